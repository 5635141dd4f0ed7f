//! 주문 타입 및 주문 기록.
//!
//! 이 모듈은 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (거절된 방향 변형 포함)
//! - `OrderType` - 주문 유형
//! - `OrderStatusType` - 주문 상태
//! - `OrderSubmission` - 주문 제출 요청
//! - `SubmitResponse` - 주문 제출 응답
//! - `Order` - 주문 싱크에 저장되는 주문 기록

use crate::error::TraderError;
use crate::types::{AssetKind, CurrencyPair, InstrumentKey, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 주문 방향.
///
/// 거래 가능한 방향 외에 실행 실패 시 사용되는 "Could not" 변형을 포함합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
    /// 매수 호가
    Bid,
    /// 매도 호가
    Ask,
    /// 롱 포지션
    Long,
    /// 숏 포지션
    Short,
    /// 포지션 청산
    ClosePosition,
    /// 아무것도 하지 않음
    #[default]
    DoNothing,
    /// 데이터 누락
    MissingData,
    /// 매수 실패
    CouldNotBuy,
    /// 매도 실패
    CouldNotSell,
    /// 롱 진입 실패
    CouldNotLong,
    /// 숏 진입 실패
    CouldNotShort,
}

impl Side {
    /// 실제 거래를 발생시키는 방향인지 확인합니다.
    pub fn can_transact(&self) -> bool {
        matches!(
            self,
            Side::Buy
                | Side::Sell
                | Side::Bid
                | Side::Ask
                | Side::Long
                | Side::Short
                | Side::ClosePosition
        )
    }

    /// 가격 상승 방향(매수 계열)인지 확인합니다.
    pub fn is_buy_like(&self) -> bool {
        matches!(self, Side::Buy | Side::Bid | Side::Long)
    }

    /// 가격 하락 방향(매도 계열)인지 확인합니다.
    pub fn is_sell_like(&self) -> bool {
        matches!(self, Side::Sell | Side::Ask | Side::Short)
    }

    /// 실행 실패 시 전환되는 "Could not" 방향을 반환합니다.
    ///
    /// 대응하는 거절 방향이 없으면 `DoNothing`입니다.
    pub fn declined(&self) -> Side {
        match self {
            Side::Buy | Side::Bid => Side::CouldNotBuy,
            Side::Sell | Side::Ask => Side::CouldNotSell,
            Side::Long => Side::CouldNotLong,
            Side::Short => Side::CouldNotShort,
            _ => Side::DoNothing,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::Bid => "BID",
            Side::Ask => "ASK",
            Side::Long => "LONG",
            Side::Short => "SHORT",
            Side::ClosePosition => "CLOSE POSITION",
            Side::DoNothing => "DO NOTHING",
            Side::MissingData => "MISSING DATA",
            Side::CouldNotBuy => "COULD NOT BUY",
            Side::CouldNotSell => "COULD NOT SELL",
            Side::CouldNotLong => "COULD NOT LONG",
            Side::CouldNotShort => "COULD NOT SHORT",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Side {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['_', '-'], " ");
        let side = match normalized.as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            "BID" => Side::Bid,
            "ASK" => Side::Ask,
            "LONG" => Side::Long,
            "SHORT" => Side::Short,
            "CLOSE POSITION" => Side::ClosePosition,
            "DO NOTHING" => Side::DoNothing,
            "MISSING DATA" => Side::MissingData,
            "COULD NOT BUY" => Side::CouldNotBuy,
            "COULD NOT SELL" => Side::CouldNotSell,
            "COULD NOT LONG" => Side::CouldNotLong,
            "COULD NOT SHORT" => Side::CouldNotShort,
            _ => return Err(TraderError::InvalidInput(format!("unknown side: {}", s))),
        };
        Ok(side)
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문
    #[default]
    Market,
    /// 지정가 주문
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 주문 생성됨 (아직 제출되지 않음)
    #[default]
    Pending,
    /// 거래소에 제출됨 (대기 중)
    Open,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
    /// 거부됨
    Rejected,
}

impl OrderStatusType {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Filled | OrderStatusType::Cancelled | OrderStatusType::Rejected
        )
    }
}

/// 주문 싱크로 전달되는 주문 제출 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmission {
    /// 거래소 이름
    pub exchange: String,
    /// 자산 유형
    pub asset: AssetKind,
    /// 통화쌍
    pub pair: CurrencyPair,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 가격
    pub price: Price,
    /// 주문 수량
    pub amount: Quantity,
}

impl OrderSubmission {
    /// 상품 키를 반환합니다.
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey::new(&self.exchange, self.asset, self.pair.clone())
    }

    /// 제출 요청을 기반으로 주문 응답의 기본 형태를 만듭니다.
    pub fn derive_submit_response(&self, order_id: impl Into<String>, at: DateTime<Utc>) -> SubmitResponse {
        SubmitResponse {
            order_id: order_id.into(),
            status: OrderStatusType::Open,
            price: self.price,
            amount: self.amount,
            fee: Decimal::ZERO,
            cost: self.price * self.amount,
            date: at,
            last_updated: at,
        }
    }
}

/// 주문 제출 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// 주문 ID
    pub order_id: String,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 체결 가격
    pub price: Price,
    /// 체결 수량
    pub amount: Quantity,
    /// 수수료
    pub fee: Decimal,
    /// 총 비용
    pub cost: Decimal,
    /// 생성 시각
    pub date: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub last_updated: DateTime<Utc>,
}

/// 주문 싱크에 저장된 주문 기록.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// 주문 ID
    pub order_id: String,
    /// 거래소 이름
    pub exchange: String,
    /// 자산 유형
    pub asset: AssetKind,
    /// 통화쌍
    pub pair: CurrencyPair,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 체결 가격
    pub price: Price,
    /// 체결 수량
    pub amount: Quantity,
    /// 수수료
    pub fee: Decimal,
    /// 총 비용
    pub cost: Decimal,
    /// 생성 시각
    pub date: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub last_updated: DateTime<Utc>,
    /// 종료 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
}

impl Order {
    /// 제출 요청과 응답으로 주문 기록을 생성합니다.
    pub fn from_response(submission: &OrderSubmission, response: &SubmitResponse) -> Self {
        Self {
            order_id: response.order_id.clone(),
            exchange: submission.exchange.clone(),
            asset: submission.asset,
            pair: submission.pair.clone(),
            side: submission.side,
            order_type: submission.order_type,
            status: response.status,
            price: response.price,
            amount: response.amount,
            fee: response.fee,
            cost: response.cost,
            date: response.date,
            last_updated: response.last_updated,
            close_time: response.status.is_final().then_some(response.last_updated),
        }
    }
}
