//! 백테스트 이벤트 타입.
//!
//! 하나의 오프셋(시뮬레이션 시간 단계)에서 발생하는 이벤트를 정의합니다:
//! - `DataEvent` - 캔들 시장 데이터
//! - `SignalEvent` - 전략 신호
//! - `OrderEvent` - 포트폴리오가 만든 주문 의도
//! - `FillEvent` - 주문 실행 결과
//! - `Event` - 위 네 가지 중 하나를 담는 합 타입

use crate::domain::order::{Order, OrderStatusType, OrderType, Side};
use crate::types::{CurrencyPair, InstrumentKey, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 모든 이벤트가 공유하는 기본 정보.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBase {
    /// 시뮬레이션 시간 단계
    pub offset: u64,
    /// 상품 키
    pub key: InstrumentKey,
    /// 이벤트 시각
    pub time: DateTime<Utc>,
    /// 캔들 간격 (초)
    pub interval_secs: u64,
    /// 선물 계약의 기초 통화쌍
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_pair: Option<CurrencyPair>,
    /// 사람이 읽을 수 있는 처리 사유 기록
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl EventBase {
    /// 새 기본 정보를 생성합니다.
    pub fn new(offset: u64, key: InstrumentKey, time: DateTime<Utc>) -> Self {
        Self {
            offset,
            key,
            time,
            interval_secs: 0,
            underlying_pair: None,
            reasons: Vec::new(),
        }
    }

    /// 캔들 간격을 설정합니다.
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// 기초 통화쌍을 설정합니다.
    pub fn with_underlying(mut self, pair: CurrencyPair) -> Self {
        self.underlying_pair = Some(pair);
        self
    }

    /// 사유를 추가합니다.
    pub fn append_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// 모든 사유를 하나의 문장으로 합칩니다.
    pub fn reason_text(&self) -> String {
        self.reasons.join(". ")
    }
}

/// 캔들 시장 데이터 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEvent {
    /// 기본 정보
    pub base: EventBase,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
    /// 데이터 소스가 누락 구간을 채운 캔들인지 여부
    #[serde(default)]
    pub missing_data: bool,
}

/// 전략 신호 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    /// 기본 정보
    pub base: EventBase,
    /// 신호 방향
    pub direction: Side,
    /// 신호 시점 종가
    pub close_price: Price,
    /// 제안 수량 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Quantity>,
}

/// 주문 의도 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// 기본 정보
    pub base: EventBase,
    /// 주문 방향
    pub direction: Side,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 주문 유형
    pub order_type: OrderType,
    /// 요청 수량
    pub amount: Quantity,
    /// 주문 시점 종가
    pub close_price: Price,
    /// 포트폴리오가 이 주문에 할당한 자금
    pub allocated_funds: Decimal,
    /// 레버리지
    pub leverage: Decimal,
    /// 청산 주문 여부
    #[serde(default)]
    pub liquidating: bool,
}

impl OrderEvent {
    /// 새 시장가 주문 이벤트를 생성합니다.
    pub fn new(
        base: EventBase,
        direction: Side,
        amount: Quantity,
        close_price: Price,
        allocated_funds: Decimal,
    ) -> Self {
        Self {
            base,
            direction,
            status: OrderStatusType::Pending,
            order_type: OrderType::Market,
            amount,
            close_price,
            allocated_funds,
            leverage: Decimal::ONE,
            liquidating: false,
        }
    }

    /// 청산 주문으로 표시합니다.
    pub fn liquidating(mut self) -> Self {
        self.liquidating = true;
        self
    }
}

/// 주문 실행 결과 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    /// 기본 정보
    pub base: EventBase,
    /// 체결 방향 (실패 시 "Could not" 변형으로 전환됨)
    pub direction: Side,
    /// 체결 수량
    pub amount: Quantity,
    /// 주문 시점 종가
    pub close_price: Price,
    /// 캔들 범위에 맞춰 조정된 가격
    pub volume_adjusted_price: Price,
    /// 실제 체결 가격
    pub purchase_price: Price,
    /// 총액 (가격 × 수량 + 수수료)
    pub total: Decimal,
    /// 거래소 수수료
    pub exchange_fee: Decimal,
    /// 슬리피지 (백분율)
    pub slippage: Decimal,
    /// 연결된 주문 기록
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    /// 청산 여부
    #[serde(default)]
    pub liquidated: bool,
}

impl FillEvent {
    /// 주문 이벤트로부터 체결 이벤트의 초기 형태를 만듭니다.
    pub fn from_order(order: &OrderEvent) -> Self {
        Self {
            base: order.base.clone(),
            direction: order.direction,
            amount: order.amount,
            close_price: order.close_price,
            volume_adjusted_price: Decimal::ZERO,
            purchase_price: Decimal::ZERO,
            total: Decimal::ZERO,
            exchange_fee: Decimal::ZERO,
            slippage: Decimal::ZERO,
            order: None,
            liquidated: order.liquidating,
        }
    }

    /// 체결 방향을 변경합니다.
    pub fn set_direction(&mut self, direction: Side) {
        self.direction = direction;
    }

    /// 사유를 추가합니다.
    pub fn append_reason(&mut self, reason: impl Into<String>) {
        self.base.append_reason(reason);
    }
}

/// 오프셋에 기록되는 이벤트 합 타입.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum Event {
    /// 시장 데이터
    Data(DataEvent),
    /// 신호
    Signal(SignalEvent),
    /// 주문
    Order(OrderEvent),
    /// 체결
    Fill(FillEvent),
}

impl Event {
    /// 기본 정보를 반환합니다.
    pub fn base(&self) -> &EventBase {
        match self {
            Event::Data(e) => &e.base,
            Event::Signal(e) => &e.base,
            Event::Order(e) => &e.base,
            Event::Fill(e) => &e.base,
        }
    }

    /// 이벤트 시점의 종가를 반환합니다.
    pub fn close_price(&self) -> Price {
        match self {
            Event::Data(e) => e.close,
            Event::Signal(e) => e.close_price,
            Event::Order(e) => e.close_price,
            Event::Fill(e) => e.close_price,
        }
    }
}

impl From<DataEvent> for Event {
    fn from(e: DataEvent) -> Self {
        Event::Data(e)
    }
}

impl From<SignalEvent> for Event {
    fn from(e: SignalEvent) -> Self {
        Event::Signal(e)
    }
}

impl From<OrderEvent> for Event {
    fn from(e: OrderEvent) -> Self {
        Event::Order(e)
    }
}

impl From<FillEvent> for Event {
    fn from(e: FillEvent) -> Self {
        Event::Fill(e)
    }
}
