//! 포트폴리오 스냅샷 타입.
//!
//! 포트폴리오 계층이 오프셋마다 만들어 통계 원장에 기록하는 값들입니다:
//! - `Holding` - 보유 자산 스냅샷
//! - `PnlSummary` - 손익 요약
//! - `ComplianceSnapshot` - 체결 거래 기록 스냅샷

use crate::domain::order::{Order, Side};
use crate::types::{InstrumentKey, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 특정 오프셋의 보유 자산 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// 상품 키
    pub key: InstrumentKey,
    /// 오프셋
    pub offset: u64,
    /// 스냅샷 시각
    pub timestamp: Option<DateTime<Utc>>,
    /// 기준 통화 초기 자금
    pub base_initial_funds: Quantity,
    /// 기준 통화 보유량 (선물은 노출 규모)
    pub base_size: Quantity,
    /// 기준 통화 평가액
    pub base_value: Decimal,
    /// 호가 통화 초기 자금
    pub quote_initial_funds: Decimal,
    /// 호가 통화 보유량
    pub quote_size: Decimal,
    /// 누적 매수 수량
    pub bought_amount: Quantity,
    /// 누적 매도 수량
    pub sold_amount: Quantity,
    /// 누적 수수료
    pub total_fees: Decimal,
    /// 총 평가액 (호가 통화 기준)
    pub total_value: Decimal,
}

/// 손익 계산 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlResult {
    /// 계산 시각
    pub time: Option<DateTime<Utc>>,
    /// 미실현 손익
    pub unrealised_pnl: Decimal,
    /// 실현 손익
    pub realised_pnl: Decimal,
    /// 기준 가격
    pub price: Price,
    /// 현재 노출 규모
    pub exposure: Quantity,
    /// 포지션 방향
    pub direction: Side,
    /// 수수료
    pub fee: Decimal,
    /// 청산 여부
    pub is_liquidated: bool,
}

/// 오프셋별 손익 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSummary {
    /// 상품 키
    pub key: InstrumentKey,
    /// 오프셋
    pub offset: u64,
    /// 손익 결과
    pub result: PnlResult,
}

/// 컴플라이언스 스냅샷에 포함되는 주문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotOrder {
    /// 주문 기록
    pub order: Order,
    /// 주문 시점 종가
    pub closing_price: Price,
    /// 실제 체결 여부
    pub has_traded: bool,
    /// 취득 원가
    pub cost_basis: Decimal,
    /// 슬리피지 비율
    pub slippage_rate: Decimal,
}

/// 특정 오프셋까지 체결된 거래 기록 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSnapshot {
    /// 오프셋
    pub offset: u64,
    /// 스냅샷 시각
    pub timestamp: Option<DateTime<Utc>>,
    /// 누적 주문 목록
    pub orders: Vec<SnapshotOrder>,
}

impl ComplianceSnapshot {
    /// 실제 체결된 주문 수를 반환합니다.
    pub fn traded_count(&self) -> usize {
        self.orders.iter().filter(|o| o.has_traded).count()
    }
}
