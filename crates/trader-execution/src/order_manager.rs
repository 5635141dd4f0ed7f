//! 주문 싱크 및 시뮬레이션 주문 관리.
//!
//! 제공 기능:
//! - 주문 제출 인터페이스 (`OrderSink`)
//! - 실제 거래소 커넥터 인터페이스 (`OrderSubmitter`)
//! - 메모리 기반 주문 장부 (`OrderManager`)
//! - 상태별 조회 및 통계

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};
use trader_core::{InstrumentKey, Order, OrderStatusType, OrderSubmission, Side, SubmitResponse};

use crate::settings::ExchangeLimits;

/// 주문 관리자 에러 타입.
#[derive(Debug, Error)]
pub enum OrderManagerError {
    #[error("Order already exists: {0}")]
    OrderAlreadyExists(String),

    #[error("Invalid order submission: {0}")]
    InvalidSubmission(String),

    #[error("Exchange limit violated for {key}: {reason}")]
    LimitViolation { key: InstrumentKey, reason: String },

    #[error("real order submission unavailable")]
    SubmitterUnavailable,

    #[error("Exchange error: {0}")]
    Exchange(String),
}

/// 실제 거래소로 주문을 보내는 커넥터.
pub trait OrderSubmitter {
    /// 주문을 제출합니다.
    fn submit(&mut self, submission: &OrderSubmission) -> Result<SubmitResponse, OrderManagerError>;
}

/// 실행 시뮬레이터가 주문을 넘기는 대상.
pub trait OrderSink {
    /// 실제 주문을 제출합니다.
    fn submit(&mut self, submission: &OrderSubmission) -> Result<SubmitResponse, OrderManagerError>;

    /// 시뮬레이션 응답으로 즉시 체결된 주문을 기록합니다.
    fn submit_fake_order(
        &mut self,
        submission: &OrderSubmission,
        response: SubmitResponse,
        use_exchange_limits: bool,
    ) -> Result<SubmitResponse, OrderManagerError>;

    /// 주문 스냅샷을 반환합니다. `None`이면 모든 상태를 포함합니다.
    fn orders_snapshot(&self, status: Option<OrderStatusType>) -> Vec<Order>;
}

/// 제출된 모든 주문을 추적하는 주문 관리자.
#[derive(Default)]
pub struct OrderManager {
    /// ID별 모든 주문
    orders: HashMap<String, Order>,
    /// 제출 순서
    sequence: Vec<String>,
    /// 상품별 주문
    orders_by_key: HashMap<InstrumentKey, Vec<String>>,
    /// 상품별 거래소 제한
    limits: HashMap<InstrumentKey, ExchangeLimits>,
    /// 실제 주문 커넥터
    submitter: Option<Box<dyn OrderSubmitter>>,
}

impl std::fmt::Debug for OrderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("orders", &self.orders.len())
            .field("limits", &self.limits)
            .field("has_submitter", &self.submitter.is_some())
            .finish()
    }
}

impl OrderManager {
    /// 새로운 주문 관리자를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 실제 주문 커넥터를 연결한다.
    pub fn with_submitter(mut self, submitter: Box<dyn OrderSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// 상품의 거래소 제한을 설정한다.
    pub fn set_limits(&mut self, key: InstrumentKey, limits: ExchangeLimits) {
        self.limits.insert(key, limits);
    }

    // ==================== 주문 기록 ====================

    fn add_order(&mut self, order: Order) -> Result<(), OrderManagerError> {
        if self.orders.contains_key(&order.order_id) {
            return Err(OrderManagerError::OrderAlreadyExists(order.order_id));
        }

        let order_id = order.order_id.clone();
        let key = InstrumentKey::new(&order.exchange, order.asset, order.pair.clone());

        self.orders_by_key
            .entry(key)
            .or_default()
            .push(order_id.clone());
        self.sequence.push(order_id.clone());
        self.orders.insert(order_id, order);

        Ok(())
    }

    fn validate(&self, submission: &OrderSubmission) -> Result<(), OrderManagerError> {
        if submission.exchange.is_empty() {
            return Err(OrderManagerError::InvalidSubmission("exchange name unset".to_string()));
        }
        if submission.pair.is_empty() {
            return Err(OrderManagerError::InvalidSubmission("currency pair unset".to_string()));
        }
        if !submission.side.can_transact() {
            return Err(OrderManagerError::InvalidSubmission(format!(
                "side {} cannot be submitted",
                submission.side
            )));
        }
        if submission.amount <= Decimal::ZERO {
            return Err(OrderManagerError::InvalidSubmission(format!(
                "amount {} must be positive",
                submission.amount
            )));
        }
        if submission.price < Decimal::ZERO {
            return Err(OrderManagerError::InvalidSubmission(format!(
                "price {} must not be negative",
                submission.price
            )));
        }
        Ok(())
    }

    fn check_limits(&self, submission: &OrderSubmission) -> Result<(), OrderManagerError> {
        let key = submission.key();
        if let Some(limits) = self.limits.get(&key) {
            limits
                .check_amount(submission.amount)
                .map_err(|reason| OrderManagerError::LimitViolation { key, reason })?;
        }
        Ok(())
    }

    // ==================== 조회 ====================

    /// ID로 주문을 가져온다.
    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// 상품에 대한 주문을 제출 순서대로 가져온다.
    pub fn orders_for(&self, key: &InstrumentKey) -> Vec<&Order> {
        self.orders_by_key
            .get(key)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// 총 주문 수를 가져온다.
    pub fn total_orders(&self) -> usize {
        self.orders.len()
    }

    // ==================== 통계 ====================

    /// 전체 통계를 가져온다.
    pub fn stats(&self) -> OrderStats {
        let orders: Vec<&Order> = self.orders.values().collect();
        calculate_stats(&orders)
    }

    /// 상품에 대한 통계를 가져온다.
    pub fn stats_for(&self, key: &InstrumentKey) -> OrderStats {
        calculate_stats(&self.orders_for(key))
    }
}

impl OrderSink for OrderManager {
    fn submit(&mut self, submission: &OrderSubmission) -> Result<SubmitResponse, OrderManagerError> {
        self.validate(submission)?;
        let submitter = self
            .submitter
            .as_mut()
            .ok_or(OrderManagerError::SubmitterUnavailable)?;
        let response = submitter.submit(submission)?;

        debug!(
            order_id = %response.order_id,
            key = %submission.key(),
            side = %submission.side,
            "Order submitted to exchange"
        );
        self.add_order(Order::from_response(submission, &response))?;
        Ok(response)
    }

    fn submit_fake_order(
        &mut self,
        submission: &OrderSubmission,
        response: SubmitResponse,
        use_exchange_limits: bool,
    ) -> Result<SubmitResponse, OrderManagerError> {
        self.validate(submission)?;
        if use_exchange_limits {
            if let Err(e) = self.check_limits(submission) {
                warn!(key = %submission.key(), error = %e, "Simulated order rejected");
                return Err(e);
            }
        }

        self.add_order(Order::from_response(submission, &response))?;

        debug!(
            order_id = %response.order_id,
            key = %submission.key(),
            side = %submission.side,
            amount = %submission.amount,
            price = %submission.price,
            "Simulated order recorded"
        );
        Ok(response)
    }

    fn orders_snapshot(&self, status: Option<OrderStatusType>) -> Vec<Order> {
        self.sequence
            .iter()
            .filter_map(|id| self.orders.get(id))
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect()
    }
}

fn calculate_stats(orders: &[&Order]) -> OrderStats {
    let filled: Vec<&&Order> = orders
        .iter()
        .filter(|o| o.status == OrderStatusType::Filled)
        .collect();

    OrderStats {
        total_orders: orders.len(),
        filled_orders: filled.len(),
        rejected_orders: orders
            .iter()
            .filter(|o| o.status == OrderStatusType::Rejected)
            .count(),
        buy_orders: orders.iter().filter(|o| o.side.is_buy_like()).count(),
        sell_orders: orders.iter().filter(|o| o.side.is_sell_like()).count(),
        close_orders: orders.iter().filter(|o| o.side == Side::ClosePosition).count(),
        total_volume: filled.iter().map(|o| o.amount).sum(),
        total_notional: filled.iter().map(|o| o.price * o.amount).sum(),
        total_fees: filled.iter().map(|o| o.fee).sum(),
    }
}

/// 주문 통계.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: usize,
    pub filled_orders: usize,
    pub rejected_orders: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub close_orders: usize,
    pub total_volume: Decimal,
    pub total_notional: Decimal,
    pub total_fees: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use trader_core::{AssetKind, CurrencyPair, OrderType};

    fn submission(side: Side, amount: Decimal) -> OrderSubmission {
        OrderSubmission {
            exchange: "binance".to_string(),
            asset: AssetKind::Spot,
            pair: CurrencyPair::new("BTC", "USDT"),
            side,
            order_type: OrderType::Market,
            price: dec!(100),
            amount,
        }
    }

    fn filled_response(submission: &OrderSubmission, id: &str) -> SubmitResponse {
        let mut response = submission.derive_submit_response(id, Utc::now());
        response.status = OrderStatusType::Filled;
        response.fee = dec!(0.1);
        response
    }

    struct EchoSubmitter;

    impl OrderSubmitter for EchoSubmitter {
        fn submit(&mut self, submission: &OrderSubmission) -> Result<SubmitResponse, OrderManagerError> {
            Ok(submission.derive_submit_response("exchange-1", Utc::now()))
        }
    }

    #[test]
    fn test_fake_order_is_recorded() {
        let mut manager = OrderManager::new();
        let sub = submission(Side::Buy, dec!(1));
        manager
            .submit_fake_order(&sub, filled_response(&sub, "a"), false)
            .unwrap();

        let order = manager.get_order("a").unwrap();
        assert_eq!(order.status, OrderStatusType::Filled);
        assert!(order.close_time.is_some());
        assert_eq!(manager.orders_for(&sub.key()).len(), 1);
    }

    #[test]
    fn test_duplicate_order_fails() {
        let mut manager = OrderManager::new();
        let sub = submission(Side::Buy, dec!(1));
        manager
            .submit_fake_order(&sub, filled_response(&sub, "a"), false)
            .unwrap();
        let result = manager.submit_fake_order(&sub, filled_response(&sub, "a"), false);
        assert!(matches!(result, Err(OrderManagerError::OrderAlreadyExists(_))));
    }

    #[test]
    fn test_invalid_submission_rejected() {
        let mut manager = OrderManager::new();
        let sub = submission(Side::Buy, dec!(0));
        let result = manager.submit_fake_order(&sub, filled_response(&sub, "a"), false);
        assert!(matches!(result, Err(OrderManagerError::InvalidSubmission(_))));

        let sub = submission(Side::CouldNotBuy, dec!(1));
        let result = manager.submit_fake_order(&sub, filled_response(&sub, "b"), false);
        assert!(matches!(result, Err(OrderManagerError::InvalidSubmission(_))));
    }

    #[test]
    fn test_exchange_limits_only_when_enabled() {
        let mut manager = OrderManager::new();
        let sub = submission(Side::Sell, dec!(20));
        manager.set_limits(
            sub.key(),
            ExchangeLimits {
                maximum_base_amount: dec!(10),
                ..Default::default()
            },
        );

        let result = manager.submit_fake_order(&sub, filled_response(&sub, "a"), true);
        assert!(matches!(result, Err(OrderManagerError::LimitViolation { .. })));

        assert!(manager
            .submit_fake_order(&sub, filled_response(&sub, "b"), false)
            .is_ok());
    }

    #[test]
    fn test_real_submission_requires_submitter() {
        let mut manager = OrderManager::new();
        let sub = submission(Side::Buy, dec!(1));
        assert!(matches!(
            manager.submit(&sub),
            Err(OrderManagerError::SubmitterUnavailable)
        ));

        let mut manager = OrderManager::new().with_submitter(Box::new(EchoSubmitter));
        let response = manager.submit(&sub).unwrap();
        assert_eq!(response.order_id, "exchange-1");
        assert_eq!(manager.orders_snapshot(Some(OrderStatusType::Open)).len(), 1);
        assert!(manager.orders_snapshot(Some(OrderStatusType::Filled)).is_empty());
    }

    #[test]
    fn test_snapshot_keeps_submission_order_and_stats() {
        let mut manager = OrderManager::new();
        for (id, side) in [("1", Side::Buy), ("2", Side::Sell), ("3", Side::Buy)] {
            let sub = submission(side, dec!(2));
            manager
                .submit_fake_order(&sub, filled_response(&sub, id), false)
                .unwrap();
        }

        let ids: Vec<String> = manager
            .orders_snapshot(None)
            .into_iter()
            .map(|o| o.order_id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);

        let stats = manager.stats();
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.filled_orders, 3);
        assert_eq!(stats.buy_orders, 2);
        assert_eq!(stats.sell_orders, 1);
        assert_eq!(stats.total_volume, dec!(6));
        assert_eq!(stats.total_notional, dec!(600));
        assert_eq!(stats.total_fees, dec!(0.3));
    }
}
