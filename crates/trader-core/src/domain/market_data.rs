//! 호가창 데이터.

use crate::types::{InstrumentKey, Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 호가 레벨.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// 가격
    pub price: Price,
    /// 수량
    pub quantity: Quantity,
}

impl OrderBookLevel {
    /// 새 호가 레벨을 생성합니다.
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }
}

/// 호가창 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// 상품 키
    pub key: InstrumentKey,
    /// 매수 호가 - 가격 내림차순 정렬
    pub bids: Vec<OrderBookLevel>,
    /// 매도 호가 - 가격 오름차순 정렬
    pub asks: Vec<OrderBookLevel>,
    /// 마지막 업데이트 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// 최우선 매수 호가를 반환합니다.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    /// 최우선 매도 호가를 반환합니다.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    /// 중간 가격을 반환합니다.
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetKind, CurrencyPair};
    use rust_decimal_macros::dec;

    #[test]
    fn test_best_levels() {
        let book = OrderBook {
            key: InstrumentKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT")),
            bids: vec![OrderBookLevel::new(dec!(99), dec!(1)), OrderBookLevel::new(dec!(98), dec!(2))],
            asks: vec![OrderBookLevel::new(dec!(101), dec!(1))],
            timestamp: Utc::now(),
        };
        assert_eq!(book.best_bid(), Some(dec!(99)));
        assert_eq!(book.best_ask(), Some(dec!(101)));
        assert_eq!(book.mid_price(), Some(dec!(100)));
    }
}
