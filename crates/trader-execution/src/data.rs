//! 시장 데이터 소스 인터페이스.

use trader_core::{DataEvent, InstrumentKey, OrderBook, Price, Quantity};

use crate::exchange::ExecutionError;

/// 단일 상품의 캔들 스트림과 호가창 조회.
///
/// 스트림은 시간순이며 가장 최근 값이 마지막에 있습니다.
pub trait DataHandler {
    /// 고가 스트림
    fn stream_high(&self) -> &[Price];

    /// 저가 스트림
    fn stream_low(&self) -> &[Price];

    /// 거래량 스트림
    fn stream_volume(&self) -> &[Quantity];

    /// 현재 호가창. 호가창을 제공하지 않는 소스는 `None`입니다.
    fn order_book(&self) -> Option<OrderBook> {
        None
    }

    /// 가장 최근 캔들의 (고가, 저가, 거래량)을 반환합니다.
    fn latest_high_low_volume(&self) -> Result<(Price, Price, Quantity), ExecutionError> {
        match (
            self.stream_high().last(),
            self.stream_low().last(),
            self.stream_volume().last(),
        ) {
            (Some(high), Some(low), Some(volume)) => Ok((*high, *low, *volume)),
            _ => Err(ExecutionError::NoCandleData),
        }
    }
}

/// 메모리에 쌓이는 캔들 스트림.
#[derive(Debug, Clone, Default)]
pub struct CandleStream {
    key: InstrumentKey,
    high: Vec<Price>,
    low: Vec<Price>,
    volume: Vec<Quantity>,
    book: Option<OrderBook>,
}

impl CandleStream {
    /// 빈 스트림을 생성합니다.
    pub fn new(key: InstrumentKey) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// 상품 키를 반환합니다.
    pub fn key(&self) -> &InstrumentKey {
        &self.key
    }

    /// 캔들 이벤트를 스트림에 추가합니다.
    pub fn push(&mut self, event: &DataEvent) {
        self.push_candle(event.high, event.low, event.volume);
    }

    /// 고가/저가/거래량을 스트림에 추가합니다.
    pub fn push_candle(&mut self, high: Price, low: Price, volume: Quantity) {
        self.high.push(high);
        self.low.push(low);
        self.volume.push(volume);
    }

    /// 호가창 스냅샷을 교체합니다.
    pub fn set_order_book(&mut self, book: OrderBook) {
        self.book = Some(book);
    }

    /// 저장된 캔들 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.high.len()
    }

    /// 스트림이 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.high.is_empty()
    }
}

impl DataHandler for CandleStream {
    fn stream_high(&self) -> &[Price] {
        &self.high
    }

    fn stream_low(&self) -> &[Price] {
        &self.low
    }

    fn stream_volume(&self) -> &[Quantity] {
        &self.volume
    }

    fn order_book(&self) -> Option<OrderBook> {
        self.book.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trader_core::{AssetKind, CurrencyPair};

    #[test]
    fn test_latest_candle_is_most_recent() {
        let mut stream = CandleStream::new(InstrumentKey::new(
            "binance",
            AssetKind::Spot,
            CurrencyPair::new("BTC", "USDT"),
        ));
        assert!(matches!(
            stream.latest_high_low_volume(),
            Err(ExecutionError::NoCandleData)
        ));

        stream.push_candle(dec!(110), dec!(90), dec!(1000));
        stream.push_candle(dec!(120), dec!(95), dec!(2000));

        assert_eq!(stream.len(), 2);
        assert_eq!(
            stream.latest_high_low_volume().unwrap(),
            (dec!(120), dec!(95), dec!(2000))
        );
        assert!(stream.order_book().is_none());
    }
}
