//! 상품별 통계 원장.
//!
//! 오프셋마다 `DataAtOffset` 하나를 두고, 시장 데이터가 처음 도착할 때 만든 뒤
//! 같은 오프셋의 신호/주문/체결/보유 자산/손익/컴플라이언스 기록으로 채워 나갑니다.
//! 실행이 끝나면 `calculate_results`가 최종 지표를 계산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use trader_core::{
    ComplianceSnapshot, CurrencyPair, DataEvent, DecimalExt, Event, FillEvent, Holding,
    InstrumentKey, OrderEvent, PnlSummary, Price, Side, SignalEvent,
};

use crate::error::{StatisticsError, StatisticsResult};
use crate::performance::{
    calculate_biggest_swing, compound_annual_growth_rate, percentage_returns, Ratios, Swing,
    ValueAtTime,
};

/// 한 오프셋에 모인 이벤트와 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAtOffset {
    /// 시뮬레이션 시간 단계
    pub offset: u64,
    /// 마지막으로 기록된 이벤트 시각
    pub time: DateTime<Utc>,
    /// 마지막으로 기록된 이벤트의 종가
    pub close_price: Price,
    /// 시장 데이터
    pub data_event: DataEvent,
    /// 전략 신호
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_event: Option<SignalEvent>,
    /// 주문 의도
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_event: Option<OrderEvent>,
    /// 체결 결과
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_event: Option<FillEvent>,
    /// 보유 자산
    pub holdings: Holding,
    /// 손익 요약
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<PnlSummary>,
    /// 컴플라이언스 스냅샷
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<ComplianceSnapshot>,
}

impl DataAtOffset {
    fn new(event: DataEvent) -> Self {
        Self {
            offset: event.base.offset,
            time: event.base.time,
            close_price: event.close,
            data_event: event,
            signal_event: None,
            order_event: None,
            fill_event: None,
            holdings: Holding::default(),
            pnl: None,
            transactions: None,
        }
    }

    /// 이벤트를 종류에 맞는 자리에 기록하고 시각/종가/오프셋을 갱신합니다.
    fn apply(&mut self, event: Event) {
        self.time = event.base().time;
        self.close_price = event.close_price();
        self.offset = event.base().offset;
        match event {
            Event::Data(e) => self.data_event = e,
            Event::Signal(e) => self.signal_event = Some(e),
            Event::Order(e) => self.order_event = Some(e),
            Event::Fill(e) => self.fill_event = Some(e),
        }
    }
}

/// 단일 상품의 통계 원장과 최종 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPairStatistic {
    /// 상품 키
    pub key: InstrumentKey,
    /// 선물 계약의 기초 통화쌍
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_pair: Option<CurrencyPair>,
    /// 오프셋 순서의 기록
    pub events: Vec<DataAtOffset>,
    #[serde(skip)]
    index: HashMap<u64, usize>,

    pub show_missing_data_warning: bool,
    pub is_strategy_profitable: bool,
    pub does_performance_beat_the_market: bool,

    pub buy_orders: u64,
    pub sell_orders: u64,
    pub long_orders: u64,
    pub short_orders: u64,
    pub total_orders: u64,

    pub lowest_closed_price: Option<ValueAtTime>,
    pub highest_closed_price: Option<ValueAtTime>,
    /// 시장 가격 변화율 (%)
    pub market_movement: Decimal,
    /// 전략 가치 변화율 (%)
    pub strategy_movement: Decimal,
    pub unrealised_pnl: Decimal,
    pub realised_pnl: Decimal,
    /// 연복리 성장률 (%)
    pub compound_annual_growth_rate: Decimal,
    pub max_drawdown: Swing,
    pub ratios: Ratios,

    pub initial_holdings: Holding,
    pub final_holdings: Holding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_orders: Option<ComplianceSnapshot>,
}

impl CurrencyPairStatistic {
    /// 빈 원장을 생성합니다.
    pub fn new(key: InstrumentKey, underlying_pair: Option<CurrencyPair>) -> Self {
        Self {
            key,
            underlying_pair,
            events: Vec::new(),
            index: HashMap::new(),
            show_missing_data_warning: false,
            is_strategy_profitable: false,
            does_performance_beat_the_market: false,
            buy_orders: 0,
            sell_orders: 0,
            long_orders: 0,
            short_orders: 0,
            total_orders: 0,
            lowest_closed_price: None,
            highest_closed_price: None,
            market_movement: Decimal::ZERO,
            strategy_movement: Decimal::ZERO,
            unrealised_pnl: Decimal::ZERO,
            realised_pnl: Decimal::ZERO,
            compound_annual_growth_rate: Decimal::ZERO,
            max_drawdown: Swing::default(),
            ratios: Ratios::default(),
            initial_holdings: Holding::default(),
            final_holdings: Holding::default(),
            final_orders: None,
        }
    }

    /// 시장 데이터 이벤트로 새 오프셋을 엽니다.
    ///
    /// 같은 오프셋이 이미 있으면 기존 기록을 건드리지 않고 실패합니다.
    pub fn record_market_event(&mut self, event: DataEvent) -> StatisticsResult<()> {
        let offset = event.base.offset;
        if self.position(offset).is_some() {
            return Err(StatisticsError::AlreadyProcessed {
                key: self.key.clone(),
                offset,
            });
        }
        self.index.insert(offset, self.events.len());
        self.events.push(DataAtOffset::new(event));
        Ok(())
    }

    /// 오프셋의 기록 위치를 찾습니다.
    ///
    /// 색인에 없으면 (역직렬화 직후 등) 최근 기록부터 거꾸로 찾습니다.
    fn position(&self, offset: u64) -> Option<usize> {
        self.index
            .get(&offset)
            .copied()
            .filter(|&i| self.events.get(i).is_some_and(|e| e.offset == offset))
            .or_else(|| self.events.iter().rposition(|e| e.offset == offset))
    }

    fn entry_mut(&mut self, offset: u64) -> Option<&mut DataAtOffset> {
        let i = self.position(offset)?;
        self.events.get_mut(i)
    }

    fn no_data_at(&self, offset: u64) -> StatisticsError {
        StatisticsError::NoDataAtOffset {
            key: self.key.clone(),
            offset,
        }
    }

    /// 이벤트를 해당 오프셋 기록에 반영합니다.
    pub fn apply_event(&mut self, event: Event) -> StatisticsResult<()> {
        let offset = event.base().offset;
        match self.entry_mut(offset) {
            Some(entry) => {
                entry.apply(event);
                Ok(())
            }
            None => Err(StatisticsError::NoRelevantStatsFound {
                key: self.key.clone(),
                offset,
            }),
        }
    }

    /// 보유 자산 스냅샷을 기록합니다.
    pub fn set_holdings(&mut self, holding: &Holding) -> StatisticsResult<()> {
        match self.entry_mut(holding.offset) {
            Some(entry) => {
                entry.holdings = holding.clone();
                Ok(())
            }
            None => Err(self.no_data_at(holding.offset)),
        }
    }

    /// 손익 요약을 기록합니다. 보유 수량은 손익의 노출 수량으로 덮어씁니다.
    pub fn set_pnl(&mut self, pnl: &PnlSummary) -> StatisticsResult<()> {
        match self.entry_mut(pnl.offset) {
            Some(entry) => {
                entry.holdings.base_size = pnl.result.exposure;
                entry.pnl = Some(pnl.clone());
                Ok(())
            }
            None => Err(self.no_data_at(pnl.offset)),
        }
    }

    /// 컴플라이언스 스냅샷을 기록합니다.
    pub fn set_compliance(&mut self, snapshot: ComplianceSnapshot, offset: u64) -> StatisticsResult<()> {
        match self.entry_mut(offset) {
            Some(entry) => {
                entry.transactions = Some(snapshot);
                Ok(())
            }
            None => Err(self.no_data_at(offset)),
        }
    }

    /// 첫 기록을 반환합니다.
    pub fn first(&self) -> Option<&DataAtOffset> {
        self.events.first()
    }

    /// 마지막 기록을 반환합니다.
    pub fn last(&self) -> Option<&DataAtOffset> {
        self.events.last()
    }

    /// 오프셋의 기록을 반환합니다.
    pub fn at_offset(&self, offset: u64) -> Option<&DataAtOffset> {
        self.position(offset).and_then(|i| self.events.get(i))
    }

    /// 최종 지표를 계산합니다.
    ///
    /// 주문 수, 최고/최저 종가, 시장/전략 변화율, 최대 낙폭, 위험 조정 지표, 연복리
    /// 성장률을 채우고 첫/마지막 보유 자산과 마지막 컴플라이언스 스냅샷을 최종 값으로 둡니다.
    pub fn calculate_results(&mut self, risk_free_rate: Decimal, interval_secs: u64) -> StatisticsResult<()> {
        let (first, last) = match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => (first.clone(), last.clone()),
            _ => return Err(StatisticsError::NoEvents(self.key.clone())),
        };

        self.buy_orders = 0;
        self.sell_orders = 0;
        self.long_orders = 0;
        self.short_orders = 0;
        self.show_missing_data_warning = false;
        self.lowest_closed_price = None;
        self.highest_closed_price = None;

        for entry in &self.events {
            if entry.data_event.missing_data {
                self.show_missing_data_warning = true;
            }
            if let Some(fill) = &entry.fill_event {
                match fill.direction {
                    Side::Buy | Side::Bid => self.buy_orders += 1,
                    Side::Sell | Side::Ask => self.sell_orders += 1,
                    Side::Long => self.long_orders += 1,
                    Side::Short => self.short_orders += 1,
                    _ => {}
                }
            }

            let close = entry.data_event.close;
            if close.is_zero() {
                continue;
            }
            if self.lowest_closed_price.map_or(true, |l| close < l.value) {
                self.lowest_closed_price = Some(ValueAtTime::new(entry.time, close));
            }
            if self.highest_closed_price.map_or(true, |h| close > h.value) {
                self.highest_closed_price = Some(ValueAtTime::new(entry.time, close));
            }
        }
        self.total_orders = self.buy_orders + self.sell_orders + self.long_orders + self.short_orders;

        self.initial_holdings = first.holdings.clone();
        self.final_holdings = last.holdings.clone();
        self.final_orders = last.transactions.clone();

        self.market_movement = first
            .data_event
            .close
            .checked_percent_change_to(last.data_event.close)
            .ok_or(StatisticsError::ArithmeticOverflow("market movement"))?;
        self.strategy_movement = first
            .holdings
            .total_value
            .checked_percent_change_to(last.holdings.total_value)
            .ok_or(StatisticsError::ArithmeticOverflow("strategy movement"))?;

        if let Some(pnl) = &last.pnl {
            self.unrealised_pnl = pnl.result.unrealised_pnl;
            self.realised_pnl = pnl.result.realised_pnl;
            self.is_strategy_profitable = self.unrealised_pnl + self.realised_pnl > Decimal::ZERO;
        } else {
            self.is_strategy_profitable = last.holdings.total_value > first.holdings.total_value;
        }
        self.does_performance_beat_the_market = self.strategy_movement > self.market_movement;

        let closes: Vec<ValueAtTime> = self
            .events
            .iter()
            .map(|e| ValueAtTime::new(e.time, e.data_event.close))
            .collect();
        self.max_drawdown = calculate_biggest_swing(&closes);

        let interval = match first.data_event.base.interval_secs {
            0 => interval_secs,
            secs => secs,
        };
        let close_values: Vec<Decimal> = closes.iter().map(|c| c.value).collect();
        self.ratios = Ratios::from_returns(&percentage_returns(&close_values)?, risk_free_rate, interval)?;
        self.compound_annual_growth_rate = compound_annual_growth_rate(
            first.holdings.total_value,
            last.holdings.total_value,
            interval,
            self.events.len().saturating_sub(1),
        );

        debug!(
            key = %self.key,
            events = self.events.len(),
            total_orders = self.total_orders,
            "Currency statistics calculated"
        );
        Ok(())
    }

    /// 최종 결과를 로그로 출력합니다.
    pub fn print_results(&self) {
        info!(
            key = %self.key,
            buy_orders = self.buy_orders,
            sell_orders = self.sell_orders,
            long_orders = self.long_orders,
            short_orders = self.short_orders,
            total_orders = self.total_orders,
            "Order counts"
        );
        info!(
            key = %self.key,
            market_movement = %self.market_movement.round_dp(4),
            strategy_movement = %self.strategy_movement.round_dp(4),
            beat_the_market = self.does_performance_beat_the_market,
            profitable = self.is_strategy_profitable,
            "Movements"
        );
        info!(
            key = %self.key,
            max_drawdown = %self.max_drawdown.drawdown_percent.round_dp(4),
            sharpe = %self.ratios.sharpe_ratio.round_dp(4),
            sortino = %self.ratios.sortino_ratio.round_dp(4),
            cagr = %self.compound_annual_growth_rate.round_dp(4),
            "Ratios"
        );
        if self.unrealised_pnl != Decimal::ZERO || self.realised_pnl != Decimal::ZERO {
            info!(
                key = %self.key,
                unrealised_pnl = %self.unrealised_pnl,
                realised_pnl = %self.realised_pnl,
                "PNL"
            );
        }
        if self.show_missing_data_warning {
            info!(key = %self.key, "Missing data was detected during this backtesting run");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use trader_core::{AssetKind, EventBase, PnlResult};

    fn key() -> InstrumentKey {
        InstrumentKey::new("binance", AssetKind::Spot, CurrencyPair::new("BTC", "USDT"))
    }

    fn time(offset: u64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset as i64)
    }

    fn candle(offset: u64, close: Decimal) -> DataEvent {
        DataEvent {
            base: EventBase::new(offset, key(), time(offset)).with_interval_secs(86_400),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
            missing_data: false,
        }
    }

    fn holding(offset: u64, total_value: Decimal) -> Holding {
        Holding {
            key: key(),
            offset,
            timestamp: Some(time(offset)),
            total_value,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_offset_keeps_original() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        stats.record_market_event(candle(1, dec!(100))).unwrap();

        let err = stats.record_market_event(candle(1, dec!(200))).unwrap_err();
        assert!(matches!(err, StatisticsError::AlreadyProcessed { offset: 1, .. }));
        assert_eq!(stats.events.len(), 1);
        assert_eq!(stats.events[0].close_price, dec!(100));
    }

    #[test]
    fn test_pnl_overwrites_exposure() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        stats.record_market_event(candle(1, dec!(100))).unwrap();
        stats.set_holdings(&holding(1, dec!(1000))).unwrap();

        let pnl = PnlSummary {
            key: key(),
            offset: 1,
            result: PnlResult {
                exposure: dec!(3),
                ..Default::default()
            },
        };
        stats.set_pnl(&pnl).unwrap();

        let entry = stats.at_offset(1).unwrap();
        assert_eq!(entry.holdings.base_size, dec!(3));
        assert_eq!(entry.holdings.total_value, dec!(1000));
        assert!(entry.pnl.is_some());
    }

    #[test]
    fn test_unknown_offset_fails() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        stats.record_market_event(candle(1, dec!(100))).unwrap();

        assert!(matches!(
            stats.set_holdings(&holding(7, dec!(1))),
            Err(StatisticsError::NoDataAtOffset { offset: 7, .. })
        ));
        assert!(matches!(
            stats.apply_event(Event::Data(candle(7, dec!(1)))),
            Err(StatisticsError::NoRelevantStatsFound { offset: 7, .. })
        ));
    }

    #[test]
    fn test_lookup_survives_serde_round_trip() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        stats.record_market_event(candle(1, dec!(100))).unwrap();
        stats.record_market_event(candle(2, dec!(110))).unwrap();

        let json = serde_json::to_string(&stats).unwrap();
        let mut restored: CurrencyPairStatistic = serde_json::from_str(&json).unwrap();
        restored.set_holdings(&holding(2, dec!(5))).unwrap();
        assert_eq!(restored.at_offset(2).unwrap().holdings.total_value, dec!(5));
    }

    #[test]
    fn test_calculate_results() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        for (offset, close, value) in [
            (0, dec!(100), dec!(1000)),
            (1, dec!(120), dec!(1100)),
            (2, dec!(90), dec!(1050)),
            (3, dec!(110), dec!(1200)),
        ] {
            let mut data = candle(offset, close);
            data.missing_data = offset == 2;
            stats.record_market_event(data).unwrap();
            stats.set_holdings(&holding(offset, value)).unwrap();
        }

        let order = OrderEvent::new(
            EventBase::new(1, key(), time(1)),
            Side::Buy,
            dec!(1),
            dec!(120),
            dec!(120),
        );
        let mut fill = FillEvent::from_order(&order);
        stats.apply_event(Event::Fill(fill.clone())).unwrap();

        fill.base.offset = 3;
        fill.set_direction(Side::CouldNotSell);
        stats.apply_event(Event::Fill(fill)).unwrap();

        stats.calculate_results(Decimal::ZERO, 0).unwrap();

        assert_eq!(stats.buy_orders, 1);
        assert_eq!(stats.sell_orders, 0);
        assert_eq!(stats.total_orders, 1);
        assert!(stats.show_missing_data_warning);
        assert_eq!(stats.market_movement, dec!(10));
        assert_eq!(stats.strategy_movement, dec!(20));
        assert!(stats.is_strategy_profitable);
        assert!(stats.does_performance_beat_the_market);
        assert_eq!(stats.highest_closed_price.unwrap().value, dec!(120));
        assert_eq!(stats.lowest_closed_price.unwrap().value, dec!(90));
        assert_eq!(stats.max_drawdown.drawdown_percent, dec!(25));
        assert_eq!(stats.initial_holdings.total_value, dec!(1000));
        assert_eq!(stats.final_holdings.total_value, dec!(1200));
        assert!(stats.compound_annual_growth_rate > Decimal::ZERO);
    }

    #[test]
    fn test_calculate_results_without_events() {
        let mut stats = CurrencyPairStatistic::new(key(), None);
        assert!(matches!(
            stats.calculate_results(Decimal::ZERO, 0),
            Err(StatisticsError::NoEvents(_))
        ));
    }
}
