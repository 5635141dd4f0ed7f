//! 실행 시뮬레이터와 통계 원장을 함께 돌리는 재생 테스트.
//!
//! 두 상품에 캔들을 흘리고 첫 캔들에서 매수한 뒤, 보유 자산을 기록하고
//! 실행 전체 결과를 계산합니다.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_analytics::{FundingItemReport, FundingReport, Statistic, StatisticsError};
use trader_core::{
    AssetKind, BacktestConfig, ComplianceSnapshot, CurrencyPair, DataEvent, Event, EventBase,
    Holding, InstrumentKey, OrderEvent, Side,
};
use trader_execution::{
    CandleStream, Exchange, FundItem, InMemoryFunds, OrderManager, OrderSink, SettingsRegistry,
    SpotPair,
};

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

const CONFIG: &str = r#"
[statistics]
strategy_name = "buy-and-hold"

[[currencies]]
exchange = "binance"
asset = "spot"
base = "BTC"
quote = "USDT"
taker_fee = "0"

[[currencies]]
exchange = "binance"
asset = "spot"
base = "ETH"
quote = "USDT"
taker_fee = "0"
"#;

fn key(base: &str) -> InstrumentKey {
    InstrumentKey::new("binance", AssetKind::Spot, CurrencyPair::new(base, "USDT"))
}

fn time(offset: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + Duration::days(offset as i64)
}

fn candle(key: &InstrumentKey, offset: u64, close: Decimal) -> DataEvent {
    DataEvent {
        base: EventBase::new(offset, key.clone(), time(offset)).with_interval_secs(86_400),
        open: close,
        high: close + dec!(5),
        low: close - dec!(5),
        close,
        volume: dec!(1_000_000),
        missing_data: false,
    }
}

struct Instrument {
    key: InstrumentKey,
    closes: [Decimal; 3],
    candles: CandleStream,
    funds: InMemoryFunds,
}

impl Instrument {
    fn new(base: &str, closes: [Decimal; 3]) -> Self {
        Self {
            key: key(base),
            closes,
            candles: CandleStream::new(key(base)),
            funds: InMemoryFunds::Pair(SpotPair::new(
                FundItem::new(base, Decimal::ZERO),
                FundItem::new("USDT", dec!(1000)),
            )),
        }
    }

    fn pair(&self) -> &SpotPair {
        match &self.funds {
            InMemoryFunds::Pair(pair) => pair,
            InMemoryFunds::Collateral(_) => panic!("expected spot funds"),
        }
    }

    fn holding(&self, offset: u64, close: Decimal) -> Holding {
        let pair = self.pair();
        let base_value = pair.base.available * close;
        Holding {
            key: self.key.clone(),
            offset,
            timestamp: Some(time(offset)),
            base_size: pair.base.available,
            base_value,
            quote_initial_funds: pair.quote.initial,
            quote_size: pair.quote.available,
            total_value: pair.quote.available + base_value,
            ..Default::default()
        }
    }
}

fn replay(stats: &mut Statistic, exchange: &mut Exchange, manager: &mut OrderManager, inst: &mut Instrument) -> anyhow::Result<()> {
    for (offset, close) in inst.closes.into_iter().enumerate() {
        let offset = offset as u64;
        let data = candle(&inst.key, offset, close);
        stats.setup_event_for_time(&data)?;
        inst.candles.push(&data);

        if offset == 0 {
            let order = OrderEvent::new(data.base.clone(), Side::Buy, dec!(1), close, close);
            if let InMemoryFunds::Pair(pair) = &mut inst.funds {
                pair.quote.reserve(close)?;
            }
            stats.set_event_for_offset(Event::Order(order.clone()))?;

            let fill = exchange.execute_order(&order, &inst.candles, manager, &mut inst.funds)?;
            stats.set_event_for_offset(Event::Fill(fill.clone()))?;
            stats.add_compliance_snapshot_for_time(
                ComplianceSnapshot {
                    offset,
                    timestamp: Some(time(offset)),
                    orders: Vec::new(),
                },
                &fill,
            )?;
        }

        stats.add_holdings_for_time(&inst.holding(offset, close))?;
    }
    Ok(())
}

fn funding_item(inst: &Instrument) -> FundingItemReport {
    let quote = &inst.pair().quote;
    FundingItemReport {
        exchange: "binance".to_string(),
        asset: AssetKind::Spot,
        currency: quote.currency.clone(),
        initial_funds: quote.initial,
        final_funds: quote.available,
        is_collateral: false,
    }
}

// ============================================================================
// 통합 테스트
// ============================================================================

#[test]
fn test_two_instrument_replay() -> anyhow::Result<()> {
    let config = BacktestConfig::from_toml_str(CONFIG)?;
    let mut exchange =
        Exchange::with_seed(7).with_settings(SettingsRegistry::from_configs(&config.currencies));
    let mut manager = OrderManager::new();
    let mut stats = Statistic::from_config(&config.statistics);

    let mut btc = Instrument::new("BTC", [dec!(100), dec!(110), dec!(120)]);
    let mut eth = Instrument::new("ETH", [dec!(50), dec!(45), dec!(55)]);
    replay(&mut stats, &mut exchange, &mut manager, &mut btc)?;
    replay(&mut stats, &mut exchange, &mut manager, &mut eth)?;

    assert_eq!(btc.pair().quote.available, dec!(900));
    assert_eq!(eth.pair().quote.available, dec!(950));
    assert_eq!(manager.orders_snapshot(None).len(), 2);

    stats.set_funding_report(FundingReport {
        using_exchange_level_funding: false,
        items: vec![funding_item(&btc), funding_item(&eth)],
    });
    stats.calculate_all_results()?;

    // 상품별 결과
    let btc_stats = stats.series(&btc.key).unwrap();
    assert_eq!(btc_stats.buy_orders, 1);
    assert_eq!(btc_stats.market_movement, dec!(20));
    assert_eq!(btc_stats.strategy_movement, dec!(2));
    assert!(btc_stats.is_strategy_profitable);
    assert!(btc_stats.final_orders.is_none());
    assert_eq!(btc_stats.initial_holdings.total_value, dec!(1000));
    assert_eq!(btc_stats.final_holdings.total_value, dec!(1020));

    let eth_stats = stats.series(&eth.key).unwrap();
    assert_eq!(eth_stats.market_movement, dec!(10));
    assert_eq!(eth_stats.strategy_movement, dec!(0.5));
    assert_eq!(eth_stats.max_drawdown.drawdown_percent, dec!(10));
    assert!(eth_stats.at_offset(0).unwrap().transactions.is_some());

    // 실행 전체 합계 및 비교
    assert_eq!(stats.total_buy_orders, 2);
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.start_date, Some(time(0)));
    assert_eq!(stats.end_date, Some(time(2)));
    assert!(!stats.has_collateral);
    assert!(!stats.was_any_data_missing);
    assert_eq!(stats.best_market_movement.as_ref().unwrap().key, btc.key);
    assert_eq!(stats.best_strategy_results.as_ref().unwrap().key, btc.key);
    assert_eq!(stats.biggest_drawdown.as_ref().unwrap().key, eth.key);

    let funding = stats.funding_statistics.as_ref().unwrap();
    assert_eq!(funding.initial_holding_value, dec!(2000));
    assert_eq!(funding.final_holding_value, dec!(2025));
    assert_eq!(funding.strategy_movement, dec!(1.25));
    assert_eq!(funding.items.len(), 2);
    assert_eq!(funding.items[0].difference_percent, dec!(-10));

    // 직렬화
    let json: serde_json::Value = serde_json::from_str(&stats.serialise()?)?;
    assert_eq!(json["strategy_name"], "buy-and-hold");
    assert_eq!(json["total_orders"], 2);
    let series = json["currency_statistics"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["events"].as_array().unwrap().len(), 3);
    Ok(())
}

#[test]
fn test_duplicate_offset_is_rejected() -> anyhow::Result<()> {
    let mut stats = Statistic::new();
    let btc = key("BTC");
    stats.setup_event_for_time(&candle(&btc, 0, dec!(100)))?;

    let err = stats.setup_event_for_time(&candle(&btc, 0, dec!(101))).unwrap_err();
    assert!(matches!(err, StatisticsError::AlreadyProcessed { offset: 0, .. }));
    assert_eq!(stats.series(&btc).unwrap().events.len(), 1);
    assert_eq!(stats.series(&btc).unwrap().events[0].close_price, dec!(100));
    Ok(())
}

#[test]
fn test_event_for_unknown_offset_fails() -> anyhow::Result<()> {
    let mut stats = Statistic::new();
    let btc = key("BTC");
    stats.setup_event_for_time(&candle(&btc, 0, dec!(100)))?;

    let order = OrderEvent::new(EventBase::new(5, btc.clone(), time(5)), Side::Buy, dec!(1), dec!(100), dec!(100));
    assert!(stats.set_event_for_offset(Event::Order(order)).is_err());
    Ok(())
}
