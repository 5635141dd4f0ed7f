//! 백테스트 통계 원장 및 포트폴리오 집계.
//!
//! # 모듈 구성
//!
//! - [`currency`]: 상품별 오프셋 시계열과 최종 지표
//! - [`funding`]: 실행 전체 자금 통계
//!
//! `Statistic`은 (거래소, 자산, 통화쌍) 키별 원장을 소유하고, 실행이 끝나면
//! `calculate_all_results`로 상품별 결과와 상품 간 최고/최악 비교를 계산합니다.

pub mod currency;
pub mod funding;

pub use currency::*;
pub use funding::*;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{error, info};
use trader_core::{
    ComplianceSnapshot, DataEvent, Event, FillEvent, Holding, InstrumentKey, PnlSummary,
    StatisticsConfig,
};

use crate::error::{StatisticsError, StatisticsResult};
use crate::performance::Swing;

/// 상품 간 비교에 쓰는 상품별 최종 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalResultsHolder {
    /// 상품 키
    pub key: InstrumentKey,
    /// 최대 낙폭
    pub max_drawdown: Swing,
    /// 시장 가격 변화율 (%)
    pub market_movement: Decimal,
    /// 전략 가치 변화율 (%)
    pub strategy_movement: Decimal,
}

/// 같은 시각에 기록된 이벤트 설명 묶음.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// 시각
    pub time: DateTime<Utc>,
    /// 이벤트 한 줄 설명
    pub events: Vec<String>,
}

/// 실행 전체 통계.
#[derive(Debug, Default, Serialize)]
pub struct Statistic {
    pub strategy_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub candle_interval_secs: u64,
    pub risk_free_rate: Decimal,

    #[serde(rename = "currency_statistics", serialize_with = "serialize_series")]
    series: BTreeMap<InstrumentKey, CurrencyPairStatistic>,

    pub total_buy_orders: u64,
    pub total_sell_orders: u64,
    pub total_long_orders: u64,
    pub total_short_orders: u64,
    pub total_orders: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub biggest_drawdown: Option<FinalResultsHolder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_strategy_results: Option<FinalResultsHolder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_market_movement: Option<FinalResultsHolder>,

    pub has_collateral: bool,
    pub was_any_data_missing: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_statistics: Option<FundingStatistics>,
    #[serde(skip)]
    funding_report: Option<FundingReport>,
}

fn serialize_series<S: Serializer>(
    series: &BTreeMap<InstrumentKey, CurrencyPairStatistic>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(series.values())
}

impl Statistic {
    /// 빈 통계를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 파일의 통계 섹션으로 생성합니다.
    pub fn from_config(config: &StatisticsConfig) -> Self {
        Self {
            strategy_name: config.strategy_name.clone(),
            risk_free_rate: config.risk_free_rate,
            candle_interval_secs: config.candle_interval_secs,
            ..Self::default()
        }
    }

    /// 기본값으로 되돌립니다.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 전략 이름을 설정합니다.
    pub fn set_strategy_name(&mut self, name: impl Into<String>) {
        self.strategy_name = name.into();
    }

    /// 자금 관리자의 종료 보고서를 설정합니다.
    pub fn set_funding_report(&mut self, report: FundingReport) {
        self.funding_report = Some(report);
    }

    /// 상품별 원장을 반환합니다.
    pub fn series(&self, key: &InstrumentKey) -> Option<&CurrencyPairStatistic> {
        self.series.get(key)
    }

    /// 모든 상품별 원장을 키 순서로 반환합니다.
    pub fn all_series(&self) -> impl Iterator<Item = &CurrencyPairStatistic> {
        self.series.values()
    }

    /// 원장 수를 반환합니다.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    // ==================== 기록 ====================

    /// 시장 데이터 이벤트로 새 오프셋을 엽니다. 상품 원장이 없으면 만듭니다.
    pub fn setup_event_for_time(&mut self, event: &DataEvent) -> StatisticsResult<()> {
        let key = event.base.key.clone();
        self.series
            .entry(key.clone())
            .or_insert_with(|| CurrencyPairStatistic::new(key, event.base.underlying_pair.clone()))
            .record_market_event(event.clone())
    }

    /// 이벤트를 해당 오프셋 기록에 반영합니다.
    pub fn set_event_for_offset(&mut self, event: Event) -> StatisticsResult<()> {
        let key = event.base().key.clone();
        self.lookup_mut(&key, "event")?.apply_event(event)
    }

    /// 보유 자산 스냅샷을 기록합니다.
    pub fn add_holdings_for_time(&mut self, holding: &Holding) -> StatisticsResult<()> {
        self.lookup_mut(&holding.key, "holding event")?.set_holdings(holding)
    }

    /// 손익 요약을 기록합니다.
    pub fn add_pnl_for_time(&mut self, pnl: &PnlSummary) -> StatisticsResult<()> {
        self.lookup_mut(&pnl.key, "pnl")?.set_pnl(pnl)
    }

    /// 체결 이벤트의 오프셋에 컴플라이언스 스냅샷을 기록합니다.
    pub fn add_compliance_snapshot_for_time(
        &mut self,
        snapshot: ComplianceSnapshot,
        fill: &FillEvent,
    ) -> StatisticsResult<()> {
        self.lookup_mut(&fill.base.key, "compliance snapshot")?
            .set_compliance(snapshot, fill.base.offset)
    }

    fn lookup_mut(
        &mut self,
        key: &InstrumentKey,
        purpose: &'static str,
    ) -> StatisticsResult<&mut CurrencyPairStatistic> {
        if self.series.is_empty() {
            return Err(StatisticsError::StatsUnset);
        }
        self.series
            .get_mut(key)
            .ok_or_else(|| StatisticsError::CurrencyStatisticsUnset {
                key: key.clone(),
                purpose,
            })
    }

    // ==================== 결과 계산 ====================

    /// 모든 상품의 결과와 실행 전체 합계를 계산합니다.
    ///
    /// 상품 하나의 계산 실패는 로그로 남기고 다음 상품으로 넘어갑니다.
    /// 상품이 둘 이상이면 최고 시장 변화, 최고 전략 성과, 최대 낙폭 상품을 고릅니다.
    pub fn calculate_all_results(&mut self) -> StatisticsResult<()> {
        info!(strategy = %self.strategy_name, "Calculating backtesting results");
        if self.series.is_empty() {
            return Err(StatisticsError::StatsUnset);
        }
        self.print_all_events_chronologically();

        let mut final_results = Vec::with_capacity(self.series.len());
        for stats in self.series.values_mut() {
            let Some(last) = stats.last() else {
                error!(key = %stats.key, "No events recorded, skipping");
                continue;
            };
            if last.pnl.is_some() {
                self.has_collateral = true;
            }
            let (start, end) = (stats.first().map(|e| e.time), Some(last.time));

            if let Err(e) = stats.calculate_results(self.risk_free_rate, self.candle_interval_secs) {
                error!(key = %stats.key, error = %e, "Failed to calculate currency statistics");
            }
            self.start_date = start;
            self.end_date = end;
            stats.print_results();

            final_results.push(FinalResultsHolder {
                key: stats.key.clone(),
                max_drawdown: stats.max_drawdown.clone(),
                market_movement: stats.market_movement,
                strategy_movement: stats.strategy_movement,
            });
            self.total_long_orders += stats.long_orders;
            self.total_short_orders += stats.short_orders;
            self.total_buy_orders += stats.buy_orders;
            self.total_sell_orders += stats.sell_orders;
            self.total_orders += stats.total_orders;
            if stats.show_missing_data_warning {
                self.was_any_data_missing = true;
            }
        }

        let funding = calculate_funding_statistics(
            self.funding_report.as_ref(),
            &self.series,
            self.risk_free_rate,
            self.candle_interval_secs,
        )?;
        funding.print_results(self.was_any_data_missing);
        self.funding_statistics = Some(funding);

        if final_results.len() > 1 {
            self.biggest_drawdown = biggest_drawdown_across_currencies(&final_results);
            self.best_market_movement = best_market_performer(&final_results);
            self.best_strategy_results = best_strategy_performer(&final_results);
            self.print_total_results();
        }
        Ok(())
    }

    /// 실행 전체 합계와 상품 간 비교 결과를 로그로 출력합니다.
    pub fn print_total_results(&self) {
        info!(
            buy_orders = self.total_buy_orders,
            sell_orders = self.total_sell_orders,
            long_orders = self.total_long_orders,
            short_orders = self.total_short_orders,
            total_orders = self.total_orders,
            "Total orders"
        );
        if let Some(best) = &self.best_market_movement {
            info!(key = %best.key, market_movement = %best.market_movement.round_dp(4), "Best market movement");
        }
        if let Some(best) = &self.best_strategy_results {
            info!(key = %best.key, strategy_movement = %best.strategy_movement.round_dp(4), "Best strategy results");
        }
        if let Some(worst) = &self.biggest_drawdown {
            info!(
                key = %worst.key,
                drawdown_percent = %worst.max_drawdown.drawdown_percent.round_dp(4),
                "Biggest drawdown"
            );
        }
    }

    /// 모든 상품의 이벤트를 시각별로 묶어 시간순으로 출력하고 반환합니다.
    pub fn print_all_events_chronologically(&self) -> Vec<TimelineEntry> {
        let mut timeline: BTreeMap<DateTime<Utc>, Vec<String>> = BTreeMap::new();
        for stats in self.series.values() {
            for entry in &stats.events {
                let mut push = |time: DateTime<Utc>, line: String| {
                    timeline.entry(time).or_default().push(line);
                };

                let data = &entry.data_event;
                push(
                    data.base.time,
                    format!(
                        "{} | Price: {} | Volume: {}{}",
                        stats.key,
                        data.close,
                        data.volume,
                        if data.missing_data { " | MISSING DATA" } else { "" }
                    ),
                );
                if let Some(signal) = &entry.signal_event {
                    push(
                        signal.base.time,
                        format!(
                            "{} | Signal: {} | {}",
                            stats.key,
                            signal.direction,
                            signal.base.reason_text()
                        ),
                    );
                }
                if let Some(order) = &entry.order_event {
                    push(
                        order.base.time,
                        format!(
                            "{} | Order: {} {} @ {}",
                            stats.key, order.direction, order.amount, order.close_price
                        ),
                    );
                }
                if let Some(fill) = &entry.fill_event {
                    push(
                        fill.base.time,
                        format!(
                            "{} | Fill: {} {} @ {} | Fee: {} | {}",
                            stats.key,
                            fill.direction,
                            fill.amount,
                            fill.purchase_price,
                            fill.exchange_fee,
                            fill.base.reason_text()
                        ),
                    );
                }
            }
        }

        let entries: Vec<TimelineEntry> = timeline
            .into_iter()
            .map(|(time, events)| TimelineEntry { time, events })
            .collect();
        for entry in &entries {
            for line in &entry.events {
                info!(time = %entry.time, "{}", line);
            }
        }
        entries
    }

    /// 전체 상태를 보기 좋은 JSON으로 직렬화합니다.
    pub fn serialise(&self) -> StatisticsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// 지표가 가장 큰 결과를 고릅니다.
///
/// 첫 후보가 기준이 되고, 이후 후보는 지표가 더 클 때만 교체합니다.
fn select_best(
    results: &[FinalResultsHolder],
    metric: impl Fn(&FinalResultsHolder) -> Decimal,
) -> Option<FinalResultsHolder> {
    let mut best: Option<&FinalResultsHolder> = None;
    for candidate in results {
        if best.map_or(true, |b| metric(candidate) > metric(b)) {
            best = Some(candidate);
        }
    }
    best.cloned()
}

/// 시장 변화율이 가장 큰 상품.
pub fn best_market_performer(results: &[FinalResultsHolder]) -> Option<FinalResultsHolder> {
    select_best(results, |r| r.market_movement)
}

/// 전략 변화율이 가장 큰 상품.
pub fn best_strategy_performer(results: &[FinalResultsHolder]) -> Option<FinalResultsHolder> {
    select_best(results, |r| r.strategy_movement)
}

/// 최대 낙폭이 가장 큰 상품.
pub fn biggest_drawdown_across_currencies(results: &[FinalResultsHolder]) -> Option<FinalResultsHolder> {
    select_best(results, |r| r.max_drawdown.drawdown_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use crate::performance::Ratios;
    use trader_core::{AssetKind, CurrencyPair, EventBase, OrderEvent, PnlResult, Side};

    fn key(base: &str) -> InstrumentKey {
        InstrumentKey::new("binance", AssetKind::Spot, CurrencyPair::new(base, "USDT"))
    }

    fn time(offset: u64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset as i64)
    }

    fn candle(key: &InstrumentKey, offset: u64, close: Decimal) -> DataEvent {
        DataEvent {
            base: EventBase::new(offset, key.clone(), time(offset)),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10),
            missing_data: false,
        }
    }

    fn result(base: &str, strategy_movement: Decimal) -> FinalResultsHolder {
        FinalResultsHolder {
            key: key(base),
            max_drawdown: Swing::default(),
            market_movement: Decimal::ZERO,
            strategy_movement,
        }
    }

    #[test]
    fn test_best_selection_is_order_independent() {
        let forward = [result("BTC", dec!(5)), result("ETH", dec!(-3))];
        let reverse = [result("ETH", dec!(-3)), result("BTC", dec!(5))];

        assert_eq!(best_strategy_performer(&forward).unwrap().strategy_movement, dec!(5));
        assert_eq!(best_strategy_performer(&reverse).unwrap().strategy_movement, dec!(5));
    }

    #[test]
    fn test_all_negative_selects_least_negative() {
        let results = [result("BTC", dec!(-7)), result("ETH", dec!(-2)), result("XRP", dec!(-4))];
        let best = best_strategy_performer(&results).unwrap();
        assert_eq!(best.key, key("ETH"));
        assert!(best_strategy_performer(&[]).is_none());
    }

    #[test]
    fn test_update_requires_series() {
        let mut stats = Statistic::new();
        let holding = Holding {
            key: key("BTC"),
            ..Default::default()
        };
        assert!(matches!(stats.add_holdings_for_time(&holding), Err(StatisticsError::StatsUnset)));

        stats.setup_event_for_time(&candle(&key("BTC"), 0, dec!(1))).unwrap();
        let holding = Holding {
            key: key("ETH"),
            ..Default::default()
        };
        assert!(matches!(
            stats.add_holdings_for_time(&holding),
            Err(StatisticsError::CurrencyStatisticsUnset { purpose: "holding event", .. })
        ));
    }

    #[test]
    fn test_compliance_snapshot_uses_fill_offset() {
        let mut stats = Statistic::new();
        let btc = key("BTC");
        stats.setup_event_for_time(&candle(&btc, 0, dec!(100))).unwrap();
        stats.setup_event_for_time(&candle(&btc, 1, dec!(101))).unwrap();

        let order = OrderEvent::new(EventBase::new(0, btc.clone(), time(0)), Side::Buy, dec!(1), dec!(100), dec!(100));
        let fill = FillEvent::from_order(&order);
        stats
            .add_compliance_snapshot_for_time(
                ComplianceSnapshot {
                    offset: 0,
                    timestamp: Some(time(0)),
                    orders: Vec::new(),
                },
                &fill,
            )
            .unwrap();

        let series = stats.series(&btc).unwrap();
        assert!(series.at_offset(0).unwrap().transactions.is_some());
        assert!(series.at_offset(1).unwrap().transactions.is_none());
    }

    #[test]
    fn test_single_series_skips_comparisons() {
        let mut stats = Statistic::new();
        let btc = key("BTC");
        for (offset, close) in [(0, dec!(100)), (1, dec!(110))] {
            stats.setup_event_for_time(&candle(&btc, offset, close)).unwrap();
        }
        stats
            .add_pnl_for_time(&PnlSummary {
                key: btc.clone(),
                offset: 1,
                result: PnlResult {
                    exposure: dec!(1),
                    ..Default::default()
                },
            })
            .unwrap();

        stats.calculate_all_results().unwrap();

        assert!(stats.has_collateral);
        assert!(stats.best_market_movement.is_none());
        assert_eq!(stats.start_date, Some(time(0)));
        assert_eq!(stats.end_date, Some(time(1)));
        assert_eq!(stats.series(&btc).unwrap().market_movement, dec!(10));
        assert!(stats.funding_statistics.is_some());
    }

    #[test]
    fn test_overflowing_series_does_not_abort_run() {
        let mut stats = Statistic::new();
        let (btc, eth) = (key("BTC"), key("ETH"));
        for (offset, close) in [(0, dec!(0.00000001)), (1, dec!(10000000)), (2, dec!(0.00000001))] {
            stats.setup_event_for_time(&candle(&btc, offset, close)).unwrap();
        }
        for (offset, close) in [(0, dec!(100)), (1, dec!(90)), (2, dec!(120))] {
            stats.setup_event_for_time(&candle(&eth, offset, close)).unwrap();
        }

        stats.calculate_all_results().unwrap();

        assert_eq!(stats.series(&eth).unwrap().market_movement, dec!(20));
        assert_eq!(stats.series(&btc).unwrap().ratios, Ratios::default());
        assert_eq!(stats.best_market_movement.as_ref().unwrap().key, eth);
        assert_eq!(stats.biggest_drawdown.as_ref().unwrap().key, btc);
        assert!(stats.funding_statistics.is_some());
    }

    #[test]
    fn test_calculate_all_results_without_series() {
        let mut stats = Statistic::new();
        assert!(matches!(stats.calculate_all_results(), Err(StatisticsError::StatsUnset)));
    }

    #[test]
    fn test_timeline_groups_by_time() {
        let mut stats = Statistic::new();
        for base in ["BTC", "ETH"] {
            stats.setup_event_for_time(&candle(&key(base), 0, dec!(1))).unwrap();
            stats.setup_event_for_time(&candle(&key(base), 1, dec!(2))).unwrap();
        }

        let timeline = stats.print_all_events_chronologically();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].time, time(0));
        assert_eq!(timeline[0].events.len(), 2);
        assert!(timeline[0].events[0].contains("BTC/USDT"));
    }

    #[test]
    fn test_serialise_lists_series() {
        let mut stats = Statistic::new();
        stats.set_strategy_name("dca");
        stats.setup_event_for_time(&candle(&key("BTC"), 0, dec!(1))).unwrap();

        let json: serde_json::Value = serde_json::from_str(&stats.serialise().unwrap()).unwrap();
        assert_eq!(json["strategy_name"], "dca");
        assert_eq!(json["currency_statistics"].as_array().unwrap().len(), 1);
        assert_eq!(json["currency_statistics"][0]["events"][0]["offset"], 0);
    }
}
