//! 자금 통계.
//!
//! 자금 관리자가 넘겨주는 통화별 초기/최종 자금 보고서와 모든 상품의 보유 자산
//! 시계열을 합쳐 실행 전체의 자금 변화를 계산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use trader_core::{AssetKind, DecimalExt, InstrumentKey};

use crate::error::{StatisticsError, StatisticsResult};
use crate::performance::{
    calculate_biggest_swing, compound_annual_growth_rate, percentage_returns, Ratios, Swing,
    ValueAtTime,
};
use crate::statistics::currency::CurrencyPairStatistic;

/// 통화 하나의 자금 보고 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingItemReport {
    /// 거래소
    pub exchange: String,
    /// 자산 유형
    pub asset: AssetKind,
    /// 통화 코드
    pub currency: String,
    /// 초기 자금
    pub initial_funds: Decimal,
    /// 최종 자금
    pub final_funds: Decimal,
    /// 증거금 여부
    #[serde(default)]
    pub is_collateral: bool,
}

/// 자금 관리자의 실행 종료 보고서.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingReport {
    /// 거래소 단위 자금 공유 여부
    pub using_exchange_level_funding: bool,
    /// 통화별 항목
    pub items: Vec<FundingItemReport>,
}

/// 통화 하나의 자금 변화.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingItemStatistics {
    /// 보고 항목
    pub report: FundingItemReport,
    /// 초기 대비 변화율 (%)
    pub difference_percent: Decimal,
}

/// 실행 전체의 자금 통계.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingStatistics {
    /// 통화별 변화
    pub items: Vec<FundingItemStatistics>,
    /// 모든 상품 보유 자산의 초기 가치 합
    pub initial_holding_value: Decimal,
    /// 모든 상품 보유 자산의 최종 가치 합
    pub final_holding_value: Decimal,
    /// 전체 가치 변화율 (%)
    pub strategy_movement: Decimal,
    /// 합산 가치의 최대 낙폭
    pub max_drawdown: Swing,
    /// 합산 가치의 위험 조정 지표
    pub ratios: Ratios,
    /// 합산 가치의 연복리 성장률 (%)
    pub compound_annual_growth_rate: Decimal,
    /// 거래소 단위 자금 공유 여부
    pub using_exchange_level_funding: bool,
}

impl FundingStatistics {
    /// 자금 통계를 로그로 출력합니다.
    pub fn print_results(&self, was_any_data_missing: bool) {
        for item in &self.items {
            info!(
                exchange = %item.report.exchange,
                asset = %item.report.asset,
                currency = %item.report.currency,
                initial = %item.report.initial_funds,
                final_funds = %item.report.final_funds,
                difference_percent = %item.difference_percent.round_dp(4),
                "Funding item"
            );
        }
        info!(
            initial_value = %self.initial_holding_value,
            final_value = %self.final_holding_value,
            strategy_movement = %self.strategy_movement.round_dp(4),
            max_drawdown = %self.max_drawdown.drawdown_percent.round_dp(4),
            cagr = %self.compound_annual_growth_rate.round_dp(4),
            "Funding totals"
        );
        if was_any_data_missing {
            warn!("Missing data was detected during this backtesting run, results may be skewed");
        }
    }
}

/// 보고서와 상품별 원장으로 자금 통계를 계산합니다.
///
/// 보유 자산 가치는 시각별로 모든 상품을 합산합니다.
pub fn calculate_funding_statistics(
    report: Option<&FundingReport>,
    series: &BTreeMap<InstrumentKey, CurrencyPairStatistic>,
    risk_free_rate: Decimal,
    interval_secs: u64,
) -> StatisticsResult<FundingStatistics> {
    if series.is_empty() {
        return Err(StatisticsError::StatsUnset);
    }

    let items = report
        .map(|r| {
            r.items
                .iter()
                .map(|item| FundingItemStatistics {
                    report: item.clone(),
                    difference_percent: item.initial_funds.percent_change_to(item.final_funds),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut totals: BTreeMap<DateTime<Utc>, Decimal> = BTreeMap::new();
    for stats in series.values() {
        for entry in &stats.events {
            *totals.entry(entry.time).or_default() += entry.holdings.total_value;
        }
    }
    let values: Vec<ValueAtTime> = totals
        .into_iter()
        .map(|(time, value)| ValueAtTime::new(time, value))
        .collect();

    let initial = values.first().map(|v| v.value).unwrap_or_default();
    let final_value = values.last().map(|v| v.value).unwrap_or_default();
    let raw: Vec<Decimal> = values.iter().map(|v| v.value).collect();
    let ratios = percentage_returns(&raw)
        .and_then(|returns| Ratios::from_returns(&returns, risk_free_rate, interval_secs))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to calculate funding ratios");
            Ratios::default()
        });

    Ok(FundingStatistics {
        items,
        initial_holding_value: initial,
        final_holding_value: final_value,
        strategy_movement: initial.percent_change_to(final_value),
        max_drawdown: calculate_biggest_swing(&values),
        ratios,
        compound_annual_growth_rate: compound_annual_growth_rate(
            initial,
            final_value,
            interval_secs,
            values.len().saturating_sub(1),
        ),
        using_exchange_level_funding: report.is_some_and(|r| r.using_exchange_level_funding),
    })
}
