//! 성과 지표 계산 모듈
//!
//! 시계열 가치(종가, 보유 자산 가치)로부터 다음 지표를 계산합니다:
//! - 구간 수익률 (Percentage Returns)
//! - 샤프 비율 (Sharpe Ratio): 위험 대비 수익률 측정
//! - 소르티노 비율 (Sortino Ratio): 하방 위험 대비 수익률 측정
//! - 연복리 성장률 (CAGR)
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use trader_analytics::performance::metrics::{percentage_returns, Ratios};
//! use rust_decimal_macros::dec;
//!
//! let closes = vec![dec!(100), dec!(102), dec!(99), dec!(105)];
//! let returns = percentage_returns(&closes)?;
//! let ratios = Ratios::from_returns(&returns, dec!(0.03), 86_400)?;
//! println!("샤프 비율: {}", ratios.sharpe_ratio);
//! ```

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StatisticsError, StatisticsResult};

/// 1년의 초 수 (365일 기준, 암호화폐 시장은 휴장일이 없음)
pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// 캔들 간격이 주어지지 않았을 때 사용하는 기본값 (1일)
pub const DEFAULT_CANDLE_INTERVAL_SECS: u64 = 86_400;

/// 캔들 간격으로부터 연간 구간 수를 계산합니다.
pub fn periods_per_year(interval_secs: u64) -> Decimal {
    let interval = if interval_secs == 0 {
        DEFAULT_CANDLE_INTERVAL_SECS
    } else {
        interval_secs
    };
    Decimal::from(SECONDS_PER_YEAR) / Decimal::from(interval)
}

/// 연속된 가치 사이의 수익률(%)을 계산합니다.
///
/// 직전 값이 0인 구간은 건너뜁니다.
pub fn percentage_returns(values: &[Decimal]) -> StatisticsResult<Vec<Decimal>> {
    values
        .windows(2)
        .filter(|w| !w[0].is_zero())
        .map(|w| {
            (w[1] - w[0])
                .checked_div(w[0])
                .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
                .ok_or(StatisticsError::ArithmeticOverflow("percentage returns"))
        })
        .collect()
}

/// 위험 조정 수익 지표.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    /// 구간 평균 수익률 (%)
    pub arithmetic_mean_return: Decimal,
    /// 구간 수익률 표준편차 (%)
    pub std_deviation: Decimal,
    /// 연율화 샤프 비율
    pub sharpe_ratio: Decimal,
    /// 연율화 소르티노 비율
    pub sortino_ratio: Decimal,
}

impl Ratios {
    /// 구간 수익률(%)로부터 지표를 계산합니다.
    ///
    /// # 매개변수
    ///
    /// * `returns` - 구간 수익률 목록 (백분율)
    /// * `risk_free_rate` - 연간 무위험 이자율 (예: 0.03 = 3%)
    /// * `interval_secs` - 구간(캔들) 길이 (초)
    ///
    /// 수익률이 너무 커서 분산 계산이 Decimal 범위를 넘으면 `ArithmeticOverflow`입니다.
    pub fn from_returns(
        returns: &[Decimal],
        risk_free_rate: Decimal,
        interval_secs: u64,
    ) -> StatisticsResult<Self> {
        let periods = periods_per_year(interval_secs);
        Ok(Self {
            arithmetic_mean_return: mean(returns).ok_or(StatisticsError::ArithmeticOverflow("mean return"))?,
            std_deviation: sample_std_dev(returns)
                .ok_or(StatisticsError::ArithmeticOverflow("standard deviation"))?,
            sharpe_ratio: sharpe_ratio(returns, risk_free_rate, periods)?,
            sortino_ratio: sortino_ratio(returns, risk_free_rate, periods)?,
        })
    }
}

fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return Some(Decimal::ZERO);
    }
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    sum.checked_div(Decimal::from(values.len()))
}

/// 제곱합. 중간 결과가 Decimal 범위를 넘으면 `None`입니다.
fn sum_of_squares(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v.checked_mul(v)?))
}

fn sample_std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return Some(Decimal::ZERO);
    }
    let avg = mean(values)?;
    let deviations = values
        .iter()
        .map(|v| v.checked_sub(avg))
        .collect::<Option<Vec<_>>>()?;
    let variance = sum_of_squares(deviations.into_iter())?.checked_div(Decimal::from(values.len() - 1))?;
    Some(decimal_sqrt(variance))
}

/// 백분율 수익률을 비율로 바꾸고 구간 초과 수익률을 계산합니다.
fn excess_return_ratios(
    returns: &[Decimal],
    risk_free_rate: Decimal,
    periods_per_year: Decimal,
) -> Option<(Vec<Decimal>, Decimal)> {
    // 백분율을 비율로 변환 (1% → 0.01)
    let ratios: Vec<Decimal> = returns.iter().map(|r| *r / Decimal::ONE_HUNDRED).collect();
    let excess_return = mean(&ratios)?.checked_sub(risk_free_rate / periods_per_year)?;
    Some((ratios, excess_return))
}

/// 샤프 비율을 계산합니다.
///
/// # 계산 공식
///
/// Sharpe = (평균 수익률 - 구간 무위험 이자율) / 표준편차 × √(연간 구간 수)
pub fn sharpe_ratio(
    returns: &[Decimal],
    risk_free_rate: Decimal,
    periods_per_year: Decimal,
) -> StatisticsResult<Decimal> {
    // 최소 2개의 수익률 데이터 필요 (표준편차 계산용)
    if returns.len() < 2 || periods_per_year <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let overflow = || StatisticsError::ArithmeticOverflow("sharpe ratio");

    let (ratios, excess_return) =
        excess_return_ratios(returns, risk_free_rate, periods_per_year).ok_or_else(overflow)?;
    let std_dev = sample_std_dev(&ratios).ok_or_else(overflow)?;
    if std_dev.is_zero() {
        return Ok(Decimal::ZERO);
    }

    excess_return
        .checked_div(std_dev)
        .and_then(|r| r.checked_mul(decimal_sqrt(periods_per_year)))
        .ok_or_else(overflow)
}

/// 소르티노 비율을 계산합니다.
///
/// 하방 편차 = √(음수 수익률²의 평균). 손실 구간이 없고 초과 수익이 양수이면
/// `Decimal::MAX`를 반환합니다.
pub fn sortino_ratio(
    returns: &[Decimal],
    risk_free_rate: Decimal,
    periods_per_year: Decimal,
) -> StatisticsResult<Decimal> {
    if returns.len() < 2 || periods_per_year <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let overflow = || StatisticsError::ArithmeticOverflow("sortino ratio");

    let (ratios, excess_return) =
        excess_return_ratios(returns, risk_free_rate, periods_per_year).ok_or_else(overflow)?;

    let negatives: Vec<Decimal> = ratios.iter().copied().filter(|r| *r < Decimal::ZERO).collect();
    if negatives.is_empty() {
        return Ok(if excess_return > Decimal::ZERO {
            Decimal::MAX
        } else {
            Decimal::ZERO
        });
    }

    let downside_variance = sum_of_squares(negatives.iter().copied())
        .and_then(|s| s.checked_div(Decimal::from(negatives.len())))
        .ok_or_else(overflow)?;
    let downside_dev = decimal_sqrt(downside_variance);
    if downside_dev.is_zero() {
        return Ok(Decimal::ZERO);
    }

    excess_return
        .checked_div(downside_dev)
        .and_then(|r| r.checked_mul(decimal_sqrt(periods_per_year)))
        .ok_or_else(overflow)
}

/// 연복리 성장률(%)을 계산합니다.
///
/// `periods`개의 구간(각 `interval_secs`초) 동안 `initial`이 `final_value`가 되었을 때
/// `((final / initial)^(1 / 연수) - 1) × 100`. 초기값이 0 이하이거나 기간이 0이면 0이고,
/// 결과가 Decimal 범위를 넘어도 0입니다.
pub fn compound_annual_growth_rate(
    initial: Decimal,
    final_value: Decimal,
    interval_secs: u64,
    periods: usize,
) -> Decimal {
    if initial <= Decimal::ZERO || final_value < Decimal::ZERO || periods == 0 {
        return Decimal::ZERO;
    }

    let years = Decimal::from(periods) / periods_per_year(interval_secs);
    let growth = final_value.checked_div(initial).and_then(|g| g.to_f64());
    let (Some(growth), Some(years)) = (growth, years.to_f64()) else {
        return Decimal::ZERO;
    };
    if years <= 0.0 {
        return Decimal::ZERO;
    }

    let cagr = (growth.powf(1.0 / years) - 1.0) * 100.0;
    Decimal::from_f64(cagr).unwrap_or(Decimal::ZERO).round_dp(8)
}

/// Decimal 타입의 제곱근을 뉴턴 방법으로 계산합니다.
///
/// 10^-10까지 수렴하거나 최대 50회 반복합니다.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut guess = value / Decimal::TWO;
    let precision = Decimal::new(1, 10); // 0.0000000001

    for _ in 0..50 {
        let next_guess = (guess + value / guess) / Decimal::TWO;
        if (next_guess - guess).abs() < precision {
            return next_guess;
        }
        guess = next_guess;
    }

    guess
}
