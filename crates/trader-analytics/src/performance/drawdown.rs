//! 최대 낙폭(Swing) 계산.
//!
//! 시점별 가치 시계열에서 고점 대비 가장 크게 하락한 구간을 찾습니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 특정 시점의 값.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueAtTime {
    /// 시점
    pub time: DateTime<Utc>,
    /// 값
    pub value: Decimal,
}

impl ValueAtTime {
    /// 새 값을 생성합니다.
    pub fn new(time: DateTime<Utc>, value: Decimal) -> Self {
        Self { time, value }
    }
}

/// 고점에서 저점까지의 하락 구간.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    /// 낙폭 시작 고점
    pub highest: Option<ValueAtTime>,
    /// 낙폭 최저점
    pub lowest: Option<ValueAtTime>,
    /// 최대 낙폭 (%)
    pub drawdown_percent: Decimal,
    /// 고점부터 저점까지의 구간 수
    pub interval_duration: u64,
}

impl Swing {
    /// 하락 구간이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lowest.is_none()
    }
}

/// 시계열에서 가장 큰 하락 구간을 계산합니다.
///
/// # 계산 공식
///
/// MDD = (고점 - 저점) / 고점 × 100%
///
/// # 예시
///
/// 1000 → 1200(고점) → 1080(저점) → 1300
/// MDD = (1200 - 1080) / 1200 × 100 = 10%
pub fn calculate_biggest_swing(values: &[ValueAtTime]) -> Swing {
    let mut swing = Swing::default();
    let Some(first) = values.first() else {
        return swing;
    };

    let mut peak = *first;
    let mut peak_index = 0usize;

    for (i, point) in values.iter().enumerate() {
        // 새로운 고점 갱신
        if point.value > peak.value {
            peak = *point;
            peak_index = i;
            continue;
        }

        if peak.value <= Decimal::ZERO {
            continue;
        }
        let drawdown = (peak.value - point.value) / peak.value * Decimal::ONE_HUNDRED;
        if drawdown > swing.drawdown_percent {
            swing = Swing {
                highest: Some(peak),
                lowest: Some(*point),
                drawdown_percent: drawdown,
                interval_duration: (i - peak_index) as u64,
            };
        }
    }

    swing
}
