//! 백테스트 통계 및 성과 분석.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 상품별 오프셋 시계열 원장 (데이터, 신호, 주문, 체결, 보유 자산, 손익)
//! - 실행 전체 통계 집계와 상품 간 비교
//! - 자금 통계
//! - 성과 지표 계산 (최대 낙폭, 샤프/소르티노 비율, 연복리 성장률)
//!
//! # Re-exports
//!
//! - [`performance`]: 성과 지표 계산 (Ratios, Swing 등)
//! - [`statistics`]: 통계 원장 (Statistic, CurrencyPairStatistic 등)

pub mod error;
pub mod performance;
pub mod statistics;

pub use error::{StatisticsError, StatisticsResult};

// Performance 모듈 re-exports
pub use performance::{
    calculate_biggest_swing, compound_annual_growth_rate, percentage_returns, periods_per_year,
    sharpe_ratio, sortino_ratio, Ratios, Swing, ValueAtTime, DEFAULT_CANDLE_INTERVAL_SECS,
};

// Statistics 모듈 re-exports
pub use statistics::{
    best_market_performer, best_strategy_performer, biggest_drawdown_across_currencies,
    calculate_funding_statistics, CurrencyPairStatistic, DataAtOffset, FinalResultsHolder,
    FundingItemReport, FundingItemStatistics, FundingReport, FundingStatistics, Statistic,
    TimelineEntry,
};
