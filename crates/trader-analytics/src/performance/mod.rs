//! 성과 분석 모듈
//!
//! # 모듈 구성
//!
//! - [`metrics`]: 성과 지표 계산 (샤프비율, 소르티노비율, 연복리 성장률)
//! - [`drawdown`]: 최대 낙폭 구간 계산

pub mod drawdown;
pub mod metrics;

pub use drawdown::*;
pub use metrics::*;
