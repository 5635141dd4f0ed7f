//! 통계 원장 에러 타입.

use thiserror::Error;
use trader_core::InstrumentKey;

/// 통계 원장 및 집계 에러.
#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("event already processed for {key} at offset {offset}")]
    AlreadyProcessed { key: InstrumentKey, offset: u64 },

    #[error("exchange asset pair statistics unset")]
    StatsUnset,

    #[error("currency statistics unset for {key} to set {purpose}")]
    CurrencyStatisticsUnset { key: InstrumentKey, purpose: &'static str },

    #[error("no relevant stats found for event {key} at offset {offset}")]
    NoRelevantStatsFound { key: InstrumentKey, offset: u64 },

    #[error("{key} no data at offset {offset}")]
    NoDataAtOffset { key: InstrumentKey, offset: u64 },

    #[error("no events recorded for {0}")]
    NoEvents(InstrumentKey),

    #[error("arithmetic overflow while calculating {0}")]
    ArithmeticOverflow(&'static str),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 통계 작업 결과 타입.
pub type StatisticsResult<T> = Result<T, StatisticsError>;
