//! 핵심 도메인 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("config error: {0}")]
    Config(String),

    /// 잘못된 입력
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl From<serde_json::Error> for TraderError {
    fn from(err: serde_json::Error) -> Self {
        TraderError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}
