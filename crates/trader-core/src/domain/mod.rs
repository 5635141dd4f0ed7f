//! 백테스트 실행과 회계를 위한 도메인 모델.

mod event;
mod market_data;
mod order;
mod portfolio;

pub use event::*;
pub use market_data::*;
pub use order::*;
pub use portfolio::*;
