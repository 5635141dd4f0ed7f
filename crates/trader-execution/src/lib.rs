//! 백테스트 주문 실행 및 자금 정산.
//!
//! 이 crate는 다음을 제공합니다:
//! - 슬리피지/캔들 범위/수수료 모델
//! - 상품별 실행 제약 설정
//! - 주문 이벤트를 체결 이벤트로 바꾸는 실행 시뮬레이터
//! - 주문 후 자금 장부 정산
//! - 시뮬레이션 주문 기록
//!
//! # 예제
//!
//! ```rust,ignore
//! use trader_execution::{CandleStream, Exchange, InMemoryFunds, OrderManager};
//!
//! let mut exchange = Exchange::with_seed(7).with_settings(registry);
//! let mut manager = OrderManager::new();
//! let fill = exchange.execute_order(&order, &candles, &mut manager, &mut funds)?;
//! ```

pub mod data;
pub mod exchange;
pub mod funding;
pub mod order_manager;
pub mod settings;
pub mod slippage;

// 주요 타입 재내보내기
pub use data::{CandleStream, DataHandler};
pub use exchange::{
    allocate_funds_post_order, summarise_position, verify_order_within_limits, Exchange,
    ExecutionError, OrderFailure, PostOrderAmounts,
};
pub use funding::{
    Collateral, CollateralReleaser, FundItem, FundReleaser, FundingError, InMemoryFunds,
    PairReleaser, SpotPair,
};
pub use order_manager::{OrderManager, OrderManagerError, OrderSink, OrderStats, OrderSubmitter};
pub use settings::{ExchangeLimits, MinMax, Settings, SettingsRegistry};
pub use slippage::{
    apply_slippage_to_price, calculate_exchange_fee, calculate_slippage_by_orderbook,
    ensure_order_fits_within_hlv, estimate_slippage_percentage,
    reduce_amount_to_cover_fee, reduce_amount_to_fit_portfolio_limit, CANDLE_VOLUME_CAP,
};
