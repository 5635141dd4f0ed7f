//! # Trader Core
//!
//! 백테스트 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 실행 시뮬레이터와 통계 원장이 공유하는 기본 타입을 제공합니다:
//! - 통화쌍, 자산 유형, 상품 키
//! - 주문 방향 및 주문 기록
//! - 백테스트 이벤트 (데이터, 신호, 주문, 체결)
//! - 포트폴리오 스냅샷 (보유 자산, 손익, 컴플라이언스)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
