//! 통화쌍, 자산 유형, 상품 키 정의.
//!
//! 이 모듈은 거래 상품 식별에 필요한 타입을 정의합니다:
//! - `AssetKind` - 자산 유형 (현물, 마진, 선물)
//! - `CurrencyPair` - 기준/호가 통화쌍
//! - `InstrumentKey` - (거래소, 자산, 통화쌍) 복합 키

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TraderError;

/// 자산 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// 현물
    #[default]
    Spot,
    /// 마진
    Margin,
    /// 선물 (증거금 기반)
    Futures,
}

impl AssetKind {
    /// 선물 계열 자산인지 확인합니다.
    pub fn is_futures(&self) -> bool {
        matches!(self, AssetKind::Futures)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Spot => write!(f, "spot"),
            AssetKind::Margin => write!(f, "margin"),
            AssetKind::Futures => write!(f, "futures"),
        }
    }
}

impl FromStr for AssetKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(AssetKind::Spot),
            "margin" => Ok(AssetKind::Margin),
            "futures" => Ok(AssetKind::Futures),
            _ => Err(TraderError::InvalidInput(format!("unknown asset: {}", s))),
        }
    }
}

/// 기준 통화와 호가 통화로 구성된 통화쌍.
///
/// 예: BTC/USDT. 선물 계약은 `BTC-PERP/USD`처럼 계약명을 기준 통화로 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// 기준 통화 (예: BTC)
    pub base: String,
    /// 호가 통화 (예: USDT)
    pub quote: String,
}

impl CurrencyPair {
    /// 새 통화쌍을 생성합니다. 통화 코드는 대문자로 정규화됩니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    /// 빈 통화쌍인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.quote.is_empty()
    }

    /// "BASE/QUOTE" 또는 "BASE-QUOTE" 형식 문자열에서 통화쌍을 파싱합니다.
    pub fn from_string(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(['/', '-']).collect();
        match parts.as_slice() {
            [base, quote] if !base.is_empty() && !quote.is_empty() => Some(Self::new(*base, *quote)),
            _ => None,
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// (거래소, 자산, 통화쌍) 복합 키.
///
/// 거래소 이름은 소문자로 정규화되어 대소문자 구분 없이 비교됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "InstrumentKeyFields")]
pub struct InstrumentKey {
    /// 거래소 이름 (소문자)
    exchange: String,
    /// 자산 유형
    pub asset: AssetKind,
    /// 통화쌍
    pub pair: CurrencyPair,
}

impl InstrumentKey {
    /// 새 상품 키를 생성합니다.
    pub fn new(exchange: &str, asset: AssetKind, pair: CurrencyPair) -> Self {
        Self {
            exchange: exchange.to_lowercase(),
            asset,
            pair,
        }
    }

    /// 소문자로 정규화된 거래소 이름.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

/// 역직렬화 중간 형태. 항상 [`InstrumentKey::new`]를 거쳐 정규화됩니다.
#[derive(Deserialize)]
struct InstrumentKeyFields {
    exchange: String,
    asset: AssetKind,
    pair: CurrencyPair,
}

impl From<InstrumentKeyFields> for InstrumentKey {
    fn from(fields: InstrumentKeyFields) -> Self {
        let pair = CurrencyPair::new(fields.pair.base, fields.pair.quote);
        Self::new(&fields.exchange, fields.asset, pair)
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.exchange, self.asset, self.pair)
    }
}
