//! 자금 장부 인터페이스.
//!
//! 실행 시뮬레이터는 자금 장부를 직접 소유하지 않고 아래 트레이트를 통해서만 다룹니다:
//! - `PairReleaser` - 현물 통화쌍 잔고 (기준/호가 통화)
//! - `CollateralReleaser` - 선물 증거금 및 계약 수량
//! - `FundReleaser` - 주문에 맞는 releaser를 제공하는 진입점
//!
//! `InMemoryFunds`는 결정적인 백테스트 재생과 테스트를 위한 메모리 기반 구현입니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trader_core::Side;

/// 자금 장부 에러.
#[derive(Debug, Error)]
pub enum FundingError {
    #[error("zero amount received")]
    ZeroAmount,

    #[error("negative amount received: {0}")]
    NegativeAmount(Decimal),

    #[error("cannot release {requested} {currency}, only {reserved} reserved")]
    CannotRelease {
        currency: String,
        requested: Decimal,
        reserved: Decimal,
    },

    #[error("cannot reserve {requested} {currency}, only {available} available")]
    InsufficientFunds {
        currency: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("direction {0} does not move funds")]
    InvalidDirection(Side),

    #[error("funding is not a spot pair")]
    NotPair,

    #[error("funding is not collateral")]
    NotCollateral,
}

/// 현물 통화쌍 잔고에 대한 해제 연산.
pub trait PairReleaser {
    /// 예약된 `allocated`를 해제하고 `new_available`만큼 가용 잔고로 되돌립니다.
    ///
    /// 매수 계열은 호가 통화, 매도 계열은 기준 통화가 대상입니다.
    fn release(&mut self, allocated: Decimal, new_available: Decimal, side: Side) -> Result<(), FundingError>;

    /// 체결로 받은 자산을 가용 잔고에 더합니다.
    ///
    /// 매수 계열은 기준 통화, 매도 계열은 호가 통화가 대상입니다.
    fn increase_available(&mut self, amount: Decimal, side: Side) -> Result<(), FundingError>;

    /// 청산 결과를 반영합니다.
    fn liquidate(&mut self);
}

/// 선물 증거금에 대한 해제 연산.
pub trait CollateralReleaser {
    /// 예약된 계약 수량을 되돌립니다.
    fn release_contracts(&mut self, amount: Decimal) -> Result<(), FundingError>;

    /// 청산 결과를 반영합니다.
    fn liquidate(&mut self);
}

/// 주문의 자산 유형에 맞는 releaser를 제공합니다.
pub trait FundReleaser {
    /// 현물 통화쌍 releaser를 반환합니다.
    fn pair_releaser(&mut self) -> Result<&mut dyn PairReleaser, FundingError>;

    /// 선물 증거금 releaser를 반환합니다.
    fn collateral_releaser(&mut self) -> Result<&mut dyn CollateralReleaser, FundingError>;
}

/// 단일 통화의 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundItem {
    /// 통화 코드
    pub currency: String,
    /// 초기 자금
    pub initial: Decimal,
    /// 가용 잔고
    pub available: Decimal,
    /// 주문에 예약된 잔고
    pub reserved: Decimal,
}

impl FundItem {
    /// 새 잔고를 생성합니다.
    pub fn new(currency: impl Into<String>, initial: Decimal) -> Self {
        Self {
            currency: currency.into().to_uppercase(),
            initial,
            available: initial,
            reserved: Decimal::ZERO,
        }
    }

    /// 가용 잔고 일부를 주문용으로 예약합니다.
    pub fn reserve(&mut self, amount: Decimal) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if amount > self.available {
            return Err(FundingError::InsufficientFunds {
                currency: self.currency.clone(),
                requested: amount,
                available: self.available,
            });
        }
        self.available -= amount;
        self.reserved += amount;
        Ok(())
    }

    /// 예약을 해제하고 `diff`만큼 가용 잔고로 되돌립니다.
    pub fn release(&mut self, amount: Decimal, diff: Decimal) -> Result<(), FundingError> {
        if amount <= Decimal::ZERO {
            return Err(FundingError::ZeroAmount);
        }
        if diff < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(diff));
        }
        if amount > self.reserved {
            return Err(FundingError::CannotRelease {
                currency: self.currency.clone(),
                requested: amount,
                reserved: self.reserved,
            });
        }
        self.reserved -= amount;
        self.available += diff;
        Ok(())
    }

    /// 가용 잔고를 늘립니다.
    pub fn increase_available(&mut self, amount: Decimal) -> Result<(), FundingError> {
        if amount < Decimal::ZERO {
            return Err(FundingError::NegativeAmount(amount));
        }
        self.available += amount;
        Ok(())
    }

    fn clear(&mut self) {
        self.available = Decimal::ZERO;
        self.reserved = Decimal::ZERO;
    }
}

/// 현물 통화쌍 잔고.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPair {
    /// 기준 통화 잔고
    pub base: FundItem,
    /// 호가 통화 잔고
    pub quote: FundItem,
}

impl SpotPair {
    /// 새 통화쌍 잔고를 생성합니다.
    pub fn new(base: FundItem, quote: FundItem) -> Self {
        Self { base, quote }
    }
}

impl PairReleaser for SpotPair {
    fn release(&mut self, allocated: Decimal, new_available: Decimal, side: Side) -> Result<(), FundingError> {
        match side {
            Side::Buy | Side::Bid => self.quote.release(allocated, new_available),
            Side::Sell | Side::Ask | Side::ClosePosition => self.base.release(allocated, new_available),
            other => Err(FundingError::InvalidDirection(other)),
        }
    }

    fn increase_available(&mut self, amount: Decimal, side: Side) -> Result<(), FundingError> {
        match side {
            Side::Buy | Side::Bid => self.base.increase_available(amount),
            Side::Sell | Side::Ask | Side::ClosePosition => self.quote.increase_available(amount),
            other => Err(FundingError::InvalidDirection(other)),
        }
    }

    fn liquidate(&mut self) {
        self.base.clear();
        self.quote.clear();
    }
}

/// 선물 증거금과 계약 수량.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    /// 계약 수량
    pub contract: FundItem,
    /// 증거금
    pub collateral: FundItem,
}

impl Collateral {
    /// 새 증거금 잔고를 생성합니다.
    pub fn new(contract: FundItem, collateral: FundItem) -> Self {
        Self { contract, collateral }
    }
}

impl CollateralReleaser for Collateral {
    fn release_contracts(&mut self, amount: Decimal) -> Result<(), FundingError> {
        self.contract.release(amount, amount)
    }

    fn liquidate(&mut self) {
        self.contract.clear();
        self.collateral.clear();
    }
}

/// 메모리 기반 자금 장부.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InMemoryFunds {
    /// 현물 통화쌍
    Pair(SpotPair),
    /// 선물 증거금
    Collateral(Collateral),
}

impl FundReleaser for InMemoryFunds {
    fn pair_releaser(&mut self) -> Result<&mut dyn PairReleaser, FundingError> {
        match self {
            InMemoryFunds::Pair(pair) => Ok(pair),
            InMemoryFunds::Collateral(_) => Err(FundingError::NotPair),
        }
    }

    fn collateral_releaser(&mut self) -> Result<&mut dyn CollateralReleaser, FundingError> {
        match self {
            InMemoryFunds::Collateral(collateral) => Ok(collateral),
            InMemoryFunds::Pair(_) => Err(FundingError::NotCollateral),
        }
    }
}
