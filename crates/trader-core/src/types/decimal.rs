//! 정밀한 금융 계산을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// 퍼센트 타입 (1 = 1%).
pub type Percentage = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 양수인지 확인합니다.
    fn is_positive(&self) -> bool;

    /// 지정된 소수점 자릿수로 반올림합니다 (중간값은 0에서 먼 쪽으로).
    fn round_half_away(&self, dp: u32) -> Decimal;

    /// `self`에서 `to`로의 변화율을 백분율로 반환합니다. 기준값이 0이거나 범위를 넘으면 0입니다.
    fn percent_change_to(&self, to: Decimal) -> Decimal;

    /// `percent_change_to`와 같지만 Decimal 범위를 넘으면 `None`을 반환합니다.
    fn checked_percent_change_to(&self, to: Decimal) -> Option<Decimal>;
}

impl DecimalExt for Decimal {
    fn is_positive(&self) -> bool {
        *self > Decimal::ZERO
    }

    fn round_half_away(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    }

    fn percent_change_to(&self, to: Decimal) -> Decimal {
        self.checked_percent_change_to(to).unwrap_or(Decimal::ZERO)
    }

    fn checked_percent_change_to(&self, to: Decimal) -> Option<Decimal> {
        if self.is_zero() {
            return Some(Decimal::ZERO);
        }
        to.checked_sub(*self)?
            .checked_div(*self)?
            .checked_mul(Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away() {
        assert_eq!(dec!(1.123456785).round_half_away(8), dec!(1.12345679));
        assert_eq!(dec!(-0.5).round_half_away(0), dec!(-1));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(dec!(100).percent_change_to(dec!(110)), dec!(10));
        assert_eq!(dec!(0).percent_change_to(dec!(110)), dec!(0));
        assert_eq!(dec!(0.00000000000000000001).checked_percent_change_to(dec!(10000000000)), None);
    }
}
