//! 슬리피지 및 주문 제약 모델.
//!
//! 주문 가격/수량을 시장 조건에 맞게 조정하는 순수 함수 모음입니다:
//! - 캔들 고가/저가/거래량 범위 맞춤 (HLV fitting)
//! - 방향별 슬리피지 적용
//! - 수수료 계산
//! - 포트폴리오 할당 한도 내 수량 축소
//! - 슬리피지 비율 추정 (무작위, 호가창 기반)

use rand::Rng;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::{OrderBook, OrderBookLevel, Price, Quantity, Side};

use crate::exchange::ExecutionError;

/// 주문 금액이 캔들 거래량을 넘을 때 적용하는 상한 비율.
///
/// 시뮬레이션 거래가 캔들 전체 거래량처럼 보이지 않도록 100%보다 약간 작습니다.
pub const CANDLE_VOLUME_CAP: Decimal = dec!(0.99999999);

/// 주문을 캔들의 고가/저가/거래량 범위에 맞춥니다.
///
/// 가격은 `[low, high]`로 제한되고, 주문 금액(수량 × 가격)이 거래량을 넘으면
/// 금액이 `volume × 0.99999999`가 되도록 수량을 줄입니다. 거래량이 0 이하이면
/// 수량은 조정하지 않습니다.
pub fn ensure_order_fits_within_hlv(
    price: Price,
    amount: Quantity,
    high: Price,
    low: Price,
    volume: Decimal,
) -> (Price, Quantity) {
    let mut adjusted_price = price;
    if adjusted_price < low {
        adjusted_price = low;
    }
    if adjusted_price > high {
        adjusted_price = high;
    }

    let order_volume = amount * adjusted_price;
    if volume <= Decimal::ZERO || order_volume <= volume || adjusted_price.is_zero() {
        return (adjusted_price, amount);
    }

    let capped_volume = volume * CANDLE_VOLUME_CAP;
    (adjusted_price, capped_volume / adjusted_price)
}

/// 방향에 따라 가격에 슬리피지를 적용합니다.
///
/// - 매수 계열: `price + price × (1 - rate)`
/// - 매도 계열: `price × rate`
///
/// 계산 결과가 0이면 원래 가격을 유지합니다.
pub fn apply_slippage_to_price(
    direction: Side,
    price: Price,
    slippage_rate: Decimal,
) -> Result<Price, ExecutionError> {
    let adjusted = match direction {
        Side::Buy | Side::Bid | Side::Long => price + price * (Decimal::ONE - slippage_rate),
        Side::Sell | Side::Ask | Side::Short => price * slippage_rate,
        other => return Err(ExecutionError::InvalidDirection(other)),
    };

    if adjusted.is_zero() {
        return Ok(price);
    }
    Ok(adjusted)
}

/// 거래소 수수료를 계산합니다.
pub fn calculate_exchange_fee(price: Price, amount: Quantity, fee_rate: Decimal) -> Decimal {
    fee_rate * price * amount
}

/// 포트폴리오가 할당한 자금 안에 들어오도록 수량을 줄입니다.
///
/// 매수는 `price × amount ≤ allocated_funds`가 되도록, 매도는 할당량(기준 통화 단위)을
/// 넘지 않도록 제한합니다. 그 외 방향은 그대로 반환합니다.
pub fn reduce_amount_to_fit_portfolio_limit(
    price: Price,
    amount: Quantity,
    allocated_funds: Decimal,
    direction: Side,
) -> Quantity {
    match direction {
        Side::Buy | Side::Bid => {
            if price > Decimal::ZERO && price * amount > allocated_funds {
                allocated_funds / price
            } else {
                amount
            }
        }
        Side::Sell | Side::Ask => amount.min(allocated_funds),
        _ => amount,
    }
}

/// 매수 수량을 수수료까지 포함해 할당 자금 안에 들어오도록 줄입니다.
///
/// `price × amount × (1 + fee_rate) ≤ allocated_funds`가 되도록 수량을 소수점 8자리에서
/// 내림합니다. 매수가 아니거나 수수료가 없으면 그대로 반환합니다.
pub fn reduce_amount_to_cover_fee(
    price: Price,
    amount: Quantity,
    allocated_funds: Decimal,
    fee_rate: Decimal,
    direction: Side,
) -> Quantity {
    if !matches!(direction, Side::Buy | Side::Bid) || fee_rate <= Decimal::ZERO {
        return amount;
    }
    let cost_per_unit = price * (Decimal::ONE + fee_rate);
    if cost_per_unit <= Decimal::ZERO || amount * cost_per_unit <= allocated_funds {
        return amount;
    }
    (allocated_funds / cost_per_unit).round_dp_with_strategy(8, RoundingStrategy::ToZero)
}

/// 설정된 범위에서 슬리피지 비율을 무작위로 추정합니다.
///
/// `min_rate`와 `max_rate`는 1~100 사이의 백분율입니다. 두 값 사이의 정수 백분율을
/// 균등하게 뽑아 100으로 나눈 값을 반환합니다. 범위를 벗어나거나 역전된 경우
/// 슬리피지가 없는 `1`을 반환합니다.
pub fn estimate_slippage_percentage<R: Rng + ?Sized>(
    rng: &mut R,
    min_rate: Decimal,
    max_rate: Decimal,
) -> Decimal {
    let valid = |rate: Decimal| rate >= Decimal::ONE && rate <= Decimal::ONE_HUNDRED;
    if !valid(min_rate) || !valid(max_rate) {
        return Decimal::ONE;
    }
    if min_rate == max_rate {
        return min_rate / Decimal::ONE_HUNDRED;
    }

    match (min_rate.trunc().to_i64(), max_rate.trunc().to_i64()) {
        (Some(low), Some(high)) if low < high => {
            Decimal::from(rng.gen_range(low..=high)) / Decimal::ONE_HUNDRED
        }
        _ => Decimal::ONE,
    }
}

/// 호가창 깊이를 따라 주문을 채웠을 때의 평균 체결가와 수수료 차감 수량을 계산합니다.
///
/// 매수는 할당 자금(호가 통화)으로 매도 호가를 소진하고, 매도는 할당 수량(기준 통화)으로
/// 매수 호가를 소진합니다. 채울 수 있는 호가가 없으면 `None`입니다.
pub fn calculate_slippage_by_orderbook(
    book: &OrderBook,
    direction: Side,
    allocated_funds: Decimal,
    fee_rate: Decimal,
) -> Option<(Price, Quantity)> {
    let (filled, notional) = if direction.is_buy_like() {
        walk_levels(
            &book.asks,
            allocated_funds,
            |level, remaining| {
                if level.price * level.quantity <= remaining {
                    level.quantity
                } else {
                    remaining / level.price
                }
            },
            |qty, price| qty * price,
        )
    } else if direction.is_sell_like() {
        walk_levels(
            &book.bids,
            allocated_funds,
            |level, remaining| level.quantity.min(remaining),
            |qty, _| qty,
        )
    } else {
        return None;
    };

    if filled <= Decimal::ZERO {
        return None;
    }
    Some((notional / filled, filled * (Decimal::ONE - fee_rate)))
}

/// 호가 레벨을 순서대로 소진합니다. `(체결 수량, 체결 금액)`을 반환합니다.
fn walk_levels(
    levels: &[OrderBookLevel],
    budget: Decimal,
    take: impl Fn(&OrderBookLevel, Decimal) -> Quantity,
    consume: impl Fn(Quantity, Price) -> Decimal,
) -> (Quantity, Decimal) {
    let mut remaining = budget;
    let mut filled = Decimal::ZERO;
    let mut notional = Decimal::ZERO;

    for level in levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        if level.price <= Decimal::ZERO {
            continue;
        }
        let qty = take(level, remaining);
        filled += qty;
        notional += qty * level.price;
        remaining -= consume(qty, level.price);
    }
    (filled, notional)
}
