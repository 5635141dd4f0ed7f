//! 주문 실행 시뮬레이터.
//!
//! 포트폴리오가 만든 주문 이벤트 하나를 받아 다음 단계를 수행합니다:
//! 1. 방향 검증 및 상품 설정 조회
//! 2. 청산 주문 처리
//! 3. 가격/수량 산정 (호가창 기반 또는 캔들 기반 시뮬레이션)
//! 4. 포트폴리오 한도, 거래소 수량 단위, 최소/최대 크기 적용
//! 5. 주문 제출 (실제 또는 시뮬레이션)
//! 6. 자금 장부 정산
//!
//! 모든 가격/수량 조정은 체결 이벤트의 사유 기록에 남습니다.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};
use trader_core::{
    AssetKind, CurrencyPair, DecimalExt, FillEvent, InstrumentKey, OrderEvent, OrderStatusType,
    OrderSubmission, OrderType, Price, Quantity, Side,
};
use uuid::Uuid;

use crate::data::DataHandler;
use crate::funding::{FundReleaser, FundingError};
use crate::order_manager::{OrderManagerError, OrderSink};
use crate::settings::{Settings, SettingsRegistry};
use crate::slippage::{
    apply_slippage_to_price, calculate_exchange_fee, calculate_slippage_by_orderbook,
    ensure_order_fits_within_hlv, estimate_slippage_percentage, reduce_amount_to_cover_fee,
    reduce_amount_to_fit_portfolio_limit,
};

/// 실행 오류 유형.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("cannot transact: order direction {0}")]
    CannotTransact(Side),

    #[error("no currency settings found for {0}")]
    NoSettingsFound(InstrumentKey),

    #[error("invalid direction: {0}")]
    InvalidDirection(Side),

    #[error("exceeded portfolio limit")]
    ExceededPortfolioLimit,

    #[error("placed order {0} not found in order manager")]
    PlacedOrderNotFound(String),

    #[error("invalid direction {direction} for {asset} asset")]
    InvalidAssetDirection { asset: AssetKind, direction: Side },

    #[error("unsupported asset type: {0}")]
    UnsupportedAsset(AssetKind),

    #[error("no candle data available")]
    NoCandleData,

    #[error("order book unavailable for {0}")]
    OrderBookUnavailable(InstrumentKey),

    #[error(transparent)]
    OrderManager(#[from] OrderManagerError),

    #[error(transparent)]
    Funding(#[from] FundingError),
}

/// 실패한 주문 실행.
///
/// 방향 전환과 사유 기록이 반영된 체결 이벤트를 함께 돌려주므로 호출자가 결과를
/// 그대로 통계에 기록할 수 있습니다.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OrderFailure {
    /// 실패 시점의 체결 이벤트
    pub fill: Box<FillEvent>,
    /// 실패 원인
    #[source]
    pub error: ExecutionError,
}

impl OrderFailure {
    fn new(fill: FillEvent, error: ExecutionError) -> Self {
        Self {
            fill: Box::new(fill),
            error,
        }
    }

    /// 체결 이벤트와 원인으로 분리합니다.
    pub fn into_parts(self) -> (FillEvent, ExecutionError) {
        (*self.fill, self.error)
    }
}

/// 주문 후 자금 정산에 필요한 수치.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostOrderAmounts {
    /// 원래 요청 수량
    pub order_amount: Quantity,
    /// 포트폴리오가 할당한 자금
    pub allocated_funds: Decimal,
    /// 한도 적용 후 최종 수량
    pub amount: Quantity,
    /// 최종 체결 가격
    pub price: Price,
    /// 수수료
    pub fee: Decimal,
}

/// 백테스트용 거래소 시뮬레이터.
#[derive(Debug)]
pub struct Exchange {
    settings: SettingsRegistry,
    rng: StdRng,
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange {
    /// 엔트로피로 초기화된 난수원을 사용하는 시뮬레이터를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: SettingsRegistry::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// 고정 시드를 사용하는 시뮬레이터를 생성합니다. 같은 시드는 같은 슬리피지를 재현합니다.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            settings: SettingsRegistry::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 설정 저장소를 교체합니다.
    pub fn with_settings(mut self, settings: SettingsRegistry) -> Self {
        self.settings = settings;
        self
    }

    /// 상품 설정을 추가하거나 교체합니다.
    pub fn set_settings(&mut self, asset: AssetKind, pair: CurrencyPair, settings: Settings) {
        self.settings.set(asset, pair, settings);
    }

    /// 상품 설정을 조회합니다.
    pub fn get_settings(
        &self,
        exchange: &str,
        asset: AssetKind,
        pair: &CurrencyPair,
    ) -> Result<&Settings, ExecutionError> {
        self.settings.get(exchange, asset, pair)
    }

    /// 주문 이벤트를 실행하고 체결 이벤트를 만듭니다.
    ///
    /// 실패해도 방향이 전환되고 사유가 기록된 체결 이벤트를 `OrderFailure`에 담아 돌려줍니다.
    pub fn execute_order(
        &mut self,
        order: &OrderEvent,
        data: &dyn DataHandler,
        sink: &mut dyn OrderSink,
        funds: &mut dyn FundReleaser,
    ) -> Result<FillEvent, OrderFailure> {
        let mut fill = FillEvent::from_order(order);
        match self.fill_order(order, &mut fill, data, sink, funds) {
            Ok(()) => Ok(fill),
            Err(error) => {
                warn!(
                    key = %order.base.key,
                    offset = order.base.offset,
                    direction = %fill.direction,
                    error = %error,
                    "Order execution failed"
                );
                Err(OrderFailure::new(fill, error))
            }
        }
    }

    fn fill_order(
        &mut self,
        order: &OrderEvent,
        fill: &mut FillEvent,
        data: &dyn DataHandler,
        sink: &mut dyn OrderSink,
        funds: &mut dyn FundReleaser,
    ) -> Result<(), ExecutionError> {
        if !order.direction.can_transact() && !order.liquidating {
            return Err(ExecutionError::CannotTransact(order.direction));
        }

        let key = &order.base.key;
        let settings = self.settings.get_by_key(key)?.clone();

        if order.liquidating {
            if key.asset.is_futures() {
                funds.collateral_releaser()?.liquidate();
            } else {
                funds.pair_releaser()?.liquidate();
            }
            info!(key = %key, offset = order.base.offset, "Liquidation recorded");
            return Ok(());
        }

        let (mut price, mut amount) = if settings.use_real_orders {
            price_from_order_book(fill, &settings, data, order.allocated_funds)?
        } else {
            match self.price_from_candle(fill, &settings, data)? {
                Some(priced) => priced,
                None => return Ok(()),
            }
        };

        let reduced =
            reduce_amount_to_fit_portfolio_limit(price, amount, order.allocated_funds, fill.direction);
        if reduced != amount {
            fill.append_reason(format!(
                "Order size shrunk from {} to {} to remain within portfolio limits",
                amount.normalize(),
                reduced.normalize()
            ));
            amount = reduced;
        }

        let covered = reduce_amount_to_cover_fee(
            price,
            amount,
            order.allocated_funds,
            settings.taker_fee,
            fill.direction,
        );
        if covered != amount {
            fill.append_reason(format!(
                "Order size shrunk from {} to {} to cover exchange fees within portfolio limits",
                amount.normalize(),
                covered.normalize()
            ));
            amount = covered;
        }

        if settings.can_use_exchange_limits {
            let conformed = settings.limits.conform_to_amount(amount);
            if conformed != amount {
                fill.append_reason(format!(
                    "Order size shrunk from {} to {} to remain within exchange step amount limits",
                    amount.normalize(),
                    conformed.normalize()
                ));
                amount = conformed;
            }
        }

        verify_order_within_limits(fill, amount, &settings)?;

        let fee = calculate_exchange_fee(price, amount, settings.taker_fee);
        fill.exchange_fee = fee;
        let amounts = PostOrderAmounts {
            order_amount: order.amount,
            allocated_funds: order.allocated_funds,
            amount,
            price,
            fee,
        };

        let order_id = match place_order(price, amount, fee, &settings, fill, sink) {
            Ok(id) => id,
            Err(error) => return allocate_funds_post_order(fill, funds, Some(error), &amounts),
        };

        // 실현 값은 주문 싱크의 기록을 따릅니다.
        if let Some(mut record) = sink
            .orders_snapshot(None)
            .into_iter()
            .find(|o| o.order_id == order_id)
        {
            record.date = order.base.time;
            record.last_updated = order.base.time;
            record.close_time = Some(order.base.time);
            fill.purchase_price = record.price;
            fill.amount = record.amount;
            if record.fee > Decimal::ZERO {
                fill.exchange_fee = record.fee;
            }
            fill.total = fill.purchase_price * fill.amount + fill.exchange_fee;
            fill.order = Some(record);
            price = fill.purchase_price;
        }

        allocate_funds_post_order(fill, funds, None, &amounts)?;

        if fill.order.is_none() {
            return Err(ExecutionError::PlacedOrderNotFound(order_id));
        }

        info!(
            key = %key,
            offset = order.base.offset,
            direction = %fill.direction,
            amount = %fill.amount,
            price = %price,
            fee = %fill.exchange_fee,
            "Order executed"
        );
        Ok(())
    }

    /// 캔들 데이터로 가격과 수량을 산정합니다.
    ///
    /// 조정 후 수량이 0 이하가 되면 방향을 거절 변형으로 바꾸고 `None`을 반환합니다.
    fn price_from_candle(
        &mut self,
        fill: &mut FillEvent,
        settings: &Settings,
        data: &dyn DataHandler,
    ) -> Result<Option<(Price, Quantity)>, ExecutionError> {
        let mut price = fill.close_price;
        let mut amount = fill.amount;
        let slippage_rate = estimate_slippage_percentage(
            &mut self.rng,
            settings.min_slippage_rate,
            settings.max_slippage_rate,
        );

        if settings.skip_candle_volume_fitting || fill.base.key.asset.is_futures() {
            fill.volume_adjusted_price = fill.close_price;
        } else {
            let (high, low, volume) = data.latest_high_low_volume()?;
            let (adjusted_price, adjusted_amount) =
                ensure_order_fits_within_hlv(price, amount, high, low, volume);
            if adjusted_amount != amount {
                fill.append_reason(format!(
                    "Order size shrunk from {} to {} to fit candle",
                    amount.normalize(),
                    adjusted_amount.normalize()
                ));
                amount = adjusted_amount;
            }
            if adjusted_price != price {
                fill.append_reason(format!(
                    "Price adjusted fitting to candle from {} to {}",
                    price.normalize(),
                    adjusted_price.normalize()
                ));
                price = adjusted_price;
            }
            fill.volume_adjusted_price = price;
        }

        if amount <= Decimal::ZERO && fill.amount > Decimal::ZERO {
            let declined = fill.direction.declined();
            fill.set_direction(declined);
            fill.append_reason("amount set to 0, data may be incorrect");
            warn!(
                key = %fill.base.key,
                offset = fill.base.offset,
                direction = %declined,
                "Order amount fitted down to zero"
            );
            return Ok(None);
        }

        let slipped = apply_slippage_to_price(fill.direction, price, slippage_rate)?;
        if slipped != price {
            fill.append_reason(format!(
                "Price has slipped from {} to {}",
                price.normalize(),
                slipped.normalize()
            ));
            price = slipped;
        }
        fill.slippage = slippage_rate * Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED;

        Ok(Some((price, amount)))
    }
}

/// 현재 호가창으로 가격과 수량을 산정합니다.
fn price_from_order_book(
    fill: &mut FillEvent,
    settings: &Settings,
    data: &dyn DataHandler,
    allocated_funds: Decimal,
) -> Result<(Price, Quantity), ExecutionError> {
    let unavailable = || ExecutionError::OrderBookUnavailable(fill.base.key.clone());
    let book = data.order_book().ok_or_else(unavailable)?;
    let (price, amount) =
        calculate_slippage_by_orderbook(&book, fill.direction, allocated_funds, settings.taker_fee)
            .ok_or_else(unavailable)?;

    fill.volume_adjusted_price = price;
    fill.slippage = fill.close_price.percent_change_to(price);
    debug!(
        key = %fill.base.key,
        price = %price,
        amount = %amount,
        slippage = %fill.slippage,
        "Order priced from order book"
    );
    Ok((price, amount))
}

/// 주문을 주문 싱크에 제출하고 주문 ID를 반환합니다.
fn place_order(
    price: Price,
    amount: Quantity,
    fee: Decimal,
    settings: &Settings,
    fill: &FillEvent,
    sink: &mut dyn OrderSink,
) -> Result<String, ExecutionError> {
    let order_id = Uuid::new_v4().to_string();
    let submission = OrderSubmission {
        exchange: fill.base.key.exchange().to_string(),
        asset: fill.base.key.asset,
        pair: fill.base.key.pair.clone(),
        side: fill.direction,
        order_type: OrderType::Market,
        price,
        amount,
    };

    let response = if settings.use_real_orders {
        sink.submit(&submission)?
    } else {
        let mut response = submission.derive_submit_response(order_id, fill.base.time);
        response.status = OrderStatusType::Filled;
        response.fee = fee;
        sink.submit_fake_order(&submission, response, settings.can_use_exchange_limits)?
    };
    Ok(response.order_id)
}

/// 최종 수량이 상품의 최소/최대 주문 크기 안에 있는지 확인합니다.
///
/// 매수/롱은 매수 측, 매도/숏은 매도 측 범위를 사용하며 포지션 청산은 검사하지 않습니다.
/// 범위를 벗어나면 방향을 거절 변형으로 바꾸고 사유를 기록합니다.
pub fn verify_order_within_limits(
    fill: &mut FillEvent,
    amount: Quantity,
    settings: &Settings,
) -> Result<(), ExecutionError> {
    let (limits, declined) = match fill.direction {
        Side::Buy | Side::Bid => (settings.buy_side, Side::CouldNotBuy),
        Side::Sell | Side::Ask => (settings.sell_side, Side::CouldNotSell),
        Side::Long => (settings.buy_side, Side::CouldNotLong),
        Side::Short => (settings.sell_side, Side::CouldNotShort),
        Side::ClosePosition => return Ok(()),
        other => {
            fill.set_direction(Side::DoNothing);
            return Err(ExecutionError::InvalidDirection(other));
        }
    };

    let mut violation = None;
    if limits.minimum_size > Decimal::ZERO && amount < limits.minimum_size {
        violation = Some(("below", "minimum", limits.minimum_size));
    }
    if limits.maximum_size > Decimal::ZERO && amount > limits.maximum_size {
        violation = Some(("exceeded", "maximum", limits.maximum_size));
    }

    if let Some((below_exceed, min_or_max, size)) = violation {
        fill.set_direction(declined);
        fill.append_reason(format!(
            "Order size {} {} {} size {}",
            amount.normalize(),
            below_exceed,
            min_or_max,
            size.normalize()
        ));
        return Err(ExecutionError::ExceededPortfolioLimit);
    }
    Ok(())
}

/// 주문 결과를 자금 장부에 정산합니다.
///
/// - 제출 실패: 할당 자금 전체(현물) 또는 요청 계약 수량(선물)을 되돌리고 방향을 거절
///   변형으로 바꾼 뒤 원래 에러를 반환합니다. 정산 중 발생한 에러는 사유 기록에 추가됩니다.
/// - 현물 매수: 할당 자금에서 `수량 × 가격 + 수수료`를 차감해 해제하고 기준 통화를 적립합니다.
/// - 현물 매도: 할당 수량에서 체결 수량을 차감해 해제하고 `수량 × 가격 - 수수료`를 적립합니다.
/// - 선물: 증거금은 주문이 소비하므로 해제하지 않습니다.
pub fn allocate_funds_post_order(
    fill: &mut FillEvent,
    funds: &mut dyn FundReleaser,
    order_error: Option<ExecutionError>,
    amounts: &PostOrderAmounts,
) -> Result<(), ExecutionError> {
    match order_error {
        Some(error) => Err(reconcile_failed_order(fill, funds, error, amounts)),
        None => reconcile_placed_order(fill, funds, amounts),
    }
}

fn reconcile_failed_order(
    fill: &mut FillEvent,
    funds: &mut dyn FundReleaser,
    error: ExecutionError,
    amounts: &PostOrderAmounts,
) -> ExecutionError {
    let asset = fill.base.key.asset;
    let direction = fill.direction;

    let released = match asset {
        AssetKind::Spot => funds
            .pair_releaser()
            .and_then(|r| r.release(amounts.allocated_funds, amounts.allocated_funds, direction))
            .map_err(ExecutionError::from),
        AssetKind::Futures => funds
            .collateral_releaser()
            .and_then(|r| r.release_contracts(amounts.order_amount))
            .map_err(ExecutionError::from),
        other => Err(ExecutionError::UnsupportedAsset(other)),
    };
    if let Err(e) = released {
        warn!(key = %fill.base.key, error = %e, "Failed to release funds after order failure");
        fill.append_reason(e.to_string());
    }

    match (asset, direction) {
        (AssetKind::Spot, Side::Buy | Side::Bid) => fill.set_direction(Side::CouldNotBuy),
        (AssetKind::Spot, Side::Sell | Side::Ask | Side::ClosePosition) => {
            fill.set_direction(Side::CouldNotSell)
        }
        (AssetKind::Futures, Side::Long) => fill.set_direction(Side::CouldNotLong),
        (AssetKind::Futures, Side::Short) => fill.set_direction(Side::CouldNotShort),
        (AssetKind::Futures, direction) => {
            return ExecutionError::InvalidAssetDirection { asset, direction };
        }
        _ => {}
    }
    error
}

fn reconcile_placed_order(
    fill: &mut FillEvent,
    funds: &mut dyn FundReleaser,
    amounts: &PostOrderAmounts,
) -> Result<(), ExecutionError> {
    let asset = fill.base.key.asset;
    let direction = fill.direction;

    let underlying = match asset {
        AssetKind::Spot => {
            let releaser = funds.pair_releaser()?;
            match direction {
                Side::Buy | Side::Bid => {
                    let spent = amounts.amount * amounts.price + amounts.fee;
                    releaser.release(
                        amounts.allocated_funds,
                        amounts.allocated_funds - spent,
                        direction,
                    )?;
                    releaser.increase_available(amounts.amount, direction)?;
                }
                Side::Sell | Side::Ask => {
                    releaser.release(
                        amounts.allocated_funds,
                        amounts.allocated_funds - amounts.amount,
                        direction,
                    )?;
                    releaser.increase_available(
                        amounts.amount * amounts.price - amounts.fee,
                        direction,
                    )?;
                }
                _ => return Err(ExecutionError::InvalidAssetDirection { asset, direction }),
            }
            None
        }
        AssetKind::Futures => {
            funds.collateral_releaser()?;
            fill.base.underlying_pair.clone()
        }
        other => return Err(ExecutionError::UnsupportedAsset(other)),
    };

    let pair = fill
        .order
        .as_ref()
        .map(|o| o.pair.clone())
        .unwrap_or_else(|| fill.base.key.pair.clone());
    let summary = summarise_position(
        direction,
        fill.amount,
        fill.amount * fill.purchase_price,
        fill.exchange_fee,
        &pair,
        underlying.as_ref(),
    );
    debug!(key = %fill.base.key, summary = %summary, "Funds reconciled");
    fill.append_reason(summary);
    Ok(())
}

/// 체결 요약 문장을 만듭니다.
///
/// 기초 통화쌍이 있으면(선물 계약) 통화쌍 전체를 기준 통화로, 기초 통화쌍의 호가 통화를
/// 호가 통화로 표시합니다.
pub fn summarise_position(
    direction: Side,
    amount: Quantity,
    total: Decimal,
    fee: Decimal,
    pair: &CurrencyPair,
    underlying: Option<&CurrencyPair>,
) -> String {
    let (base, quote) = match underlying {
        Some(u) if !u.is_empty() => (pair.to_string(), u.quote.clone()),
        _ => (pair.base.clone(), pair.quote.clone()),
    };
    let round = |value: Decimal| value.round_half_away(8).normalize();

    format!(
        "Placed {} order of {} {} for {} {}, with {} {} in fees, totalling {} {}",
        direction,
        round(amount),
        base,
        round(total),
        quote,
        round(fee),
        quote,
        round(total + fee),
        quote,
    )
}
