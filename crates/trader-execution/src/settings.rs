//! 상품별 거래 설정.
//!
//! - `MinMax` - 주문 크기 범위
//! - `ExchangeLimits` - 거래소 주문 단위 제한
//! - `Settings` - 상품별 실행 제약
//! - `SettingsRegistry` - (거래소, 자산, 통화쌍) 키 기반 설정 저장소

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use trader_core::{AssetKind, CurrencyPair, CurrencySettingsConfig, InstrumentKey, MinMaxConfig, Quantity};

use crate::exchange::ExecutionError;

/// 주문 크기 범위. 0은 제한 없음을 의미합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    /// 최소 주문 크기
    pub minimum_size: Quantity,
    /// 최대 주문 크기
    pub maximum_size: Quantity,
    /// 최대 누적 주문 금액
    pub maximum_total: Decimal,
}

impl From<&MinMaxConfig> for MinMax {
    fn from(config: &MinMaxConfig) -> Self {
        Self {
            minimum_size: config.minimum_size,
            maximum_size: config.maximum_size,
            maximum_total: config.maximum_total,
        }
    }
}

/// 거래소 주문 단위 제한.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeLimits {
    /// 수량 단위 (0이면 제한 없음)
    pub amount_step_increment: Quantity,
    /// 최소 기준 수량 (0이면 제한 없음)
    pub minimum_base_amount: Quantity,
    /// 최대 기준 수량 (0이면 제한 없음)
    pub maximum_base_amount: Quantity,
}

impl ExchangeLimits {
    /// 수량을 거래소 수량 단위의 배수로 내림합니다.
    pub fn conform_to_amount(&self, amount: Quantity) -> Quantity {
        if self.amount_step_increment <= Decimal::ZERO {
            return amount;
        }
        (amount / self.amount_step_increment).floor() * self.amount_step_increment
    }

    /// 수량이 최소/최대 기준 수량 범위 안에 있는지 확인합니다.
    pub fn check_amount(&self, amount: Quantity) -> Result<(), String> {
        if self.minimum_base_amount > Decimal::ZERO && amount < self.minimum_base_amount {
            return Err(format!(
                "amount {} below minimum base amount {}",
                amount, self.minimum_base_amount
            ));
        }
        if self.maximum_base_amount > Decimal::ZERO && amount > self.maximum_base_amount {
            return Err(format!(
                "amount {} above maximum base amount {}",
                amount, self.maximum_base_amount
            ));
        }
        Ok(())
    }
}

/// 상품별 실행 제약.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// 상품 키
    pub key: InstrumentKey,
    /// 매수 측 크기 범위 (롱에도 적용)
    pub buy_side: MinMax,
    /// 매도 측 크기 범위 (숏에도 적용)
    pub sell_side: MinMax,
    /// 최소 슬리피지 비율 (백분율)
    pub min_slippage_rate: Decimal,
    /// 최대 슬리피지 비율 (백분율)
    pub max_slippage_rate: Decimal,
    /// 메이커 수수료율
    pub maker_fee: Decimal,
    /// 테이커 수수료율
    pub taker_fee: Decimal,
    /// 실제 주문 제출 여부
    pub use_real_orders: bool,
    /// 거래소 주문 단위 제한 적용 여부
    pub can_use_exchange_limits: bool,
    /// 캔들 거래량 맞춤 생략 여부
    pub skip_candle_volume_fitting: bool,
    /// 거래소 주문 단위 제한
    pub limits: ExchangeLimits,
}

impl Settings {
    /// 설정 파일 항목에서 실행 설정을 만듭니다.
    pub fn from_config(config: &CurrencySettingsConfig) -> Self {
        Self {
            key: config.key(),
            buy_side: MinMax::from(&config.buy_side),
            sell_side: MinMax::from(&config.sell_side),
            min_slippage_rate: config.min_slippage_rate,
            max_slippage_rate: config.max_slippage_rate,
            maker_fee: config.maker_fee.unwrap_or_default(),
            taker_fee: config.taker_fee.unwrap_or_default(),
            use_real_orders: config.use_real_orders,
            can_use_exchange_limits: config.can_use_exchange_limits,
            skip_candle_volume_fitting: config.skip_candle_volume_fitting,
            limits: ExchangeLimits {
                amount_step_increment: config.amount_step_increment,
                minimum_base_amount: config.minimum_base_amount,
                maximum_base_amount: config.maximum_base_amount,
            },
        }
    }
}

/// 상품별 설정 저장소.
///
/// 거래소 이름은 대소문자를 구분하지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    entries: HashMap<InstrumentKey, Settings>,
}

impl SettingsRegistry {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 파일 항목들로 저장소를 채웁니다.
    pub fn from_configs<'a>(configs: impl IntoIterator<Item = &'a CurrencySettingsConfig>) -> Self {
        let mut registry = Self::new();
        for config in configs {
            let settings = Settings::from_config(config);
            registry.set(config.asset, settings.key.pair.clone(), settings);
        }
        registry
    }

    /// 설정을 추가하거나 같은 키의 설정을 교체합니다.
    ///
    /// 거래소 이름이나 통화쌍이 비어 있으면 무시합니다.
    pub fn set(&mut self, asset: AssetKind, pair: CurrencyPair, mut settings: Settings) {
        if settings.key.exchange().is_empty() || pair.is_empty() {
            warn!(
                exchange = %settings.key.exchange(),
                pair = %pair,
                "Ignoring currency settings without exchange or pair"
            );
            return;
        }

        settings.key = InstrumentKey::new(settings.key.exchange(), asset, pair);
        debug!(key = %settings.key, "Currency settings stored");
        self.entries.insert(settings.key.clone(), settings);
    }

    /// 설정을 조회합니다.
    pub fn get(
        &self,
        exchange: &str,
        asset: AssetKind,
        pair: &CurrencyPair,
    ) -> Result<&Settings, ExecutionError> {
        let key = InstrumentKey::new(exchange, asset, pair.clone());
        self.get_by_key(&key)
    }

    /// 상품 키로 설정을 조회합니다.
    pub fn get_by_key(&self, key: &InstrumentKey) -> Result<&Settings, ExecutionError> {
        self.entries
            .get(key)
            .ok_or_else(|| ExecutionError::NoSettingsFound(key.clone()))
    }

    /// 저장된 설정 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 저장소가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn settings(exchange: &str) -> Settings {
        Settings {
            key: InstrumentKey::new(exchange, AssetKind::Spot, CurrencyPair::new("BTC", "USDT")),
            taker_fee: dec!(0.001),
            ..Default::default()
        }
    }

    #[test]
    fn test_conform_to_amount_floors_to_step() {
        let limits = ExchangeLimits {
            amount_step_increment: dec!(0.01),
            ..Default::default()
        };
        assert_eq!(limits.conform_to_amount(dec!(1.2345)), dec!(1.23));
        assert_eq!(ExchangeLimits::default().conform_to_amount(dec!(1.2345)), dec!(1.2345));
    }

    #[test]
    fn test_check_amount() {
        let limits = ExchangeLimits {
            minimum_base_amount: dec!(0.1),
            maximum_base_amount: dec!(10),
            ..Default::default()
        };
        assert!(limits.check_amount(dec!(1)).is_ok());
        assert!(limits.check_amount(dec!(0.05)).is_err());
        assert!(limits.check_amount(dec!(11)).is_err());
    }

    #[test]
    fn test_registry_upsert_is_case_insensitive() {
        let pair = CurrencyPair::new("BTC", "USDT");
        let mut registry = SettingsRegistry::new();
        registry.set(AssetKind::Spot, pair.clone(), settings("Binance"));

        let mut replacement = settings("BINANCE");
        replacement.taker_fee = dec!(0.002);
        registry.set(AssetKind::Spot, pair.clone(), replacement);

        assert_eq!(registry.len(), 1);
        let found = registry.get("binance", AssetKind::Spot, &pair).unwrap();
        assert_eq!(found.taker_fee, dec!(0.002));
    }

    #[test]
    fn test_registry_ignores_incomplete_settings() {
        let mut registry = SettingsRegistry::new();
        registry.set(AssetKind::Spot, CurrencyPair::new("BTC", "USDT"), settings(""));
        registry.set(AssetKind::Spot, CurrencyPair::default(), settings("binance"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_missing_key() {
        let registry = SettingsRegistry::new();
        let err = registry
            .get("binance", AssetKind::Futures, &CurrencyPair::new("BTC", "USDT"))
            .unwrap_err();
        assert!(matches!(err, ExecutionError::NoSettingsFound(_)));
    }
}
