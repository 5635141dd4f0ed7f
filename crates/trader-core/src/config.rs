//! 설정 관리.
//!
//! 이 모듈은 백테스트 실행 설정을 정의하고 로드합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{TraderError, TraderResult};
use crate::types::{AssetKind, CurrencyPair, InstrumentKey};

/// 백테스트 실행 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BacktestConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 통계 설정
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// 상품별 거래 설정
    #[serde(default)]
    pub currencies: Vec<CurrencySettingsConfig>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// 추가 로그 파일 경로
    #[serde(default)]
    pub files: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            files: Vec::new(),
        }
    }
}

/// 통계 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatisticsConfig {
    /// 전략 이름
    #[serde(default)]
    pub strategy_name: String,
    /// 연간 무위험 이자율 (예: 0.03 = 3%)
    #[serde(default)]
    pub risk_free_rate: Decimal,
    /// 캔들 간격 (초)
    #[serde(default = "default_candle_interval_secs")]
    pub candle_interval_secs: u64,
}

fn default_candle_interval_secs() -> u64 {
    86_400
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            strategy_name: String::new(),
            risk_free_rate: Decimal::ZERO,
            candle_interval_secs: default_candle_interval_secs(),
        }
    }
}

/// 주문 크기 범위 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MinMaxConfig {
    /// 최소 주문 크기 (0이면 제한 없음)
    #[serde(default)]
    pub minimum_size: Decimal,
    /// 최대 주문 크기 (0이면 제한 없음)
    #[serde(default)]
    pub maximum_size: Decimal,
    /// 최대 누적 주문 금액 (0이면 제한 없음)
    #[serde(default)]
    pub maximum_total: Decimal,
}

/// 상품별 거래 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencySettingsConfig {
    /// 거래소 이름
    pub exchange: String,
    /// 자산 유형
    pub asset: AssetKind,
    /// 기준 통화
    pub base: String,
    /// 호가 통화
    pub quote: String,
    /// 매수 측 주문 크기 범위
    #[serde(default)]
    pub buy_side: MinMaxConfig,
    /// 매도 측 주문 크기 범위
    #[serde(default)]
    pub sell_side: MinMaxConfig,
    /// 최소 슬리피지 비율 (백분율, 예: 95 = 가격의 95% 유지)
    #[serde(default = "default_slippage_rate")]
    pub min_slippage_rate: Decimal,
    /// 최대 슬리피지 비율 (백분율)
    #[serde(default = "default_slippage_rate")]
    pub max_slippage_rate: Decimal,
    /// 메이커 수수료율 재정의
    #[serde(default)]
    pub maker_fee: Option<Decimal>,
    /// 테이커 수수료율 재정의
    #[serde(default)]
    pub taker_fee: Option<Decimal>,
    /// 실제 주문 제출 여부
    #[serde(default)]
    pub use_real_orders: bool,
    /// 거래소 주문 단위 제한 적용 여부
    #[serde(default)]
    pub can_use_exchange_limits: bool,
    /// 캔들 거래량 맞춤 생략 여부
    #[serde(default)]
    pub skip_candle_volume_fitting: bool,
    /// 수량 단위 (0이면 제한 없음)
    #[serde(default)]
    pub amount_step_increment: Decimal,
    /// 거래소 최소 기준 수량
    #[serde(default)]
    pub minimum_base_amount: Decimal,
    /// 거래소 최대 기준 수량
    #[serde(default)]
    pub maximum_base_amount: Decimal,
}

fn default_slippage_rate() -> Decimal {
    Decimal::ONE_HUNDRED
}

impl CurrencySettingsConfig {
    /// 상품 키를 반환합니다.
    pub fn key(&self) -> InstrumentKey {
        InstrumentKey::new(&self.exchange, self.asset, CurrencyPair::new(&self.base, &self.quote))
    }

    /// 설정 값을 검증합니다.
    pub fn validate(&self) -> TraderResult<()> {
        let key = self.key();
        for fee in [self.maker_fee, self.taker_fee].into_iter().flatten() {
            if fee < Decimal::ZERO {
                return Err(TraderError::Config(format!("{}: fee must not be negative", key)));
            }
        }
        for rate in [self.min_slippage_rate, self.max_slippage_rate] {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(TraderError::Config(format!(
                    "{}: slippage rate {} outside 0..=100",
                    key, rate
                )));
            }
        }
        if self.min_slippage_rate > self.max_slippage_rate {
            return Err(TraderError::Config(format!(
                "{}: minimum slippage rate above maximum",
                key
            )));
        }
        for (label, side) in [("buy", &self.buy_side), ("sell", &self.sell_side)] {
            if side.maximum_size > Decimal::ZERO && side.minimum_size > side.maximum_size {
                return Err(TraderError::Config(format!(
                    "{}: {} side minimum size {} above maximum size {}",
                    key, label, side.minimum_size, side.maximum_size
                )));
            }
        }
        Ok(())
    }
}

impl BacktestConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BACKTEST")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(content: &str) -> TraderResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 전체 설정을 검증합니다.
    pub fn validate(&self) -> TraderResult<()> {
        self.currencies.iter().try_for_each(CurrencySettingsConfig::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
[logging]
level = "debug"
format = "json"

[statistics]
strategy_name = "dca"
risk_free_rate = "0.03"

[[currencies]]
exchange = "Binance"
asset = "spot"
base = "btc"
quote = "usdt"
min_slippage_rate = "95"
max_slippage_rate = "100"
taker_fee = "0.001"
can_use_exchange_limits = true
amount_step_increment = "0.001"

[currencies.buy_side]
minimum_size = "0.01"
maximum_size = "5"
"#;

    #[test]
    fn test_load_from_toml() {
        let config = BacktestConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.statistics.strategy_name, "dca");
        assert_eq!(config.statistics.candle_interval_secs, 86_400);

        let btc = &config.currencies[0];
        assert_eq!(btc.key().exchange(), "binance");
        assert_eq!(btc.key().pair, CurrencyPair::new("BTC", "USDT"));
        assert_eq!(btc.buy_side.minimum_size, dec!(0.01));
        assert_eq!(btc.sell_side.maximum_size, Decimal::ZERO);
        assert_eq!(btc.taker_fee, Some(dec!(0.001)));
        assert!(btc.can_use_exchange_limits);
    }

    #[test]
    fn test_rejects_inverted_slippage_bounds() {
        let content = SAMPLE.replace(r#"min_slippage_rate = "95""#, r#"min_slippage_rate = "100""#)
            .replace(r#"max_slippage_rate = "100""#, r#"max_slippage_rate = "90""#);
        assert!(matches!(
            BacktestConfig::from_toml_str(&content),
            Err(TraderError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_negative_fee() {
        let content = SAMPLE.replace(r#"taker_fee = "0.001""#, r#"taker_fee = "-0.001""#);
        assert!(BacktestConfig::from_toml_str(&content).is_err());
    }
}
