use std::collections::HashSet;

use anyhow::{Context, Result};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{NATIVE_ETH, WETH};
use crate::oracle::{
    FeedRound, OracleRouter, PoolKind, PoolState, RouterSettings, ValuationStrategy,
};
use crate::utils::math::decimal_to_wad;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub router: RouterConfig,
    /// 피드 전달 권한을 받을 주소
    #[serde(default)]
    pub reporters: Vec<Address>,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    /// 시작 시 주입할 피드/환율/관측값/풀 상태
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub admin: Address,
    pub admin_can_overwrite: bool,
    #[serde(default)]
    pub settings: RouterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// 초기 바인딩 (없으면 decimals만 등록)
    #[serde(default)]
    pub strategy: Option<ValuationStrategy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool: Address,
    pub kind: PoolKind,
    pub constituents: Vec<Address>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub feeds: Vec<FeedSeed>,
    #[serde(default)]
    pub rates: Vec<RateSeed>,
    #[serde(default)]
    pub observations: Vec<ObservationSeed>,
    #[serde(default)]
    pub pool_states: Vec<PoolStateSeed>,
}

/// 정수 값은 10진수 문자열 (U256 범위)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSeed {
    pub feed: Address,
    pub answer: String,
    pub decimals: u8,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSeed {
    pub asset: Address,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationSeed {
    pub pair: Address,
    pub cumulative_price: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStateSeed {
    pub pool: Address,
    pub reserves: Vec<String>,
    pub total_supply: String,
    #[serde(default)]
    pub virtual_price: Option<Decimal>,
    pub updated_at: u64,
}

fn parse_amount(value: &str, field: &str) -> Result<U256> {
    U256::from_dec_str(value.trim())
        .map_err(|e| anyhow::anyhow!("Invalid integer for {}: {:?} ({:?})", field, value, e))
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file {}", path))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// base unit(WETH)과 native ETH sentinel을 1로 고정한 기본 설정
    pub fn default() -> Self {
        let unity = ValuationStrategy::Fixed { value: Decimal::ONE };
        Self {
            router: RouterConfig {
                admin: Address::zero(),
                admin_can_overwrite: true,
                settings: RouterSettings::default(),
            },
            reporters: Vec::new(),
            assets: vec![
                AssetConfig {
                    symbol: "WETH".to_string(),
                    address: WETH,
                    decimals: 18,
                    strategy: Some(unity.clone()),
                },
                AssetConfig {
                    symbol: "ETH".to_string(),
                    address: NATIVE_ETH,
                    decimals: 18,
                    strategy: Some(unity),
                },
            ],
            pools: Vec::new(),
            seed: SeedConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.router.admin.is_zero() {
            return Err(anyhow::anyhow!("Router admin must be configured"));
        }

        let settings = &self.router.settings;
        if settings.max_recursion_depth == 0 {
            return Err(anyhow::anyhow!("max_recursion_depth must be greater than 0"));
        }
        if settings.max_pool_constituents == 0 {
            return Err(anyhow::anyhow!("max_pool_constituents must be greater than 0"));
        }
        if settings.observation_retention_secs == 0 {
            return Err(anyhow::anyhow!("observation_retention_secs must be greater than 0"));
        }

        let mut addresses = HashSet::new();
        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if !addresses.insert(asset.address) {
                return Err(anyhow::anyhow!("Asset {:?} configured twice", asset.address));
            }
            if !symbols.insert(asset.symbol.as_str()) {
                return Err(anyhow::anyhow!("Asset symbol {} configured twice", asset.symbol));
            }
            if let Some(strategy) = &asset.strategy {
                strategy
                    .validate(settings)
                    .with_context(|| format!("invalid strategy for {}", asset.symbol))?;
            }
        }

        for pool in &self.pools {
            if pool.constituents.is_empty() {
                return Err(anyhow::anyhow!("Pool {:?} has no constituents", pool.pool));
            }
        }

        for feed in &self.seed.feeds {
            parse_amount(&feed.answer, "feed answer")?;
        }
        for rate in &self.seed.rates {
            decimal_to_wad(rate.rate).with_context(|| format!("invalid rate for {:?}", rate.asset))?;
        }
        for observation in &self.seed.observations {
            parse_amount(&observation.cumulative_price, "cumulative_price")?;
        }
        for pool_state in &self.seed.pool_states {
            for reserve in &pool_state.reserves {
                parse_amount(reserve, "reserve")?;
            }
            parse_amount(&pool_state.total_supply, "total_supply")?;
        }

        Ok(())
    }

    pub fn asset_by_symbol(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets
            .iter()
            .find(|asset| asset.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn symbol_of(&self, address: Address) -> Option<&str> {
        self.assets
            .iter()
            .find(|asset| asset.address == address)
            .map(|asset| asset.symbol.as_str())
    }

    /// 설정으로 라우터 구성 (바인딩, decimals, reporter, 풀, seed)
    pub async fn build_router(&self) -> Result<OracleRouter> {
        let bindings = self
            .assets
            .iter()
            .filter_map(|asset| asset.strategy.clone().map(|strategy| (asset.address, strategy)))
            .collect();
        let router = OracleRouter::initialize(
            bindings,
            self.router.admin,
            self.router.admin_can_overwrite,
            self.router.settings.clone(),
        )?;

        let admin = self.router.admin;
        for asset in &self.assets {
            router
                .set_decimals(admin, asset.address, asset.decimals)
                .await
                .with_context(|| format!("failed to register decimals for {}", asset.symbol))?;
        }
        for reporter in &self.reporters {
            router.add_reporter(admin, *reporter).await?;
        }
        for pool in &self.pools {
            router
                .register_pool(admin, pool.pool, pool.constituents.clone(), pool.kind)
                .await?;
        }

        self.apply_seed(&router).await?;

        info!(
            "Router built: {} assets, {} pools, {} reporters",
            self.assets.len(),
            self.pools.len(),
            self.reporters.len()
        );
        Ok(router)
    }

    /// seed 값을 admin 권한으로 주입
    pub async fn apply_seed(&self, router: &OracleRouter) -> Result<()> {
        let admin = self.router.admin;
        let seed = &self.seed;

        for feed in &seed.feeds {
            let round = FeedRound {
                answer: parse_amount(&feed.answer, "feed answer")?,
                decimals: feed.decimals,
                updated_at: feed.updated_at,
            };
            router.set_feed(admin, feed.feed, round).await?;
        }
        for rate in &seed.rates {
            router
                .set_exchange_rate(admin, rate.asset, decimal_to_wad(rate.rate)?)
                .await?;
        }
        for observation in &seed.observations {
            router
                .record_observation(
                    admin,
                    observation.pair,
                    parse_amount(&observation.cumulative_price, "cumulative_price")?,
                    observation.timestamp,
                )
                .await?;
        }
        for pool_state in &seed.pool_states {
            let reserves = pool_state
                .reserves
                .iter()
                .map(|reserve| parse_amount(reserve, "reserve"))
                .collect::<Result<Vec<_>>>()?;
            let virtual_price = pool_state.virtual_price.map(decimal_to_wad).transpose()?;
            router
                .update_pool_state(
                    admin,
                    pool_state.pool,
                    PoolState {
                        reserves,
                        total_supply: parse_amount(&pool_state.total_supply, "total_supply")?,
                        virtual_price,
                        updated_at: pool_state.updated_at,
                    },
                )
                .await?;
        }

        debug!(
            "Seeded {} feeds, {} rates, {} observations, {} pool states",
            seed.feeds.len(),
            seed.rates.len(),
            seed.observations.len(),
            seed.pool_states.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WAD;
    use crate::oracle::PriceOracle;
    use std::io::Write;

    const SAMPLE: &str = r#"
reporters = ["0x3333333333333333333333333333333333333333"]

[router]
admin = "0xadadadadadadadadadadadadadadadadadadadad"
admin_can_overwrite = false

[router.settings]
max_recursion_depth = 4

[[assets]]
symbol = "WETH"
address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
decimals = 18
strategy = { kind = "fixed", value = "1" }

[[assets]]
symbol = "USDC"
address = "0x0606060606060606060606060606060606060606"
decimals = 6
strategy = { kind = "direct_feed", feed = "0xf0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0", max_age_secs = 4000000000 }

[[assets]]
symbol = "LP"
address = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
decimals = 18
strategy = { kind = "lp_share", pool = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" }

[[pools]]
pool = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
kind = "reserves"
constituents = [
    "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
    "0x0606060606060606060606060606060606060606",
]

[[seed.feeds]]
feed = "0xf0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0"
answer = "500000000000000"
decimals = 18
updated_at = 1700000000

[[seed.pool_states]]
pool = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
reserves = ["1000000000000000000", "2000000000"]
total_supply = "2000000000000000000"
updated_at = 1700000000
"#;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.router.admin = Address::repeat_byte(0xad);
        config
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.assets.len(), 2);
        assert_eq!(config.asset_by_symbol("weth").unwrap().address, WETH);
        assert_eq!(config.symbol_of(NATIVE_ETH), Some("ETH"));
        assert!(config.router.admin_can_overwrite);
        // admin must be set explicitly
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.router.settings.max_recursion_depth = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.assets.push(config.assets[0].clone());
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.seed.feeds.push(FeedSeed {
            feed: Address::repeat_byte(0xf0),
            answer: "12.5".to_string(),
            decimals: 8,
            updated_at: 0,
        });
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.assets[0].strategy = Some(ValuationStrategy::Fixed { value: Decimal::from(-2) });
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.router.settings.observation_retention_secs = 3_600;
        config.assets[0].strategy = Some(ValuationStrategy::AmmTwap {
            pair: Address::repeat_byte(0x50),
            quote_asset: NATIVE_ETH,
            window_secs: 7_200,
            max_age_secs: None,
        });
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_shipped_config_prices_every_asset() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        config.validate().unwrap();
        let router = config.build_router().await.unwrap();

        // 1 USD / 2500 USD per ETH
        let usdc = config.asset_by_symbol("USDC").unwrap().address;
        assert_eq!(router.price(usdc).await.unwrap().value, WAD / 2_500);

        for asset in &config.assets {
            let price = router.price(asset.address).await;
            assert!(
                matches!(&price, Ok(p) if !p.value.is_zero()),
                "{} did not price: {:?}",
                asset.symbol,
                price
            );
        }
    }

    #[tokio::test]
    async fn test_load_and_build_router() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = Config::load(&path).await.unwrap();
        config.validate().unwrap();
        assert_eq!(config.router.settings.max_recursion_depth, 4);
        assert_eq!(config.reporters.len(), 1);

        let router = config.build_router().await.unwrap();
        assert!(!router.admin_can_overwrite().await);

        let usdc = config.asset_by_symbol("USDC").unwrap().address;
        // 1 USDC = 0.0005 ETH
        assert_eq!(router.price(usdc).await.unwrap().value, WAD / 2_000);

        // 1 WETH + 2000 USDC backing 2 LP = 1 ETH per LP
        let lp = config.asset_by_symbol("LP").unwrap().address;
        assert_eq!(router.price(lp).await.unwrap().value, WAD);
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(Config::load(path.to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_config_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.toml");
        let path = path.to_str().unwrap();

        let config = test_config();
        config.save(path).await.unwrap();
        let loaded = Config::load(path).await.unwrap();

        assert_eq!(loaded.router.admin, config.router.admin);
        assert_eq!(loaded.assets.len(), config.assets.len());
        assert_eq!(loaded.assets[0].strategy, config.assets[0].strategy);
    }
}
