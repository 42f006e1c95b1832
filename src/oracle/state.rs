use std::collections::HashMap;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::access::AccessControl;
use super::assets::AssetRegistry;
use super::feeds::{FeedStore, RateStore};
use super::observation::ObservationBuffer;
use super::pool_registry::PoolRegistry;
use super::strategy::ValuationStrategy;
use crate::constants::*;
use crate::types::Asset;

/// 라우터 동작 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// 모든 가격의 단위 자산
    pub base_asset: Asset,
    pub max_recursion_depth: usize,
    pub default_max_feed_age_secs: u64,
    /// USD 호가 피드를 base 단위로 바꿀 때 쓰는 USD/base 피드
    pub usd_base_feed: Option<Address>,
    /// USD/base 피드 자체의 최대 허용 나이
    pub usd_base_feed_max_age_secs: u64,
    /// vault/staking 환율의 최대 허용 나이
    pub max_rate_age_secs: u64,
    pub max_pool_constituents: usize,
    pub permissionless_pool_registration: bool,
    pub observation_retention_secs: u64,
    pub max_observations_per_pair: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            base_asset: WETH,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            default_max_feed_age_secs: DEFAULT_MAX_FEED_AGE_SECS,
            usd_base_feed: None,
            usd_base_feed_max_age_secs: DEFAULT_MAX_FEED_AGE_SECS,
            max_rate_age_secs: DEFAULT_MAX_FEED_AGE_SECS,
            max_pool_constituents: DEFAULT_MAX_POOL_CONSTITUENTS,
            permissionless_pool_registration: false,
            observation_retention_secs: DEFAULT_OBSERVATION_RETENTION_SECS,
            max_observations_per_pair: DEFAULT_MAX_OBSERVATIONS_PER_PAIR,
        }
    }
}

/// 라우터 전체 상태
///
/// 하나의 락 아래에 있으므로 조회는 항상 일관된 스냅샷을 본다.
#[derive(Debug, Clone)]
pub struct OracleState {
    pub(crate) bindings: HashMap<Asset, ValuationStrategy>,
    pub(crate) access: AccessControl,
    pub(crate) pools: PoolRegistry,
    pub(crate) observations: ObservationBuffer,
    pub(crate) feeds: FeedStore,
    pub(crate) rates: RateStore,
    pub(crate) assets: AssetRegistry,
    pub(crate) settings: RouterSettings,
}

impl OracleState {
    pub fn new(settings: RouterSettings, admin: Address, admin_can_overwrite: bool) -> Self {
        Self {
            bindings: HashMap::new(),
            access: AccessControl::new(
                admin,
                admin_can_overwrite,
                settings.permissionless_pool_registration,
            ),
            pools: PoolRegistry::new(settings.max_pool_constituents),
            observations: ObservationBuffer::new(
                settings.observation_retention_secs,
                settings.max_observations_per_pair,
            ),
            feeds: FeedStore::new(),
            rates: RateStore::new(),
            assets: AssetRegistry::new(),
            settings,
        }
    }

    pub fn binding(&self, asset: Asset) -> Option<&ValuationStrategy> {
        self.bindings.get(&asset)
    }

    pub fn bindings(&self) -> &HashMap<Asset, ValuationStrategy> {
        &self.bindings
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn observations(&self) -> &ObservationBuffer {
        &self.observations
    }

    pub fn feeds(&self) -> &FeedStore {
        &self.feeds
    }

    pub fn rates(&self) -> &RateStore {
        &self.rates
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = RouterSettings::default();
        assert_eq!(settings.base_asset, WETH);
        assert_eq!(settings.max_recursion_depth, 8);
        assert!(settings.usd_base_feed.is_none());
        assert_eq!(settings.usd_base_feed_max_age_secs, DEFAULT_MAX_FEED_AGE_SECS);
        assert_eq!(settings.max_rate_age_secs, DEFAULT_MAX_FEED_AGE_SECS);
        assert!(!settings.permissionless_pool_registration);
    }

    #[test]
    fn test_partial_settings_from_toml() {
        let settings: RouterSettings = toml::from_str("max_recursion_depth = 3").unwrap();
        assert_eq!(settings.max_recursion_depth, 3);
        assert_eq!(settings.default_max_feed_age_secs, DEFAULT_MAX_FEED_AGE_SECS);
    }

    #[test]
    fn test_state_wires_settings_into_components() {
        let settings = RouterSettings {
            permissionless_pool_registration: true,
            ..Default::default()
        };
        let state = OracleState::new(settings, Address::repeat_byte(1), false);
        assert!(state.access().ensure_pool_registrar(Address::repeat_byte(2)).is_ok());
        assert!(!state.access().admin_can_overwrite());
        assert!(state.bindings().is_empty());
        assert!(state.pools().is_empty());
    }
}
