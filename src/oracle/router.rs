use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, U256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::feeds::FeedRound;
use super::pool_registry::{PoolKind, PoolRegistration, PoolState};
use super::price_oracle::{PriceOracle, PriceResult, PriceSource};
use super::state::{OracleState, RouterSettings};
use super::strategy::{PriceResolver, ValuationStrategy};
use crate::constants::WAD;
use crate::types::{Asset, OracleError, OracleResult, PairId, PoolId};
use crate::utils::math::{mul_div, pow10};
use crate::utils::time::{Clock, SystemClock};

/// 한 번의 가격 조회 동안 유지되는 재귀 조회자
///
/// 읽기 guard에서 빌린 상태만 보므로, 하위 조회까지 같은 스냅샷을 공유한다.
struct Resolver<'a> {
    state: &'a OracleState,
    now: u64,
    depth: usize,
}

impl<'a> Resolver<'a> {
    fn new(state: &'a OracleState, now: u64) -> Self {
        Self { state, now, depth: 0 }
    }

    fn resolve_binding(&self, asset: Asset) -> OracleResult<(U256, PriceSource)> {
        if self.depth > self.state.settings.max_recursion_depth {
            warn!("Recursion limit hit resolving {:?} at depth {}", asset, self.depth);
            return Err(OracleError::RecursionLimit {
                asset,
                depth: self.depth,
            });
        }

        let strategy = self
            .state
            .binding(asset)
            .ok_or(OracleError::UnboundAsset(asset))?;
        let value = strategy.resolve(asset, self)?;

        debug!(
            "Resolved {:?} via {:?} at depth {}: {}",
            asset,
            strategy.source(),
            self.depth,
            value
        );
        Ok((value, strategy.source()))
    }
}

impl PriceResolver for Resolver<'_> {
    fn resolve(&self, asset: Asset) -> OracleResult<U256> {
        let child = Resolver {
            state: self.state,
            now: self.now,
            depth: self.depth + 1,
        };
        child.resolve_binding(asset).map(|(value, _)| value)
    }

    fn state(&self) -> &OracleState {
        self.state
    }

    fn now(&self) -> u64 {
        self.now
    }
}

fn rejected(operation: &str, err: OracleError) -> OracleError {
    warn!("{} rejected: {}", operation, err);
    err
}

/// 자산 => 평가 전략 라우터
///
/// 바인딩, 풀, 관측값, 피드는 모두 하나의 `RwLock` 아래에 있다.
/// 변경은 직렬화되고, 조회는 읽기 guard 하나로 끝까지 진행된다.
#[derive(Clone)]
pub struct OracleRouter {
    state: Arc<RwLock<OracleState>>,
    clock: Arc<dyn Clock>,
}

impl OracleRouter {
    /// 초기 바인딩으로 라우터 생성
    pub fn initialize(
        bindings: Vec<(Asset, ValuationStrategy)>,
        admin: Address,
        admin_can_overwrite: bool,
        settings: RouterSettings,
    ) -> OracleResult<Self> {
        let mut state = OracleState::new(settings, admin, admin_can_overwrite);

        for (asset, strategy) in bindings {
            if state.bindings.contains_key(&asset) {
                return Err(OracleError::DuplicateAsset(asset));
            }
            strategy.validate(&state.settings)?;
            state.bindings.insert(asset, strategy);
        }

        info!(
            "Oracle router initialized: {} bindings, admin {:?}, overwrite {}",
            state.bindings.len(),
            admin,
            if admin_can_overwrite { "enabled" } else { "disabled" }
        );

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ===== Admin interface =====

    /// 바인딩 추가 또는 교체
    ///
    /// 덮어쓰기 금지 검사가 권한 검사보다 먼저 수행된다.
    pub async fn bind(
        &self,
        caller: Address,
        asset: Asset,
        strategy: ValuationStrategy,
    ) -> OracleResult<()> {
        let mut state = self.state.write().await;

        let already_bound = state.bindings.contains_key(&asset);
        state
            .access
            .ensure_rebind_allowed(asset, already_bound)
            .and_then(|_| state.access.ensure_admin(caller))
            .and_then(|_| strategy.validate(&state.settings))
            .map_err(|e| rejected("bind", e))?;

        let source = strategy.source();
        let previous = state.bindings.insert(asset, strategy);
        info!(
            "Bound {:?} to {:?}{}",
            asset,
            source,
            if previous.is_some() { " (replaced)" } else { "" }
        );
        Ok(())
    }

    /// 여러 바인딩을 한 번에 적용 (전부 성공 또는 전부 실패)
    pub async fn bind_many(
        &self,
        caller: Address,
        bindings: Vec<(Asset, ValuationStrategy)>,
    ) -> OracleResult<()> {
        let mut state = self.state.write().await;

        let mut seen = HashSet::new();
        for (asset, strategy) in &bindings {
            if !seen.insert(*asset) {
                return Err(rejected("bind_many", OracleError::DuplicateAsset(*asset)));
            }
            let already_bound = state.bindings.contains_key(asset);
            state
                .access
                .ensure_rebind_allowed(*asset, already_bound)
                .and_then(|_| strategy.validate(&state.settings))
                .map_err(|e| rejected("bind_many", e))?;
        }
        state
            .access
            .ensure_admin(caller)
            .map_err(|e| rejected("bind_many", e))?;

        let count = bindings.len();
        state.bindings.extend(bindings);
        info!("Applied {} bindings", count);
        Ok(())
    }

    /// 풀 등록 (등록 이후 구성 자산 불변)
    pub async fn register_pool(
        &self,
        caller: Address,
        pool_id: PoolId,
        constituents: Vec<Asset>,
        kind: PoolKind,
    ) -> OracleResult<PoolRegistration> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        state
            .access
            .ensure_pool_registrar(caller)
            .map_err(|e| rejected("register_pool", e))?;
        let registration = state
            .pools
            .register(pool_id, constituents, kind, now)
            .map_err(|e| rejected("register_pool", e))?
            .clone();

        info!(
            "Registered {:?} pool {:?} ({} constituents)",
            kind,
            pool_id,
            registration.constituents.len()
        );
        Ok(registration)
    }

    pub async fn add_reporter(&self, caller: Address, reporter: Address) -> OracleResult<bool> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_admin(caller)
            .map_err(|e| rejected("add_reporter", e))?;
        let added = state.access.add_reporter(reporter);
        if added {
            info!("Reporter {:?} authorized", reporter);
        }
        Ok(added)
    }

    pub async fn remove_reporter(&self, caller: Address, reporter: Address) -> OracleResult<bool> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_admin(caller)
            .map_err(|e| rejected("remove_reporter", e))?;
        let removed = state.access.remove_reporter(reporter);
        if removed {
            info!("Reporter {:?} revoked", reporter);
        }
        Ok(removed)
    }

    // ===== Feed-delivery interface =====

    /// 누적 가격 관측값 기록
    pub async fn record_observation(
        &self,
        caller: Address,
        pair: PairId,
        cumulative_price: U256,
        timestamp: u64,
    ) -> OracleResult<()> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_reporter(caller)
            .map_err(|e| rejected("record_observation", e))?;
        state
            .observations
            .record(pair, cumulative_price, timestamp)
            .map_err(|e| rejected("record_observation", e))?;
        debug!("Observation {:?} @ {}: {}", pair, timestamp, cumulative_price);
        Ok(())
    }

    /// 외부 피드 라운드 반영
    pub async fn set_feed(&self, caller: Address, feed: Address, round: FeedRound) -> OracleResult<()> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_reporter(caller)
            .map_err(|e| rejected("set_feed", e))?;
        state
            .feeds
            .set(feed, round)
            .map_err(|e| rejected("set_feed", e))?;
        debug!("Feed {:?} updated at {}", feed, round.updated_at);
        Ok(())
    }

    /// share -> underlying 환율 반영 (WAD)
    pub async fn set_exchange_rate(&self, caller: Address, asset: Asset, rate: U256) -> OracleResult<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state
            .access
            .ensure_reporter(caller)
            .map_err(|e| rejected("set_exchange_rate", e))?;
        if rate.is_zero() {
            warn!("Exchange rate for {:?} set to zero", asset);
        }
        state
            .rates
            .set(asset, rate, now)
            .map_err(|e| rejected("set_exchange_rate", e))?;
        debug!("Exchange rate {:?} = {}", asset, rate);
        Ok(())
    }

    pub async fn update_pool_state(
        &self,
        caller: Address,
        pool_id: PoolId,
        pool_state: PoolState,
    ) -> OracleResult<()> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_reporter(caller)
            .map_err(|e| rejected("update_pool_state", e))?;
        state
            .pools
            .update_state(pool_id, pool_state)
            .map_err(|e| rejected("update_pool_state", e))
    }

    /// 자산 decimals 등록 (최초 1회)
    pub async fn set_decimals(&self, caller: Address, asset: Asset, decimals: u8) -> OracleResult<bool> {
        let mut state = self.state.write().await;
        state
            .access
            .ensure_reporter(caller)
            .map_err(|e| rejected("set_decimals", e))?;
        state
            .assets
            .set_decimals(asset, decimals)
            .map_err(|e| rejected("set_decimals", e))
    }

    // ===== Queries =====

    fn resolve_snapshot(&self, state: &OracleState, asset: Asset, now: u64) -> OracleResult<PriceResult> {
        let (value, source) = Resolver::new(state, now).resolve_binding(asset)?;
        if value.is_zero() {
            warn!("{:?} priced at zero via {:?}", asset, source);
        }
        Ok(PriceResult {
            asset,
            value,
            denominated_in: state.settings.base_asset,
            source,
            resolved_at: now,
        })
    }

    /// 페어 TWAP (WAD)
    pub async fn twap(&self, pair: PairId, window_secs: u64) -> OracleResult<U256> {
        let state = self.state.read().await;
        state.observations.twap(pair, window_secs)?.to_wad()
    }

    pub async fn binding(&self, asset: Asset) -> Option<ValuationStrategy> {
        self.state.read().await.binding(asset).cloned()
    }

    pub async fn pool(&self, pool_id: PoolId) -> OracleResult<PoolRegistration> {
        self.state.read().await.pools.lookup(pool_id).cloned()
    }

    pub async fn admin_can_overwrite(&self) -> bool {
        self.state.read().await.access.admin_can_overwrite()
    }

    pub async fn settings(&self) -> RouterSettings {
        self.state.read().await.settings.clone()
    }
}

#[async_trait]
impl PriceOracle for OracleRouter {
    async fn price(&self, asset: Asset) -> OracleResult<PriceResult> {
        let state = self.state.read().await;
        self.resolve_snapshot(&state, asset, self.clock.now())
    }

    async fn underlying_price(&self, asset: Asset) -> OracleResult<U256> {
        let state = self.state.read().await;
        let price = self.resolve_snapshot(&state, asset, self.clock.now())?;
        let decimals = state.assets.decimals(asset)?;
        mul_div(price.value, WAD, pow10(decimals)?)
    }

    async fn prices_batch(&self, assets: &[Asset]) -> Vec<OracleResult<PriceResult>> {
        let state = self.state.read().await;
        let now = self.clock.now();
        assets
            .iter()
            .map(|asset| self.resolve_snapshot(&state, *asset, now))
            .collect()
    }
}
