use std::collections::{HashMap, HashSet};

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CONSTANT_PRODUCT_CONSTITUENTS, TRICRYPTO_CONSTITUENTS};
use crate::types::{Asset, OracleError, OracleResult, PoolId};

/// 풀 가치 계산 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    /// Σ reserve_i * price_i / supply
    Reserves,
    /// 2 * sqrt(r0 * r1) * sqrt(p0 * p1) / supply (조작 방지 fair-reserves)
    ConstantProduct,
    /// virtual_price * min(price_i)
    StableSwap,
    /// 3 * virtual_price * geomean(price_i)
    #[serde(rename = "tricrypto")]
    TriCrypto,
}

impl PoolKind {
    /// 고정된 구성 자산 수가 필요한 경우
    pub fn required_constituents(&self) -> Option<usize> {
        match self {
            PoolKind::ConstantProduct => Some(CONSTANT_PRODUCT_CONSTITUENTS),
            PoolKind::TriCrypto => Some(TRICRYPTO_CONSTITUENTS),
            PoolKind::Reserves | PoolKind::StableSwap => None,
        }
    }

    pub fn needs_virtual_price(&self) -> bool {
        matches!(self, PoolKind::StableSwap | PoolKind::TriCrypto)
    }
}

/// 풀 등록 정보 (등록 후 불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistration {
    pub pool_id: PoolId,
    /// 구성 자산 (순서 고정: reserves 인덱스와 일치)
    pub constituents: Vec<Asset>,
    pub kind: PoolKind,
    pub registered_at: u64,
}

/// 외부에서 전달되는 풀 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// 구성 자산별 reserve (각 자산의 raw 단위)
    pub reserves: Vec<U256>,
    /// LP 토큰 총 공급량 (LP 토큰 raw 단위)
    pub total_supply: U256,
    /// StableSwap/TriCrypto 가상 가격 (WAD)
    pub virtual_price: Option<U256>,
    pub updated_at: u64,
}

/// 풀 메타데이터 레지스트리
#[derive(Debug, Clone)]
pub struct PoolRegistry {
    pools: HashMap<PoolId, PoolRegistration>,
    states: HashMap<PoolId, PoolState>,
    max_constituents: usize,
}

impl PoolRegistry {
    pub fn new(max_constituents: usize) -> Self {
        Self {
            pools: HashMap::new(),
            states: HashMap::new(),
            max_constituents,
        }
    }

    /// 풀 등록
    ///
    /// 중복 등록은 no-op이 아니라 `AlreadyRegistered`로 거절한다.
    pub fn register(
        &mut self,
        pool_id: PoolId,
        constituents: Vec<Asset>,
        kind: PoolKind,
        registered_at: u64,
    ) -> OracleResult<&PoolRegistration> {
        if self.pools.contains_key(&pool_id) {
            return Err(OracleError::AlreadyRegistered(pool_id));
        }
        if constituents.is_empty() {
            return Err(OracleError::EmptyPool(pool_id));
        }
        if constituents.len() > self.max_constituents {
            return Err(OracleError::TooManyConstituents {
                pool: pool_id,
                count: constituents.len(),
                max: self.max_constituents,
            });
        }
        if let Some(required) = kind.required_constituents() {
            if constituents.len() != required {
                return Err(OracleError::invalid(format!(
                    "{:?} pool {:?} needs exactly {} constituents, got {}",
                    kind,
                    pool_id,
                    required,
                    constituents.len()
                )));
            }
        }

        let mut seen = HashSet::new();
        for asset in &constituents {
            if !seen.insert(*asset) {
                return Err(OracleError::DuplicateAsset(*asset));
            }
            if *asset == pool_id {
                return Err(OracleError::invalid(format!(
                    "pool {:?} lists itself as a constituent",
                    pool_id
                )));
            }
        }

        debug!(
            "Registering {:?} pool {:?} with {} constituents",
            kind,
            pool_id,
            constituents.len()
        );

        let registration = PoolRegistration {
            pool_id,
            constituents,
            kind,
            registered_at,
        };
        Ok(self.pools.entry(pool_id).or_insert(registration))
    }

    pub fn lookup(&self, pool_id: PoolId) -> OracleResult<&PoolRegistration> {
        self.pools
            .get(&pool_id)
            .ok_or(OracleError::UnregisteredPool(pool_id))
    }

    pub fn is_registered(&self, pool_id: PoolId) -> bool {
        self.pools.contains_key(&pool_id)
    }

    /// 풀 상태 갱신 (reserves 길이는 구성 자산 수와 같아야 함)
    pub fn update_state(&mut self, pool_id: PoolId, state: PoolState) -> OracleResult<()> {
        let registration = self.lookup(pool_id)?;

        if state.reserves.len() != registration.constituents.len() {
            return Err(OracleError::invalid(format!(
                "pool {:?} has {} constituents but {} reserves were reported",
                pool_id,
                registration.constituents.len(),
                state.reserves.len()
            )));
        }
        if registration.kind.needs_virtual_price() && state.virtual_price.is_none() {
            return Err(OracleError::invalid(format!(
                "{:?} pool {:?} requires a virtual price",
                registration.kind, pool_id
            )));
        }
        if let Some(previous) = self.states.get(&pool_id) {
            if state.updated_at < previous.updated_at {
                return Err(OracleError::NonMonotonicTimestamp {
                    key: pool_id,
                    last: previous.updated_at,
                    new: state.updated_at,
                });
            }
        }

        self.states.insert(pool_id, state);
        Ok(())
    }

    pub fn state(&self, pool_id: PoolId) -> OracleResult<&PoolState> {
        self.lookup(pool_id)?;
        self.states
            .get(&pool_id)
            .ok_or(OracleError::PoolStateUnavailable(pool_id))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &PoolRegistration> {
        self.pools.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn state(reserves: Vec<u64>, supply: u64, updated_at: u64) -> PoolState {
        PoolState {
            reserves: reserves.into_iter().map(U256::from).collect(),
            total_supply: U256::from(supply),
            virtual_price: None,
            updated_at,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = PoolRegistry::new(4);
        let pool = addr(0xaa);

        let registration = registry
            .register(pool, vec![addr(1), addr(2)], PoolKind::Reserves, 10)
            .unwrap();
        assert_eq!(registration.constituents, vec![addr(1), addr(2)]);
        assert_eq!(registration.registered_at, 10);

        let looked_up = registry.lookup(pool).unwrap();
        assert_eq!(looked_up.kind, PoolKind::Reserves);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup(addr(0xbb)),
            Err(OracleError::UnregisteredPool(addr(0xbb)))
        );
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = PoolRegistry::new(4);
        let pool = addr(0xaa);
        registry
            .register(pool, vec![addr(1), addr(2)], PoolKind::Reserves, 10)
            .unwrap();

        let err = registry
            .register(pool, vec![addr(3), addr(4)], PoolKind::Reserves, 20)
            .unwrap_err();
        assert_eq!(err, OracleError::AlreadyRegistered(pool));
        // first ordering is untouched
        assert_eq!(registry.lookup(pool).unwrap().constituents, vec![addr(1), addr(2)]);
    }

    #[test]
    fn test_constituent_bounds() {
        let mut registry = PoolRegistry::new(4);
        assert_eq!(
            registry.register(addr(0xaa), vec![], PoolKind::Reserves, 0),
            Err(OracleError::EmptyPool(addr(0xaa)))
        );
        assert_eq!(
            registry.register(
                addr(0xab),
                (1..=5).map(addr).collect(),
                PoolKind::Reserves,
                0
            ),
            Err(OracleError::TooManyConstituents { pool: addr(0xab), count: 5, max: 4 })
        );
        assert!(registry
            .register(addr(0xac), vec![addr(1), addr(2)], PoolKind::TriCrypto, 0)
            .is_err());
        assert!(registry
            .register(addr(0xad), vec![addr(1), addr(2), addr(3)], PoolKind::ConstantProduct, 0)
            .is_err());
        assert_eq!(
            registry.register(addr(0xae), vec![addr(1), addr(1)], PoolKind::Reserves, 0),
            Err(OracleError::DuplicateAsset(addr(1)))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_state_updates() {
        let mut registry = PoolRegistry::new(4);
        let pool = addr(0xaa);
        registry
            .register(pool, vec![addr(1), addr(2)], PoolKind::Reserves, 0)
            .unwrap();

        assert_eq!(registry.state(pool), Err(OracleError::PoolStateUnavailable(pool)));
        assert!(registry.update_state(pool, state(vec![1], 1, 5)).is_err());

        registry.update_state(pool, state(vec![1, 2], 3, 5)).unwrap();
        assert_eq!(registry.state(pool).unwrap().total_supply, U256::from(3));

        let err = registry.update_state(pool, state(vec![1, 2], 3, 4)).unwrap_err();
        assert_eq!(err, OracleError::NonMonotonicTimestamp { key: pool, last: 5, new: 4 });

        assert_eq!(
            registry.update_state(addr(0xbb), state(vec![1], 1, 1)),
            Err(OracleError::UnregisteredPool(addr(0xbb)))
        );
    }

    #[test]
    fn test_stable_pools_require_virtual_price() {
        let mut registry = PoolRegistry::new(4);
        let pool = addr(0xaa);
        registry
            .register(pool, vec![addr(1), addr(2), addr(3)], PoolKind::StableSwap, 0)
            .unwrap();

        assert!(registry.update_state(pool, state(vec![1, 1, 1], 3, 1)).is_err());

        let mut with_vp = state(vec![1, 1, 1], 3, 1);
        with_vp.virtual_price = Some(U256::exp10(18));
        assert!(registry.update_state(pool, with_vp).is_ok());
    }
}
