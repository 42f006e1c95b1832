use std::collections::HashMap;

use crate::constants::MAX_FEED_DECIMALS;
use crate::types::{Asset, OracleError, OracleResult};

/// 자산 decimals 캐시
///
/// 한 번 관측된 decimals는 바뀌지 않는다.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    decimals: HashMap<Asset, u8>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// decimals 등록
    ///
    /// 같은 값 재등록은 no-op(false), 다른 값이면 에러.
    pub fn set_decimals(&mut self, asset: Asset, decimals: u8) -> OracleResult<bool> {
        if decimals > MAX_FEED_DECIMALS {
            return Err(OracleError::invalid(format!(
                "decimals {} for {:?} exceeds {}",
                decimals, asset, MAX_FEED_DECIMALS
            )));
        }

        match self.decimals.get(&asset) {
            Some(existing) if *existing == decimals => Ok(false),
            Some(existing) => Err(OracleError::invalid(format!(
                "decimals for {:?} already cached as {}, got {}",
                asset, existing, decimals
            ))),
            None => {
                self.decimals.insert(asset, decimals);
                Ok(true)
            }
        }
    }

    pub fn decimals(&self, asset: Asset) -> OracleResult<u8> {
        self.decimals
            .get(&asset)
            .copied()
            .ok_or(OracleError::UnknownDecimals(asset))
    }

    pub fn len(&self) -> usize {
        self.decimals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decimals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn test_decimals_are_immutable_once_cached() {
        let usdc = Address::repeat_byte(0x06);
        let mut registry = AssetRegistry::new();

        assert_eq!(registry.decimals(usdc), Err(OracleError::UnknownDecimals(usdc)));
        assert!(registry.set_decimals(usdc, 6).unwrap());
        assert!(!registry.set_decimals(usdc, 6).unwrap());
        assert!(registry.set_decimals(usdc, 18).is_err());
        assert_eq!(registry.decimals(usdc).unwrap(), 6);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejects_absurd_decimals() {
        let mut registry = AssetRegistry::new();
        assert!(registry.set_decimals(Address::repeat_byte(1), 77).is_err());
        assert!(registry.is_empty());
    }
}
