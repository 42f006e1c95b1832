use async_trait::async_trait;
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Asset, OracleResult};
use crate::utils::math::{format_wad, wad_to_decimal};

/// 가격 소스 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    DirectFeed,
    AmmTwap,
    LpShare,
    VaultShare,
    StakingDerivative,
    Fixed,
}

/// 가격 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResult {
    /// 조회 대상 자산
    pub asset: Asset,
    /// 자산 1개당 가격 (18자리 고정소수점)
    pub value: U256,
    /// 가격 단위 자산 (base unit)
    pub denominated_in: Asset,
    /// 바인딩된 전략
    pub source: PriceSource,
    /// 조회 시각
    pub resolved_at: u64,
}

impl PriceResult {
    /// 0으로 평가된 가격인지 확인 ("가격 없음"과 구분)
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// 표시용 Decimal 변환
    pub fn to_decimal(&self) -> Option<Decimal> {
        wad_to_decimal(self.value)
    }

    pub fn display_value(&self) -> String {
        format_wad(self.value)
    }
}

/// 가격 오라클 트레이트
///
/// 대출/담보 시스템이 소비하는 유일한 조회 인터페이스.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// 자산 1개의 base unit 가격
    async fn price(&self, asset: Asset) -> OracleResult<PriceResult>;

    /// 자산 최소 단위 기준 가격 (price * 1e18 / 10^decimals)
    async fn underlying_price(&self, asset: Asset) -> OracleResult<U256>;

    /// 여러 자산을 하나의 스냅샷에서 조회
    async fn prices_batch(&self, assets: &[Asset]) -> Vec<OracleResult<PriceResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WAD;
    use ethers::types::Address;

    fn result(value: U256) -> PriceResult {
        PriceResult {
            asset: Address::repeat_byte(0x11),
            value,
            denominated_in: Address::repeat_byte(0xee),
            source: PriceSource::Fixed,
            resolved_at: 0,
        }
    }

    #[test]
    fn test_zero_price_is_distinguishable() {
        assert!(result(U256::zero()).is_zero());
        assert!(!result(WAD).is_zero());
    }

    #[test]
    fn test_display_conversions() {
        let price = result(WAD * 3 / 2);
        assert_eq!(price.to_decimal(), Some(Decimal::new(15, 1)));
        assert_eq!(price.display_value(), "1.500000000000000000");
    }

    #[test]
    fn test_source_serialization() {
        let json = serde_json::to_string(&PriceSource::StakingDerivative).unwrap();
        assert_eq!(json, "\"staking_derivative\"");
    }
}
