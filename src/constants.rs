use ethers::types::{Address, H160, U256};

// Fixed-point scale
pub const WAD_DECIMALS: u8 = 18;
pub const WAD: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

// 피드 라운드가 가질 수 있는 최대 소수 자릿수
pub const MAX_FEED_DECIMALS: u8 = 36;

// Router defaults
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 8;
pub const DEFAULT_MAX_FEED_AGE_SECS: u64 = 86_400; // 24 hours

// Pool registry bounds
pub const DEFAULT_MAX_POOL_CONSTITUENTS: usize = 8;
pub const CONSTANT_PRODUCT_CONSTITUENTS: usize = 2;
pub const TRICRYPTO_CONSTITUENTS: usize = 3;

// Observation retention
pub const DEFAULT_OBSERVATION_RETENTION_SECS: u64 = 86_400;
pub const DEFAULT_MAX_OBSERVATIONS_PER_PAIR: usize = 1_440;
pub const MIN_TWAP_OBSERVATIONS: usize = 2;

// Common token addresses (mainnet)
/// 메인넷 WETH 주소 (기본 base unit)
pub const WETH: Address = H160([
    0xc0, 0x2a, 0xaa, 0x39, 0xb2, 0x23, 0xfe, 0x8d, 0x0a, 0x0e, 0x5c, 0x4f, 0x27, 0xea, 0xd9, 0x08,
    0x3c, 0x75, 0x6c, 0xc2,
]);

/// 네이티브 ETH 센티넬 주소 (0xEeee...EEeE)
pub const NATIVE_ETH: Address = H160([0xee; 20]);
