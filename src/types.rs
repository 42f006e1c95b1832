use ethers::types::Address;

/// 자산 식별자 (토큰 주소)
pub type Asset = Address;

/// AMM 페어 식별자
pub type PairId = Address;

/// 풀 식별자
pub type PoolId = Address;

/// 오라클 에러 타입
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No oracle bound for asset {0:?}")]
    UnboundAsset(Asset),

    #[error("Asset {0:?} appears more than once")]
    DuplicateAsset(Asset),

    #[error("Binding for {0:?} already exists and overwriting is disabled")]
    OverwriteForbidden(Asset),

    #[error("Caller {0:?} is not authorized")]
    Unauthorized(Address),

    #[error("Recursion limit reached while resolving {asset:?} at depth {depth}")]
    RecursionLimit { asset: Asset, depth: usize },

    #[error("Feed {feed:?} is stale: age {age}s > {max_age}s")]
    StaleFeed { feed: Address, age: u64, max_age: u64 },

    #[error("No feed value for {0:?}")]
    NoFeed(Address),

    #[error("Not enough observations for pair {pair:?} over a {window}s window")]
    InsufficientObservations { pair: PairId, window: u64 },

    #[error("Timestamp {new} is not after {last} for {key:?}")]
    NonMonotonicTimestamp { key: Address, last: u64, new: u64 },

    #[error("Exchange rate unavailable for {0:?}")]
    ExchangeRateUnavailable(Asset),

    #[error("Pool {0:?} is not registered")]
    UnregisteredPool(PoolId),

    #[error("Pool {0:?} is already registered")]
    AlreadyRegistered(PoolId),

    #[error("Pool {0:?} has no constituents")]
    EmptyPool(PoolId),

    #[error("Pool {pool:?} has {count} constituents (max {max})")]
    TooManyConstituents { pool: PoolId, count: usize, max: usize },

    #[error("Pool {0:?} has no reported state")]
    PoolStateUnavailable(PoolId),

    #[error("Decimals unknown for {0:?}")]
    UnknownDecimals(Asset),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Arithmetic overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivisionByZero,
}

/// Result type alias
pub type OracleResult<T> = Result<T, OracleError>;

impl OracleError {
    pub fn invalid(message: impl Into<String>) -> Self {
        OracleError::InvalidParameter(message.into())
    }
}
