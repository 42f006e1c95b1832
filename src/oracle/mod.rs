pub mod access;
pub mod assets;
pub mod feeds;
pub mod observation;
pub mod pool_registry;
pub mod price_oracle;
pub mod router;
pub mod state;
pub mod strategy;

pub use access::AccessControl;
pub use assets::AssetRegistry;
pub use feeds::{FeedRound, FeedStore, RateEntry, RateStore};
pub use observation::{Observation, ObservationBuffer, TwapQuote};
pub use pool_registry::{PoolKind, PoolRegistration, PoolRegistry, PoolState};
pub use price_oracle::{PriceOracle, PriceResult, PriceSource};
pub use router::OracleRouter;
pub use state::{OracleState, RouterSettings};
pub use strategy::{FeedQuote, PriceResolver, ValuationStrategy};
