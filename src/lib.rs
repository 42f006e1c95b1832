// Price oracle router library

pub mod config;
pub mod oracle;
pub mod utils;

// Core types
pub mod types;
pub mod constants;

// Re-exports for convenience
pub use config::Config;
pub use oracle::{OracleRouter, PriceOracle, PriceResult, ValuationStrategy};
pub use types::{Asset, OracleError, OracleResult};
