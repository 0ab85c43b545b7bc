//! Historical price data: provider trait, upstream adapters, and caching

pub mod cache;
pub mod circuit_breaker;
pub mod provider;
pub mod read_through;
pub mod synthetic;
pub mod yahoo;

pub use cache::{ParquetCache, SnapshotMeta};
pub use circuit_breaker::CircuitBreaker;
pub use provider::{clean_series, DataError, DataSource, FetchResult, PriceProvider};
pub use read_through::{CacheStats, ReadThroughProvider};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;
