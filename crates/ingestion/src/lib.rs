//! Data ingestion and normalization for the pairs analytics system.
//!
//! This crate handles:
//! - Live trade subscriptions, one independent task per symbol
//! - Trade payload parsing
//! - The persistent tick store
//! - Time-bucket resampling
//! - Pair alignment

pub mod aligner;
pub mod feed;
pub mod ingestor;
pub mod parser;
pub mod resampler;
pub mod store;

pub use aligner::align;
pub use feed::{install_crypto_provider, BinanceTradeFeed, FeedStream, MarketFeed};
pub use ingestor::{IngestStats, IngestorHandle, StreamIngestor};
pub use parser::parse_trade;
pub use resampler::Resampler;
pub use store::{MemoryTickStore, SqliteTickStore, TickSink, TickSnapshot, TickStore};
