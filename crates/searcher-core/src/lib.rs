//! Searcher SDK core
//!
//! Wallchain auction client: JSON-RPC transport over websocket, auction
//! session with liveness probing, and EIP-712 signing of searcher bids.

pub mod api;
pub mod config;
pub mod error;
pub mod rpc;
pub mod searcher;
pub mod signing;
pub mod trace_context;
pub mod types;

pub use api::{AuctionClient, BidSubmitter};
pub use config::{AuctionConfig, ReconnectPolicy, SearcherConfig};
pub use error::{Error, Result};
pub use searcher::{Bidder, LoggingResultSink, ResultSink};
