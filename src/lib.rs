//! Searcher SDK: bid in the Wallchain MEV auction
//!
//! This is the root crate that hosts integration tests and benchmarks.
//! For actual functionality, use the individual crates directly:
//!
//! - `searcher-core`: JSON-RPC transport, auction session, bid signing
//! - `simple-searcher`: fixed-bid example searcher binary

// Re-export for tests and benchmarks
pub use searcher_core as core;
