//! Core domain types for the auction protocol.

pub mod bid;
pub mod encoding;
pub mod opportunity;

pub use bid::*;
pub use encoding::{encode_hex_int, hex_u256, parse_hex_int, HexString};
pub use opportunity::*;
