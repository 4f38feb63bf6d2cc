//! EIP-712 signing of searcher requests.
//!
//! The capsule contract recovers the searcher's address from a typed-data
//! signature over the bid, so every hash here mirrors the contract exactly.
//!
//! ```text
//! Opportunity ── user_tx_hash ──► BidRequest.userCallHash
//!                                      │
//! DomainInfo ── separator ──┐          │ struct_hash
//!                           ▼          ▼
//!               keccak256(0x1901 ∥ domain ∥ struct)
//!                           │
//!                 BidSigner ▼ secp256k1
//!                       SignedBid
//! ```

pub mod domain;
pub mod signer;
pub mod typed_data;

pub use domain::{DomainInfo, BSC_CHAIN_ID, CAPSULE_NAME, CAPSULE_VERSION, DOMAIN_TYPE_SCHEMA};
pub use signer::BidSigner;
pub use typed_data::{
    struct_hash, typed_data_hash, user_call_hash, user_tx_hash, SEARCHER_REQUEST_TYPE,
};
