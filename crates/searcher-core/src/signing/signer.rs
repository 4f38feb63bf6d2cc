//! Searcher request signing.
//!
//! Produces the recoverable ECDSA signature the capsule contract checks
//! before executing a searcher call.

use alloy_primitives::{Address, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;

use super::domain::DomainInfo;
use super::typed_data::{struct_hash, typed_data_hash};
use crate::types::{BidRequest, HexString, SignedBid};
use crate::{Error, Result};

/// Signs searcher requests for one capsule domain.
///
/// Signing is pure: the same request, domain and key always produce the same
/// signature.
#[derive(Clone)]
pub struct BidSigner {
    signer: PrivateKeySigner,
    domain: DomainInfo,
}

impl BidSigner {
    pub fn new(signer: PrivateKeySigner, domain: DomainInfo) -> Self {
        Self { signer, domain }
    }

    /// Create a signer from a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str, domain: DomainInfo) -> Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");
        let signer = PrivateKeySigner::from_str(key_clean).map_err(|e| Error::Signing {
            message: format!("Invalid private key format: {e}"),
        })?;
        Ok(Self::new(signer, domain))
    }

    /// Address the capsule recovers from our signatures.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn domain(&self) -> &DomainInfo {
        &self.domain
    }

    /// EIP-712 digest of a request under this signer's domain.
    pub fn digest(&self, request: &BidRequest) -> Result<B256> {
        Ok(typed_data_hash(self.domain.separator(), struct_hash(request)?))
    }

    /// Sign a request and return the 65-byte signature as `0x` hex.
    pub fn sign_request(&self, request: &BidRequest) -> Result<HexString> {
        let signature = self.sign_digest(&self.digest(request)?)?;
        Ok(HexString::from_bytes(&signature.as_bytes()))
    }

    /// Sign a request, pairing it with its signature.
    pub fn sign(&self, request: BidRequest) -> Result<SignedBid> {
        let searcher_signature = self.sign_request(&request)?;
        Ok(SignedBid {
            searcher_request: request,
            searcher_signature,
        })
    }

    fn sign_digest(&self, digest: &B256) -> Result<Signature> {
        self.signer.sign_hash_sync(digest).map_err(|e| Error::Signing {
            message: format!("Failed to sign searcher request: {e}"),
        })
    }
}

impl std::fmt::Debug for BidSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BidSigner")
            .field("address", &format!("{:?}", self.address()))
            .field("chain_id", &self.domain.chain_id)
            .field("verifying_contract", &self.domain.verifying_contract)
            .finish()
    }
}
