//! Bids submitted to the auction and the auction's verdict on them.

use super::encoding::{hex_u256, HexString};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// The searcher request signed for the capsule contract.
///
/// Field order and meaning match the `SearcherRequest` struct the capsule
/// verifies; see [`crate::signing::SEARCHER_REQUEST_TYPE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequest {
    /// Searcher contract the capsule calls.
    pub to: HexString,
    /// Gas limit for the searcher call.
    pub gas: u64,
    /// Random replay-protection nonce.
    #[serde(with = "hex_u256")]
    pub nonce: U256,
    /// Call data for the searcher contract.
    pub data: HexString,
    /// Bid amount in native token units.
    #[serde(with = "hex_u256")]
    pub bid: U256,
    /// Hash of the lot transaction this bid reacts to.
    pub user_call_hash: HexString,
    #[serde(with = "hex_u256")]
    pub max_gas_price: U256,
    /// Unix timestamp after which the bid is void.
    pub deadline: u64,
}

impl BidRequest {
    /// A fresh, unpredictable 256-bit nonce.
    pub fn random_nonce() -> U256 {
        U256::from_be_bytes(rand::random::<[u8; 32]>())
    }
}

/// A bid request together with its EIP-712 signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBid {
    pub searcher_request: BidRequest,
    /// 65-byte recoverable signature.
    pub searcher_signature: HexString,
}

/// Params of the `make_bid` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeBidParams {
    pub lot_id: String,
    pub searcher_request: BidRequest,
    pub searcher_signature: HexString,
}

impl MakeBidParams {
    pub fn new(lot_id: impl Into<String>, bid: SignedBid) -> Self {
        Self {
            lot_id: lot_id.into(),
            searcher_request: bid.searcher_request,
            searcher_signature: bid.searcher_signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verified: bool,
    #[serde(default, alias = "error_reason")]
    pub error_reason: Option<String>,
    #[serde(default, alias = "error_debug_info")]
    pub error_debug_info: Option<serde_json::Value>,
}

/// Result of `make_bid`.
///
/// No verification result means the auction accepted the bid without
/// synchronous verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResult {
    #[serde(default, alias = "verification_result")]
    pub verification_result: Option<VerificationResult>,
}

impl BidResult {
    /// `Some(false)` only when the auction explicitly rejected the bid.
    pub fn verified(&self) -> Option<bool> {
        self.verification_result.as_ref().map(|v| v.verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> BidRequest {
        BidRequest {
            to: HexString::new("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap(),
            gas: 1_000_000,
            nonce: U256::from(42u64),
            data: HexString::new("0x").unwrap(),
            bid: U256::from(10_000_000_000u64),
            user_call_hash: HexString::new(
                "0x15168fc51e3196519c6c3174da94796fe0f75403aa1011a6b0eef67fb4212087",
            )
            .unwrap(),
            max_gas_price: U256::from(5_000_000_000u64),
            deadline: 1_672_531_200,
        }
    }

    #[test]
    fn test_bid_request_wire_format() {
        let json = serde_json::to_value(sample_request()).unwrap();
        assert_eq!(json["nonce"], json!("0x2a"));
        assert_eq!(json["bid"], json!("0x2540be400"));
        assert_eq!(json["maxGasPrice"], json!("0x12a05f200"));
        assert_eq!(json["gas"], json!(1_000_000));
        assert_eq!(json["deadline"], json!(1_672_531_200u64));
        assert!(json.get("userCallHash").is_some());
    }

    #[test]
    fn test_make_bid_params_wire_format() {
        let params = MakeBidParams::new(
            "lot-7",
            SignedBid {
                searcher_request: sample_request(),
                searcher_signature: HexString::from_bytes(&[1u8; 65]),
            },
        );
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["lotId"], json!("lot-7"));
        assert!(json["searcherRequest"].is_object());
        assert!(json["searcherSignature"].as_str().unwrap().starts_with("0x01"));
    }

    #[test]
    fn test_random_nonce_differs() {
        assert_ne!(BidRequest::random_nonce(), BidRequest::random_nonce());
    }

    #[test]
    fn test_bid_result_accepts_both_casings() {
        let camel: BidResult = serde_json::from_value(json!({
            "verificationResult": { "verified": false, "errorReason": "bad signature" }
        }))
        .unwrap();
        let snake: BidResult = serde_json::from_value(json!({
            "verification_result": { "verified": false, "error_reason": "bad signature" }
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.verified(), Some(false));
    }

    #[test]
    fn test_empty_bid_result() {
        let result: BidResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(result.verified(), None);
    }
}
