//! Auction lots streamed to searchers.

use super::encoding::{hex_u256, HexString};
use crate::Result;
use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

/// The user transaction a lot was opened for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: HexString,
    pub to: HexString,
    #[serde(with = "hex_u256")]
    pub value: U256,
    pub input: HexString,
}

impl Transaction {
    /// Hash binding a bid to this transaction; see [`crate::signing::user_tx_hash`].
    pub fn user_call_hash(&self) -> Result<B256> {
        crate::signing::user_call_hash(self)
    }
}

/// An event log emitted by the user transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxLog {
    pub address: HexString,
    pub topics: Vec<HexString>,
    pub data: HexString,
}

/// A lot open for bidding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Session-scoped lot identifier, echoed back in `make_bid`.
    pub lot_id: String,
    pub txn: Transaction,
    pub logs: Vec<TxLog>,
    /// Earliest deadline the auction accepts for bids on this lot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_deadline: Option<u64>,
    /// Swap metadata attached by the auction, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_info: Option<serde_json::Value>,
    /// Trace propagation carrier, if the auction traces this lot.
    #[serde(
        rename = "__tracing_context__",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trace_context: Option<serde_json::Value>,
}

impl Opportunity {
    pub fn user_call_hash(&self) -> Result<B256> {
        self.txn.user_call_hash()
    }
}
