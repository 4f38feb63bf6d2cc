//! Fixed-bid strategy: every lot gets the same bid on the same contract.

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use searcher_core::signing::user_tx_hash;
use searcher_core::types::{BidRequest, HexString, Opportunity};
use searcher_core::Bidder;

/// Selector of the searcher contract's bid entry point.
pub const BID_SELECTOR: [u8; 4] = [0xfe, 0x0d, 0x94, 0xc1];
/// 10^10 wei.
pub const BID_WEI: u64 = 10_000_000_000;
pub const GAS_LIMIT: u64 = 1_000_000;
/// 5 gwei.
pub const MAX_GAS_PRICE_WEI: u64 = 5_000_000_000;
/// Bids expire this long after they are made.
pub const DEADLINE_SECS: u64 = 30;

pub struct SimpleSearcher {
    contract: HexString,
    bid: U256,
}

impl SimpleSearcher {
    pub fn new(contract_address: &str) -> searcher_core::Result<Self> {
        let contract = HexString::new(contract_address)?;
        contract.to_address()?;
        Ok(Self {
            contract,
            bid: U256::from(BID_WEI),
        })
    }

    /// Call data for the searcher contract: selector followed by the bid word.
    pub fn call_data(&self) -> HexString {
        HexString::from_bytes(&[&BID_SELECTOR[..], &self.bid.to_be_bytes::<32>()].concat())
    }

    pub fn bid_for(&self, lot: &Opportunity, now: u64) -> searcher_core::Result<BidRequest> {
        Ok(BidRequest {
            to: self.contract.clone(),
            gas: GAS_LIMIT,
            nonce: BidRequest::random_nonce(),
            data: self.call_data(),
            bid: self.bid,
            user_call_hash: user_tx_hash(lot)?,
            max_gas_price: U256::from(MAX_GAS_PRICE_WEI),
            deadline: now + DEADLINE_SECS,
        })
    }
}

#[async_trait]
impl Bidder for SimpleSearcher {
    async fn make_bid_request(
        &self,
        opportunity: &Opportunity,
    ) -> anyhow::Result<Option<BidRequest>> {
        let now = u64::try_from(Utc::now().timestamp())?;
        Ok(Some(self.bid_for(opportunity, now)?))
    }
}
