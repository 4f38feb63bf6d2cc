//! Hashing of searcher requests as the capsule contract computes it.

use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::SolValue;

use crate::types::{BidRequest, HexString, Opportunity, Transaction};
use crate::Result;

/// Struct signature of `SearcherRequest` as deployed in the capsule.
///
/// The space before `uint256 deadline` is part of the on-chain type hash and
/// must not be normalised away.
pub const SEARCHER_REQUEST_TYPE: &str =
    "SearcherRequest(address to,uint256 gas,uint256 nonce,bytes data,uint256 bid,bytes32 userCallHash,uint256 maxGasPrice, uint256 deadline)";

/// `keccak256(abi.encodePacked(to, input, value))` of a lot transaction.
pub fn user_call_hash(txn: &Transaction) -> Result<B256> {
    let to = txn.to.to_address()?;
    let packed = [
        to.as_slice(),
        txn.input.as_bytes(),
        &txn.value.to_be_bytes::<32>(),
    ]
    .concat();
    Ok(keccak256(packed))
}

/// The `userCallHash` a bid on this lot must carry, as hex.
pub fn user_tx_hash(opportunity: &Opportunity) -> Result<HexString> {
    user_call_hash(&opportunity.txn).map(HexString::from)
}

/// Compute the EIP-712 struct hash of a searcher request.
pub fn struct_hash(request: &BidRequest) -> Result<B256> {
    let type_hash = keccak256(SEARCHER_REQUEST_TYPE.as_bytes());

    // encodeData: every member is one 32-byte word, dynamic bytes are hashed
    let to_padded = B256::left_padding_from(request.to.to_address()?.as_slice());
    let data_hash = keccak256(request.data.as_bytes());
    let user_call_hash = request.user_call_hash.to_b256()?;

    let encoded = (
        type_hash,
        to_padded,
        U256::from(request.gas),
        request.nonce,
        data_hash,
        request.bid,
        user_call_hash,
        request.max_gas_price,
        U256::from(request.deadline),
    )
        .abi_encode_packed();

    Ok(keccak256(&encoded))
}

/// Compute the EIP-712 digest: `keccak256("\x19\x01" ++ domainSeparator ++ structHash)`.
pub fn typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    let prefix = [0x19u8, 0x01];
    let data = [&prefix[..], domain_separator.as_slice(), struct_hash.as_slice()].concat();
    keccak256(&data)
}
