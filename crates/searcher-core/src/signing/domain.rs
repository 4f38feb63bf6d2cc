//! EIP-712 domain of the searcher execution capsule.
//!
//! The capsule contract verifies every searcher request against this domain,
//! so each field is hashed exactly as the contract does it.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;

/// BNB Smart Chain, the default auction chain.
pub const BSC_CHAIN_ID: u64 = 0x38;

/// Domain type schema used by the capsule.
pub const DOMAIN_TYPE_SCHEMA: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Capsule domain name.
pub const CAPSULE_NAME: &str = "SearcherExecutionCapsule";

/// Capsule domain version.
pub const CAPSULE_VERSION: &str = "1";

/// Signature domain, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub type_schema: String,
    pub name: String,
    pub version: String,
    pub chain_id: U256,
    /// Capsule contract address.
    pub verifying_contract: Address,
}

impl DomainInfo {
    /// Capsule domain on the given chain.
    pub fn capsule(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            type_schema: DOMAIN_TYPE_SCHEMA.to_string(),
            name: CAPSULE_NAME.to_string(),
            version: CAPSULE_VERSION.to_string(),
            chain_id: U256::from(chain_id),
            verifying_contract,
        }
    }

    /// Compute the EIP-712 domain separator hash.
    pub fn separator(&self) -> B256 {
        let type_hash = keccak256(self.type_schema.as_bytes());
        let name_hash = keccak256(self.name.as_bytes());
        let version_hash = keccak256(self.version.as_bytes());

        // encodeData pads the address to a full word
        let contract_padded = B256::left_padding_from(self.verifying_contract.as_slice());

        let encoded = (
            type_hash,
            name_hash,
            version_hash,
            self.chain_id,
            contract_padded,
        )
            .abi_encode_packed();

        keccak256(&encoded)
    }
}
