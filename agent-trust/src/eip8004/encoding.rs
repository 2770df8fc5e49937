//! ABI word encoding used to build hash preimages

use ethers::types::{Address, H256};
use ethers::utils::keccak256 as ethers_keccak256;

/// Encode a uint256 value as 32 bytes
pub fn encode_uint256(value: u64) -> [u8; 32] {
    let mut encoded = [0u8; 32];
    encoded[24..32].copy_from_slice(&value.to_be_bytes());
    encoded
}

/// Encode an address (20 bytes) as 32 bytes (left-padded)
pub fn encode_address(address: &Address) -> [u8; 32] {
    let mut encoded = [0u8; 32];
    encoded[12..32].copy_from_slice(address.as_bytes());
    encoded
}

/// Incremental `abi.encode` of static words
#[derive(Debug, Default, Clone)]
pub struct WordEncoder {
    buf: Vec<u8>,
}

impl WordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uint(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&encode_uint256(value));
        self
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.buf.extend_from_slice(&encode_address(address));
        self
    }

    pub fn bytes32(mut self, data: &[u8; 32]) -> Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn keccak256(&self) -> H256 {
        keccak256(&self.buf)
    }
}

/// Compute keccak256 hash
pub fn keccak256(data: &[u8]) -> H256 {
    H256::from(ethers_keccak256(data))
}
