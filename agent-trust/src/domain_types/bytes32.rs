//! DomainBytes32 - 32-byte hashes and tokens (data hashes, feedback auth IDs)

use ethers::types::H256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::eip8004::RegistryError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct DomainBytes32(pub H256);

impl DomainBytes32 {
    /// Lowercase `0x`-prefixed hex, 66 characters
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl FromStr for DomainBytes32 {
    type Err = RegistryError;

    /// Short hex is left-padded, the way `bytes32(uint256(x))` reads
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err(RegistryError::malformed(format!(
                "'{}' is not a 32-byte hex value",
                s
            )));
        }
        let padded = format!("{:0>64}", hex_part);
        let bytes = hex::decode(&padded)
            .map_err(|e| RegistryError::malformed(format!("'{}': {}", s, e)))?;
        Ok(Self(H256::from_slice(&bytes)))
    }
}

impl From<H256> for DomainBytes32 {
    fn from(input: H256) -> Self {
        Self(input)
    }
}

impl From<DomainBytes32> for H256 {
    fn from(input: DomainBytes32) -> Self {
        input.0
    }
}

impl std::ops::Deref for DomainBytes32 {
    type Target = H256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DomainBytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for DomainBytes32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for DomainBytes32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
