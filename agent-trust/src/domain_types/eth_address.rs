//! DomainEthAddress - agent address as it appears on the wire
//!
//! Accepts any hex case with or without `0x`, always renders EIP-55 checksummed.

use ethers::types::Address;
use ethers::utils::to_checksum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::eip8004::RegistryError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct DomainEthAddress(pub Address);

impl DomainEthAddress {
    /// EIP-55 mixed-case form
    pub fn checksummed(&self) -> String {
        to_checksum(&self.0, None)
    }
}

impl FromStr for DomainEthAddress {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_part.len() != 40 {
            return Err(RegistryError::malformed(format!(
                "address '{}' must be 20 bytes of hex",
                s
            )));
        }
        let bytes = hex::decode(hex_part)
            .map_err(|e| RegistryError::malformed(format!("address '{}': {}", s, e)))?;
        Ok(Self(Address::from_slice(&bytes)))
    }
}

impl From<Address> for DomainEthAddress {
    fn from(input: Address) -> Self {
        Self(input)
    }
}

impl From<DomainEthAddress> for Address {
    fn from(input: DomainEthAddress) -> Self {
        input.0
    }
}

impl std::ops::Deref for DomainEthAddress {
    type Target = Address;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DomainEthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksummed())
    }
}

impl Serialize for DomainEthAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.checksummed())
    }
}

impl<'de> Deserialize<'de> for DomainEthAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
