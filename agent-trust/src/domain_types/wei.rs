//! DomainWei - value attached to a call, in wei
//!
//! Accepts JSON integers, decimal strings and `0x` hex strings. Bare digit
//! strings are always decimal: `U256::from_str` would read "1000" as hex.

use ethers::types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::eip8004::RegistryError;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct DomainWei(pub U256);

impl FromStr for DomainWei {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim();
        let parsed = match cleaned
            .strip_prefix("0x")
            .or_else(|| cleaned.strip_prefix("0X"))
        {
            Some(hex_part) => U256::from_str_radix(hex_part, 16)
                .map_err(|e| format!("bad hex wei value '{}': {}", s, e)),
            None => U256::from_dec_str(cleaned)
                .map_err(|e| format!("bad decimal wei value '{}': {}", s, e)),
        };
        parsed.map(Self).map_err(RegistryError::MalformedInput)
    }
}

impl Serialize for DomainWei {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Decimal string, U256 overflows JSON numbers
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for DomainWei {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DomainWeiVisitor;

        impl<'de> Visitor<'de> for DomainWeiVisitor {
            type Value = DomainWei;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a wei amount as an integer, decimal string or 0x hex string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map_err(de::Error::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(DomainWei(U256::from(value)))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(value)
                    .map(|v| DomainWei(U256::from(v)))
                    .map_err(|_| de::Error::custom("wei amount cannot be negative"))
            }
        }

        deserializer.deserialize_any(DomainWeiVisitor)
    }
}

impl From<U256> for DomainWei {
    fn from(input: U256) -> Self {
        Self(input)
    }
}

impl From<DomainWei> for U256 {
    fn from(input: DomainWei) -> Self {
        input.0
    }
}

impl std::ops::Deref for DomainWei {
    type Target = U256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DomainWei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
