//! Domain types
//!
//! String-facing wrappers for the chain values that cross the RPC boundary.
//! Each parses leniently, serializes canonically, and reports parse failures
//! as `RegistryError::MalformedInput`.

pub mod bytes32;
pub mod eth_address;
pub mod wei;

pub use bytes32::DomainBytes32;
pub use eth_address::DomainEthAddress;
pub use wei::DomainWei;
