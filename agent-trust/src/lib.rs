//! Trust registries for autonomous agents.
//!
//! Three registries share one host context (caller, attached value, block height):
//! - Identity Registry: agent IDs bound to unique domains and addresses
//! - Reputation Registry: server-granted feedback authorizations
//! - Validation Registry: single-shot, expiring validation requests
//!
//! Every mutating call is all-or-nothing and emits a `RegistryEvent`
//! for off-chain indexers.

pub mod domain_types;
pub mod eip8004;

pub use eip8004::*;
