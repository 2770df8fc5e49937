//! EIP-8004 Trustless Agents registries
//!
//! In-process implementation of the three EIP-8004 registries:
//! - Identity Registry: sequential agent IDs, unique domains and addresses
//! - Reputation Registry: feedback authorizations between agent pairs
//! - Validation Registry: independent work verification with expiry
//!
//! Reputation and Validation only ever read from Identity; nothing writes
//! across registry boundaries.

pub mod types;
pub mod error;
pub mod config;
pub mod clock;
pub mod encoding;
pub mod derivation;
pub mod admission;
pub mod events;
pub mod identity;
pub mod reputation;
pub mod validation;
pub mod deployment;


pub use types::*;
pub use error::{AgentKey, ErrorCategory, RegistryError, RegistryResult};
pub use config::{RateLimitConfig, RegistryConfig};
pub use clock::{BlockClock, ManualClock};
pub use derivation::{AuthIdDeriver, AuthSeed, CounterDeriver, SaltedDeriver};
pub use admission::{AdmissionPolicy, FeePolicy, RateLimitPolicy};
pub use events::{EventJournal, EventSink, JournalEntry, RegistryEvent};
pub use identity::IdentityRegistry;
pub use reputation::ReputationRegistry;
pub use validation::ValidationRegistry;
pub use deployment::Deployment;
