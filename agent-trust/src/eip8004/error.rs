//! Registry errors
//!
//! Every failure is local and caller-correctable. An operation that returns
//! an error has left registry state untouched.

use ethers::types::{Address, H256, U256};
use std::fmt;
use strum::{AsRefStr, Display};

use super::types::{AgentId, ResponseScheme};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// The key an agent lookup was attempted with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentKey {
    Id(AgentId),
    Domain(String),
    Address(Address),
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKey::Id(id) => write!(f, "id {}", id),
            AgentKey::Domain(domain) => write!(f, "domain '{}'", domain),
            AgentKey::Address(addr) => write!(f, "address {:?}", addr),
        }
    }
}

/// Coarse error families, used for logging and HTTP status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// Domain, address or data hash already taken
    Uniqueness,
    /// Caller does not control the required address
    Authorization,
    /// Unknown agent or data hash
    NotFound,
    /// Out-of-range or malformed input
    Range,
    /// Registration fee or other admission control refused the call
    Admission,
    /// Duplicate or late response
    Temporal,
    /// Registry constructed without its Identity Registry
    Wiring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DomainAlreadyRegistered(String),
    AddressAlreadyRegistered(Address),
    ValidationRequestExists(H256),

    UnauthorizedRegistration { caller: Address, address: Address },
    UnauthorizedUpdate { agent_id: AgentId, caller: Address },
    UnauthorizedFeedback { server_id: AgentId, caller: Address },
    UnauthorizedValidator { data_hash: H256, caller: Address },

    AgentNotFound(AgentKey),
    ValidationRequestNotFound(H256),

    InvalidDomain,
    InvalidAddress,
    InvalidDataHash,
    InvalidResponse { response: u64, scheme: ResponseScheme },
    MalformedInput(String),

    InsufficientFee { required: U256, attached: U256 },
    RateLimited { caller: Address, limit: u32, window: u64 },

    ValidationAlreadyResponded(H256),
    RequestExpired { data_hash: H256, created_at_height: u64, height: u64 },

    IdentityRegistryUnset,
}

impl RegistryError {
    pub fn category(&self) -> ErrorCategory {
        use RegistryError::*;
        match self {
            DomainAlreadyRegistered(_) | AddressAlreadyRegistered(_) | ValidationRequestExists(_) => {
                ErrorCategory::Uniqueness
            }
            UnauthorizedRegistration { .. }
            | UnauthorizedUpdate { .. }
            | UnauthorizedFeedback { .. }
            | UnauthorizedValidator { .. } => ErrorCategory::Authorization,
            AgentNotFound(_) | ValidationRequestNotFound(_) => ErrorCategory::NotFound,
            InvalidDomain
            | InvalidAddress
            | InvalidDataHash
            | InvalidResponse { .. }
            | MalformedInput(_) => ErrorCategory::Range,
            InsufficientFee { .. } | RateLimited { .. } => ErrorCategory::Admission,
            ValidationAlreadyResponded(_) | RequestExpired { .. } => ErrorCategory::Temporal,
            IdentityRegistryUnset => ErrorCategory::Wiring,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        RegistryError::MalformedInput(msg.into())
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RegistryError::*;
        match self {
            DomainAlreadyRegistered(domain) => write!(f, "domain '{}' is already registered", domain),
            AddressAlreadyRegistered(addr) => write!(f, "address {:?} is already registered", addr),
            ValidationRequestExists(hash) => {
                write!(f, "a validation request for {:?} already exists", hash)
            }
            UnauthorizedRegistration { caller, address } => write!(
                f,
                "caller {:?} cannot register an agent for address {:?}",
                caller, address
            ),
            UnauthorizedUpdate { agent_id, caller } => {
                write!(f, "caller {:?} does not control agent {}", caller, agent_id)
            }
            UnauthorizedFeedback { server_id, caller } => write!(
                f,
                "caller {:?} does not control server agent {}",
                caller, server_id
            ),
            UnauthorizedValidator { data_hash, caller } => write!(
                f,
                "caller {:?} is not the validator for request {:?}",
                caller, data_hash
            ),
            AgentNotFound(key) => write!(f, "no agent with {}", key),
            ValidationRequestNotFound(hash) => write!(f, "no validation request for {:?}", hash),
            InvalidDomain => write!(f, "agent domain must not be empty"),
            InvalidAddress => write!(f, "agent address must not be the zero address"),
            InvalidDataHash => write!(f, "data hash must not be zero"),
            InvalidResponse { response, scheme } => {
                write!(f, "response {} is not valid for the {} scheme", response, scheme)
            }
            MalformedInput(msg) => write!(f, "malformed input: {}", msg),
            InsufficientFee { required, attached } => write!(
                f,
                "registration requires {} wei, {} attached",
                required, attached
            ),
            RateLimited { caller, limit, window } => write!(
                f,
                "caller {:?} exceeded {} registrations per {} blocks",
                caller, limit, window
            ),
            ValidationAlreadyResponded(hash) => {
                write!(f, "validation request {:?} was already answered", hash)
            }
            RequestExpired { data_hash, created_at_height, height } => write!(
                f,
                "validation request {:?} created at height {} expired (now {})",
                data_hash, created_at_height, height
            ),
            IdentityRegistryUnset => write!(f, "identity registry reference is not set"),
        }
    }
}

impl std::error::Error for RegistryError {}
