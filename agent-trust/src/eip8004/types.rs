//! EIP-8004 Type definitions

use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Sequential agent identifier, starting at 1
pub type AgentId = u64;

/// Response code for an approved request under `ResponseScheme::Binary`
pub const APPROVED_CODE: u8 = 1;
/// Response code for a rejected request under `ResponseScheme::Binary`
pub const REJECTED_CODE: u8 = 2;
/// Highest score accepted under `ResponseScheme::Scored`
pub const MAX_SCORE: u8 = 100;

/// Who is calling, and what value they attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: U256,
}

impl CallContext {
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::zero(),
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: AgentId,
    pub agent_domain: String,
    pub agent_address: Address,
}

impl std::fmt::Display for AgentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {} ({})",
            self.agent_id,
            self.agent_domain,
            ethers::utils::to_checksum(&self.agent_address, None)
        )
    }
}

/// One grant of feedback permission from a server agent to a client agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAuthorization {
    pub client_id: AgentId,
    pub server_id: AgentId,
    pub auth_id: H256,
    pub granted_at_height: u64,
    /// 1 for the first grant on this pair, incremented on every re-grant
    pub grant_count: u64,
}

/// A validation request keyed by its data hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub data_hash: H256,
    pub validator_id: AgentId,
    pub server_id: AgentId,
    pub created_at_height: u64,
    pub responded: bool,
    /// Only meaningful once `responded` is true
    pub response: u8,
    pub responded_at_height: Option<u64>,
}

impl ValidationRequest {
    pub fn new(data_hash: H256, validator_id: AgentId, server_id: AgentId, height: u64) -> Self {
        Self {
            data_hash,
            validator_id,
            server_id,
            created_at_height: height,
            responded: false,
            response: 0,
            responded_at_height: None,
        }
    }

    /// Derive the lifecycle state at `height`
    pub fn status_at(&self, height: u64, window: u64, boundary: ExpiryBoundary) -> ValidationStatus {
        if self.responded {
            ValidationStatus::Responded
        } else if boundary.is_expired(self.created_at_height, height, window) {
            ValidationStatus::Expired
        } else {
            ValidationStatus::Pending
        }
    }
}

/// Lifecycle state of a data hash in the Validation Registry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationStatus {
    Absent,
    Pending,
    Responded,
    Expired,
}

/// Interpreted answer of a validation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValidationResult {
    Unset,
    Score(u8),
    Approved,
    Rejected,
}

/// How validator responses are encoded
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ResponseScheme {
    /// Any score in 0..=100
    #[default]
    Scored,
    /// Exactly `APPROVED_CODE` or `REJECTED_CODE`
    Binary,
}

impl ResponseScheme {
    pub fn accepts(&self, response: u8) -> bool {
        match self {
            ResponseScheme::Scored => response <= MAX_SCORE,
            ResponseScheme::Binary => response == APPROVED_CODE || response == REJECTED_CODE,
        }
    }

    /// Interpret a stored response. Callers only pass accepted values.
    pub fn interpret(&self, response: u8) -> ValidationResult {
        match self {
            ResponseScheme::Scored => ValidationResult::Score(response),
            ResponseScheme::Binary if response == APPROVED_CODE => ValidationResult::Approved,
            ResponseScheme::Binary if response == REJECTED_CODE => ValidationResult::Rejected,
            ResponseScheme::Binary => ValidationResult::Unset,
        }
    }
}

/// Whether a response landing exactly `window` heights after creation still counts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExpiryBoundary {
    /// Answerable while `height <= created + window`
    #[default]
    Inclusive,
    /// Answerable while `height < created + window`
    Exclusive,
}

impl ExpiryBoundary {
    pub fn is_expired(&self, created_at: u64, height: u64, window: u64) -> bool {
        let elapsed = height.saturating_sub(created_at);
        match self {
            ExpiryBoundary::Inclusive => elapsed > window,
            ExpiryBoundary::Exclusive => elapsed >= window,
        }
    }
}
