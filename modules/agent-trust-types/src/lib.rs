//! Shared types for the agent trust service and its RPC clients.
//!
//! Addresses, hashes and wei amounts travel as strings; the service parses
//! them and answers with checksummed addresses and `0x` hex hashes.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub agent_id: u64,
    pub agent_domain: String,
    pub agent_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAuthView {
    pub authorized: bool,
    /// Zero hash when not authorized
    pub auth_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequestView {
    pub data_hash: String,
    pub validator_id: u64,
    pub server_id: u64,
    pub created_at_height: u64,
    pub responded: bool,
    pub response: u8,
    pub responded_at_height: Option<u64>,
    /// absent | pending | responded | expired
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingView {
    pub exists: bool,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponseView {
    pub has_response: bool,
    pub response: u8,
}

/// One persisted registry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub seq: u64,
    pub height: u64,
    pub event_type: String,
    pub recorded_at: String,
    pub payload: serde_json::Value,
}

// =====================================================
// RPC Request Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub caller: String,
    pub domain: String,
    pub address: String,
    /// Attached value in wei, decimal or 0x hex; zero when omitted
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateAgentRequest {
    pub caller: String,
    pub agent_id: u64,
    #[serde(default)]
    pub new_domain: Option<String>,
    #[serde(default)]
    pub new_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetAgentRequest {
    pub agent_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveDomainRequest {
    pub domain: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveAddressRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptFeedbackRequest {
    pub caller: String,
    pub client_id: u64,
    pub server_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackPairRequest {
    pub client_id: u64,
    pub server_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenValidationRequest {
    pub caller: String,
    pub validator_id: u64,
    pub server_id: u64,
    pub data_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondValidationRequest {
    pub caller: String,
    pub data_hash: String,
    /// Range-checked by the service, so out-of-range values get a proper error
    pub response: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataHashRequest {
    pub data_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error family, e.g. "uniqueness" or "not_found"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            error_kind: None,
        }
    }

    pub fn err_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            error_kind: Some(kind.into()),
            ..Self::err(msg)
        }
    }
}

/// Result of a committed mutating call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt<T> {
    pub result: T,
    /// Height the call executed at
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCount {
    pub count: u64,
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub height: u64,
    pub agent_count: u64,
    pub event_count: u64,
    /// Events mirrored into the SQLite index for this deployment
    pub indexed_event_count: u64,
    pub registration_fee: String,
    pub collected_fees: String,
    pub expiration_window: u64,
    pub expiry_boundary: String,
    pub response_scheme: String,
}
