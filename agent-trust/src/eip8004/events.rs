//! Registry events
//!
//! Each committed mutation emits exactly one `RegistryEvent`. Nothing in the
//! registries reads events back.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::types::AgentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    AgentRegistered {
        agent_id: AgentId,
        agent_domain: String,
        agent_address: Address,
    },
    AgentUpdated {
        agent_id: AgentId,
        agent_domain: String,
        agent_address: Address,
    },
    FeedbackAuthorized {
        client_id: AgentId,
        server_id: AgentId,
        auth_id: H256,
    },
    ValidationRequested {
        validator_id: AgentId,
        server_id: AgentId,
        data_hash: H256,
    },
    ValidationResponded {
        validator_id: AgentId,
        server_id: AgentId,
        data_hash: H256,
        response: u8,
    },
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::AgentRegistered { .. } => "agent_registered",
            RegistryEvent::AgentUpdated { .. } => "agent_updated",
            RegistryEvent::FeedbackAuthorized { .. } => "feedback_authorized",
            RegistryEvent::ValidationRequested { .. } => "validation_requested",
            RegistryEvent::ValidationResponded { .. } => "validation_responded",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, height: u64, event: RegistryEvent);
}

/// An event with its position in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonically increasing, starting at 1
    pub seq: u64,
    pub height: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: RegistryEvent,
}

/// In-memory event log shared by all registries of a deployment.
///
/// Entries are only ever appended; a host that has copied them elsewhere can
/// drop the oldest with `trim_through`. Sequence numbers are never reused.
#[derive(Debug, Default)]
pub struct EventJournal {
    inner: Mutex<JournalState>,
}

#[derive(Debug, Default)]
struct JournalState {
    entries: Vec<JournalEntry>,
    /// Entries dropped from the front so far
    trimmed: u64,
}

impl JournalState {
    fn latest_seq(&self) -> u64 {
        self.trimmed + self.entries.len() as u64
    }
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retained entries with `seq > after`, oldest first
    pub fn since(&self, after: u64) -> Vec<JournalEntry> {
        let state = self.inner.lock();
        // seq N lives at index N - trimmed - 1
        let start = (after.saturating_sub(state.trimmed) as usize).min(state.entries.len());
        state.entries[start..].to_vec()
    }

    pub fn all(&self) -> Vec<JournalEntry> {
        self.since(0)
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the newest entry ever emitted, 0 when none
    pub fn latest_seq(&self) -> u64 {
        self.inner.lock().latest_seq()
    }

    /// Drop every entry with `seq <= seq`, returning how many went
    pub fn trim_through(&self, seq: u64) -> usize {
        let mut state = self.inner.lock();
        let count = (seq.saturating_sub(state.trimmed) as usize).min(state.entries.len());
        if count > 0 {
            state.entries.drain(..count);
            state.trimmed += count as u64;
            log::debug!("[Events] Trimmed {} entries through #{}", count, state.trimmed);
        }
        count
    }
}

impl EventSink for EventJournal {
    fn emit(&self, height: u64, event: RegistryEvent) {
        let mut state = self.inner.lock();
        let seq = state.latest_seq() + 1;
        log::debug!("[Events] #{} at height {}: {}", seq, height, event.name());
        state.entries.push(JournalEntry {
            seq,
            height,
            recorded_at: Utc::now(),
            event,
        });
    }
}
