//! Reputation Registry
//!
//! Records which client agents a server agent has authorized to leave
//! feedback about it. No scores are kept here.
//!
//! Re-authorizing a pair always succeeds and issues a fresh token; the pair's
//! current token changes, while every token issued before keeps resolving
//! through `resolve_feedback_auth`.

use ethers::types::H256;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::BlockClock;
use super::derivation::{AuthIdDeriver, AuthSeed, CounterDeriver};
use super::error::{AgentKey, RegistryError, RegistryResult};
use super::events::{EventSink, RegistryEvent};
use super::identity::IdentityRegistry;
use super::types::{AgentId, CallContext, FeedbackAuthorization};

#[derive(Debug, Default)]
struct ReputationState {
    /// (client, server) -> current token
    current: HashMap<(AgentId, AgentId), H256>,
    /// Every token ever issued
    grants: HashMap<H256, FeedbackAuthorization>,
}

pub struct ReputationRegistry {
    identity: Arc<IdentityRegistry>,
    deriver: Box<dyn AuthIdDeriver>,
    clock: Arc<dyn BlockClock>,
    events: Arc<dyn EventSink>,
    state: RwLock<ReputationState>,
}

/// Builder for `ReputationRegistry`. Clock and event sink default to the
/// Identity Registry's so the whole deployment shares one host context.
#[derive(Default)]
pub struct ReputationRegistryBuilder {
    identity: Option<Arc<IdentityRegistry>>,
    deriver: Option<Box<dyn AuthIdDeriver>>,
    clock: Option<Arc<dyn BlockClock>>,
    events: Option<Arc<dyn EventSink>>,
}

impl ReputationRegistryBuilder {
    pub fn identity(mut self, identity: Arc<IdentityRegistry>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn deriver(mut self, deriver: Box<dyn AuthIdDeriver>) -> Self {
        self.deriver = Some(deriver);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn BlockClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> RegistryResult<ReputationRegistry> {
        let identity = self.identity.ok_or(RegistryError::IdentityRegistryUnset)?;
        let clock = self.clock.unwrap_or_else(|| identity.clock());
        let events = self.events.unwrap_or_else(|| identity.events());
        Ok(ReputationRegistry {
            deriver: self.deriver.unwrap_or_else(|| Box::new(CounterDeriver::new())),
            identity,
            clock,
            events,
            state: RwLock::new(ReputationState::default()),
        })
    }
}

impl ReputationRegistry {
    pub fn builder() -> ReputationRegistryBuilder {
        ReputationRegistryBuilder::default()
    }

    pub fn identity(&self) -> &Arc<IdentityRegistry> {
        &self.identity
    }

    /// Authorize `client_id` to give feedback about `server_id`.
    ///
    /// The caller must control the server agent's current address.
    /// Returns the newly issued token.
    pub fn accept_feedback(
        &self,
        ctx: &CallContext,
        client_id: AgentId,
        server_id: AgentId,
    ) -> RegistryResult<H256> {
        let mut state = self.state.write();
        let height = self.clock.height();

        if !self.identity.agent_exists(client_id) {
            return Err(RegistryError::AgentNotFound(AgentKey::Id(client_id)));
        }
        let server = self.identity.get_agent(server_id)?;
        if ctx.caller != server.agent_address {
            log::warn!(
                "[Reputation] {:?} tried to authorize feedback for agent {} it does not control",
                ctx.caller,
                server_id
            );
            return Err(RegistryError::UnauthorizedFeedback {
                server_id,
                caller: ctx.caller,
            });
        }

        let previous = state
            .current
            .get(&(client_id, server_id))
            .and_then(|id| state.grants.get(id))
            .map(|grant| grant.grant_count)
            .unwrap_or(0);

        let auth_id = self.deriver.derive(&AuthSeed {
            client_id,
            server_id,
            caller: ctx.caller,
            height,
        });
        let grant = FeedbackAuthorization {
            client_id,
            server_id,
            auth_id,
            granted_at_height: height,
            grant_count: previous + 1,
        };
        state.current.insert((client_id, server_id), auth_id);
        state.grants.insert(auth_id, grant);

        if previous > 0 {
            log::info!(
                "[Reputation] Re-authorized client {} for server {} (grant #{})",
                client_id,
                server_id,
                previous + 1
            );
        } else {
            log::info!("[Reputation] Authorized client {} for server {}", client_id, server_id);
        }
        self.events.emit(
            height,
            RegistryEvent::FeedbackAuthorized {
                client_id,
                server_id,
                auth_id,
            },
        );

        Ok(auth_id)
    }

    /// `(true, token)` once the pair has been authorized, `(false, zero)` before
    pub fn is_feedback_authorized(&self, client_id: AgentId, server_id: AgentId) -> (bool, H256) {
        let auth_id = self.get_feedback_auth_id(client_id, server_id);
        (!auth_id.is_zero(), auth_id)
    }

    /// Current token for the pair, zero if never authorized
    pub fn get_feedback_auth_id(&self, client_id: AgentId, server_id: AgentId) -> H256 {
        self.state
            .read()
            .current
            .get(&(client_id, server_id))
            .copied()
            .unwrap_or_else(H256::zero)
    }

    /// Look up the grant behind any token this registry has issued
    pub fn resolve_feedback_auth(&self, auth_id: H256) -> Option<FeedbackAuthorization> {
        self.state.read().grants.get(&auth_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip8004::clock::ManualClock;
    use crate::eip8004::events::EventJournal;
    use ethers::types::Address;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn setup() -> (ReputationRegistry, Arc<ManualClock>, Arc<EventJournal>) {
        let clock = Arc::new(ManualClock::new(10));
        let journal = Arc::new(EventJournal::new());
        let identity = Arc::new(IdentityRegistry::new(clock.clone(), journal.clone()));
        for (domain, byte) in [("client.eth", 1u8), ("server.eth", 2u8)] {
            identity
                .new_agent(&CallContext::new(addr(byte)), domain, addr(byte))
                .unwrap();
        }
        let registry = ReputationRegistry::builder().identity(identity).build().unwrap();
        (registry, clock, journal)
    }

    #[test]
    fn test_build_requires_identity() {
        assert!(matches!(
            ReputationRegistry::builder().build(),
            Err(RegistryError::IdentityRegistryUnset)
        ));
    }

    #[test]
    fn test_unauthorized_before_accept() {
        let (registry, _, _) = setup();
        assert_eq!(registry.is_feedback_authorized(1, 2), (false, H256::zero()));
        assert!(registry.get_feedback_auth_id(1, 2).is_zero());
    }

    #[test]
    fn test_accept_feedback() {
        let (registry, _, journal) = setup();
        let token = registry.accept_feedback(&CallContext::new(addr(2)), 1, 2).unwrap();

        assert!(!token.is_zero());
        assert_eq!(registry.is_feedback_authorized(1, 2), (true, token));
        // Direction matters
        assert_eq!(registry.is_feedback_authorized(2, 1), (false, H256::zero()));

        let last = journal.all().pop().unwrap();
        assert_eq!(
            last.event,
            RegistryEvent::FeedbackAuthorized { client_id: 1, server_id: 2, auth_id: token }
        );
    }

    #[test]
    fn test_only_server_controller_may_authorize() {
        let (registry, _, journal) = setup();
        let before = journal.len();
        for caller in [addr(1), addr(9)] {
            assert_eq!(
                registry.accept_feedback(&CallContext::new(caller), 1, 2),
                Err(RegistryError::UnauthorizedFeedback { server_id: 2, caller })
            );
        }
        assert_eq!(registry.is_feedback_authorized(1, 2), (false, H256::zero()));
        assert_eq!(journal.len(), before);
    }

    #[test]
    fn test_unknown_agents_rejected() {
        let (registry, _, _) = setup();
        let ctx = CallContext::new(addr(2));
        assert_eq!(
            registry.accept_feedback(&ctx, 7, 2),
            Err(RegistryError::AgentNotFound(AgentKey::Id(7)))
        );
        assert_eq!(
            registry.accept_feedback(&ctx, 1, 8),
            Err(RegistryError::AgentNotFound(AgentKey::Id(8)))
        );
    }

    #[test]
    fn test_reauthorization_regenerates_token() {
        let (registry, clock, _) = setup();
        let ctx = CallContext::new(addr(2));

        let first = registry.accept_feedback(&ctx, 1, 2).unwrap();
        clock.advance(1);
        let second = registry.accept_feedback(&ctx, 1, 2).unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.is_feedback_authorized(1, 2), (true, second));

        // The earlier token still resolves to the same pair
        let old = registry.resolve_feedback_auth(first).unwrap();
        assert_eq!((old.client_id, old.server_id, old.grant_count), (1, 2, 1));
        assert_eq!(old.granted_at_height, 10);
        let new = registry.resolve_feedback_auth(second).unwrap();
        assert_eq!(new.grant_count, 2);
        assert_eq!(new.granted_at_height, 11);

        assert!(registry.resolve_feedback_auth(H256::repeat_byte(1)).is_none());
    }

    #[test]
    fn test_authorization_follows_address_transfer() {
        let (registry, _, _) = setup();
        registry
            .identity()
            .update_agent(&CallContext::new(addr(2)), 2, "", addr(5))
            .unwrap();

        assert!(registry.accept_feedback(&CallContext::new(addr(2)), 1, 2).is_err());
        assert!(registry.accept_feedback(&CallContext::new(addr(5)), 1, 2).is_ok());
    }
}
