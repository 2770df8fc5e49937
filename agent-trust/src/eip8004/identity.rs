//! Identity Registry
//!
//! Owns the agent directory: one primary map keyed by agent ID and two unique
//! indexes (domain, address). All three live under a single lock so every
//! mutation updates them together or not at all.

use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::admission::{AdmissionPolicy, FeePolicy};
use super::clock::BlockClock;
use super::error::{AgentKey, RegistryError, RegistryResult};
use super::events::{EventSink, RegistryEvent};
use super::types::{AgentId, AgentInfo, CallContext};

#[derive(Debug)]
struct IdentityState {
    agents: HashMap<AgentId, AgentInfo>,
    domain_index: HashMap<String, AgentId>,
    address_index: HashMap<Address, AgentId>,
    next_id: AgentId,
    collected_fees: U256,
}

impl Default for IdentityState {
    fn default() -> Self {
        Self {
            agents: HashMap::new(),
            domain_index: HashMap::new(),
            address_index: HashMap::new(),
            next_id: 1,
            collected_fees: U256::zero(),
        }
    }
}

pub struct IdentityRegistry {
    state: RwLock<IdentityState>,
    admission: Vec<Box<dyn AdmissionPolicy>>,
    clock: Arc<dyn BlockClock>,
    events: Arc<dyn EventSink>,
}

impl IdentityRegistry {
    /// Create a registry with a zero registration fee
    pub fn new(clock: Arc<dyn BlockClock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            state: RwLock::new(IdentityState::default()),
            admission: vec![Box::new(FeePolicy::default())],
            clock,
            events,
        }
    }

    /// Replace the admission policies. Every policy must admit a registration.
    pub fn with_admission(mut self, policies: Vec<Box<dyn AdmissionPolicy>>) -> Self {
        self.admission = policies;
        self
    }

    pub fn clock(&self) -> Arc<dyn BlockClock> {
        self.clock.clone()
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }

    /// Register a new agent and return its ID.
    ///
    /// The caller must be `address` itself. Attached value is kept by the
    /// registry whatever its size.
    pub fn new_agent(&self, ctx: &CallContext, domain: &str, address: Address) -> RegistryResult<AgentId> {
        let mut guard = self.state.write();
        let height = self.clock.height();
        let state = &mut *guard;

        for policy in &self.admission {
            policy.check(ctx, height)?;
        }
        if domain.is_empty() {
            return Err(RegistryError::InvalidDomain);
        }
        if address.is_zero() {
            return Err(RegistryError::InvalidAddress);
        }
        if ctx.caller != address {
            return Err(RegistryError::UnauthorizedRegistration {
                caller: ctx.caller,
                address,
            });
        }
        if state.domain_index.contains_key(domain) {
            return Err(RegistryError::DomainAlreadyRegistered(domain.to_string()));
        }
        if state.address_index.contains_key(&address) {
            return Err(RegistryError::AddressAlreadyRegistered(address));
        }

        let agent_id = state.next_id;
        state.next_id += 1;

        let agent = AgentInfo {
            agent_id,
            agent_domain: domain.to_string(),
            agent_address: address,
        };
        state.domain_index.insert(agent.agent_domain.clone(), agent_id);
        state.address_index.insert(address, agent_id);
        state.agents.insert(agent_id, agent);
        state.collected_fees = state.collected_fees.saturating_add(ctx.value);

        for policy in &self.admission {
            policy.record(ctx, height);
        }

        log::info!("[Identity] Registered agent {} '{}' at {:?}", agent_id, domain, address);
        self.events.emit(
            height,
            RegistryEvent::AgentRegistered {
                agent_id,
                agent_domain: domain.to_string(),
                agent_address: address,
            },
        );

        Ok(agent_id)
    }

    /// Change an agent's domain and/or address.
    ///
    /// An empty `new_domain` or a zero `new_address` leaves that field as is.
    /// Both new keys are checked before either index is touched.
    pub fn update_agent(
        &self,
        ctx: &CallContext,
        agent_id: AgentId,
        new_domain: &str,
        new_address: Address,
    ) -> RegistryResult<bool> {
        let mut guard = self.state.write();
        let height = self.clock.height();
        let state = &mut *guard;

        let current = state
            .agents
            .get(&agent_id)
            .cloned()
            .ok_or(RegistryError::AgentNotFound(AgentKey::Id(agent_id)))?;

        if ctx.caller != current.agent_address {
            log::warn!(
                "[Identity] Rejected update of agent {} by {:?}",
                agent_id,
                ctx.caller
            );
            return Err(RegistryError::UnauthorizedUpdate {
                agent_id,
                caller: ctx.caller,
            });
        }

        let domain_change = (!new_domain.is_empty() && new_domain != current.agent_domain)
            .then_some(new_domain);
        let address_change =
            (!new_address.is_zero() && new_address != current.agent_address).then_some(new_address);

        if let Some(domain) = domain_change {
            if state.domain_index.contains_key(domain) {
                return Err(RegistryError::DomainAlreadyRegistered(domain.to_string()));
            }
        }
        if let Some(address) = address_change {
            if state.address_index.contains_key(&address) {
                return Err(RegistryError::AddressAlreadyRegistered(address));
            }
        }

        // Nothing below can fail.
        let Some(agent) = state.agents.get_mut(&agent_id) else {
            return Err(RegistryError::AgentNotFound(AgentKey::Id(agent_id)));
        };
        if let Some(domain) = domain_change {
            state.domain_index.remove(&current.agent_domain);
            state.domain_index.insert(domain.to_string(), agent_id);
            agent.agent_domain = domain.to_string();
        }
        if let Some(address) = address_change {
            state.address_index.remove(&current.agent_address);
            state.address_index.insert(address, agent_id);
            agent.agent_address = address;
        }

        log::info!(
            "[Identity] Updated agent {}: '{}' at {:?}",
            agent_id,
            agent.agent_domain,
            agent.agent_address
        );
        self.events.emit(
            height,
            RegistryEvent::AgentUpdated {
                agent_id,
                agent_domain: agent.agent_domain.clone(),
                agent_address: agent.agent_address,
            },
        );

        Ok(true)
    }

    pub fn get_agent(&self, agent_id: AgentId) -> RegistryResult<AgentInfo> {
        self.state
            .read()
            .agents
            .get(&agent_id)
            .cloned()
            .ok_or(RegistryError::AgentNotFound(AgentKey::Id(agent_id)))
    }

    pub fn resolve_by_domain(&self, domain: &str) -> RegistryResult<AgentInfo> {
        let state = self.state.read();
        state
            .domain_index
            .get(domain)
            .and_then(|id| state.agents.get(id))
            .cloned()
            .ok_or_else(|| RegistryError::AgentNotFound(AgentKey::Domain(domain.to_string())))
    }

    pub fn resolve_by_address(&self, address: Address) -> RegistryResult<AgentInfo> {
        let state = self.state.read();
        state
            .address_index
            .get(&address)
            .and_then(|id| state.agents.get(id))
            .cloned()
            .ok_or(RegistryError::AgentNotFound(AgentKey::Address(address)))
    }

    pub fn agent_exists(&self, agent_id: AgentId) -> bool {
        self.state.read().agents.contains_key(&agent_id)
    }

    pub fn get_agent_count(&self) -> u64 {
        self.state.read().agents.len() as u64
    }

    /// Total value retained from registrations
    pub fn collected_fees(&self) -> U256 {
        self.state.read().collected_fees
    }

    /// Value a registration must carry to pass every admission policy
    pub fn registration_fee(&self) -> U256 {
        self.admission
            .iter()
            .map(|p| p.required_value())
            .fold(U256::zero(), |acc, v| acc.max(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip8004::admission::RateLimitPolicy;
    use crate::eip8004::clock::ManualClock;
    use crate::eip8004::events::EventJournal;

    struct Harness {
        registry: IdentityRegistry,
        clock: Arc<ManualClock>,
        journal: Arc<EventJournal>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1));
        let journal = Arc::new(EventJournal::new());
        let registry = IdentityRegistry::new(clock.clone(), journal.clone());
        Harness { registry, clock, journal }
    }

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn register(reg: &IdentityRegistry, domain: &str, byte: u8) -> RegistryResult<AgentId> {
        reg.new_agent(&CallContext::new(addr(byte)), domain, addr(byte))
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let h = harness();
        for (i, byte) in (1u8..=5).enumerate() {
            let id = register(&h.registry, &format!("agent{}.eth", byte), byte).unwrap();
            assert_eq!(id, i as u64 + 1);
        }
        assert_eq!(h.registry.get_agent_count(), 5);
        assert!(h.registry.agent_exists(5));
        assert!(!h.registry.agent_exists(6));
        assert!(!h.registry.agent_exists(0));
    }

    #[test]
    fn test_failed_registration_does_not_consume_an_id() {
        let h = harness();
        register(&h.registry, "a.eth", 1).unwrap();
        assert!(register(&h.registry, "a.eth", 2).is_err());
        assert_eq!(register(&h.registry, "b.eth", 2).unwrap(), 2);
    }

    #[test]
    fn test_uniqueness_errors() {
        let h = harness();
        register(&h.registry, "unique-domain.eth", 1).unwrap();

        assert_eq!(
            register(&h.registry, "unique-domain.eth", 2),
            Err(RegistryError::DomainAlreadyRegistered("unique-domain.eth".into()))
        );
        assert_eq!(
            register(&h.registry, "other.eth", 1),
            Err(RegistryError::AddressAlreadyRegistered(addr(1)))
        );
        assert_eq!(h.registry.get_agent_count(), 1);
    }

    #[test]
    fn test_registration_input_checks() {
        let h = harness();
        assert_eq!(register(&h.registry, "", 1), Err(RegistryError::InvalidDomain));
        assert_eq!(
            h.registry.new_agent(&CallContext::new(Address::zero()), "z.eth", Address::zero()),
            Err(RegistryError::InvalidAddress)
        );
        assert_eq!(
            h.registry.new_agent(&CallContext::new(addr(9)), "squat.eth", addr(1)),
            Err(RegistryError::UnauthorizedRegistration { caller: addr(9), address: addr(1) })
        );
        assert!(h.journal.is_empty());
    }

    #[test]
    fn test_fee_is_required_and_retained() {
        let clock = Arc::new(ManualClock::new(1));
        let registry = IdentityRegistry::new(clock, Arc::new(EventJournal::new()))
            .with_admission(vec![Box::new(FeePolicy::new(U256::from(1000)))]);
        assert_eq!(registry.registration_fee(), U256::from(1000));

        let short = CallContext::new(addr(1)).with_value(U256::from(999));
        assert!(matches!(
            registry.new_agent(&short, "a.eth", addr(1)),
            Err(RegistryError::InsufficientFee { .. })
        ));
        assert_eq!(registry.get_agent_count(), 0);

        let paid = CallContext::new(addr(1)).with_value(U256::from(1500));
        registry.new_agent(&paid, "a.eth", addr(1)).unwrap();
        assert_eq!(registry.collected_fees(), U256::from(1500));
    }

    #[test]
    fn test_rate_limited_registration() {
        let clock = Arc::new(ManualClock::new(1));
        let registry = IdentityRegistry::new(clock.clone(), Arc::new(EventJournal::new()))
            .with_admission(vec![
                Box::new(FeePolicy::default()),
                Box::new(RateLimitPolicy::new(1, 10).unwrap()),
            ]);
        register(&registry, "a.eth", 1).unwrap();
        // A failed attempt does not count against the caller
        assert!(register(&registry, "a.eth", 2).is_err());
        register(&registry, "b.eth", 2).unwrap();

        // Agent 1 moves away, freeing its old address for a new registration
        registry
            .update_agent(&CallContext::new(addr(1)), 1, "", addr(5))
            .unwrap();
        clock.advance(9);
        assert_eq!(
            register(&registry, "c.eth", 1),
            Err(RegistryError::RateLimited { caller: addr(1), limit: 1, window: 10 })
        );
        assert!(registry.resolve_by_domain("c.eth").is_err());

        clock.advance(1);
        assert_eq!(register(&registry, "c.eth", 1), Ok(3));
        assert_eq!(registry.resolve_by_address(addr(1)).unwrap().agent_domain, "c.eth");
        // The new registration restarts the window for that caller
        registry
            .update_agent(&CallContext::new(addr(1)), 3, "", addr(6))
            .unwrap();
        assert!(matches!(
            register(&registry, "d.eth", 1),
            Err(RegistryError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_lookups() {
        let h = harness();
        register(&h.registry, "trading.alice.eth", 0xa1).unwrap();

        let by_id = h.registry.get_agent(1).unwrap();
        assert_eq!(h.registry.resolve_by_domain("trading.alice.eth").unwrap(), by_id);
        assert_eq!(h.registry.resolve_by_address(addr(0xa1)).unwrap(), by_id);

        assert_eq!(
            h.registry.get_agent(2),
            Err(RegistryError::AgentNotFound(AgentKey::Id(2)))
        );
        assert!(h.registry.resolve_by_domain("missing.eth").is_err());
        assert!(h.registry.resolve_by_address(addr(0xff)).is_err());
    }

    #[test]
    fn test_update_swaps_both_indexes() {
        let h = harness();
        register(&h.registry, "old.eth", 1).unwrap();
        h.clock.advance(1);

        let ctx = CallContext::new(addr(1));
        assert!(h.registry.update_agent(&ctx, 1, "new.eth", addr(2)).unwrap());

        let agent = h.registry.get_agent(1).unwrap();
        assert_eq!(agent.agent_domain, "new.eth");
        assert_eq!(agent.agent_address, addr(2));
        assert!(h.registry.resolve_by_domain("old.eth").is_err());
        assert!(h.registry.resolve_by_address(addr(1)).is_err());
        assert_eq!(h.registry.resolve_by_domain("new.eth").unwrap().agent_id, 1);

        // Old keys are free again
        register(&h.registry, "old.eth", 1).unwrap();
        // Ownership moved with the address
        assert!(h.registry.update_agent(&ctx, 1, "x.eth", Address::zero()).is_err());
        let owner = CallContext::new(addr(2));
        assert!(h.registry.update_agent(&owner, 1, "x.eth", Address::zero()).is_ok());
    }

    #[test]
    fn test_update_keeps_unchanged_fields() {
        let h = harness();
        register(&h.registry, "keep.eth", 1).unwrap();
        let ctx = CallContext::new(addr(1));

        h.registry.update_agent(&ctx, 1, "", addr(3)).unwrap();
        let agent = h.registry.get_agent(1).unwrap();
        assert_eq!(agent.agent_domain, "keep.eth");
        assert_eq!(agent.agent_address, addr(3));

        let ctx = CallContext::new(addr(3));
        h.registry.update_agent(&ctx, 1, "renamed.eth", Address::zero()).unwrap();
        let agent = h.registry.get_agent(1).unwrap();
        assert_eq!(agent.agent_domain, "renamed.eth");
        assert_eq!(agent.agent_address, addr(3));

        // Re-submitting the current values is not a collision
        h.registry.update_agent(&ctx, 1, "renamed.eth", addr(3)).unwrap();
    }

    #[test]
    fn test_update_collision_is_all_or_nothing() {
        let h = harness();
        register(&h.registry, "a.eth", 1).unwrap();
        register(&h.registry, "b.eth", 2).unwrap();
        let ctx = CallContext::new(addr(1));

        // Free domain, taken address: neither field may change
        assert_eq!(
            h.registry.update_agent(&ctx, 1, "free.eth", addr(2)),
            Err(RegistryError::AddressAlreadyRegistered(addr(2)))
        );
        let agent = h.registry.get_agent(1).unwrap();
        assert_eq!(agent.agent_domain, "a.eth");
        assert!(h.registry.resolve_by_domain("free.eth").is_err());

        assert_eq!(
            h.registry.update_agent(&ctx, 1, "b.eth", addr(7)),
            Err(RegistryError::DomainAlreadyRegistered("b.eth".into()))
        );
        assert!(h.registry.resolve_by_address(addr(7)).is_err());
        assert_eq!(h.registry.resolve_by_address(addr(1)).unwrap().agent_id, 1);
    }

    #[test]
    fn test_unauthorized_update_leaves_record_unchanged() {
        let h = harness();
        register(&h.registry, "a.eth", 1).unwrap();
        let before = h.registry.get_agent(1).unwrap();
        let events_before = h.journal.len();

        let intruder = CallContext::new(addr(9));
        assert_eq!(
            h.registry.update_agent(&intruder, 1, "stolen.eth", addr(9)),
            Err(RegistryError::UnauthorizedUpdate { agent_id: 1, caller: addr(9) })
        );
        assert_eq!(h.registry.get_agent(1).unwrap(), before);
        assert_eq!(h.journal.len(), events_before);

        assert_eq!(
            h.registry.update_agent(&intruder, 42, "x.eth", addr(9)),
            Err(RegistryError::AgentNotFound(AgentKey::Id(42)))
        );
    }

    #[test]
    fn test_events_emitted() {
        let h = harness();
        register(&h.registry, "a.eth", 1).unwrap();
        h.clock.advance(2);
        h.registry
            .update_agent(&CallContext::new(addr(1)), 1, "b.eth", Address::zero())
            .unwrap();

        let entries = h.journal.all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].height, 1);
        assert_eq!(
            entries[1].event,
            RegistryEvent::AgentUpdated {
                agent_id: 1,
                agent_domain: "b.eth".into(),
                agent_address: addr(1),
            }
        );
        assert_eq!(entries[1].height, 3);
    }

    #[test]
    fn test_concurrent_registrations_stay_unique() {
        let h = harness();
        let registry = Arc::new(h.registry);
        let mut handles = Vec::new();
        for t in 0u8..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let mut ok = 0u64;
                for i in 0u8..16 {
                    // Threads contend for the same 16 domains
                    let byte = t * 16 + i + 1;
                    let ctx = CallContext::new(addr(byte));
                    if registry.new_agent(&ctx, &format!("shared{}.eth", i), addr(byte)).is_ok() {
                        ok += 1;
                    }
                }
                ok
            }));
        }
        let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 16);
        assert_eq!(registry.get_agent_count(), 16);
        let mut domains = std::collections::HashSet::new();
        let mut addresses = std::collections::HashSet::new();
        for id in 1..=16 {
            let agent = registry.get_agent(id).unwrap();
            assert!(domains.insert(agent.agent_domain));
            assert!(addresses.insert(agent.agent_address));
        }
        assert!(!registry.agent_exists(17));
    }

    #[test]
    fn test_journal_heights_follow_commit_order() {
        let h = harness();
        let registry = Arc::new(h.registry);
        let clock = h.clock.clone();
        let ticker = std::thread::spawn(move || {
            for _ in 0..500 {
                clock.advance(1);
                std::thread::yield_now();
            }
        });
        let handles: Vec<_> = (0u8..4)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0u8..25 {
                        let byte = t * 25 + i + 1;
                        let ctx = CallContext::new(addr(byte));
                        registry.new_agent(&ctx, &format!("tick{}.eth", byte), addr(byte)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        ticker.join().unwrap();

        let entries = h.journal.all();
        assert_eq!(entries.len(), 100);
        for pair in entries.windows(2) {
            assert!(pair[0].height <= pair[1].height, "{:?} then {:?}", pair[0], pair[1]);
        }
    }
}
