//! One complete registry deployment: the three registries wired to a shared
//! clock and event journal.

use std::sync::Arc;

use super::admission::{AdmissionPolicy, FeePolicy, RateLimitPolicy};
use super::clock::{BlockClock, ManualClock};
use super::config::RegistryConfig;
use super::error::RegistryResult;
use super::events::EventJournal;
use super::identity::IdentityRegistry;
use super::reputation::ReputationRegistry;
use super::validation::ValidationRegistry;

pub struct Deployment {
    pub identity: Arc<IdentityRegistry>,
    pub reputation: ReputationRegistry,
    pub validation: ValidationRegistry,
    pub clock: Arc<ManualClock>,
    pub journal: Arc<EventJournal>,
}

impl Deployment {
    /// Deploy at height 0
    pub fn from_config(config: &RegistryConfig) -> RegistryResult<Self> {
        Self::from_config_at(config, 0)
    }

    pub fn from_config_at(config: &RegistryConfig, start_height: u64) -> RegistryResult<Self> {
        let clock = Arc::new(ManualClock::new(start_height));
        let journal = Arc::new(EventJournal::new());

        let mut admission: Vec<Box<dyn AdmissionPolicy>> =
            vec![Box::new(FeePolicy::new(config.registration_fee))];
        if let Some(limit) = config.rate_limit {
            admission.push(Box::new(RateLimitPolicy::new(limit.max_registrations, limit.window)?));
        }

        let identity = Arc::new(
            IdentityRegistry::new(clock.clone(), journal.clone()).with_admission(admission),
        );
        let reputation = ReputationRegistry::builder().identity(identity.clone()).build()?;
        let validation = ValidationRegistry::builder()
            .identity(identity.clone())
            .config(config)
            .build()?;

        log::info!(
            "[Deployment] Registries ready at height {} (fee {} wei, window {} blocks, {} responses)",
            start_height,
            config.registration_fee,
            config.expiration_window,
            config.response_scheme
        );

        Ok(Self {
            identity,
            reputation,
            validation,
            clock,
            journal,
        })
    }

    /// Current block height
    pub fn height(&self) -> u64 {
        self.clock.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip8004::config::RateLimitConfig;
    use crate::eip8004::error::RegistryError;
    use crate::eip8004::types::{CallContext, ResponseScheme};
    use ethers::types::{Address, U256};

    #[test]
    fn test_config_reaches_every_registry() {
        let config = RegistryConfig::default()
            .with_registration_fee(U256::from(10))
            .with_expiration_window(50)
            .with_response_scheme(ResponseScheme::Binary)
            .with_rate_limit(1, 100);
        let deployment = Deployment::from_config_at(&config, 7).unwrap();

        assert_eq!(deployment.height(), 7);
        assert_eq!(deployment.identity.registration_fee(), U256::from(10));
        assert_eq!(deployment.validation.expiration_window(), 50);
        assert_eq!(deployment.validation.response_scheme(), ResponseScheme::Binary);

        // The old address of a moved agent is throttled until the window passes
        let alice = Address::repeat_byte(0xaa);
        let paid = CallContext::new(alice).with_value(U256::from(10));
        deployment.identity.new_agent(&paid, "alice.eth", alice).unwrap();
        deployment
            .identity
            .update_agent(&paid, 1, "", Address::repeat_byte(0xab))
            .unwrap();
        assert!(matches!(
            deployment.identity.new_agent(&paid, "alice2.eth", alice),
            Err(RegistryError::RateLimited { limit: 1, window: 100, .. })
        ));
        deployment.clock.advance(100);
        assert_eq!(deployment.identity.new_agent(&paid, "alice2.eth", alice), Ok(2));
    }

    #[test]
    fn test_zero_rate_limit_fails_deployment() {
        let mut config = RegistryConfig::default();
        config.rate_limit = Some(RateLimitConfig {
            max_registrations: 0,
            window: 10,
        });
        assert!(matches!(
            Deployment::from_config(&config),
            Err(RegistryError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_registries_share_journal() {
        let deployment = Deployment::from_config(&RegistryConfig::default()).unwrap();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        deployment.identity.new_agent(&CallContext::new(a), "a.eth", a).unwrap();
        deployment.identity.new_agent(&CallContext::new(b), "b.eth", b).unwrap();
        deployment.reputation.accept_feedback(&CallContext::new(b), 1, 2).unwrap();

        let seqs: Vec<u64> = deployment.journal.all().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
