//! Validation Registry
//!
//! Per data hash: absent -> pending -> responded | expired.
//! Only `responded` is stored; pending vs expired is derived from the current
//! height at read time. Records are never removed, so a hash can only ever
//! carry one request.

use ethers::types::H256;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::clock::BlockClock;
use super::config::{DEFAULT_EXPIRATION_WINDOW, RegistryConfig};
use super::error::{AgentKey, RegistryError, RegistryResult};
use super::events::{EventSink, RegistryEvent};
use super::identity::IdentityRegistry;
use super::types::{
    AgentId, CallContext, ExpiryBoundary, ResponseScheme, ValidationRequest, ValidationResult,
    ValidationStatus,
};

pub struct ValidationRegistry {
    identity: Arc<IdentityRegistry>,
    clock: Arc<dyn BlockClock>,
    events: Arc<dyn EventSink>,
    expiration_window: u64,
    expiry_boundary: ExpiryBoundary,
    response_scheme: ResponseScheme,
    requests: RwLock<HashMap<H256, ValidationRequest>>,
}

/// Builder for `ValidationRegistry`. Clock and event sink default to the
/// Identity Registry's.
pub struct ValidationRegistryBuilder {
    identity: Option<Arc<IdentityRegistry>>,
    clock: Option<Arc<dyn BlockClock>>,
    events: Option<Arc<dyn EventSink>>,
    expiration_window: u64,
    expiry_boundary: ExpiryBoundary,
    response_scheme: ResponseScheme,
}

impl Default for ValidationRegistryBuilder {
    fn default() -> Self {
        Self {
            identity: None,
            clock: None,
            events: None,
            expiration_window: DEFAULT_EXPIRATION_WINDOW,
            expiry_boundary: ExpiryBoundary::default(),
            response_scheme: ResponseScheme::default(),
        }
    }
}

impl ValidationRegistryBuilder {
    pub fn identity(mut self, identity: Arc<IdentityRegistry>) -> Self {
        self.identity = Some(identity);
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

    pub fn expiration_window(mut self, window: u64) -> Self {
        self.expiration_window = window;
        self
    }

    pub fn expiry_boundary(mut self, boundary: ExpiryBoundary) -> Self {
        self.expiry_boundary = boundary;
        self
    }

    pub fn response_scheme(mut self, scheme: ResponseScheme) -> Self {
        self.response_scheme = scheme;
        self
    }

    /// Take window, boundary and scheme from a deployment config
    pub fn config(self, config: &RegistryConfig) -> Self {
        self.expiration_window(config.expiration_window)
            .expiry_boundary(config.expiry_boundary)
            .response_scheme(config.response_scheme)
    }

    pub fn build(self) -> RegistryResult<ValidationRegistry> {
        let identity = self.identity.ok_or(RegistryError::IdentityRegistryUnset)?;
        let clock = self.clock.unwrap_or_else(|| identity.clock());
        let events = self.events.unwrap_or_else(|| identity.events());
        Ok(ValidationRegistry {
            identity,
            clock,
            events,
            expiration_window: self.expiration_window,
            expiry_boundary: self.expiry_boundary,
            response_scheme: self.response_scheme,
            requests: RwLock::new(HashMap::new()),
        })
    }
}

impl ValidationRegistry {
    pub fn builder() -> ValidationRegistryBuilder {
        ValidationRegistryBuilder::default()
    }

    pub fn expiration_window(&self) -> u64 {
        self.expiration_window
    }

    pub fn response_scheme(&self) -> ResponseScheme {
        self.response_scheme
    }

    /// Ask `validator_id` to validate `server_id`'s work identified by `data_hash`.
    /// Anyone may call this.
    pub fn validation_request(
        &self,
        ctx: &CallContext,
        validator_id: AgentId,
        server_id: AgentId,
        data_hash: H256,
    ) -> RegistryResult<()> {
        if data_hash.is_zero() {
            return Err(RegistryError::InvalidDataHash);
        }

        let mut requests = self.requests.write();
        let height = self.clock.height();

        if let Some(existing) = requests.get(&data_hash) {
            log::warn!(
                "[Validation] {:?} reused data hash {:?} ({})",
                ctx.caller,
                data_hash,
                existing.status_at(height, self.expiration_window, self.expiry_boundary)
            );
            return Err(RegistryError::ValidationRequestExists(data_hash));
        }
        for id in [validator_id, server_id] {
            if !self.identity.agent_exists(id) {
                return Err(RegistryError::AgentNotFound(AgentKey::Id(id)));
            }
        }

        requests.insert(
            data_hash,
            ValidationRequest::new(data_hash, validator_id, server_id, height),
        );

        log::info!(
            "[Validation] Request {:?}: validator {} for server {} at height {}",
            data_hash,
            validator_id,
            server_id,
            height
        );
        self.events.emit(
            height,
            RegistryEvent::ValidationRequested {
                validator_id,
                server_id,
                data_hash,
            },
        );

        Ok(())
    }

    /// Record the designated validator's answer. Accepted once, before expiry.
    pub fn validation_response(
        &self,
        ctx: &CallContext,
        data_hash: H256,
        response: u8,
    ) -> RegistryResult<()> {
        let mut requests = self.requests.write();
        let height = self.clock.height();

        let request = requests
            .get_mut(&data_hash)
            .ok_or(RegistryError::ValidationRequestNotFound(data_hash))?;

        if request.responded {
            return Err(RegistryError::ValidationAlreadyResponded(data_hash));
        }
        if self
            .expiry_boundary
            .is_expired(request.created_at_height, height, self.expiration_window)
        {
            return Err(RegistryError::RequestExpired {
                data_hash,
                created_at_height: request.created_at_height,
                height,
            });
        }

        let validator = self.identity.get_agent(request.validator_id)?;
        if ctx.caller != validator.agent_address {
            log::warn!(
                "[Validation] {:?} is not validator {} for {:?}",
                ctx.caller,
                request.validator_id,
                data_hash
            );
            return Err(RegistryError::UnauthorizedValidator {
                data_hash,
                caller: ctx.caller,
            });
        }
        if !self.response_scheme.accepts(response) {
            return Err(RegistryError::InvalidResponse {
                response: u64::from(response),
                scheme: self.response_scheme,
            });
        }

        request.responded = true;
        request.response = response;
        request.responded_at_height = Some(height);

        log::info!(
            "[Validation] Validator {} answered {:?} with {}",
            request.validator_id,
            data_hash,
            response
        );
        self.events.emit(
            height,
            RegistryEvent::ValidationResponded {
                validator_id: request.validator_id,
                server_id: request.server_id,
                data_hash,
                response,
            },
        );

        Ok(())
    }

    /// Lifecycle state of `data_hash` at the current height
    pub fn validation_status(&self, data_hash: H256) -> ValidationStatus {
        let height = self.clock.height();
        self.requests
            .read()
            .get(&data_hash)
            .map(|r| r.status_at(height, self.expiration_window, self.expiry_boundary))
            .unwrap_or(ValidationStatus::Absent)
    }

    /// `(exists, pending)`
    pub fn is_validation_pending(&self, data_hash: H256) -> (bool, bool) {
        match self.validation_status(data_hash) {
            ValidationStatus::Absent => (false, false),
            ValidationStatus::Pending => (true, true),
            ValidationStatus::Responded | ValidationStatus::Expired => (true, false),
        }
    }

    /// `(has_response, response)`; response is 0 until answered
    pub fn get_validation_response(&self, data_hash: H256) -> (bool, u8) {
        self.requests
            .read()
            .get(&data_hash)
            .filter(|r| r.responded)
            .map(|r| (true, r.response))
            .unwrap_or((false, 0))
    }

    pub fn get_validation_request(&self, data_hash: H256) -> RegistryResult<ValidationRequest> {
        self.requests
            .read()
            .get(&data_hash)
            .cloned()
            .ok_or(RegistryError::ValidationRequestNotFound(data_hash))
    }

    /// The answer interpreted under the configured scheme, `Unset` until answered
    pub fn validation_result(&self, data_hash: H256) -> ValidationResult {
        match self.get_validation_response(data_hash) {
            (true, response) => self.response_scheme.interpret(response),
            (false, _) => ValidationResult::Unset,
        }
    }
}
