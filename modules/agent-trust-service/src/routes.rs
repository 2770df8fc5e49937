//! Axum route handlers for the agent trust RPC API.

use crate::db::Db;
use agent_trust::domain_types::{DomainBytes32, DomainEthAddress, DomainWei};
use agent_trust::{
    AgentInfo, CallContext, Deployment, ErrorCategory, JournalEntry, RegistryConfig, RegistryError,
    RegistryResult, ValidationRequest, ValidationResult,
};
use agent_trust_types::*;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_EVENT_PAGE: u32 = 100;
const MAX_EVENT_PAGE: u32 = 1000;

pub struct AppState {
    pub deployment: Deployment,
    pub config: RegistryConfig,
    pub db: Arc<Db>,
    pub deployment_id: i64,
    pub start_time: Instant,
    /// Held for the whole of every mutating call
    write_lock: Mutex<()>,
}

type RpcReply<T> = (StatusCode, Json<RpcResponse<T>>);

impl AppState {
    pub fn new(config: RegistryConfig, db: Arc<Db>) -> Result<Self, String> {
        let deployment = Deployment::from_config(&config).map_err(|e| e.to_string())?;
        let config_json = serde_json::to_string(&config).map_err(|e| e.to_string())?;
        let deployment_id = db.start_deployment(&config_json)?;
        Ok(Self {
            deployment,
            config,
            db,
            deployment_id,
            start_time: Instant::now(),
            write_lock: Mutex::new(()),
        })
    }

    /// Run one mutating call at the current height.
    ///
    /// On success the height advances by one and the new journal entries are
    /// mirrored into the event index. Failed calls leave the height alone.
    fn commit<T>(&self, op: impl FnOnce(&Deployment) -> RegistryResult<T>) -> RegistryResult<Receipt<T>> {
        let _guard = self.write_lock.lock();
        let height = self.deployment.height();
        let result = op(&self.deployment)?;
        self.deployment.clock.advance(1);
        self.index_new_events();
        Ok(Receipt { result, height })
    }

    fn index_new_events(&self) {
        let after = match self.db.latest_seq(self.deployment_id) {
            Ok(seq) => seq,
            Err(e) => {
                log::error!("[Service] Event index unavailable: {}", e);
                return;
            }
        };
        let mut indexed = after;
        for entry in self.deployment.journal.since(after) {
            let stored = event_entry(&entry).and_then(|e| self.db.insert_event(self.deployment_id, &e));
            if let Err(e) = stored {
                log::error!("[Service] Failed to index event #{}: {}", entry.seq, e);
                break;
            }
            indexed = entry.seq;
        }
        // Only entries that made it into the index leave memory
        self.deployment.journal.trim_through(indexed);
    }

    pub fn register_agent(&self, req: &RegisterAgentRequest) -> RegistryResult<Receipt<u64>> {
        let ctx = call_context(&req.caller, req.value.as_deref())?;
        let address: DomainEthAddress = req.address.parse()?;
        self.commit(|d| d.identity.new_agent(&ctx, &req.domain, address.0))
    }

    pub fn update_agent(&self, req: &UpdateAgentRequest) -> RegistryResult<Receipt<bool>> {
        let ctx = call_context(&req.caller, None)?;
        let new_address = match req.new_address.as_deref() {
            Some(s) => s.parse::<DomainEthAddress>()?.0,
            None => Default::default(),
        };
        let new_domain = req.new_domain.as_deref().unwrap_or("");
        self.commit(|d| d.identity.update_agent(&ctx, req.agent_id, new_domain, new_address))
    }

    pub fn accept_feedback(&self, req: &AcceptFeedbackRequest) -> RegistryResult<Receipt<String>> {
        let ctx = call_context(&req.caller, None)?;
        self.commit(|d| d.reputation.accept_feedback(&ctx, req.client_id, req.server_id))
            .map(|r| Receipt {
                result: DomainBytes32(r.result).to_hex(),
                height: r.height,
            })
    }

    pub fn request_validation(&self, req: &OpenValidationRequest) -> RegistryResult<Receipt<bool>> {
        let ctx = call_context(&req.caller, None)?;
        let data_hash: DomainBytes32 = req.data_hash.parse()?;
        self.commit(|d| {
            d.validation
                .validation_request(&ctx, req.validator_id, req.server_id, data_hash.0)
                .map(|()| true)
        })
    }

    pub fn respond_validation(&self, req: &RespondValidationRequest) -> RegistryResult<Receipt<bool>> {
        let ctx = call_context(&req.caller, None)?;
        let data_hash: DomainBytes32 = req.data_hash.parse()?;
        let response = u8::try_from(req.response).map_err(|_| RegistryError::InvalidResponse {
            response: req.response,
            scheme: self.deployment.validation.response_scheme(),
        })?;
        self.commit(|d| {
            d.validation
                .validation_response(&ctx, data_hash.0, response)
                .map(|()| true)
        })
    }

    pub fn validation_request_info(&self, data_hash: &str) -> RegistryResult<ValidationRequestView> {
        let data_hash: DomainBytes32 = data_hash.parse()?;
        let request = self.deployment.validation.get_validation_request(data_hash.0)?;
        let status = self.deployment.validation.validation_status(data_hash.0);
        Ok(request_view(&request, status.as_ref()))
    }

    fn indexed_event_count(&self) -> u64 {
        match self.db.count_events(self.deployment_id) {
            Ok(count) => count,
            Err(e) => {
                log::error!("[Service] Event index unavailable: {}", e);
                0
            }
        }
    }

    pub fn status(&self) -> ServiceStatus {
        let identity = &self.deployment.identity;
        ServiceStatus {
            running: true,
            uptime_secs: self.start_time.elapsed().as_secs(),
            height: self.deployment.height(),
            agent_count: identity.get_agent_count(),
            event_count: self.deployment.journal.latest_seq(),
            indexed_event_count: self.indexed_event_count(),
            registration_fee: identity.registration_fee().to_string(),
            collected_fees: identity.collected_fees().to_string(),
            expiration_window: self.deployment.validation.expiration_window(),
            expiry_boundary: self.config.expiry_boundary.to_string(),
            response_scheme: self.deployment.validation.response_scheme().to_string(),
        }
    }
}

fn call_context(caller: &str, value: Option<&str>) -> RegistryResult<CallContext> {
    let caller: DomainEthAddress = caller.parse()?;
    let ctx = CallContext::new(caller.0);
    Ok(match value {
        Some(v) => ctx.with_value(v.parse::<DomainWei>()?.0),
        None => ctx,
    })
}

fn agent_view(agent: AgentInfo) -> AgentView {
    AgentView {
        agent_id: agent.agent_id,
        agent_domain: agent.agent_domain,
        agent_address: DomainEthAddress(agent.agent_address).to_string(),
    }
}

fn request_view(request: &ValidationRequest, status: &str) -> ValidationRequestView {
    ValidationRequestView {
        data_hash: DomainBytes32(request.data_hash).to_hex(),
        validator_id: request.validator_id,
        server_id: request.server_id,
        created_at_height: request.created_at_height,
        responded: request.responded,
        response: request.response,
        responded_at_height: request.responded_at_height,
        status: status.to_string(),
    }
}

fn event_entry(entry: &JournalEntry) -> Result<EventEntry, String> {
    Ok(EventEntry {
        seq: entry.seq,
        height: entry.height,
        event_type: entry.event.name().to_string(),
        recorded_at: entry.recorded_at.to_rfc3339(),
        payload: serde_json::to_value(&entry.event).map_err(|e| e.to_string())?,
    })
}

pub fn status_code(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::InsufficientFee { .. } => StatusCode::PAYMENT_REQUIRED,
        RegistryError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => match err.category() {
            ErrorCategory::Uniqueness | ErrorCategory::Temporal => StatusCode::CONFLICT,
            ErrorCategory::Authorization => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Range => StatusCode::BAD_REQUEST,
            ErrorCategory::Admission => StatusCode::PAYMENT_REQUIRED,
            ErrorCategory::Wiring => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn reply<T: Serialize>(result: RegistryResult<T>) -> RpcReply<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(RpcResponse::ok(data))),
        Err(e) => {
            log::debug!("[Service] Rejected call ({}): {}", e.category(), e);
            (
                status_code(&e),
                Json(RpcResponse::err_kind(e.category().as_ref(), e.to_string())),
            )
        }
    }
}

// POST /rpc/identity/register
pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAgentRequest>,
) -> RpcReply<Receipt<u64>> {
    reply(state.register_agent(&req))
}

// POST /rpc/identity/update
pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateAgentRequest>,
) -> RpcReply<Receipt<bool>> {
    reply(state.update_agent(&req))
}

// POST /rpc/identity/get
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetAgentRequest>,
) -> RpcReply<AgentView> {
    reply(state.deployment.identity.get_agent(req.agent_id).map(agent_view))
}

// POST /rpc/identity/resolve_domain
pub async fn resolve_domain(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveDomainRequest>,
) -> RpcReply<AgentView> {
    reply(state.deployment.identity.resolve_by_domain(&req.domain).map(agent_view))
}

// POST /rpc/identity/resolve_address
pub async fn resolve_address(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveAddressRequest>,
) -> RpcReply<AgentView> {
    let result = req
        .address
        .parse::<DomainEthAddress>()
        .and_then(|a| state.deployment.identity.resolve_by_address(a.0))
        .map(agent_view);
    reply(result)
}

// GET /rpc/identity/count
pub async fn agent_count(State(state): State<Arc<AppState>>) -> RpcReply<AgentCount> {
    reply(Ok(AgentCount {
        count: state.deployment.identity.get_agent_count(),
    }))
}

// POST /rpc/reputation/accept
pub async fn accept_feedback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptFeedbackRequest>,
) -> RpcReply<Receipt<String>> {
    reply(state.accept_feedback(&req))
}

// POST /rpc/reputation/authorized
pub async fn feedback_authorized(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedbackPairRequest>,
) -> RpcReply<FeedbackAuthView> {
    let (authorized, auth_id) = state
        .deployment
        .reputation
        .is_feedback_authorized(req.client_id, req.server_id);
    reply(Ok(FeedbackAuthView {
        authorized,
        auth_id: DomainBytes32(auth_id).to_hex(),
    }))
}

// POST /rpc/validation/request
pub async fn request_validation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenValidationRequest>,
) -> RpcReply<Receipt<bool>> {
    reply(state.request_validation(&req))
}

// POST /rpc/validation/respond
pub async fn respond_validation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RespondValidationRequest>,
) -> RpcReply<Receipt<bool>> {
    reply(state.respond_validation(&req))
}

// POST /rpc/validation/pending
pub async fn validation_pending(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataHashRequest>,
) -> RpcReply<PendingView> {
    let result = req.data_hash.parse::<DomainBytes32>().map(|hash| {
        let (exists, pending) = state.deployment.validation.is_validation_pending(hash.0);
        PendingView { exists, pending }
    });
    reply(result)
}

// POST /rpc/validation/response
pub async fn validation_response(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataHashRequest>,
) -> RpcReply<ValidationResponseView> {
    let result = req.data_hash.parse::<DomainBytes32>().map(|hash| {
        let (has_response, response) = state.deployment.validation.get_validation_response(hash.0);
        ValidationResponseView {
            has_response,
            response,
        }
    });
    reply(result)
}

// POST /rpc/validation/request_info
pub async fn validation_request_info(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataHashRequest>,
) -> RpcReply<ValidationRequestView> {
    reply(state.validation_request_info(&req.data_hash))
}

// POST /rpc/validation/result
pub async fn validation_result(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DataHashRequest>,
) -> RpcReply<ValidationResult> {
    let result = req
        .data_hash
        .parse::<DomainBytes32>()
        .map(|hash| state.deployment.validation.validation_result(hash.0));
    reply(result)
}

// GET /rpc/events?since=N&limit=M
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> RpcReply<Vec<EventEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_PAGE).min(MAX_EVENT_PAGE);
    match state
        .db
        .events_since(state.deployment_id, query.since.unwrap_or(0), limit)
    {
        Ok(events) => (StatusCode::OK, Json(RpcResponse::ok(events))),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e))),
    }
}

// GET /rpc/status
pub async fn status(State(state): State<Arc<AppState>>) -> RpcReply<ServiceStatus> {
    (StatusCode::OK, Json(RpcResponse::ok(state.status())))
}
