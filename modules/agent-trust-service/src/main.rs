//! Agent Trust Service: standalone binary hosting one registry deployment.
//!
//! Serves the Identity, Reputation and Validation registries over a JSON RPC
//! API and mirrors every emitted event into SQLite.
//! Default: http://127.0.0.1:9110/

mod db;
mod routes;

use agent_trust::RegistryConfig;
use axum::routing::{get, post};
use routes::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let port: u16 = std::env::var("AGENT_TRUST_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9110);

    let db_path = std::env::var("AGENT_TRUST_DB_PATH")
        .unwrap_or_else(|_| "./agent_trust_events.db".to_string());

    log::info!("Opening event index at: {}", db_path);
    let database = Arc::new(db::Db::open(&db_path).expect("Failed to open database"));

    let config = RegistryConfig::from_env();
    let state = Arc::new(AppState::new(config, database).expect("Failed to start deployment"));
    log::info!("Deployment #{} started", state.deployment_id);

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        .route("/rpc/identity/register", post(routes::register_agent))
        .route("/rpc/identity/update", post(routes::update_agent))
        .route("/rpc/identity/get", post(routes::get_agent))
        .route("/rpc/identity/resolve_domain", post(routes::resolve_domain))
        .route("/rpc/identity/resolve_address", post(routes::resolve_address))
        .route("/rpc/identity/count", get(routes::agent_count))
        .route("/rpc/reputation/accept", post(routes::accept_feedback))
        .route("/rpc/reputation/authorized", post(routes::feedback_authorized))
        .route("/rpc/validation/request", post(routes::request_validation))
        .route("/rpc/validation/respond", post(routes::respond_validation))
        .route("/rpc/validation/pending", post(routes::validation_pending))
        .route("/rpc/validation/response", post(routes::validation_response))
        .route("/rpc/validation/request_info", post(routes::validation_request_info))
        .route("/rpc/validation/result", post(routes::validation_result))
        .route("/rpc/events", get(routes::events))
        .route("/rpc/status", get(routes::status))
        .with_state(state)
        .layer(cors);

    let addr = format!("127.0.0.1:{}", port);
    log::info!("Agent Trust Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
