#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cadastre_adapter::{
    ActorOpRequest, AdapterRejection, AdapterRuntime, DemoFulfillRequest, DemoSealRequest,
    DisclosureRequest, OracleCallbackRequest, SetCooldownRequest, SubmitRecordRequest,
    TargetActorRequest,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = env::var("CADASTRE_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let bind = env::var("CADASTRE_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let adapter = AdapterRuntime::default_from_env()?;
    let demo_oracle = adapter.demo_oracle_enabled();
    let runtime: SharedRuntime = Arc::new(Mutex::new(adapter));

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/registry", get(registry_state))
        .route("/v1/registry/pause", post(pause))
        .route("/v1/registry/unpause", post(unpause))
        .route("/v1/registry/cooldown", post(set_cooldown))
        .route("/v1/registry/ownership", post(transfer_ownership))
        .route("/v1/providers/add", post(add_provider))
        .route("/v1/providers/remove", post(remove_provider))
        .route("/v1/actors/:actor/roles", get(actor_roles))
        .route("/v1/batches/open", post(open_batch))
        .route("/v1/batches/close", post(close_batch))
        .route("/v1/records", post(submit))
        .route("/v1/records/:record_id", get(record))
        .route("/v1/disclosures", post(request_disclosure))
        .route("/v1/disclosures/:request_id", get(disclosure_status))
        .route("/v1/oracle/callback", post(oracle_callback))
        .route("/v1/events", get(events));
    if demo_oracle {
        warn!("demo oracle endpoints enabled; they reveal plaintext to any caller");
        app = app
            .route("/v1/demo/seal", post(demo_seal))
            .route("/v1/demo/fulfill", post(demo_fulfill));
    }
    let app = app.with_state(runtime);

    info!(%addr, demo_oracle, "cadastre_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

fn lock(runtime: &SharedRuntime) -> Result<MutexGuard<'_, AdapterRuntime>, Response> {
    runtime.lock().map_err(|_| {
        reject(AdapterRejection {
            status: "error".to_string(),
            outcome: "REJECTED".to_string(),
            reason: "adapter runtime lock poisoned".to_string(),
            error: None,
            reason_code: None,
            http_status: 500,
        })
    })
}

fn reject(rejection: AdapterRejection) -> Response {
    let status =
        StatusCode::from_u16(rejection.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(rejection)).into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, AdapterRejection>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(rejection) => reject(rejection),
    }
}

macro_rules! mutating_handler {
    ($name:ident, $req:ty) => {
        async fn $name(State(runtime): State<SharedRuntime>, Json(request): Json<$req>) -> Response {
            match lock(&runtime) {
                Ok(mut rt) => respond(rt.$name(request)),
                Err(resp) => resp,
            }
        }
    };
}

mutating_handler!(pause, ActorOpRequest);
mutating_handler!(unpause, ActorOpRequest);
mutating_handler!(open_batch, ActorOpRequest);
mutating_handler!(close_batch, ActorOpRequest);
mutating_handler!(set_cooldown, SetCooldownRequest);
mutating_handler!(transfer_ownership, TargetActorRequest);
mutating_handler!(add_provider, TargetActorRequest);
mutating_handler!(remove_provider, TargetActorRequest);
mutating_handler!(submit, SubmitRecordRequest);
mutating_handler!(request_disclosure, DisclosureRequest);
mutating_handler!(oracle_callback, OracleCallbackRequest);
mutating_handler!(demo_seal, DemoSealRequest);
mutating_handler!(demo_fulfill, DemoFulfillRequest);

async fn healthz(State(runtime): State<SharedRuntime>) -> Response {
    match lock(&runtime) {
        Ok(rt) => (StatusCode::OK, Json(rt.health())).into_response(),
        Err(resp) => resp,
    }
}

async fn registry_state(State(runtime): State<SharedRuntime>) -> Response {
    match lock(&runtime) {
        Ok(rt) => (StatusCode::OK, Json(rt.registry_state())).into_response(),
        Err(resp) => resp,
    }
}

async fn actor_roles(State(runtime): State<SharedRuntime>, Path(actor): Path<String>) -> Response {
    match lock(&runtime) {
        Ok(rt) => respond(rt.actor_roles(&actor)),
        Err(resp) => resp,
    }
}

async fn record(State(runtime): State<SharedRuntime>, Path(record_id): Path<u64>) -> Response {
    match lock(&runtime) {
        Ok(rt) => respond(rt.record(record_id)),
        Err(resp) => resp,
    }
}

async fn disclosure_status(
    State(runtime): State<SharedRuntime>,
    Path(request_id): Path<String>,
) -> Response {
    match lock(&runtime) {
        Ok(mut rt) => respond(rt.disclosure_status(&request_id)),
        Err(resp) => resp,
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsQuery {
    after: Option<u64>,
}

async fn events(State(runtime): State<SharedRuntime>, Query(query): Query<EventsQuery>) -> Response {
    match lock(&runtime) {
        Ok(rt) => (
            StatusCode::OK,
            Json(rt.events_since(query.after.unwrap_or(0))),
        )
            .into_response(),
        Err(resp) => resp,
    }
}
