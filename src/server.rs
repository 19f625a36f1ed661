//!
//! keygate HTTP server
//! -------------------
//! Thin Axum surface over [`Service`]. Handlers read `email`, `pwhash`, `key` and `json`
//! from the query string, call one service operation, and answer with the JSON
//! envelope `{code, message, values}`. Status codes come from
//! [`AuthError::http_status`]; no other wire contract lives here.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::AuthError;
use crate::objects::StoredObject;
use crate::service::{DeleteAuth, Service};
use crate::storage::MemoryBackend;

const SOURCE: &str = "---          K E Y G A T E          ---\n            keygate v0.3.0\n credential, session and object service\n---                                   ---\n";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
}

/// Request parameters. Absent parameters read as empty strings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub email: String,
    pub pwhash: String,
    pub key: String,
    pub json: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

fn is_zero(c: &u16) -> bool { *c == 0 }

impl Envelope {
    pub fn values(values: Vec<Value>) -> Self { Self { values, ..Default::default() } }

    pub fn error(err: &AuthError) -> Self {
        Self { code: err.http_status(), message: err.to_string(), values: Vec::new() }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "server", "request failed: {self}");
        } else {
            debug!(target: "server", "request rejected: {self}");
        }
        (status, Json(Envelope::error(&self))).into_response()
    }
}

type ApiResult = Result<Json<Envelope>, AuthError>;

fn ok(values: Vec<Value>) -> ApiResult { Ok(Json(Envelope::values(values))) }

fn object_view(obj: &StoredObject) -> Value {
    match obj.payload_str() {
        Some(text) => json!({ "id": obj.id, "json": text, "owner": obj.owner() }),
        None => json!({ "id": obj.id, "payload_b64": obj.payload_b64(), "owner": obj.owner() }),
    }
}

/// Any origin may call the API with credentials. The request origin is echoed back
/// since a literal `*` is not allowed alongside credentials.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_credentials(true)
}

pub fn router(service: Arc<Service>) -> Router {
    Router::new()
        .route("/source", get(|| async { SOURCE }))
        .route("/admin/valid", get(admin_valid))
        .route("/admin/create", get(admin_create))
        .route("/admin/delete", get(admin_delete))
        .route("/user/create", get(user_create))
        .route("/user/delete", get(user_delete))
        .route("/user/valid", get(user_valid))
        .route("/user/login", get(user_login))
        .route("/user/logout", get(user_logout))
        .route("/object/{id}", get(object_get).put(object_put).delete(object_delete))
        .with_state(AppState { service })
        .layer(cors())
}

async fn admin_valid(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    let admin = state.service.check_admin(&p.key)?;
    info!(target: "server", "admin {:?} verified", admin.email);
    ok(vec![json!("ok")])
}

async fn admin_create(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    let key = state.service.create_admin(&p.key, &p.email, &p.pwhash)?;
    info!(target: "server", "admin {:?} created", p.email);
    ok(vec![json!({ "email": p.email, "key": key })])
}

async fn admin_delete(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    state.service.delete_admin(&p.key)?;
    ok(vec![json!({ "deleted": true })])
}

async fn user_create(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    state.service.create_user(&p.key, &p.email, &p.pwhash)?;
    info!(target: "server", "user {:?} created", p.email);
    ok(vec![json!({ "email": p.email })])
}

async fn user_delete(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    let auth = if !p.key.is_empty() {
        DeleteAuth::AdminKey(&p.key)
    } else if !p.email.is_empty() || !p.pwhash.is_empty() {
        DeleteAuth::Password(&p.pwhash)
    } else {
        return Err(AuthError::BadRequest("must pass pwhash and email, or API key".into()));
    };
    state.service.delete_user(auth, &p.email)?;
    ok(vec![json!({ "email": p.email })])
}

async fn user_valid(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    state.service.validate(&p.email, &p.key)?;
    ok(vec![json!({ "email": p.email })])
}

async fn user_login(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    let key = state.service.login(&p.email, &p.pwhash)?;
    ok(vec![json!({ "email": p.email, "key": key })])
}

async fn user_logout(State(state): State<AppState>, Query(p): Query<Params>) -> ApiResult {
    state.service.logout(&p.email, &p.key)?;
    ok(vec![json!({ "email": p.email })])
}

/// Payload comes from the `json` parameter, or the raw request body when it is absent.
async fn object_put(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<Params>,
    body: Bytes,
) -> ApiResult {
    let payload = if p.json.is_empty() { body.to_vec() } else { p.json.into_bytes() };
    let obj = state.service.put_object(&p.email, &p.key, &id, payload)?;
    ok(vec![object_view(&obj)])
}

async fn object_get(State(state): State<AppState>, Path(id): Path<String>, Query(p): Query<Params>) -> ApiResult {
    let obj = state.service.get_object(&p.email, &p.key, &id)?;
    ok(vec![object_view(&obj)])
}

async fn object_delete(State(state): State<AppState>, Path(id): Path<String>, Query(p): Query<Params>) -> ApiResult {
    state.service.delete_object(&p.email, &p.key, &id)?;
    ok(vec![json!(id)])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "server", "failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!(target: "server", "shutdown requested");
}

/// Open the backend, build the service, and serve HTTP until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let backend = MemoryBackend::from_settings(&config.persistence())
        .with_context(|| format!("While opening backend snapshot {:?}", config.snapshot_path))?;
    let service = Arc::new(Service::new(Arc::new(backend.clone()), config.session())?);

    if let Some((email, password)) = &config.bootstrap_admin {
        if let Some(key) = service.bootstrap_admin(email, password)? {
            println!("bootstrap admin {email} key: {key}");
        }
    }

    let app = router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        target: "server",
        "keygate listening on {addr}, session_timeout={:?}, snapshot={:?}",
        config.session_timeout, config.snapshot_path
    );
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    backend.save_snapshot().context("Final snapshot failed")?;
    info!(target: "server", "keygate stopped");
    Ok(())
}
