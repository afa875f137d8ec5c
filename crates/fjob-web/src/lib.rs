//! Axum HTTP surface: sync trigger, provider webhook, health check.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use fjob_adapters::ProviderKind;
use fjob_sync::{pipeline_from_env, Environment, SyncConfig, SyncPipeline, DEFAULT_DATASET_LIMIT};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const CRATE_NAME: &str = "fjob-web";

pub const RUN_SUCCEEDED_EVENT: &str = "ACTOR.RUN.SUCCEEDED";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    pub cron_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

impl AuthConfig {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            environment: config.environment,
            cron_secret: config.cron_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AuthRejection {
    Unauthorized,
    Misconfigured(&'static str),
}

impl AuthConfig {
    /// The shared secret is mandatory in production and not checked elsewhere.
    fn check_trigger(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        if !self.environment.is_production() {
            return Ok(());
        }
        match &self.cron_secret {
            None => Err(AuthRejection::Misconfigured("CRON_SECRET is not configured")),
            Some(secret) => bearer_matches(headers, secret),
        }
    }

    fn check_webhook(&self, headers: &HeaderMap) -> Result<(), AuthRejection> {
        match &self.webhook_secret {
            None => Ok(()),
            Some(secret) => bearer_matches(headers, secret),
        }
    }
}

fn bearer_matches(headers: &HeaderMap, secret: &str) -> Result<(), AuthRejection> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(()),
        _ => Err(AuthRejection::Unauthorized),
    }
}

/// Runtime depends only on the lengths, not on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SyncPipeline>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(pipeline: Arc<SyncPipeline>, auth: AuthConfig) -> Self {
        Self { pipeline, auth }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    event_type: String,
    #[serde(default)]
    resource: Option<WebhookResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    actor_id: Option<String>,
    #[serde(default)]
    default_dataset_id: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs/sync-apify", post(sync_trigger_handler))
        .route("/api/webhooks/apify", post(apify_webhook_handler))
        .route("/healthz", get(health_handler))
        .with_state(Arc::new(state))
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
    pub port: u16,
}

impl ServeOptions {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("FJOB_WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("FJOB_WEB_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}

pub async fn serve(config: SyncConfig, options: ServeOptions) -> anyhow::Result<()> {
    let pipeline = Arc::new(pipeline_from_env(&config).await?);
    let scheduler = Arc::clone(&pipeline).maybe_build_scheduler(&config).await?;
    if let Some(sched) = &scheduler {
        sched.start().await.context("starting scheduler")?;
        info!(cron = %config.sync_cron, "sync scheduler started");
    }

    let state = AppState::new(pipeline, AuthConfig::from_config(&config));
    let listener = TcpListener::bind((options.host.as_str(), options.port))
        .await
        .with_context(|| format!("binding {}:{}", options.host, options.port))?;
    info!(host = %options.host, port = options.port, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    serve(SyncConfig::from_env(), ServeOptions::from_env()).await
}

async fn sync_trigger_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.auth.check_trigger(&headers) {
        Ok(()) => {}
        Err(AuthRejection::Unauthorized) => return unauthorized(),
        Err(AuthRejection::Misconfigured(details)) => {
            error!(details, "sync trigger misconfigured");
            return failure("Sync failed", details.to_string());
        }
    }

    match state.pipeline.run_once().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            error!(error = %format!("{err:#}"), "sync run failed");
            failure("Sync failed", format!("{err:#}"))
        }
    }
}

async fn apify_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.auth.check_webhook(&headers).is_err() {
        return unauthorized();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "undecodable webhook payload");
            return bad_request(format!("Invalid webhook payload: {err}"));
        }
    };

    if payload.event_type != RUN_SUCCEEDED_EVENT {
        return Json(json!({
            "success": true,
            "message": format!("Ignoring event type: {}", payload.event_type),
        }))
        .into_response();
    }

    let resource = payload.resource.as_ref();
    let Some(dataset_id) = resource.and_then(|r| r.default_dataset_id.as_deref()) else {
        return bad_request("No datasetId in webhook payload".to_string());
    };
    // Opaque actor ids fall back to career-site parsing, which keeps each item's source name.
    let provider = resource
        .and_then(|r| r.actor_id.as_deref())
        .and_then(ProviderKind::from_actor_ref)
        .unwrap_or(ProviderKind::CareerSite);
    info!(
        run_id = resource.and_then(|r| r.id.as_deref()).unwrap_or("unknown"),
        dataset_id,
        provider = provider.id(),
        "processing provider webhook"
    );

    match state
        .pipeline
        .ingest_dataset(provider, dataset_id, DEFAULT_DATASET_LIMIT)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => {
            error!(error = %format!("{err:#}"), "webhook processing failed");
            failure("Webhook processing failed", format!("{err:#}"))
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

fn bad_request(error: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": error })),
    )
        .into_response()
}

fn failure(error: &str, details: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": error, "details": details })),
    )
        .into_response()
}
