#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use vidgen_api::config::{EngineConfig, LookupPolicy, ProgressMode, ServerConfig};
use vidgen_api::engine::{Orchestrator, ProgressBackend};
use vidgen_api::router::build_app_router;
use vidgen_api::state::AppState;
use vidgen_api::store::JobStore;
use vidgen_core::job::GenerationParams;
use vidgen_provider::models::{ProviderJob, ProviderProgress};
use vidgen_provider::{ProviderError, VideoProvider};

/// Poll interval used by upstream drivers under test.
pub const UPSTREAM_POLL: Duration = Duration::from_millis(100);

/// An application router plus a handle on its orchestrator for inspection.
pub struct TestApp {
    pub router: Router,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(mode: ProgressMode, lookup: LookupPolicy) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        engine: EngineConfig {
            mode,
            lookup,
            upstream_poll_interval: UPSTREAM_POLL,
            ..EngineConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Build the full application (same middleware stack as `main.rs`) in
/// simulated mode.
pub fn build_test_app(lookup: LookupPolicy) -> TestApp {
    build_app(
        test_config(ProgressMode::Simulated, lookup),
        Arc::new(FakeProvider::default()),
    )
}

/// Build the full application in upstream mode against `provider`.
pub fn build_upstream_app(provider: Arc<FakeProvider>, lookup: LookupPolicy) -> TestApp {
    build_app(test_config(ProgressMode::Upstream, lookup), provider)
}

fn build_app(config: ServerConfig, provider: Arc<dyn VideoProvider>) -> TestApp {
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(JobStore::new()),
        ProgressBackend::from_config(&config.engine, provider),
        config.engine.lookup,
        CancellationToken::new(),
    ));
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };

    TestApp {
        router: build_app_router(state, &config),
        orchestrator,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fake provider
// ---------------------------------------------------------------------------

/// One scripted provider answer for `get_job`.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(&'static str, Option<f64>),
    Completed(&'static str),
    Failed(&'static str),
    ApiFailure(u16, &'static str),
    NotFound,
}

/// In-memory provider. Created jobs are named `vid_1`, `vid_2`, ... and
/// answer `get_job` from a per-id script; the last reply repeats.
#[derive(Default)]
pub struct FakeProvider {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    created: AtomicUsize,
    pub missing_key: bool,
    pub listing: bool,
}

impl FakeProvider {
    pub fn without_key() -> Self {
        Self {
            missing_key: true,
            ..Self::default()
        }
    }

    pub fn script(&self, id: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), replies.into_iter().collect());
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn next_reply(&self, id: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::NotFound),
            None => Reply::NotFound,
        }
    }

    fn check_key(&self) -> Result<(), ProviderError> {
        if self.missing_key {
            Err(ProviderError::MissingCredentials)
        } else {
            Ok(())
        }
    }
}

fn job(id: &str, status: &str) -> ProviderJob {
    ProviderJob {
        id: id.to_string(),
        status: status.to_string(),
        progress: None,
        error: None,
        video_url: None,
        thumbnail_url: None,
    }
}

fn reply_to_job(id: &str, reply: Reply) -> Result<ProviderJob, ProviderError> {
    match reply {
        Reply::Status(status, progress) => Ok(ProviderJob {
            progress,
            ..job(id, status)
        }),
        Reply::Completed(url) => Ok(ProviderJob {
            video_url: Some(url.to_string()),
            progress: Some(100.0),
            ..job(id, "completed")
        }),
        Reply::Failed(message) => Ok(ProviderJob {
            error: serde_json::from_value(serde_json::json!({ "message": message })).ok(),
            ..job(id, "failed")
        }),
        Reply::ApiFailure(status, message) => Err(ProviderError::ApiError {
            status,
            message: message.to_string(),
        }),
        Reply::NotFound => Err(ProviderError::NotFound(id.to_string())),
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    async fn create_job(&self, _params: &GenerationParams) -> Result<ProviderJob, ProviderError> {
        self.check_key()?;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("vid_{n}");
        self.scripts
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(|| VecDeque::from([Reply::Status("queued", None)]));
        Ok(job(&id, "queued"))
    }

    async fn get_job(&self, id: &str) -> Result<ProviderJob, ProviderError> {
        self.check_key()?;
        reply_to_job(id, self.next_reply(id))
    }

    async fn get_progress(&self, id: &str) -> Result<ProviderProgress, ProviderError> {
        let remote = self.get_job(id).await?;
        Ok(ProviderProgress {
            status: Some(remote.status),
            progress: remote.progress,
        })
    }

    async fn download_url(&self, id: &str) -> Result<String, ProviderError> {
        self.check_key()?;
        match self.next_reply(id) {
            Reply::Completed(url) => Ok(url.to_string()),
            Reply::NotFound => Err(ProviderError::NotFound(id.to_string())),
            _ => Err(ProviderError::ApiError {
                status: 409,
                message: "Video is not ready".into(),
            }),
        }
    }

    fn supports_listing(&self) -> bool {
        self.listing
    }
}
