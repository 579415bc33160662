//! Shared test helpers for API tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

use compozit_api::{AppState, build_router};
use compozit_core::config::AppConfig;
use compozit_core::types::JobId;
use compozit_entity::{JobKind, JobStatus};
use compozit_realtime::{JobEventBridge, NotificationHub};
use compozit_worker::dispatch::{self, DispatchReceiver};
use compozit_worker::inflight::InFlightJobs;
use compozit_worker::processors::StagedProcessor;
use compozit_worker::{JobQueue, JobRuntime, MemoryJobRegistry, ProcessorRegistry};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state behind the router
    pub state: AppState,
    runtime: Option<JobRuntime>,
    // held so an idle queue's channel stays open
    _receiver: Option<DispatchReceiver>,
}

fn processors() -> ProcessorRegistry {
    JobKind::ALL
        .into_iter()
        .fold(ProcessorRegistry::new(), |registry, kind| {
            registry.with(Arc::new(StagedProcessor::instant(kind)))
        })
}

impl TestApp {
    /// App with a running worker pool and instant processors.
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.worker.concurrency = 2;
        config.worker.queue_capacity = 16;

        let hub = Arc::new(NotificationHub::new(config.realtime.clone()));
        let runtime = JobRuntime::start(
            &config.worker,
            Arc::new(MemoryJobRegistry::new()),
            processors(),
            Arc::new(JobEventBridge::new(hub.clone())),
        );
        let state = AppState::new(Arc::new(config), runtime.queue(), hub);

        Self {
            router: build_router(state.clone()),
            state,
            runtime: Some(runtime),
            _receiver: None,
        }
    }

    /// App whose dispatch channel is never drained, so jobs stay `queued`.
    pub fn idle(capacity: usize) -> Self {
        let mut config = AppConfig::default();
        config.worker.queue_capacity = capacity;

        let hub = Arc::new(NotificationHub::new(config.realtime.clone()));
        let (sender, receiver) = dispatch::channel(capacity);
        let queue = Arc::new(JobQueue::new(
            Arc::new(MemoryJobRegistry::new()),
            sender,
            Arc::new(JobEventBridge::new(hub.clone())),
            Arc::new(InFlightJobs::new()),
            Arc::new(processors()),
            config.worker.clone(),
        ));
        let state = AppState::new(Arc::new(config), queue, hub);

        Self {
            router: build_router(state.clone()),
            state,
            runtime: None,
            _receiver: Some(receiver),
        }
    }

    /// Serve the router on an ephemeral local port
    pub async fn serve(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server failed");
        });
        addr
    }

    /// Make an HTTP request to the test app
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(user) = user {
            req = req.header("x-user-id", user);
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Submit a job and return its id
    pub async fn submit(&self, user: &str, body: Value) -> String {
        let response = self.request("POST", "/api/jobs", Some(body), Some(user)).await;
        assert_eq!(
            response.status,
            StatusCode::ACCEPTED,
            "Submit failed: {:?}",
            response.body
        );
        response.body["job_id"]
            .as_str()
            .expect("No job_id in submit response")
            .to_string()
    }

    /// Poll the queue until the job reaches a terminal status
    pub async fn wait_terminal(&self, id: &str) -> JobStatus {
        let id = JobId::from(id);
        for _ in 0..200 {
            if let Some(job) = self.state.queue.get(&id) {
                if job.status.is_terminal() {
                    return job.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body
    pub body: Value,
}
