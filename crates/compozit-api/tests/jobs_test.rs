//! API tests for job submission, lookup, listing, and cancellation.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use compozit_entity::JobStatus;

#[tokio::test]
async fn test_submit_and_complete() {
    let app = helpers::TestApp::new();

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({"type": "quick_render", "project_id": "p1", "payload": {"prompt": "loft"}})),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], json!("queued"));
    let id = response.body["job_id"].as_str().expect("job_id").to_string();

    assert_eq!(app.wait_terminal(&id).await, JobStatus::Completed);

    let response = app
        .request("GET", &format!("/api/jobs/{id}"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["owner_id"], json!("alice"));
    assert_eq!(response.body["type"], json!("quick_render"));
    assert_eq!(response.body["status"], json!("completed"));
    assert_eq!(response.body["progress"], json!(100));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = helpers::TestApp::idle(4);

    let response = app
        .request("POST", "/api/jobs", Some(json!({"type": "export"})), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], json!("UNAUTHORIZED"));

    let response = app.request("GET", "/api/jobs", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_submissions_are_rejected() {
    let app = helpers::TestApp::idle(4);

    for body in [
        json!({"type": "teleport"}),
        json!({"type": "export", "payload": "not an object"}),
        json!({"type": "export", "max_retries": 99}),
        json!({"project_id": "p1"}),
    ] {
        let response = app.request("POST", "/api/jobs", Some(body.clone()), Some("alice")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response.body["error"], json!("VALIDATION_ERROR"));
    }

    let stats = app.state.queue.stats();
    assert_eq!(stats.depth, 0);
    assert_eq!(stats.jobs.total(), 0);
}

#[tokio::test]
async fn test_duplicate_id_conflicts() {
    let app = helpers::TestApp::idle(4);
    app.submit("alice", json!({"type": "export", "id": "job-fixed"})).await;

    let response = app
        .request(
            "POST",
            "/api/jobs",
            Some(json!({"type": "export", "id": "job-fixed"})),
            Some("alice"),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], json!("CONFLICT"));
}

#[tokio::test]
async fn test_full_queue_returns_503_with_retry_after() {
    let app = helpers::TestApp::idle(1);
    app.submit("alice", json!({"type": "export"})).await;

    let response = app
        .request("POST", "/api/jobs", Some(json!({"type": "export"})), Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["error"], json!("QUEUE_FULL"));
    assert_eq!(
        response
            .headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok()),
        Some("1")
    );
    assert_eq!(app.state.queue.stats().jobs.total(), 1);
}

#[tokio::test]
async fn test_jobs_are_scoped_to_owner() {
    let app = helpers::TestApp::idle(4);
    let id = app.submit("alice", json!({"type": "inpainting"})).await;

    let response = app
        .request("GET", &format!("/api/jobs/{id}"), None, Some("bob"))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request("POST", &format!("/api/jobs/{id}/cancel"), None, Some("bob"))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request("GET", "/api/jobs/job-unknown", None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], json!("NOT_FOUND"));
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let app = helpers::TestApp::idle(4);
    let id = app.submit("alice", json!({"type": "style_transfer"})).await;

    let response = app
        .request("POST", &format!("/api/jobs/{id}/cancel"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], json!("cancelled"));
    assert!(response.body["completed_at"].is_string());

    let response = app
        .request("POST", &format!("/api/jobs/{id}/cancel"), None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], json!("ALREADY_TERMINAL"));
}

#[tokio::test]
async fn test_list_only_returns_callers_jobs() {
    let app = helpers::TestApp::idle(8);
    let first = app.submit("alice", json!({"type": "export"})).await;
    app.submit("alice", json!({"type": "export"})).await;
    app.submit("alice", json!({"type": "3d_model"})).await;
    app.submit("bob", json!({"type": "export"})).await;

    app.request("POST", &format!("/api/jobs/{first}/cancel"), None, Some("alice"))
        .await;

    let response = app.request("GET", "/api/jobs", None, Some("alice")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], json!(3));
    let jobs = response.body["jobs"].as_array().expect("jobs");
    assert!(jobs.iter().all(|j| j["owner_id"] == json!("alice")));

    let response = app
        .request("GET", "/api/jobs?status=cancelled", None, Some("alice"))
        .await;
    assert_eq!(response.body["total"], json!(1));
    assert_eq!(response.body["jobs"][0]["id"], json!(first));

    let response = app
        .request("GET", "/api/jobs?limit=2", None, Some("alice"))
        .await;
    assert_eq!(response.body["total"], json!(2));

    let response = app
        .request("GET", "/api/jobs?status=sleeping", None, Some("alice"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_queue_and_connections() {
    let app = helpers::TestApp::idle(8);
    app.submit("alice", json!({"type": "export"})).await;
    let (_conn, _rx) = app.state.hub.register("alice".into());

    let response = app.request("GET", "/api/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], json!("ok"));
    assert_eq!(response.body["queue"]["capacity"], json!(8));
    assert_eq!(response.body["queue"]["depth"], json!(1));
    assert_eq!(response.body["queue"]["jobs"]["queued"], json!(1));
    assert_eq!(response.body["connections"], json!(1));
    assert_eq!(response.body["users"], json!(1));
}
