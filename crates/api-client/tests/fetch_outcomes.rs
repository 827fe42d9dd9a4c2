//! Integration tests for `ResearchApi` against a scripted HTTP server.
//!
//! Each test serves exactly one canned HTTP response and asserts how
//! the client maps it, in particular the result-fetch status mapping:
//! 400 and 404 are the not-ready window after completion, not errors.

use assert_matches::assert_matches;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tempest_api::{ApiError, ResearchApi};
use tempest_core::FetchOutcome;

/// Bind a listener and serve one canned response on the first
/// connection. Returns the base URL to point the client at.
async fn serve_one(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");

        // Read the request head; the requests under test carry no body.
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.expect("read request");
            request.extend_from_slice(&buf[..n]);
            if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\n\
             content-type: application/json\r\n\
             content-length: {}\r\n\
             connection: close\r\n\
             \r\n\
             {body}",
            body.len(),
        );
        stream
            .write_all(response.as_bytes())
            .await
            .expect("write response");
    });

    format!("http://{addr}")
}

const ARTIFACT_BODY: &str = r##"{
    "job_id": "job-1",
    "title": "Ransomware in 2026",
    "content": "# Report",
    "sources": ["https://example.com/advisory"],
    "created_at": "2026-08-23T12:00:00Z",
    "output_format": "research_report"
}"##;

// ---------------------------------------------------------------------------
// Test: 400 on the result endpoint is the not-completed-yet window
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_400_maps_to_not_ready() {
    let base_url = serve_one("400 Bad Request", r#"{"detail":"not completed"}"#).await;
    let api = ResearchApi::new(base_url);

    let outcome = api.fetch_artifact("job-1").await.expect("fetch");
    assert_matches!(outcome, FetchOutcome::NotReady);
}

// ---------------------------------------------------------------------------
// Test: 404 on the result endpoint is the write-after-notify race
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_404_maps_to_not_ready() {
    let base_url = serve_one("404 Not Found", r#"{"detail":"no result"}"#).await;
    let api = ResearchApi::new(base_url);

    let outcome = api.fetch_artifact("job-1").await.expect("fetch");
    assert_matches!(outcome, FetchOutcome::NotReady);
}

// ---------------------------------------------------------------------------
// Test: a 2xx artifact body yields Ready
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_2xx_yields_ready_artifact() {
    let base_url = serve_one("200 OK", ARTIFACT_BODY).await;
    let api = ResearchApi::new(base_url);

    match api.fetch_artifact("job-1").await.expect("fetch") {
        FetchOutcome::Ready(artifact) => {
            assert_eq!(artifact.job_id, "job-1");
            assert_eq!(artifact.title, "Ransomware in 2026");
            assert_eq!(artifact.sources.len(), 1);
        }
        FetchOutcome::NotReady => panic!("Expected Ready for a 200 response"),
    }
}

// ---------------------------------------------------------------------------
// Test: other non-2xx statuses are real errors, not a waiting state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn result_500_is_an_api_error() {
    let base_url = serve_one("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
    let api = ResearchApi::new(base_url);

    let err = api.fetch_artifact("job-1").await.expect_err("must fail");
    assert_matches!(err, ApiError::Api { status: 500, .. });
}

// ---------------------------------------------------------------------------
// Test: a status pull parses into a job snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_pull_parses_snapshot() {
    let base_url = serve_one(
        "200 OK",
        r#"{"job_id":"job-1","status":"generating","percent":90,"current_step":"rendering"}"#,
    )
    .await;
    let api = ResearchApi::new(base_url);

    let snapshot = api.job_status("job-1").await.expect("status pull");
    assert_eq!(snapshot.job_id, "job-1");
    assert_eq!(snapshot.status, tempest_core::JobStatus::Generating);
    assert_eq!(snapshot.percent, 90);
}
