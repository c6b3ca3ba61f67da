// Gate API integration tests
//
// Drives the router in-process: token validation, content resolution, the
// error view redirect and the audit trail left in the store.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use page_gate::api::ApiServer;
use page_gate::content::FsContentResolver;
use page_gate::storage::{SqlStorage, TokenStore};
use page_gate::types::{AllowedPages, Token};
use page_gate::validator::TokenValidator;
use std::fs;
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    router: Router,
    store: Arc<dyn TokenStore>,
    _content_dir: tempfile::TempDir,
}

async fn harness(tokens: Vec<Token>) -> Harness {
    let content_dir = tempfile::tempdir().unwrap();
    fs::write(content_dir.path().join("report.html"), "<h1>Quarterly report</h1>").unwrap();
    fs::write(content_dir.path().join("summary.html"), "<h1>Summary</h1>").unwrap();

    let store: Arc<dyn TokenStore> = Arc::new(SqlStorage::memory().unwrap());
    for token in tokens {
        store.put_token(token).await.unwrap();
    }

    let content = FsContentResolver::new(vec![content_dir.path().to_path_buf()]);
    let server = ApiServer::new(
        TokenValidator::new(store.clone()),
        Arc::new(content),
        "127.0.0.1:0",
    );

    Harness {
        router: server.router(),
        store,
        _content_dir: content_dir,
    }
}

fn token(value: &str, pages: &[&str]) -> Token {
    Token::new(
        value,
        Utc::now() + Duration::days(7),
        AllowedPages::new(pages.iter().copied()),
    )
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder()
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .header(header::USER_AGENT, "gate-test/1.0")
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_valid_token_serves_page_and_logs_access() {
    let h = harness(vec![token("abc", &["report"])]).await;

    let response = get(&h.router, "/t/abc/Report.html").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-robots-tag").unwrap(),
        "noindex, nofollow"
    );
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(body_text(response).await, "<h1>Quarterly report</h1>");

    let stored = h.store.find_by_value("abc").await.unwrap().unwrap();
    assert_eq!(stored.access_count, 1);
    assert_eq!(stored.access_log[0].page, "report");
    assert_eq!(stored.access_log[0].ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(stored.access_log[0].user_agent.as_deref(), Some("gate-test/1.0"));
}

#[tokio::test]
async fn test_only_first_page_segment_counts() {
    let h = harness(vec![token("abc", &["report"])]).await;

    let response = get(&h.router, "/t/abc/report/extra/segments").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_denials_redirect_with_reason() {
    let mut inactive = token("off", &["report"]);
    inactive.is_active = false;
    let mut expired = token("old", &["report"]);
    expired.expires_at = Utc::now() - Duration::days(1);

    let h = harness(vec![token("abc", &["report"]), inactive, expired]).await;

    let cases = [
        ("/t/missing/report", "TOKEN_NOT_FOUND"),
        ("/t/off/report", "TOKEN_INACTIVE"),
        ("/t/old/report", "TOKEN_EXPIRED"),
        ("/t/abc/summary", "PAGE_NOT_ALLOWED"),
    ];
    for (uri, reason) in cases {
        let response = get(&h.router, uri).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(
            location(&response),
            format!("/access-restricted?reason={}", reason),
            "{}",
            uri
        );
    }

    let stored = h.store.get_stats().await.unwrap();
    assert_eq!(stored.total_accesses, 0);
}

#[tokio::test]
async fn test_allowed_but_missing_page_redirects_not_found() {
    let h = harness(vec![token("abc", &["*"])]).await;

    let response = get(&h.router, "/t/abc/nonexistent").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/access-restricted?reason=PAGE_NOT_FOUND");

    let response = get(&h.router, "/t/abc/..%2Freport").await;
    assert_eq!(location(&response), "/access-restricted?reason=PAGE_NOT_FOUND");
}

#[tokio::test]
async fn test_access_restricted_view() {
    let h = harness(vec![]).await;

    let response = get(&h.router, "/access-restricted?reason=TOKEN_EXPIRED").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_text(response).await;
    assert!(body.contains("expired"));
    assert!(body.contains("TOKEN_EXPIRED"));

    let response = get(&h.router, "/access-restricted?reason=%3Cscript%3E").await;
    let body = body_text(response).await;
    assert!(body.contains("ACCESS_RESTRICTED"));
    assert!(!body.contains("<script>"));

    let response = get(&h.router, "/access-restricted").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_reports_store_counters() {
    let h = harness(vec![token("abc", &["report"]), token("def", &["*"])]).await;
    get(&h.router, "/t/abc/report").await;
    get(&h.router, "/t/def/summary").await;

    let response = get(&h.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tokens"], 2);
    assert_eq!(body["accesses"], 2);
    assert_eq!(body["audit_failures"], 0);
}
