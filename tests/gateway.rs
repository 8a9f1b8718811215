//! End-to-end gateway tests against mock shell and fragment origins.

mod common;

use common::{
    start_gateway, start_mock_backend, start_programmable_backend, start_streaming_backend,
};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SHELL_HTML: &str = concat!(
    "<!DOCTYPE html><html><head><title>Shell</title></head><body>",
    "<piercing-fragment-outlet fragment-id=\"news\"></piercing-fragment-outlet>",
    "<piercing-fragment-host fragment-id=\"news\"><p>pre-rendered</p></piercing-fragment-host>",
    "</body></html>"
);

const STYLES: &str = "<style>piercing-fragment-host{display:none}</style>";

fn config(shell: SocketAddr, fragment: SocketAddr, extra: &str) -> String {
    format!(
        r#"
pre_piercing_styles = "{STYLES}"

[listener]
bind_address = "127.0.0.1:0"

[shell]
origin = "http://{shell}"

[[fragments]]
id = "news"
routes = ["/news/:rest*"]
endpoint = "http://{fragment}"
pre_piercing_class_names = ["news-pending"]
forward_headers = ["x-user", "cookie"]
{extra}
"#
    )
}

/// Fragment origin that records every request it receives.
async fn recording_fragment(
    status: u16,
    content_type: &'static str,
    body: &'static str,
) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_programmable_backend(move |request| {
        log.lock().unwrap().push(request);
        async move { (status, content_type, body.to_string()) }
    })
    .await;
    (addr, seen)
}

#[tokio::test]
async fn test_shell_document_rewritten_while_streaming() {
    let shell = start_mock_backend("text/html; charset=utf-8", SHELL_HTML).await;
    let (fragment, _) = recording_fragment(200, "text/html", "").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let response = reqwest::get(format!("http://{gateway}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().get(CONTENT_LENGTH).is_none());
    assert!(response.headers().contains_key("x-request-id"));

    let body = response.text().await.unwrap();
    assert!(body.starts_with(&format!(
        "<!DOCTYPE html><html><head>{STYLES}<title>Shell</title></head>"
    )));
    assert_eq!(body.matches(STYLES).count(), 1);
    assert!(body.contains(
        r#"<piercing-fragment-host class="news-pending" fragment-id="news"><p>pre-rendered</p>"#
    ));
}

#[tokio::test]
async fn test_origins_asked_for_uncompressed_bodies() {
    let (shell, shell_seen) = recording_fragment(200, "text/html", SHELL_HTML).await;
    let (fragment, fragment_seen) = recording_fragment(200, "text/html", "<p>news</p>").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("http://{gateway}/"))
        .header("accept-encoding", "gzip, br")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body.matches(STYLES).count(), 1);

    client
        .get(format!("http://{gateway}/news/a"))
        .header("accept-encoding", "gzip, br")
        .send()
        .await
        .unwrap();

    for seen in [shell_seen, fragment_seen] {
        let request = seen.lock().unwrap()[0].to_ascii_lowercase();
        assert!(request.contains("accept-encoding: identity"));
        assert!(!request.contains("gzip"));
    }
}

#[tokio::test]
async fn test_client_disconnect_cancels_origin_stream() {
    let (shell, written) = start_streaming_backend(200, Duration::from_millis(20)).await;
    let (fragment, _) = recording_fragment(200, "text/plain", "").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let mut response = reqwest::get(format!("http://{gateway}/")).await.unwrap();
    let first = response.chunk().await.unwrap().unwrap();
    assert!(!first.is_empty());
    drop(response);

    // the whole document would take four seconds to stream
    let written = tokio::time::timeout(Duration::from_secs(3), written)
        .await
        .expect("origin kept streaming after the client went away")
        .unwrap();
    assert!(written < 200, "origin wrote {written} chunks");
}

#[tokio::test]
async fn test_fragment_route_forwards_only_allowlisted_headers() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, seen) = recording_fragment(200, "text/plain", "news body").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{gateway}/news/today?page=2"))
        .header("x-user", "alice")
        .header("x-secret", "hunter2")
        .header("cookie", "fragment_id=news")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "news body");

    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = requests[0].to_ascii_lowercase();
    assert!(request.starts_with("get /news/today?page=2 http/1.1"));
    assert!(request.contains("x-user: alice"));
    assert!(request.contains("cookie: fragment_id=news"));
    assert!(!request.contains("x-secret"));
    assert!(!request.contains("x-request-id"));
}

#[tokio::test]
async fn test_reserved_prefix_proxies_to_fragment() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, seen) = recording_fragment(200, "text/html", "<p>latest</p>").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let body = reqwest::get(format!("http://{gateway}/piercing-fragment/news/latest?x=1"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    // no head, body or piercing element in a partial document, so nothing is injected
    assert_eq!(body, "<p>latest</p>");
    assert!(seen.lock().unwrap()[0].starts_with("GET /latest?x=1 HTTP/1.1"));

    let response = reqwest::get(format!("http://{gateway}/piercing-fragment/unknown/x"))
        .await
        .unwrap();
    // unknown ids fall through to the shell untouched
    assert_eq!(response.text().await.unwrap(), SHELL_HTML);
}

#[tokio::test]
async fn test_fallback_used_on_origin_error() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, _) = recording_fragment(500, "text/plain", "boom").await;
    let extra = r#"
[fragments.fallback]
status = 200
body = "<p>News is unavailable</p>"
"#;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, extra)).await;

    let response = reqwest::get(format!("http://{gateway}/news")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.text().await.unwrap(), "<p>News is unavailable</p>");
}

#[tokio::test]
async fn test_origin_status_surfaced_without_fallback() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, _) = recording_fragment(503, "text/html", "<p>secret stack trace</p>").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let response = reqwest::get(format!("http://{gateway}/news/a")).await.unwrap();
    assert_eq!(response.status(), 503);
    let body = response.text().await.unwrap();
    assert_eq!(body, "Failed to fetch fragment: Service Unavailable");
}

#[tokio::test]
async fn test_non_html_fragment_passes_untouched() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, _) = recording_fragment(200, "application/json", "{\"html\":\"<head>\"}").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let response = reqwest::get(format!("http://{gateway}/news/feed.json"))
        .await
        .unwrap();
    assert_eq!(response.headers()[CONTENT_LENGTH], "17");
    assert_eq!(response.text().await.unwrap(), "{\"html\":\"<head>\"}");
}

#[tokio::test]
async fn test_post_to_fragment_streams_body() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, seen) = recording_fragment(200, "text/plain", "saved").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let response = reqwest::Client::new()
        .post(format!("http://{gateway}/news/comments"))
        .body("first!")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "saved");

    let request = seen.lock().unwrap()[0].clone();
    assert!(request.starts_with("POST /news/comments HTTP/1.1"));
    assert!(request.ends_with("first!"));
}

#[tokio::test]
async fn test_unmatched_post_goes_to_shell_untouched() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, seen) = recording_fragment(200, "text/plain", "").await;
    let (gateway, _shutdown) = start_gateway(&config(shell, fragment, "")).await;

    let response = reqwest::Client::new()
        .post(format!("http://{gateway}/login"))
        .send()
        .await
        .unwrap();
    assert!(response.headers().get(CONTENT_LENGTH).is_some());
    assert_eq!(response.text().await.unwrap(), SHELL_HTML);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let shell = start_mock_backend("text/html", SHELL_HTML).await;
    let (fragment, _) = recording_fragment(200, "text/plain", "").await;
    let (gateway, shutdown) = start_gateway(&config(shell, fragment, "")).await;

    assert!(reqwest::get(format!("http://{gateway}/")).await.is_ok());
    shutdown.trigger();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(reqwest::Client::new()
        .get(format!("http://{gateway}/"))
        .header("connection", "close")
        .send()
        .await
        .is_err());
}
