mod common;

use common::init_tracing;
use rss_relay::{
    FeedSource, FetchConfig, Fetcher, RelayError, RssFeedSource, SendConfig, SendOutcome,
    TelegramTransport, Transport,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

const TOKEN: &str = "123456:secret-token";

const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Local</title>
<item><title>Hello</title><link>https://example.com/hello</link>
<pubDate>Mon, 04 Mar 2024 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

/// Serves a single canned HTTP response and hands back the raw request.
struct OneShotServer {
    url: String,
    request: JoinHandle<String>,
}

impl OneShotServer {
    async fn start(status: &str, content_type: &str, body: &str) -> Self {
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        Self::spawn(Some(response)).await
    }

    /// Responds without Content-Length; the body ends when the socket closes.
    async fn without_length(body: &str) -> Self {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/rss+xml\r\nConnection: close\r\n\r\n{}",
            body
        );
        Self::spawn(Some(response)).await
    }

    /// Accepts the connection but never answers.
    async fn silent() -> Self {
        Self::spawn(None).await
    }

    async fn spawn(response: Option<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let request = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    socket.shutdown().await.ok();
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
            request
        });

        Self { url, request }
    }

    async fn request(self) -> String {
        self.request.await.unwrap()
    }
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn transport(api_base: &str, timeout_seconds: u64) -> TelegramTransport {
    assert_ok!(TelegramTransport::new(
        TOKEN,
        SendConfig {
            api_base: api_base.to_string(),
            timeout_seconds,
        },
    ))
}

#[test]
fn empty_bot_token_is_rejected() {
    let result = TelegramTransport::new("  ", SendConfig::default());
    assert!(matches!(result, Err(RelayError::Transport(_))));
}

#[tokio::test]
async fn accepted_message_is_delivered() {
    init_tracing();
    let server = OneShotServer::start(
        "200 OK",
        "application/json",
        r#"{"ok":true,"result":{"message_id":7}}"#,
    )
    .await;

    let outcome = transport(&format!("{}/", server.url), 10)
        .send("@news", "Hello (2024-03-04 18:00)\nhttps://example.com/hello\n[Local]")
        .await;
    assert_eq!(outcome, SendOutcome::Delivered);

    let request = server.request().await;
    assert!(request.starts_with(&format!("POST /bot{}/sendMessage ", TOKEN)));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["chat_id"], "@news");
    assert_eq!(
        json["text"],
        "Hello (2024-03-04 18:00)\nhttps://example.com/hello\n[Local]"
    );
}

#[tokio::test]
async fn rejected_message_reports_api_description() {
    init_tracing();
    let server = OneShotServer::start(
        "400 Bad Request",
        "application/json",
        r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
    )
    .await;

    match transport(&server.url, 10).send("@nobody", "hi").await {
        SendOutcome::Failed(reason) => {
            assert!(reason.contains("400"), "{}", reason);
            assert!(reason.contains("chat not found"), "{}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn unreadable_response_is_a_failure() {
    init_tracing();
    let server = OneShotServer::start("502 Bad Gateway", "text/html", "<h1>oops</h1>").await;

    let outcome = transport(&server.url, 10).send("@news", "hi").await;
    assert!(matches!(outcome, SendOutcome::Failed(_)), "{:?}", outcome);
}

#[tokio::test]
async fn unreachable_api_fails_without_leaking_token() {
    init_tracing();

    match transport("http://127.0.0.1:9", 5).send("@news", "hi").await {
        SendOutcome::Failed(reason) => assert!(!reason.contains(TOKEN), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_api_times_out() {
    init_tracing();
    let server = OneShotServer::silent().await;

    let outcome = transport(&server.url, 1).send("@news", "hi").await;
    assert_eq!(outcome, SendOutcome::TimedOut);
}

#[tokio::test]
async fn feed_source_fetches_and_parses() {
    init_tracing();
    let server = OneShotServer::start("200 OK", "application/rss+xml", RSS).await;
    let url = format!("{}/feed.xml", server.url);

    let source = assert_ok!(RssFeedSource::new(FetchConfig::default()));
    let entries = assert_ok!(source.entries(&url).await);

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].link, "https://example.com/hello");
    assert_eq!(entries[0].title, "Hello");

    let request = server.request().await;
    assert!(request.starts_with("GET /feed.xml "));
    assert!(request.to_lowercase().contains("user-agent: rss-relay/"));
}

#[tokio::test]
async fn http_error_status_is_a_fetch_error() {
    init_tracing();
    let server = OneShotServer::start("404 Not Found", "text/plain", "missing").await;
    let url = format!("{}/feed.xml", server.url);

    let fetcher = assert_ok!(Fetcher::new(FetchConfig::default()));
    match assert_err!(fetcher.fetch_feed(&url).await) {
        RelayError::Fetch { url: failed, reason } => {
            assert_eq!(failed, url);
            assert!(reason.contains("HTTP 404"), "{}", reason);
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn oversized_feed_is_rejected() {
    init_tracing();
    let server = OneShotServer::start("200 OK", "application/rss+xml", RSS).await;

    let fetcher = assert_ok!(Fetcher::new(FetchConfig {
        max_feed_size_mb: 0,
        ..FetchConfig::default()
    }));
    match assert_err!(fetcher.fetch_feed(&server.url).await) {
        RelayError::Fetch { reason, .. } => assert!(reason.contains("too large"), "{}", reason),
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_feed_is_an_error() {
    init_tracing();

    let source = assert_ok!(RssFeedSource::new(FetchConfig {
        timeout_seconds: 5,
        ..FetchConfig::default()
    }));
    assert_err!(source.entries("http://127.0.0.1:9/feed.xml").await);
}

#[tokio::test]
async fn non_feed_body_is_a_parse_error() {
    init_tracing();
    let server = OneShotServer::start("200 OK", "text/html", "<html>hi</html>").await;

    let source = assert_ok!(RssFeedSource::new(FetchConfig::default()));
    assert!(matches!(
        source.pull(&server.url).await,
        Err(RelayError::Parse(_))
    ));
}

#[tokio::test]
async fn oversized_feed_without_length_header_is_rejected() {
    init_tracing();
    let server = OneShotServer::without_length(RSS).await;

    let fetcher = assert_ok!(Fetcher::new(FetchConfig {
        max_feed_size_mb: 0,
        ..FetchConfig::default()
    }));
    match assert_err!(fetcher.fetch_feed(&server.url).await) {
        RelayError::Fetch { reason, .. } => assert!(reason.contains("too large"), "{}", reason),
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn feed_without_length_header_is_read_to_the_end() {
    init_tracing();
    let server = OneShotServer::without_length(RSS).await;

    let fetcher = assert_ok!(Fetcher::new(FetchConfig::default()));
    let content = assert_ok!(fetcher.fetch_feed(&server.url).await);
    assert_eq!(content, RSS);
}
