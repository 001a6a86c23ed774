//! Integration tests for the request pipeline against a mock HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pokeforge_rs::{
    AuthConfig, ClientConfig, Error, PokeForgeClient, RequestDescriptor, RetryConfig,
};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Config pointed at the mock server with fast backoff.
fn test_config(server: &MockServer) -> ClientConfig {
    init_logging();
    ClientConfig::default()
        .with_base_url(server.uri())
        .with_retry(
            RetryConfig::default()
                .with_base_delay(Duration::from_millis(10))
                .with_max_delay(Duration::from_secs(30)),
        )
}

fn client_with(config: ClientConfig) -> PokeForgeClient {
    PokeForgeClient::new(config).expect("client builds")
}

#[tokio::test]
async fn test_retryable_statuses_exhaust_all_attempts() {
    for status in [429u16, 500, 502, 503] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Cards"))
            .respond_with(ResponseTemplate::new(status))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_with(test_config(&server).with_max_retries(2));
        let result = client
            .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
            .await;

        let err = result.expect_err("must fail after retries");
        assert_eq!(err.status(), Some(status), "status {status}");
        server.verify().await;
    }
}

#[tokio::test]
async fn test_non_retryable_statuses_make_single_attempt() {
    for status in [400u16, 401, 403, 404] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Cards"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(test_config(&server).with_max_retries(3));
        let result = client
            .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
            .await;

        let err = result.expect_err("must fail immediately");
        assert_eq!(err.status(), Some(status), "status {status}");
        server.verify().await;
    }
}

#[tokio::test]
async fn test_succeeds_after_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(test_config(&server).with_max_retries(3));
    let body = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect("fourth attempt succeeds")
        .expect("json body");

    assert_eq!(body, serde_json::json!({"ok": true}));
    server.verify().await;
}

#[tokio::test]
async fn test_retry_after_hint_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server).with_max_retries(1));
    let started = Instant::now();
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect("succeeds after waiting out the hint");
    let elapsed = started.elapsed();

    // Local base delay is 10ms; only the server hint explains a ~1s wait.
    assert!(elapsed >= Duration::from_millis(950), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "waited {elapsed:?}");
}

#[tokio::test]
async fn test_rate_limit_error_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "5")
                .set_body_json(serde_json::json!({"title": "Too Many Requests"})),
        )
        .mount(&server)
        .await;

    let client = client_with(test_config(&server).with_max_retries(0));
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect_err("rate limited");

    match err {
        Error::RateLimit {
            message,
            retry_after,
            ..
        } => {
            assert_eq!(message, "Too Many Requests");
            assert_eq!(retry_after, Some(Duration::from_secs(5)));
        }
        other => panic!("expected RateLimit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_terminates_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(test_config(&server).with_max_retries(3));
    let started = Instant::now();
    let err = client
        .request::<serde_json::Value>(
            RequestDescriptor::get("/Slow").timeout(Duration::from_millis(100)),
        )
        .await
        .expect_err("deadline fires first");

    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_millis(400));
    server.verify().await;
}

#[tokio::test]
async fn test_timeout_covers_stalled_body_read() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Headers arrive promptly; the promised body never does.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await;
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n",
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_max_retries(0);
    let client = PokeForgeClient::new(config).unwrap();

    let started = Instant::now();
    let err = client
        .request::<serde_json::Value>(
            RequestDescriptor::get("/Cards").timeout(Duration::from_millis(100)),
        )
        .await
        .expect_err("body never completes");

    assert!(matches!(err, Error::Timeout { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_no_retry_flag_makes_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(test_config(&server).with_max_retries(3));
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards").no_retry())
        .await
        .expect_err("fails without retrying");

    assert_eq!(err.status(), Some(503));
    server.verify().await;
}

#[tokio::test]
async fn test_dynamic_token_provider_invoked_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let auth = AuthConfig::dynamic(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move { format!("token-{n}") }
    });

    let client = client_with(test_config(&server).with_auth(auth).with_max_retries(2));
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect("third attempt succeeds");

    // Two retries means three attempts, each with a fresh token.
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let requests = server.received_requests().await.expect("recording enabled");
    let bearers: Vec<_> = requests
        .iter()
        .map(|r| {
            r.headers
                .get("authorization")
                .expect("authorization header")
                .to_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(bearers, vec!["Bearer token-0", "Bearer token-1", "Bearer token-2"]);
}

#[tokio::test]
async fn test_authorization_header_omitted_when_unconfigured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_static_token_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with(
        test_config(&server).with_auth(AuthConfig::static_token("jwt-abc")),
    );
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap(),
        "Bearer jwt-abc"
    );
}

#[tokio::test]
async fn test_set_token_takes_effect_for_later_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with(
        test_config(&server).with_auth(AuthConfig::static_token("old-token")),
    );
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .unwrap();
    client.set_token("new-token").await;
    client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let bearer = |i: usize| {
        requests[i]
            .headers
            .get("authorization")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    };
    assert_eq!(bearer(0), "Bearer old-token");
    assert_eq!(bearer(1), "Bearer new-token");
}

#[tokio::test]
async fn test_array_query_values_repeat_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    client
        .request::<serde_json::Value>(
            RequestDescriptor::get("/Cards")
                .query("rarity", vec!["Rare", "Common"])
                .query_opt("search", None::<&str>),
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default();
    assert!(query.contains("rarity=Rare"), "query was {query}");
    assert!(query.contains("rarity=Common"), "query was {query}");
    assert!(!query.contains("search"), "query was {query}");
}

#[tokio::test]
async fn test_not_found_message_uses_problem_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            serde_json::json!({"title": "Not Found", "detail": "Card not found"}),
        ))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards/missing"))
        .await
        .expect_err("404");

    match err {
        Error::NotFound { message, problem } => {
            assert_eq!(message, "Not Found");
            assert_eq!(
                problem.unwrap().detail.as_deref(),
                Some("Card not found")
            );
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_error_body_falls_back_to_synthesized_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(400).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect_err("400");

    match err {
        Error::Validation { message, problem, .. } => {
            assert_eq!(message, "HTTP 400 error");
            assert!(problem.is_none());
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_content_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/Collections/42"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    let body = client
        .request::<serde_json::Value>(RequestDescriptor::delete("/Collections/42"))
        .await
        .unwrap();
    assert!(body.is_none());
}

#[tokio::test]
async fn test_non_json_success_resolves_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/export"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/plain")
                .set_body_string("plain text"),
        )
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    let body = client
        .request::<serde_json::Value>(RequestDescriptor::get("/export"))
        .await
        .unwrap();
    assert!(body.is_none());
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let client = client_with(test_config(&server));
    let started = Instant::now();
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Slow").cancel_token(token))
        .await
        .expect_err("cancelled");

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn test_cancellation_aborts_retry_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    // Long backoff so the cancel lands mid-sleep, after the 503.
    let config = test_config(&server)
        .with_max_retries(3)
        .with_retry(RetryConfig::default().with_base_delay(Duration::from_secs(5)));
    let client = client_with(config);

    let started = Instant::now();
    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards").cancel_token(token))
        .await
        .expect_err("cancelled during backoff");

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_millis(500));
    server.verify().await;
}

#[tokio::test]
async fn test_connection_failure_surfaces_as_network_error() {
    // Bind a port and drop the listener so the address refuses connections.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_max_retries(1)
        .with_retry(RetryConfig::default().with_base_delay(Duration::from_millis(5)));
    let client = PokeForgeClient::new(config).unwrap();

    let err = client
        .request::<serde_json::Value>(RequestDescriptor::get("/Cards"))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, Error::Network { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Sets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 2})))
        .mount(&server)
        .await;

    let client = client_with(test_config(&server));
    let (cards, sets) = tokio::join!(
        client.request::<serde_json::Value>(RequestDescriptor::get("/Cards")),
        client.request::<serde_json::Value>(RequestDescriptor::get("/Sets")),
    );

    assert!(cards.is_ok());
    assert!(sets.is_ok());
}
