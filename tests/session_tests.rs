// Session lifecycle tests against a local one-shot HTTP stub.
//
// The stub counts login exchanges so reuse and refresh behavior can be
// asserted without touching a real upstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use callscribe::api::{LoginProvider, VoipApiCredentials};
use callscribe::{AuthToken, Error, NetsapiensClient, PeerlogicClient};
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct ApiStub {
    base_url: String,
    logins: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

/// Serves canned responses: every POST is treated as a login exchange,
/// anything else gets `other_body`. Connections are closed after one
/// response so each request is visible to the counters.
async fn spawn_stub(
    login_status: &'static str,
    login_body: &'static str,
    other_body: &'static str,
) -> ApiStub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let logins = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(AtomicUsize::new(0));

    let login_counter = Arc::clone(&logins);
    let request_counter = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let login_counter = Arc::clone(&login_counter);
            let request_counter = Arc::clone(&request_counter);
            tokio::spawn(async move {
                let head = read_request(&mut socket).await;
                request_counter.fetch_add(1, Ordering::SeqCst);

                let is_login =
                    head.starts_with("POST /login") || head.contains("oauth2/token");
                let (status, body) = if is_login {
                    login_counter.fetch_add(1, Ordering::SeqCst);
                    (login_status, login_body)
                } else {
                    ("200 OK", other_body)
                };

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    ApiStub {
        base_url,
        logins,
        requests,
    }
}

/// Reads one request (head plus content-length body) and returns the head.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::from_utf8_lossy(&buf).to_string();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let mut body_read = buf.len() - (header_end + 4);
    while body_read < content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        body_read += n;
    }

    head
}

const LIVE_TOKEN: &str = r#"{"access_token": "tok-abc", "expires_in": 3600, "scope": "worker"}"#;
const EXPIRED_TOKEN: &str = r#"{"access_token": "tok-old", "expires_in": 0}"#;

#[tokio::test]
async fn unexpired_session_is_reused_without_a_second_login() {
    let stub = spawn_stub("200 OK", LIVE_TOKEN, "{}").await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    client.ensure_session().await.unwrap();
    client.ensure_session().await.unwrap();

    assert_eq!(stub.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_token_forces_one_fresh_login() {
    let stub = spawn_stub("200 OK", EXPIRED_TOKEN, "{}").await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    client.ensure_session().await.unwrap();
    client.ensure_session().await.unwrap();

    // The cached token is already past its expiry skew, so each call pays
    // exactly one login.
    assert_eq!(stub.logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_drops_the_cached_session() {
    let stub = spawn_stub("200 OK", LIVE_TOKEN, "{}").await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    client.ensure_session().await.unwrap();
    client.invalidate_session().await;
    client.ensure_session().await.unwrap();

    assert_eq!(stub.logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_login_carries_endpoint_and_status() {
    let stub = spawn_stub("401 Unauthorized", "{}", "{}").await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "bad-pw");

    let err = client.ensure_session().await.unwrap_err();
    match err {
        Error::Authentication { endpoint, status, .. } => {
            assert!(endpoint.ends_with("/login"), "endpoint was {endpoint}");
            assert_eq!(status, Some(401));
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_credential_results_raise_not_found_and_stop() {
    let stub = spawn_stub("200 OK", LIVE_TOKEN, r#"{"count": 0, "results": []}"#).await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    let err = client.get_api_credentials("provider-7").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");

    // One login, one lookup, nothing after the empty page.
    assert_eq!(stub.logins.load(Ordering::SeqCst), 1);
    assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn credentials_lookup_returns_the_first_active_row() {
    let page = r#"{
        "count": 1,
        "results": [{
            "id": "cred-1",
            "voip_provider": "provider-7",
            "api_url": "https://pbx.example.com",
            "client_id": "cid",
            "client_secret": "secret",
            "username": "api-user",
            "password": "api-pw",
            "active": true
        }]
    }"#;
    let stub = spawn_stub("200 OK", LIVE_TOKEN, page).await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    let creds = client.get_api_credentials("provider-7").await.unwrap();
    assert_eq!(creds.id, "cred-1");
    assert_eq!(creds.api_url, "https://pbx.example.com");
    assert!(creds.active);
}

fn sample_credentials() -> VoipApiCredentials {
    VoipApiCredentials {
        id: "cred-1".to_string(),
        voip_provider: "provider-7".to_string(),
        api_url: "https://pbx.example.com".to_string(),
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        username: "api-user".to_string(),
        password: "api-pw".to_string(),
        active: true,
    }
}

#[tokio::test]
async fn transcript_partial_initializes_then_finalizes() {
    let stub = spawn_stub("200 OK", LIVE_TOKEN, r#"{"id": "tp-1"}"#).await;
    let client = PeerlogicClient::new(&stub.base_url, "worker", "pw");

    let partial = client
        .initialize_transcript_partial("call-1", "part-1", "word_timing", "text/plain")
        .await
        .unwrap();
    assert_eq!(partial.id, "tp-1");

    client
        .finalize_transcript_partial(&partial.id, "call-1", "part-1", "hello world", "text/plain")
        .await
        .unwrap();

    // Both operations rode the one cached session.
    assert_eq!(stub.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn netsapiens_recording_lookup_goes_through_the_session() {
    let stub = spawn_stub(
        "200 OK",
        LIVE_TOKEN,
        r#"[{"remotepath": "/recordings/abc.wav"}]"#,
    )
    .await;
    let mut creds = sample_credentials();
    creds.api_url = stub.base_url.clone();
    let client = NetsapiensClient::new(creds);

    let listing = client.get_recording_urls("orig-1", "term-1").await.unwrap();
    assert!(listing.is_array());
    assert_eq!(stub.logins.load(Ordering::SeqCst), 1);
    assert_eq!(stub.requests.load(Ordering::SeqCst), 2);
}

#[test]
fn netsapiens_login_uses_the_password_grant_shape() {
    let client = NetsapiensClient::new(sample_credentials());

    assert_eq!(client.login_url(), "https://pbx.example.com/oauth2/token/");
    let form = client.login_form();
    assert!(form.contains(&("grant_type", "password".to_string())));
    assert!(form.contains(&("client_id", "cid".to_string())));
    assert!(form.contains(&("client_secret", "secret".to_string())));
    assert!(form.contains(&("username", "api-user".to_string())));
}

#[test]
fn peerlogic_login_uses_the_simple_credentials_shape() {
    let client = PeerlogicClient::new("https://api.example.com", "worker", "pw");

    assert_eq!(client.login_url(), "https://api.example.com/login");
    let form = client.login_form();
    assert_eq!(form.len(), 2);
    assert!(form.contains(&("username", "worker".to_string())));
    assert!(form.contains(&("password", "pw".to_string())));
}

#[test]
fn token_parsing_requires_an_access_token() {
    let err = AuthToken::from_login_response("https://x/login", &json!({"expires_in": 10}))
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");

    let err = AuthToken::from_login_response("https://x/login", &json!({"access_token": ""}))
        .unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
}

#[test]
fn token_expiry_honors_the_refresh_skew() {
    let token = AuthToken::from_login_response(
        "https://x/login",
        &json!({"access_token": "tok", "expires_in": 3600}),
    )
    .unwrap();
    assert!(!token.is_expired(Utc::now()));
    // Within the skew window the token counts as expired.
    assert!(token.is_expired(Utc::now() + Duration::seconds(3590)));

    let token = AuthToken::from_login_response(
        "https://x/login",
        &json!({"access_token": "tok"}),
    )
    .unwrap();
    // No advertised expiry: live until invalidated.
    assert!(!token.is_expired(Utc::now() + Duration::days(365)));
}
