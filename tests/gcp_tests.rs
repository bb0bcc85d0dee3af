// Platform client tests against a local stand-in for the storage and speech
// REST endpoints.

use std::sync::Arc;

use callscribe::gcp::{SpeechClient, StaticTokenSource, StorageClient};
use callscribe::{Error, RecognitionJobSpec};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned response per connection.
async fn spawn_endpoint(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                drain_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    base_url
}

/// Reads one full request (head plus content-length body) so the client is
/// never cut off mid-write.
async fn drain_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
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
}

fn tokens() -> Arc<StaticTokenSource> {
    Arc::new(StaticTokenSource::new("test-token"))
}

#[tokio::test]
async fn upload_returns_the_gs_uri() {
    let base = spawn_endpoint("200 OK", r#"{"name": "part-1.wav"}"#).await;
    let storage = StorageClient::new(tokens()).with_upload_base(base);

    let uri = storage
        .upload_bytes("pcm-bucket", "part-1.wav", vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(uri, "gs://pcm-bucket/part-1.wav");
}

#[tokio::test]
async fn rejected_upload_is_a_submission_error() {
    let base = spawn_endpoint("500 Internal Server Error", "{}").await;
    let storage = StorageClient::new(tokens()).with_upload_base(base);

    let err = storage
        .upload_bytes("pcm-bucket", "part-1.wav", vec![1, 2, 3])
        .await
        .unwrap_err();
    match err {
        Error::Submission { uri, .. } => assert_eq!(uri, "gs://pcm-bucket/part-1.wav"),
        other => panic!("expected Submission, got {other:?}"),
    }
}

#[tokio::test]
async fn accepted_job_returns_without_waiting_for_completion() {
    let base = spawn_endpoint("200 OK", r#"{"name": "operations/recognize-123"}"#).await;
    let speech = SpeechClient::new(tokens()).with_endpoint(base);

    let spec = RecognitionJobSpec::new("gs://pcm/in.wav", "gs://raw/out.json", 8000);
    // Returns as soon as the operation is accepted; nothing polls it.
    speech.submit(&spec).await.unwrap();
}

#[tokio::test]
async fn rejected_job_names_the_destination() {
    let base = spawn_endpoint("400 Bad Request", "{}").await;
    let speech = SpeechClient::new(tokens()).with_endpoint(base);

    let spec = RecognitionJobSpec::new("gs://pcm/in.wav", "gs://raw/out.json", 8000);
    let err = speech.submit(&spec).await.unwrap_err();
    match err {
        Error::Submission { uri, .. } => assert_eq!(uri, "gs://raw/out.json"),
        other => panic!("expected Submission, got {other:?}"),
    }
}
