//! HTTP-level tests for pdftotext-server.
//!
//! A real `pdftotext` is not needed: the extractor is replaced by a small
//! `sh -c` script that behaves like it: a file starting with `%PDF` is
//! "converted" by dropping its first line, anything else fails with a
//! diagnostic on stderr and exit code 1.
//!
//! Every test points the workspace root at its own temporary directory and
//! checks that it is empty again once the response has been consumed.

#![cfg(unix)]

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use futures::StreamExt;
use pdftotext_server::{router, serve_with_listener, ServerConfig};
use std::path::Path;
use std::time::{Duration, Instant};
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

const FAKE_PDFTOTEXT: &str = r#"case "$(head -c 4 "$1")" in
  %PDF) sed 1d "$1" > "$2" ;;
  *) echo "Syntax Warning: May not be a PDF file (continuing anyway)" >&2
     echo "Syntax Error: Couldn't find trailer dictionary" >&2
     exit 1 ;;
esac"#;

const SAMPLE_PDF: &[u8] = b"%PDF-1.4 fake\nPostbank\nCard Service Hamburg\nPostfach 10 12 34\n";

const BOUNDARY: &str = "pdftotext-test-boundary-7MA4YWxkTrZu0gW";

fn config_with_script(root: &Path, script: &str) -> ServerConfig {
    ServerConfig::builder()
        .extractor("sh")
        .extractor_args(["-c", script, "fake-pdftotext"])
        .workspace_root(root)
        .build()
        .expect("valid config")
}

fn fake_config(root: &Path) -> ServerConfig {
    config_with_script(root, FAKE_PDFTOTEXT)
}

/// `(field name, optional file name, content)`
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match file_name {
            Some(f) => format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            ),
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_multipart(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// Route server logs into the test harness; `RUST_LOG` picks the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn send(config: ServerConfig, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    init_tracing();
    let resp = router(config).oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

fn assert_no_residue(root: &Path) {
    let left: Vec<_> = std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(left.is_empty(), "workspace residue: {left:?}");
}

/// Wait for the extractor script to write its PID into `marker`.
async fn wait_for_pid(marker: &Path) -> u32 {
    for _ in 0..100 {
        if let Some(pid) = std::fs::read_to_string(marker)
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("extractor never wrote {}", marker.display());
}

/// True once `pid` has exited, reaped or not. Polls `/proc` for up to two
/// seconds; without procfs the process cannot be observed and this is true.
async fn process_gone(pid: u32) -> bool {
    for _ in 0..40 {
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
            return true;
        };
        let state = stat.rsplit(')').next().and_then(|s| s.split_whitespace().next());
        if matches!(state, Some("Z") | Some("X")) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_pdf_to_text() {
    let root = tempfile::tempdir().unwrap();

    let (status, headers, body) = send(
        fake_config(root.path()),
        post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Postbank\nCard Service Hamburg"), "got: {text:?}");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_convert_without_multipart_request() {
    let root = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = send(fake_config(root.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"Multipart request required.");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_convert_with_wrong_content_type() {
    let root = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Body::from(SAMPLE_PDF))
        .unwrap();

    let (status, _, body) = send(fake_config(root.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"Multipart request required.");
}

#[tokio::test]
async fn test_convert_with_multipart_missing_boundary() {
    let root = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Body::from(SAMPLE_PDF))
        .unwrap();

    let (status, _, body) = send(fake_config(root.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"Multipart request required.");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_convert_without_pdf() {
    let root = tempfile::tempdir().unwrap();

    let (status, _, body) = send(
        fake_config(root.path()),
        post_multipart(&[("foo", None, &b"bar"[..])]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"No pdf provided.");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_convert_with_invalid_pdf() {
    let root = tempfile::tempdir().unwrap();

    let (status, _, body) = send(
        fake_config(root.path()),
        post_multipart(&[("pdf", Some("pdf"), &b"bar"[..])]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("Conversion failed."), "got: {text:?}");
    assert!(text.contains("Couldn't find trailer dictionary"), "got: {text:?}");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_repeated_requests_are_identical_and_leave_nothing() {
    let root = tempfile::tempdir().unwrap();
    let config = fake_config(root.path());
    let mut first: Option<Bytes> = None;

    for _ in 0..5 {
        let (status, _, body) = send(
            config.clone(),
            post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        match first {
            None => first = Some(body),
            Some(ref expected) => assert_eq!(&body, expected),
        }
        assert_no_residue(root.path());
    }
}

#[tokio::test]
async fn test_large_output_streams_intact() {
    let root = tempfile::tempdir().unwrap();
    let mut text = String::new();
    for i in 0..40_000 {
        text.push_str(&format!("line {i}\n"));
    }
    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.extend_from_slice(text.as_bytes());

    let (status, _, body) = send(
        fake_config(root.path()),
        post_multipart(&[("pdf", Some("big.pdf"), &pdf[..])]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.len() > 4 * 64 * 1024);
    assert_eq!(&body[..], text.as_bytes());
    assert_no_residue(root.path());
}

// ── Ingestion details ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_file_name_cannot_escape_workspace() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with_script(root.path(), r#"printf '%s' "$1" > "$2""#);

    let (status, _, body) = send(
        config,
        post_multipart(&[("pdf", Some("../../escape.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let input = std::path::PathBuf::from(String::from_utf8(body.to_vec()).unwrap());
    assert!(input.starts_with(root.path()), "input outside root: {input:?}");
    assert_eq!(input.file_name().unwrap(), "escape.pdf");
    assert_eq!(input.parent().unwrap().parent().unwrap(), root.path());
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_only_first_pdf_part_is_stored() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with_script(root.path(), r#"ls "$(dirname "$1")" > "$2""#);

    let (status, _, body) = send(
        config,
        post_multipart(&[
            ("foo", None, &b"bar"[..]),
            ("pdf", Some("first.pdf"), SAMPLE_PDF),
            ("pdf", Some("second.pdf"), SAMPLE_PDF),
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"first.pdf\nfirst.pdf.txt\n");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_upload_limit_rejects_large_body() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        max_upload_bytes: Some(1024),
        ..fake_config(root.path())
    };
    let big = vec![b'x'; 16 * 1024];

    let (status, _, body) = send(config, post_multipart(&[("pdf", Some("big.pdf"), &big[..])])).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(&body[..], b"Upload too large.");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_upload_without_limit_accepts_large_body() {
    let root = tempfile::tempdir().unwrap();
    // Above axum's 2 MB default multipart limit.
    let mut pdf = b"%PDF-1.4\n".to_vec();
    pdf.extend(std::iter::repeat(b'a').take(3 * 1024 * 1024));

    let (status, _, body) = send(
        fake_config(root.path()),
        post_multipart(&[("pdf", Some("big.pdf"), &pdf[..])]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.len() >= 3 * 1024 * 1024);
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_truncated_multipart_body_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"pdf\"; filename=\"cut.pdf\"\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(SAMPLE_PDF);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, body) = send(fake_config(root.path()), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(&body[..], b"Malformed multipart request.");
    assert_no_residue(root.path());
}

// ── Resource failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_extractor_is_generic_500() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .extractor("/definitely/not/a/real/pdftotext")
        .workspace_root(root.path())
        .build()
        .unwrap();

    let (status, _, body) = send(
        config,
        post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal server error.");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_extractor_success_without_output_is_generic_500() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with_script(root.path(), "exit 0");

    let (status, _, body) = send(
        config,
        post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Internal server error.");
    assert_no_residue(root.path());
}

// ── Extractor lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_conversion_timeout_kills_extractor() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        conversion_timeout_secs: Some(1),
        ..config_with_script(root.path(), "exec sleep 5")
    };

    let started = Instant::now();
    let (status, _, body) = send(
        config,
        post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Conversion failed. Timed out after 1s.");
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_crashed_extractor_is_conversion_failure() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with_script(root.path(), r#"echo "Syntax Error: boom" >&2; kill -9 $$"#);

    let (status, _, body) = send(
        config,
        post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&body[..], b"Conversion failed. Syntax Error: boom\n");
    assert_no_residue(root.path());
}

#[tokio::test]
async fn test_disconnect_during_conversion_cleans_up() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let marker = scratch.path().join("extractor.pid");
    let script = format!(r#"echo $$ > "{}"; exec sleep 5"#, marker.display());
    let config = config_with_script(root.path(), &script);

    let request = tokio::spawn(
        router(config).oneshot(post_multipart(&[("pdf", Some("sample.pdf"), SAMPLE_PDF)])),
    );
    let pid = wait_for_pid(&marker).await;
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);

    // Dropping the in-flight handler is what hyper does when the client goes away.
    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());

    assert_no_residue(root.path());
    assert!(process_gone(pid).await, "extractor {pid} still running");
}

#[tokio::test]
async fn test_abandoned_response_cleans_up() {
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        chunk_size: 16,
        ..fake_config(root.path())
    };
    let mut pdf = b"%PDF-1.4\n".to_vec();
    pdf.extend_from_slice(&[b'z'; 1024]);

    let resp = router(config)
        .oneshot(post_multipart(&[("pdf", Some("sample.pdf"), &pdf[..])]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let mut stream = resp.into_body().into_data_stream();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 16);
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);

    drop(stream);
    assert_no_residue(root.path());
}

// ── Live server ──────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let slow = format!("sleep 1; {FAKE_PDFTOTEXT}");
    let config = config_with_script(root.path(), &slow);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_listener(listener, config, async {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/");

    let upload = |content: &'static [u8]| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let form = reqwest::multipart::Form::new().part(
                "pdf",
                reqwest::multipart::Part::bytes(content).file_name("same-name.pdf"),
            );
            let resp = client.post(&url).multipart(form).send().await.unwrap();
            (resp.status(), resp.text().await.unwrap())
        }
    };

    let a = tokio::spawn(upload(b"%PDF-1.4\nfirst document\n"));
    let b = tokio::spawn(upload(b"%PDF-1.4\nsecond document\n"));

    // Liveness stays responsive while both conversions are in flight.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let start = Instant::now();
    let health = client
        .get(format!("http://{addr}/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");
    assert!(start.elapsed() < Duration::from_millis(800));

    let (status_a, text_a) = a.await.unwrap();
    let (status_b, text_b) = b.await.unwrap();
    assert_eq!(status_a, reqwest::StatusCode::OK);
    assert_eq!(status_b, reqwest::StatusCode::OK);
    assert_eq!(text_a, "first document\n");
    assert_eq!(text_b, "second document\n");
    assert_no_residue(root.path());

    drop(client);
    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
