//! # Publish Client Integration Tests
//!
//! Runs `PublishClient` against a wiremock target API: request shape,
//! credential scoping, rejection handling and local batch validation.

use intuf_core::{
    DeleteCredential, TargetDescriptor, TargetDescriptorBuilder, TargetPath, WriteCredential,
};
use intuf_publish::{ArtifactBundle, PublishClient, PublishConfig, PublishError, TargetBatch};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/api/v1/targets/";

fn tp(s: &str) -> TargetPath {
    TargetPath::new(s).expect("valid target path")
}

fn client(server: &MockServer) -> PublishClient {
    let url = Url::parse(&format!("{}{API_PATH}", server.uri())).unwrap();
    PublishClient::new(&PublishConfig::new(url)).expect("client build")
}

fn write_token() -> WriteCredential {
    WriteCredential::new("write-token-abc").unwrap()
}

fn delete_token() -> DeleteCredential {
    DeleteCredential::new("delete-token-xyz").unwrap()
}

fn describe(dir: &std::path::Path, name: &str, attachments: Option<&[TargetPath]>) -> TargetDescriptor {
    let file = dir.join(name);
    std::fs::write(&file, format!("contents of {name}")).unwrap();
    TargetDescriptorBuilder::default()
        .describe_as(file, tp(name), attachments)
        .unwrap()
}

/// Answer one request with `status_line` and a body cut off before its
/// declared length.
async fn truncated_response_endpoint(status_line: &'static str) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 8192];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: 256\r\nconnection: close\r\n\r\n{{\"detail\":"
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    Url::parse(&format!("http://{addr}{API_PATH}")).unwrap()
}

// ── Publish ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_posts_batch_with_write_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let layout = describe(dir.path(), "root.layout", None);
    let target = describe(dir.path(), "app.whl", Some(&[tp("root.layout")][..]));
    let expected = serde_json::to_value(TargetBatch::with_attachments(
        target.clone(),
        std::slice::from_ref(&layout),
    ))
    .unwrap();

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer write-token-abc"))
        .and(header("accept", "application/json"))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "data": { "task_id": "task-42", "targets": ["app.whl", "root.layout"] },
            "message": "Target(s) Accepted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client(&server)
        .publish(&write_token(), target, &[layout])
        .await
        .expect("publish accepted");

    assert_eq!(receipt.status, 202);
    assert_eq!(receipt.task_id.as_deref(), Some("task-42"));
    assert_eq!(receipt.targets, vec![tp("app.whl"), tp("root.layout")]);
}

#[tokio::test]
async fn publish_body_carries_attachment_list() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    for name in ["app.whl", "root.layout", "alice.pub", "build.link"] {
        std::fs::write(dir.path().join(name), name).unwrap();
    }
    let batch = ArtifactBundle {
        target: "app.whl".into(),
        layout: "root.layout".into(),
        key: "alice.pub".into(),
        links: vec!["build.link".into()],
    }
    .describe_in(dir.path(), &TargetDescriptorBuilder::default())
    .unwrap();

    client(&server)
        .publish_batch(&write_token(), &batch)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["targets"].as_array().unwrap().len(), 4);
    assert_eq!(body["targets"][0]["path"], "app.whl");
    assert_eq!(
        body["targets"][0]["info"]["custom"]["in-toto"],
        serde_json::json!(["root.layout", "build.link"])
    );
    assert_eq!(
        body["targets"][1]["info"]["custom"]["in-toto"],
        serde_json::json!(["alice.pub"])
    );
    assert!(body["targets"][2]["info"].get("custom").is_none());
}

#[tokio::test]
async fn rejected_publish_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("token lacks write:targets"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = describe(dir.path(), "root.layout", None);
    let key = describe(dir.path(), "alice.pub", None);
    let target = describe(dir.path(), "app.whl", Some(&[tp("root.layout"), tp("alice.pub")][..]));
    let err = client(&server)
        .publish(&write_token(), target, &[layout, key])
        .await
        .unwrap_err();

    match err {
        PublishError::PublishRejected { status, body, .. } => {
            assert_eq!(status, 403);
            assert_eq!(body, "token lacks write:targets");
        }
        other => panic!("expected PublishRejected, got {other:?}"),
    }

    // The artifact and both attachments went out as one request.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["targets"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn duplicate_paths_send_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = describe(dir.path(), "app.whl", None);
    let err = client(&server)
        .publish(&write_token(), target.clone(), &[target])
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::DuplicatePath(p) if p == tp("app.whl")));
}

#[tokio::test]
async fn empty_batch_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .publish_batch(&write_token(), &TargetBatch::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::EmptyBatch));
}

#[tokio::test]
async fn publish_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = describe(dir.path(), "app.whl", None);
    let err = client(&server)
        .publish(&write_token(), target, &[])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
}

// ── Retract ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn retract_deletes_with_delete_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer delete-token-xyz"))
        .and(header("accept", "application/json"))
        .and(body_json(serde_json::json!({ "targets": ["app.whl", "root.layout"] })))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "data": { "task_id": "task-43" },
            "message": "Remove Target(s) Accepted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client(&server)
        .retract(&delete_token(), &[tp("app.whl"), tp("root.layout")])
        .await
        .unwrap();
    assert_eq!(receipt.task_id.as_deref(), Some("task-43"));
    assert_eq!(receipt.message.as_deref(), Some("Remove Target(s) Accepted"));
}

#[tokio::test]
async fn retract_of_unknown_target_is_rejected_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(API_PATH))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"detail":"targets not found: a.whl"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .retract(&delete_token(), &[tp("a.whl"), tp("layout.json")])
        .await
        .unwrap_err();

    match err {
        PublishError::RetractRejected { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, r#"{"detail":"targets not found: a.whl"}"#);
        }
        other => panic!("expected RetractRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn retract_validates_locally() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let c = client(&server);
    assert!(matches!(
        c.retract(&delete_token(), &[]).await,
        Err(PublishError::EmptyBatch)
    ));
    assert!(matches!(
        c.retract(&delete_token(), &[tp("a.whl"), tp("a.whl")]).await,
        Err(PublishError::DuplicatePath(_))
    ));
}

#[tokio::test]
async fn unreadable_rejection_body_is_a_transport_error() {
    let url = truncated_response_endpoint("422 Unprocessable Entity").await;
    let client = PublishClient::new(&PublishConfig::new(url)).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = client
        .publish(&write_token(), describe(dir.path(), "app.whl", None), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Http { .. }), "got {err:?}");
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn unreadable_retract_body_is_a_transport_error() {
    let url = truncated_response_endpoint("404 Not Found").await;
    let client = PublishClient::new(&PublishConfig::new(url)).unwrap();

    let err = client
        .retract(&delete_token(), &[tp("app.whl")])
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Http { .. }), "got {err:?}");
}
