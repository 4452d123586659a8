use braincraft_core::{ApiClient, ApiError, ChatBackend, DiagramKind, Logger};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Duration::from_secs(5), Logger::quiet("ApiClient")).unwrap()
}

#[tokio::test]
async fn test_send_message_with_diagram() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({ "message": "draw a login flow" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Here is your diagram.",
            "status": "success",
            "diagram": { "code": "graph TD\nA-->B", "type": "flowchart" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).send_message("draw a login flow").await.unwrap();
    assert_eq!(reply.response, "Here is your diagram.");
    assert_eq!(reply.status, "success");
    let diagram = reply.diagram.unwrap();
    assert_eq!(diagram.code, "graph TD\nA-->B");
    assert_eq!(diagram.kind, DiagramKind::Flowchart);
}

#[tokio::test]
async fn test_send_message_without_diagram() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Hi!",
            "status": "success"
        })))
        .mount(&server)
        .await;

    let reply = client_for(&server).send_message("hello").await.unwrap();
    assert!(reply.diagram.is_none());
}

#[tokio::test]
async fn test_server_error_carries_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "model overloaded" })))
        .mount(&server)
        .await;

    let err = client_for(&server).send_message("hello").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Server {
            status: 500,
            message: "model overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).send_message("hello").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ApiClient::new(&uri, Duration::from_secs(2), Logger::quiet("ApiClient")).unwrap();
    let err = client.send_message("hello").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_health_reports_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    assert!(client_for(&server).check_health().await);
}

#[tokio::test]
async fn test_health_down_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "down" })))
        .mount(&server)
        .await;

    assert!(!client_for(&server).check_health().await);
}

#[tokio::test]
async fn test_health_never_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    assert!(!client_for(&server).check_health().await);

    let garbled = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{status"))
        .mount(&garbled)
        .await;
    assert!(!client_for(&garbled).check_health().await);

    let uri = garbled.uri();
    drop(garbled);
    let offline = ApiClient::new(&uri, Duration::from_secs(2), Logger::quiet("ApiClient")).unwrap();
    assert!(!offline.check_health().await);
}

#[tokio::test]
async fn test_synthesize_speech() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .and(body_json(json!({ "text": "Here is your diagram." })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "audio_base64": "SUQzBAA=" })))
        .mount(&server)
        .await;

    let audio = client_for(&server).synthesize_speech("Here is your diagram.").await.unwrap();
    assert_eq!(audio, "SUQzBAA=");
}

#[tokio::test]
async fn test_synthesize_speech_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client_for(&server).synthesize_speech("hi").await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_transcribe_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .and(body_json(json!({ "audio_base64": "UklGRg==" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "draw a pie chart" })))
        .mount(&server)
        .await;

    let text = client_for(&server).transcribe_audio("UklGRg==").await.unwrap();
    assert_eq!(text, "draw a pie chart");
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    let client = ApiClient::new(&format!("{}/", server.uri()), Duration::from_secs(5), Logger::quiet("ApiClient")).unwrap();
    assert!(client.check_health().await);
}
