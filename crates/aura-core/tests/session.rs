//! End-to-end chat turns against a mock backend.

use aura_core::client::{AuraClient, ClientSettings, EMPTY_CHAT_REPLY};
use aura_core::reveal::{Pacing, Renderer, RevealOptions, RevealOutcome, RevealState};
use aura_core::session::{
    ChatSession, KbState, NOTICE_UPLOADED, STATUS_ERROR, STATUS_READY, STATUS_UPLOAD_DONE,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn session_for(server: &MockServer) -> ChatSession {
    let client = AuraClient::new(ClientSettings::new(&server.uri(), None).unwrap()).unwrap();
    let renderer = Renderer::new(RevealOptions {
        pacing: Pacing::instant(),
        ..RevealOptions::default()
    });
    ChatSession::new(client, renderer)
}

#[tokio::test]
async fn test_upload_then_ask_reveals_markdown_answer() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "file_id": "doc-7" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "file_id": "doc-7" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "The answer is **42**. Area is $\\pi r^2$."
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("guide.md");
    std::fs::write(&file, "# Guide\n\nForty-two.").unwrap();

    let mut session = session_for(&server);
    assert!(session.upload(file, |_| {}).await);
    assert_eq!(session.state().status(), STATUS_UPLOAD_DONE);
    assert_eq!(session.state().kb(), KbState::Loaded);
    assert_eq!(
        session.state().transcript().last().unwrap().target().text_content(),
        NOTICE_UPLOADED
    );

    let handle = session.ask("What is the answer?").await.unwrap();
    let target = handle.target().clone();
    assert_eq!(handle.finished().await, RevealOutcome::Completed);

    assert_eq!(session.state().status(), STATUS_READY);
    assert_eq!(target.state(), RevealState::Complete);
    assert_eq!(
        target.html(),
        "<p>The answer is <strong>42</strong>. Area is \
         <span class=\"math inline\">\\pi r^2</span>.</p>"
    );
    let messages = session.state().transcript().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].content(), "What is the answer?");
    assert!(!session.state().transcript().is_revealing());
}

#[tokio::test]
async fn test_failed_turn_becomes_error_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    assert!(session.ask("hello").await.is_none());
    assert_eq!(session.state().status(), STATUS_ERROR);

    let last = session.state().transcript().last().unwrap();
    assert!(last.is_error());
    assert_eq!(last.target().text_content(), "Error: HTTP 500");
    assert!(!session.state().is_sending());
}

#[tokio::test]
async fn test_empty_answer_is_revealed_as_no_response() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "" })))
        .mount(&server)
        .await;

    let mut session = session_for(&server);
    let handle = session.ask("anything?").await.unwrap();
    let target = handle.target().clone();
    assert_eq!(handle.finished().await, RevealOutcome::Completed);

    let last = session.state().transcript().last().unwrap();
    assert!(!last.is_error());
    assert_eq!(target.text_content(), EMPTY_CHAT_REPLY);
    assert_eq!(target.html(), "<p>No response</p>");
}
