// Any change to a sealed cookie must be detected and yield an empty session.
mod common;

use common::{empty_request, options, request_with_token, session_cookie};
use sealed_cookie_session::{OutgoingResponse, get_session};
use serde_json::json;

async fn saved_token() -> String {
    let mut response = OutgoingResponse::new();
    let mut session = get_session(&empty_request(), &mut response, options())
        .await
        .expect("session loads");
    session
        .insert("user", json!({"id": 1, "admin": false}))
        .expect("insert succeeds");
    session.save().await.expect("save succeeds");
    drop(session);
    session_cookie(&response).value().to_string()
}

fn flip(token: &str, index: usize) -> String {
    token
        .char_indices()
        .map(|(i, c)| match (i == index, c) {
            (true, 'A') => 'B',
            (true, _) => 'A',
            (false, c) => c,
        })
        .collect()
}

#[tokio::test]
async fn untouched_token_loads() {
    let token = saved_token().await;

    let mut response = OutgoingResponse::new();
    let session = get_session(&request_with_token("test", &token), &mut response, options())
        .await
        .expect("session loads");

    assert_eq!(
        session.get_value("user"),
        Some(&json!({"id": 1, "admin": false}))
    );
}

#[tokio::test]
async fn every_single_character_change_is_rejected() {
    let token = saved_token().await;

    // Exercise: change each character of the token in turn.
    for index in 0..token.len() {
        let tampered = flip(&token, index);
        let mut response = OutgoingResponse::new();
        let request = request_with_token("test", &tampered);
        let session = get_session(&request, &mut response, options())
            .await
            .expect("tampered cookie never fails the request");

        // Expectation: the session starts empty.
        assert!(session.is_empty(), "change at {index} was accepted: {tampered}");
    }
}

#[tokio::test]
async fn truncated_token_is_rejected() {
    let token = saved_token().await;

    for len in [0, 10, token.len() / 2, token.len() - 3, token.len() - 1] {
        let mut response = OutgoingResponse::new();
        let session = get_session(
            &request_with_token("test", &token[..len]),
            &mut response,
            options(),
        )
        .await
        .expect("truncated cookie never fails the request");

        assert!(session.is_empty(), "truncation to {len} was accepted");
    }
}
