//! HTTP-level tests for the message API, driven through the full router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use tokenpost::api::create_router;
use tokenpost::app::AppState;
use tokenpost::domain::{Chain, ChainRegistry, MessageRepository};
use tokenpost::test_utils::{MockChainClient, MockMessageRepository};

const SENDER: &str = "SenderWalletAddress1111111111111111111111111";
const RECEIVER: &str = "ReceiverWalletAddress111111111111111111111111";

fn test_state() -> Arc<AppState> {
    let repository = Arc::new(MockMessageRepository::new());
    let chains = ChainRegistry::new(vec![
        Arc::new(MockChainClient::new(Chain::Solana)),
        Arc::new(MockChainClient::new(Chain::Bnb)),
    ]);
    Arc::new(AppState::new(repository, chains, None))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_validate_address_accepts_wellformed_address() {
    let router = create_router(test_state());

    let response = router
        .oneshot(get(&format!(
            "/api/messages/validate-address?address={SENDER}&chain=solana"
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], json!(true));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_validate_address_reports_invalid_address() {
    let router = create_router(test_state());

    // Long enough to pass request validation, rejected by the chain client.
    let response = router
        .oneshot(get(
            "/api/messages/validate-address?address=ShortShortShortShortShortShortShort&chain=solana",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], json!(false));
    assert_eq!(body["error"], json!("Invalid Solana wallet address"));
}

#[tokio::test]
async fn test_validate_address_rejects_undersized_input() {
    let router = create_router(test_state());

    let response = router
        .oneshot(get("/api/messages/validate-address?address=abc&chain=solana"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], json!("validation_error"));
}

#[tokio::test]
async fn test_estimated_fee_per_chain() {
    let router = create_router(test_state());

    let response = router
        .clone()
        .oneshot(get("/api/messages/estimated-fee?chain=solana"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fee"], json!(0.002));

    let response = router
        .oneshot(get("/api/messages/estimated-fee?chain=bnb"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_transaction_returns_prepared_payload() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "gm from the test suite",
        "chain": "solana",
    });

    let response = router
        .oneshot(post_json("/api/messages/transaction", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["transaction"], json!("bW9jay10cmFuc2FjdGlvbg=="));
    assert_eq!(body["chain"], json!("solana"));
    assert!(body["tokenIdentity"]["publicKey"].is_string());
}

#[tokio::test]
async fn test_create_transaction_rejects_oversized_message() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "x".repeat(600),
        "chain": "solana",
    });

    let response = router
        .oneshot(post_json("/api/messages/transaction", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], json!("validation_error"));
}

#[tokio::test]
async fn test_confirm_message_persists_and_is_queryable() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "hello receiver",
        "signedTransaction": "c2lnbmVkLXRyYW5zYWN0aW9u",
        "chain": "solana",
    });

    let response = router
        .clone()
        .oneshot(post_json("/api/messages/confirm", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let confirmed = body_json(response).await;
    let signature = confirmed["txSignature"].as_str().unwrap().to_string();
    assert!(confirmed["explorerLink"].as_str().unwrap().contains(&signature));

    // Visible in the sender's outbox
    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/messages/sent?walletAddress={SENDER}"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = body_json(response).await;
    assert_eq!(sent.as_array().unwrap().len(), 1);
    assert_eq!(sent[0]["message"], json!("hello receiver"));

    // Visible in the receiver's inbox
    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/messages/received?walletAddress={RECEIVER}"
        )))
        .await
        .unwrap();
    let received = body_json(response).await;
    assert_eq!(received.as_array().unwrap().len(), 1);

    // Retrievable by signature
    let response = router
        .oneshot(get(&format!("/api/messages/by-signature/{signature}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let found = body_json(response).await;
    assert_eq!(found["txSignature"], json!(signature));
}

#[tokio::test]
async fn test_confirm_message_is_idempotent_per_signature() {
    let repository = Arc::new(MockMessageRepository::new());
    let chains = ChainRegistry::new(vec![Arc::new(MockChainClient::with_fixed_signature(
        Chain::Solana,
        "fixed_signature_abc",
    ))]);
    let state = Arc::new(AppState::new(
        Arc::clone(&repository) as Arc<dyn MessageRepository>,
        chains,
        None,
    ));
    let router = create_router(state);

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "once only",
        "signedTransaction": "c2lnbmVkLXRyYW5zYWN0aW9u",
        "chain": "solana",
    });

    let first = router
        .clone()
        .oneshot(post_json("/api/messages/confirm", &payload))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first_body = body_json(first).await;

    let second = router
        .oneshot(post_json("/api/messages/confirm", &payload))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second_body = body_json(second).await;

    assert_eq!(first_body["id"], second_body["id"]);
    assert_eq!(repository.records().len(), 1);
}

#[tokio::test]
async fn test_confirm_message_requires_signed_transaction() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "missing payload",
        "signedTransaction": "",
        "chain": "solana",
    });

    let response = router
        .oneshot(post_json("/api/messages/confirm", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_overview_counts_sent_and_received() {
    let router = create_router(test_state());

    for (sender, receiver, message) in [
        (SENDER, RECEIVER, "first"),
        (SENDER, RECEIVER, "second"),
        (RECEIVER, SENDER, "reply"),
    ] {
        let payload = json!({
            "senderPublicKey": sender,
            "receiverAddress": receiver,
            "message": message,
            "signedTransaction": "c2lnbmVkLXRyYW5zYWN0aW9u",
            "chain": "solana",
        });
        let response = router
            .clone()
            .oneshot(post_json("/api/messages/confirm", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .oneshot(get(&format!(
            "/api/messages/overview?walletAddress={SENDER}&recentLimit=2"
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totals"]["sent"], json!(2));
    assert_eq!(body["totals"]["received"], json!(1));
    assert_eq!(body["totals"]["combined"], json!(3));
    assert_eq!(body["recent"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_all_messages_lists_everything() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "for the archive",
        "signedTransaction": "c2lnbmVkLXRyYW5zYWN0aW9u",
        "chain": "bnb",
    });
    router
        .clone()
        .oneshot(post_json("/api/messages/confirm", &payload))
        .await
        .unwrap();

    let response = router
        .oneshot(get(&format!("/api/messages/all?walletAddress={SENDER}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["chain"], json!("bnb"));
}

#[tokio::test]
async fn test_health_reports_database_and_chains() {
    let router = create_router(test_state());

    let response = router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("healthy"));
    assert_eq!(body["database"], json!("healthy"));
    assert_eq!(body["chains"]["solana"], json!("healthy"));
    assert_eq!(body["chains"]["bnb"], json!("healthy"));
}

#[tokio::test]
async fn test_unsupported_chain_in_body_is_rejected() {
    let router = create_router(test_state());

    let payload = json!({
        "senderPublicKey": SENDER,
        "receiverAddress": RECEIVER,
        "message": "hi",
        "chain": "dogecoin",
    });

    let response = router
        .oneshot(post_json("/api/messages/transaction", &payload))
        .await
        .unwrap();

    // Unknown chain names fail deserialization before reaching the service.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
