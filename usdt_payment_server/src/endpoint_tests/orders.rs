use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use usdt_payment_engine::{
    db_types::{MessageRef, OrderStatusType},
    StoreError,
};

use super::{
    helpers::{bearer, send, API_TOKEN},
    mocks::{sample_order, stored, MockOrderStore},
};

fn new_order_request() -> TestRequest {
    TestRequest::post().uri("/orders").set_json(json!({"requester_id": 42, "plan_id": "plan_30d"}))
}

fn store_with_free_amounts() -> MockOrderStore {
    let mut store = MockOrderStore::new();
    store.expect_fetch_pending_order_for().returning(|_| Ok(None));
    store.expect_is_amount_reserved().returning(|_| Ok(false));
    store.expect_create_order().times(1).returning(|order| Ok(stored(order)));
    store
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(new_order_request(), store_with_free_amounts(), false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requester_id"], 42);
    assert_eq!(body["plan_id"], "plan_30d");
    assert_eq!(body["status"], "Pending");
    let amount = body["amount"].as_str().expect("amount should be a string");
    assert!(amount.starts_with("15."), "{amount} is not a 30-day plan amount");
    assert_ne!(amount, "15.00");
    assert!(body["order_id"].as_str().unwrap().starts_with("ORD-42-"));
}

#[actix_web::test]
async fn second_order_while_one_is_active_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_pending_order_for().returning(|_| {
        let mut order = sample_order(OrderStatusType::Pending);
        order.expires_at = chrono::Utc::now() + chrono::Duration::minutes(5);
        Ok(Some(order))
    });
    store.expect_create_order().never();
    let (status, body) = send(new_order_request(), store, false).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already has an active order"));
}

#[actix_web::test]
async fn unknown_plan_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_pending_order_for().returning(|_| Ok(None));
    let req = TestRequest::post().uri("/orders").set_json(json!({"requester_id": 42, "plan_id": "plan_forever"}));
    let (status, body) = send(req, store, false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Could not read request body: Unknown plan: plan_forever");
}

#[actix_web::test]
async fn exhausted_amounts_are_unavailable() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_pending_order_for().returning(|_| Ok(None));
    store.expect_is_amount_reserved().returning(|_| Ok(true));
    store.expect_create_order().never();
    let (status, _) = send(new_order_request(), store, false).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn fetch_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_order().returning(|_| Ok(Some(sample_order(OrderStatusType::Pending))));
    let req = TestRequest::get().uri("/orders/ORD-42-1709294400000-0000beef");
    let (status, body) = send(req, store, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], "ORD-42-1709294400000-0000beef");
    assert_eq!(body["amount"], "15.4321");
    assert_eq!(body["tx_hash"], serde_json::Value::Null);
}

#[actix_web::test]
async fn unknown_order_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_order().returning(|_| Ok(None));
    let (status, _) = send(TestRequest::get().uri("/orders/ORD-nope"), store, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancel_pending_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store
        .expect_update_order_status()
        .withf(|_, status, tx_hash, _| *status == OrderStatusType::Cancelled && tx_hash.is_none())
        .returning(|_, _, _, _| Ok(Some(sample_order(OrderStatusType::Cancelled))));
    let req = TestRequest::post().uri("/orders/ORD-42-1709294400000-0000beef/cancel");
    let (status, body) = send(req, store, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelled");
}

#[actix_web::test]
async fn cancelling_a_paid_order_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_update_order_status().returning(|id, _, _, _| {
        Err(StoreError::InvalidTransition {
            order_id: id.clone(),
            from: OrderStatusType::Paid,
            to: OrderStatusType::Cancelled,
        })
    });
    let req = TestRequest::post().uri("/orders/ORD-42-1709294400000-0000beef/cancel");
    let (status, _) = send(req, store, false).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn attach_message() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store
        .expect_set_order_message()
        .withf(|id, message| id.as_str() == "ORD-42-1709294400000-0000beef" && *message == MessageRef(31))
        .times(1)
        .returning(|_, _| Ok(()));
    let req = TestRequest::put().uri("/orders/ORD-42-1709294400000-0000beef/message").set_json(json!({"message_ref": 31}));
    let (status, body) = send(req, store, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn attach_message_to_unknown_order() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_set_order_message().returning(|id, _| Err(StoreError::OrderNotFound(id.clone())));
    let req = TestRequest::put().uri("/orders/ORD-nope/message").set_json(json!({"message_ref": 31}));
    let (status, _) = send(req, store, false).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn missing_token_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_create_order().never();
    let (status, body) = send(new_order_request(), store, true).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "A valid bearer token is required"}));
}

#[actix_web::test]
async fn wrong_token_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut store = MockOrderStore::new();
    store.expect_fetch_order().never();
    let req = TestRequest::get().uri("/orders/ORD-42-1709294400000-0000beef").insert_header(bearer("guess"));
    let (status, _) = send(req, store, true).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn right_token_is_accepted() {
    let _ = env_logger::try_init().ok();
    let req = new_order_request().insert_header(bearer(API_TOKEN));
    let (status, body) = send(req, store_with_free_amounts(), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Pending");
}
