mod helpers;
mod mocks;
mod orders;

use actix_web::{http::StatusCode, test::TestRequest};

use self::{helpers::send, mocks::MockOrderStore};

#[actix_web::test]
async fn health_is_open() {
    let (status, body) = send(TestRequest::get().uri("/health"), MockOrderStore::new(), true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn plans_are_listed_without_a_token() {
    let (status, body) = send(TestRequest::get().uri("/plans"), MockOrderStore::new(), true).await;
    assert_eq!(status, StatusCode::OK);
    let plans = body.as_array().expect("Expected a list of plans");
    assert_eq!(plans.len(), 4);
    assert_eq!(plans[1]["id"], "plan_30d");
    assert_eq!(plans[1]["price"], "15.00");
    assert_eq!(plans[1]["duration_days"], 30);
}
