use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use serde_json::Value;
use upg_common::Secret;
use usdt_payment_engine::{IssuerConfig, OrderIssuerApi, PlanCatalog};

use super::mocks::MockOrderStore;
use crate::{
    middleware::BearerAuthFactory,
    routes::{health, plans, AttachMessageRoute, CancelOrderRoute, CreateOrderRoute, OrderByIdRoute},
};

pub const API_TOKEN: &str = "let-me-in";

/// Sends `req` to an app laid out like the server's, backed by `store`. The order routes require [`API_TOKEN`] when
/// `protected` is set.
pub async fn send(req: TestRequest, store: MockOrderStore, protected: bool) -> (StatusCode, Value) {
    let issuer = web::Data::new(OrderIssuerApi::with_seed(store, PlanCatalog::default(), IssuerConfig::default(), 99));
    let token = protected.then(|| Secret::new(API_TOKEN.to_string()));
    let app = App::new()
        .app_data(issuer)
        .app_data(web::Data::new(PlanCatalog::default()))
        .service(health)
        .service(plans)
        .service(
            web::scope("")
                .wrap(BearerAuthFactory::new(token))
                .service(CreateOrderRoute::<MockOrderStore>::new())
                .service(OrderByIdRoute::<MockOrderStore>::new())
                .service(CancelOrderRoute::<MockOrderStore>::new())
                .service(AttachMessageRoute::<MockOrderStore>::new()),
        );
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = test::read_body(res).await;
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into()));
    (status, json)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}
