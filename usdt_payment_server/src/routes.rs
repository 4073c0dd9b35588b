//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two belong in the engine, not here.
//!
//! Any I/O in a handler must be awaited, never blocked on: each worker thread processes its requests sequentially, so a
//! blocking handler stalls every request queued behind it.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use usdt_payment_engine::{
    db_types::{MessageRef, OrderId},
    OrderIssuerApi,
    OrderManagement,
    PlanCatalog,
};

use crate::{
    data_objects::{JsonResponse, MessageRefRequest, NewOrderRequest, OrderResponse, PlanResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Plans  ----------------------------------------------------
#[get("/plans")]
pub async fn plans(catalog: web::Data<PlanCatalog>) -> impl Responder {
    let plans = catalog.iter().map(PlanResponse::from).collect::<Vec<_>>();
    HttpResponse::Ok().json(plans)
}

// ----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement);
/// Issues a new payment order for `requester_id` and `plan_id`.
///
/// * 409 if the requester already has an open order,
/// * 400 for an unknown plan,
/// * 503 if no unreserved amount could be found for the plan.
pub async fn create_order<B: OrderManagement>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<OrderIssuerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let NewOrderRequest { requester_id, plan_id } = body.into_inner();
    debug!("💻️ POST order for {requester_id} ({plan_id})");
    let order = api.create_payment_order(requester_id, &plan_id).await.map_err(|e| {
        debug!("💻️ Could not issue an order for {requester_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

route!(order_by_id => Get "/orders/{id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderIssuerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ GET order {order_id}");
    let order = api.order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

route!(cancel_order => Post "/orders/{id}/cancel" impl OrderManagement);
pub async fn cancel_order<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderIssuerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ POST cancel order {order_id}");
    let order = api.cancel_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

route!(attach_message => Put "/orders/{id}/message" impl OrderManagement);
/// Records the chat message that shows the payment prompt, so it can be removed once the order is settled.
pub async fn attach_message<B: OrderManagement>(
    path: web::Path<String>,
    body: web::Json<MessageRefRequest>,
    api: web::Data<OrderIssuerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let message = MessageRef(body.message_ref);
    debug!("💻️ PUT message {} for order {order_id}", message.0);
    api.attach_message(&order_id, message).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Message attached to {order_id}"))))
}
