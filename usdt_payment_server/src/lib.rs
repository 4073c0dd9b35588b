//! # USDT payment server
//! The server hosts the HTTP order API and the background reconciliation worker. It is responsible for:
//! * Issuing payment orders on behalf of the chat front end, each with a unique amount.
//! * Polling TronGrid for USDT transfers to the payment wallet and matching them to pending orders.
//! * Extending the customer's membership and telling them, and the operator, about the payment on Telegram.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/plans`: The membership plans on sale.
//! * `POST /orders`: Issue a new order for a requester and plan.
//! * `GET /orders/{id}`: Fetch an order.
//! * `POST /orders/{id}/cancel`: Cancel a pending order.
//! * `PUT /orders/{id}/message`: Record the chat message that shows the payment prompt.
//!
//! If `UPG_API_TOKEN` is set, the `/orders` routes require it as a bearer token.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod membership;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;
pub mod telegram;

#[cfg(test)]
mod endpoint_tests;
