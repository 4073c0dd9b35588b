//! # USDT payment engine public API
//!
//! * [`order_issuer_api`] issues payment orders with amounts that are unique among pending orders, and lets
//!   callers look up, cancel, or attach a chat message to them.
//! * [`reconciler`] periodically matches confirmed inbound transfers to pending orders, grants the entitlement for
//!   paid orders and expires the ones that ran out of time.
//! * [`messages`] renders the texts sent to requesters and the operator.
//!
//! Both APIs are created by supplying a backend that implements the store traits in [`crate::db::traits`]:
//!
//! ```rust,ignore
//! use usdt_payment_engine::{IssuerConfig, OrderIssuerApi, PlanCatalog, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/payment.db", 5).await?;
//! let api = OrderIssuerApi::new(db, PlanCatalog::default(), IssuerConfig::default());
//! let order = api.create_payment_order(requester_id, "plan_30d").await?;
//! ```
pub mod errors;
pub mod messages;
pub mod order_issuer_api;
pub mod reconciler;
