//! USDT Payment Engine
//!
//! The engine sells time-limited memberships for USDT on the TRON network. It is transport-agnostic: chat front ends
//! and the HTTP server talk to it through the APIs in this crate.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@db`]). The traits in `db::traits` describe what a backend must provide; SQLite is the supported
//!    backend. The data types used in the database are defined in [`db_types`].
//! 2. The ledger ([`ledger`]), which reads inbound TRC20 transfers from TronGrid.
//! 3. The public API ([`tpe_api`]): order issuance and payment reconciliation.
//! 4. The outbound collaborators ([`sinks`]) the reconciler hands paid orders and notifications to.
//!
//! Orders are identified on-chain by their amount alone. Each pending order's amount is the plan price plus a random
//! addend of 1 to 9999 ten-thousandths of a USDT, unique among pending orders.
pub mod db;
pub mod db_types;
pub mod ledger;
pub mod plans;
pub mod sinks;
pub mod tpe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{OrderManagement, PaymentStore, StoreError, TransactionManagement};
pub use ledger::{CredentialRotation, LedgerError, LedgerSource, TronGridClient, TronGridConfig};
pub use plans::{Plan, PlanCatalog};
pub use sinks::{FulfillmentSink, GrantReceipt, NotificationAction, NotificationError, NotificationSink};
pub use tpe_api::{
    errors::{IssuanceError, ReconcileError},
    order_issuer_api::{IssuerConfig, OrderIssuerApi},
    reconciler::{ReconcileConfig, Reconciler, TickOutcome, TickReport},
};
