//! #  Payment store contracts.
//!
//! These traits define what a storage backend must provide for the payment engine to issue orders and reconcile
//! them against observed transfers.
//!
//! * [`PaymentStore`] ties the two halves together and identifies the backend.
//! * [`OrderManagement`] covers the order lifecycle: creation, lookups, conditional status transitions and expiry.
//! * [`TransactionManagement`] records observed ledger transfers and the processed barrier that stops a transfer from
//!   being applied twice.
//!
//! Every backend reports failures as a [`StoreError`], so the engine APIs can tell a refused transition apart from a
//! broken connection without knowing which backend is in use.
mod errors;
mod order_management;
mod payment_store;
mod transaction_management;

pub use errors::StoreError;
pub use order_management::OrderManagement;
pub use payment_store::PaymentStore;
pub use transaction_management::TransactionManagement;
