//! Reading inbound token transfers from the chain.
//!
//! [`LedgerSource`] is what the reconciler polls. [`TronGridClient`] implements it against the TronGrid HTTP API,
//! rotating through a pool of API keys as they get rate limited or rejected.
mod credentials;
mod errors;
mod trongrid;

pub use credentials::{Credential, CredentialRotation};
pub use errors::LedgerError;
pub use trongrid::{TronGridClient, TronGridConfig};

use crate::db_types::TransactionRecord;

#[allow(async_fn_in_trait)]
pub trait LedgerSource {
    /// The most recent inbound transfers to the receiving wallet, newest first, with confirmation counts filled in.
    ///
    /// Failures are logged and yield an empty batch.
    async fn fetch_recent_transfers(&self, limit: usize) -> Vec<TransactionRecord>;

    async fn current_block_height(&self) -> Result<u64, LedgerError>;
}
