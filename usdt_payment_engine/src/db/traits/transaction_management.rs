use crate::{
    db::traits::StoreError,
    db_types::{OrderId, TransactionRecord, TransferDisposition},
};

/// Records observed ledger transfers and which of them have been dealt with.
#[allow(async_fn_in_trait)]
pub trait TransactionManagement {
    /// Inserts or refreshes an observed transfer.
    ///
    /// Refreshing updates the confirmation count and block height. The `processed` flag never goes from true back to
    /// false, and an existing disposition or order link is never overwritten.
    async fn upsert_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError>;

    /// False for unknown transfers.
    async fn is_transaction_processed(&self, tx_hash: &str) -> Result<bool, StoreError>;

    /// Sets the processed barrier for a recorded transfer along with the reason it was closed off.
    async fn mark_transaction_processed(
        &self,
        tx_hash: &str,
        disposition: TransferDisposition,
        order_id: Option<&OrderId>,
    ) -> Result<(), StoreError>;

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError>;
}
