use crate::db::traits::{OrderManagement, StoreError, TransactionManagement};

/// The highest level of behaviour for backends supporting the payment engine.
///
/// Implementations are cheap to clone (they wrap a connection pool), so every engine component holds its own copy.
#[allow(async_fn_in_trait)]
pub trait PaymentStore: OrderManagement + TransactionManagement + Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
