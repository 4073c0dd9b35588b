use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;
use upg_common::MicroUsdt;

use super::{db_url, new_pool, orders, orders::OrderQueryFilter, transactions, SqliteDatabaseError};
use crate::{
    db::traits::{OrderManagement, PaymentStore, StoreError, TransactionManagement},
    db_types::{MessageRef, NewOrder, Order, OrderId, OrderStatusType, TransactionRecord, TransferDisposition},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await.map_err(SqliteDatabaseError::from)?;
        let order_id = order.order_id.clone();
        let id = orders::insert_order(order, &mut tx).await?.ok_or_else(|| StoreError::DuplicateOrder(order_id.clone()))?;
        let saved = orders::fetch_order_by_order_id(&order_id, &mut tx)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        tx.commit().await.map_err(SqliteDatabaseError::from)?;
        debug!("🗃️ Order {order_id} for {} has been saved in the DB with id {id}", saved.amount);
        Ok(saved)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_pending_order_for(&self, requester_id: i64) -> Result<Option<Order>, StoreError> {
        let query = OrderQueryFilter::default()
            .with_requester_id(requester_id)
            .with_status(OrderStatusType::Pending)
            .newest_first()
            .with_limit(1);
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_orders(query, &mut conn).await?.into_iter().next())
    }

    async fn fetch_pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        let query = OrderQueryFilter::default().with_status(OrderStatusType::Pending);
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_orders(query, &mut conn).await?)
    }

    async fn fetch_expired_pending_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let query = OrderQueryFilter::default().with_status(OrderStatusType::Pending).with_expires_before(now);
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_orders(query, &mut conn).await?)
    }

    async fn fetch_paid_orders(&self) -> Result<Vec<Order>, StoreError> {
        let query = OrderQueryFilter::default().with_status(OrderStatusType::Paid);
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::fetch_orders(query, &mut conn).await?)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        tx_hash: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        let changed = orders::transition_order_status(order_id, new_status, tx_hash, at, &mut conn).await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if changed {
            debug!("🗃️ Order {order_id} is now {new_status}");
            return Ok(Some(order));
        }
        if order.status == new_status {
            debug!("🗃️ Order {order_id} already has status {new_status}. No action to take");
            return Ok(None);
        }
        warn!("🗃️ Order {order_id} cannot be transitioned from {} to {new_status}", order.status);
        Err(StoreError::InvalidTransition { order_id: order_id.clone(), from: order.status, to: new_status })
    }

    async fn expire_pending_orders(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::expire_pending_orders(now, &mut conn).await?)
    }

    async fn is_amount_reserved(&self, amount: MicroUsdt) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(orders::is_amount_reserved(amount, &mut conn).await?)
    }

    async fn set_order_message(&self, order_id: &OrderId, message: MessageRef) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        if !orders::set_message_ref(order_id, message, &mut conn).await? {
            return Err(StoreError::OrderNotFound(order_id.clone()));
        }
        trace!("🗃️ Order {order_id} is displayed in message {message}");
        Ok(())
    }

    async fn fetch_order_message(&self, order_id: &OrderId) -> Result<Option<MessageRef>, StoreError> {
        Ok(self.fetch_order(order_id).await?.and_then(|o| o.message_ref))
    }
}

impl TransactionManagement for SqliteDatabase {
    async fn upsert_transaction(&self, tx: &TransactionRecord) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(transactions::upsert_transaction(tx, &mut conn).await?)
    }

    async fn is_transaction_processed(&self, tx_hash: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(transactions::is_processed(tx_hash, &mut conn).await?)
    }

    async fn mark_transaction_processed(
        &self,
        tx_hash: &str,
        disposition: TransferDisposition,
        order_id: Option<&OrderId>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        if !transactions::mark_processed(tx_hash, disposition, order_id, &mut conn).await? {
            return Err(StoreError::TransactionNotFound(tx_hash.to_string()));
        }
        debug!("🗃️ Transaction {tx_hash} processed ({disposition})");
        Ok(())
    }

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(SqliteDatabaseError::from)?;
        Ok(transactions::fetch_transaction(tx_hash, &mut conn).await?)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `UPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Migrations complete on {}", self.url);
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
