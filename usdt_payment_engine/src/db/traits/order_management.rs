use chrono::{DateTime, Utc};
use upg_common::MicroUsdt;

use crate::{
    db::traits::StoreError,
    db_types::{MessageRef, NewOrder, Order, OrderId, OrderStatusType},
};

/// The `OrderManagement` trait defines the behaviour for creating, querying and transitioning payment orders.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in the `Pending` state and returns the stored row.
    ///
    /// Fails with [`StoreError::DuplicateOrder`] if the order id is already taken.
    async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// The most recently created `Pending` order for the requester, if any.
    async fn fetch_pending_order_for(&self, requester_id: i64) -> Result<Option<Order>, StoreError>;

    /// All `Pending` orders, oldest first.
    async fn fetch_pending_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// `Pending` orders whose deadline is strictly before `now`.
    async fn fetch_expired_pending_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;

    /// Orders that were paid but never completed.
    async fn fetch_paid_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Moves an order into `new_status`, but only from one of its permitted predecessor states.
    ///
    /// * Moving to `Paid` records `tx_hash` and stamps `paid_at` with `at`.
    /// * Moving to `Completed` stamps `completed_at` with `at`.
    ///
    /// Returns the updated order, or `None` if the order was already in `new_status` (nothing is written). Any other
    /// starting state yields [`StoreError::InvalidTransition`], and an unknown id yields [`StoreError::OrderNotFound`].
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        tx_hash: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;

    /// Moves every `Pending` order whose deadline is before `now` to `Expired`, returning the number of orders changed.
    async fn expire_pending_orders(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// True if a `Pending` order already claims an amount within the reservation tolerance of `amount`.
    async fn is_amount_reserved(&self, amount: MicroUsdt) -> Result<bool, StoreError>;

    async fn set_order_message(&self, order_id: &OrderId, message: MessageRef) -> Result<(), StoreError>;

    async fn fetch_order_message(&self, order_id: &OrderId) -> Result<Option<MessageRef>, StoreError>;
}
