use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use upg_common::MicroUsdt;
use usdt_payment_engine::{
    db_types::{MessageRef, NewOrder, Order, OrderId, OrderStatusType},
    OrderManagement,
    StoreError,
};

mock! {
    pub OrderStore {}
    impl OrderManagement for OrderStore {
        async fn create_order(&self, order: NewOrder) -> Result<Order, StoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;
        async fn fetch_pending_order_for(&self, requester_id: i64) -> Result<Option<Order>, StoreError>;
        async fn fetch_pending_orders(&self) -> Result<Vec<Order>, StoreError>;
        async fn fetch_expired_pending_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
        async fn fetch_paid_orders(&self) -> Result<Vec<Order>, StoreError>;
        async fn update_order_status<'a>(
            &self,
            order_id: &OrderId,
            new_status: OrderStatusType,
            tx_hash: Option<&'a str>,
            at: DateTime<Utc>,
        ) -> Result<Option<Order>, StoreError>;
        async fn expire_pending_orders(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
        async fn is_amount_reserved(&self, amount: MicroUsdt) -> Result<bool, StoreError>;
        async fn set_order_message(&self, order_id: &OrderId, message: MessageRef) -> Result<(), StoreError>;
        async fn fetch_order_message(&self, order_id: &OrderId) -> Result<Option<MessageRef>, StoreError>;
    }
}

pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A stored order for requester 42 on the 30-day plan.
pub fn sample_order(status: OrderStatusType) -> Order {
    Order {
        id: 1,
        order_id: OrderId::from("ORD-42-1709294400000-0000beef"),
        requester_id: 42,
        plan_id: "plan_30d".to_string(),
        amount: MicroUsdt::from(15_432_100),
        status,
        created_at: created_at(),
        expires_at: created_at() + chrono::Duration::minutes(10),
        tx_hash: None,
        paid_at: None,
        completed_at: None,
        message_ref: None,
    }
}

/// What the store hands back after inserting `order`.
pub fn stored(order: NewOrder) -> Order {
    Order {
        id: 7,
        order_id: order.order_id,
        requester_id: order.requester_id,
        plan_id: order.plan_id,
        amount: order.amount,
        status: OrderStatusType::Pending,
        created_at: order.created_at,
        expires_at: order.expires_at,
        tx_hash: None,
        paid_at: None,
        completed_at: None,
        message_ref: None,
    }
}
