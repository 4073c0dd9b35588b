use thiserror::Error;

use crate::{
    db::traits::StoreError,
    db_types::{Order, OrderId},
};

#[derive(Debug, Clone, Error)]
pub enum IssuanceError {
    #[error("Requester {} already has an active order {}", .order.requester_id, .order.order_id)]
    ActiveOrderExists { order: Box<Order> },
    #[error("Unknown plan: {0}")]
    InvalidPlan(String),
    #[error("Could not find an unreserved amount for plan {0}")]
    AmountSpaceExhausted(String),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for IssuanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateOrder(id) => Self::DuplicateOrder(id),
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            e => Self::Store(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Could not read or update the payment store: {0}")]
    Store(#[from] StoreError),
}
