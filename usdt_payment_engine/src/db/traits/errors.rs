use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderStatusType, to: OrderStatusType },
    #[error("Transaction {0} has not been recorded")]
    TransactionNotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}
