use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use usdt_payment_engine::{
    db_types::{Order, OrderStatusType},
    Plan,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub requester_id: i64,
    pub plan_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRefRequest {
    pub message_ref: i64,
}

/// An order as the chat front end sees it. Amounts are decimal USDT strings, exactly as the customer must pay them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub requester_id: i64,
    pub plan_id: String,
    pub amount: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            requester_id: order.requester_id,
            plan_id: order.plan_id,
            amount: order.amount.to_string(),
            status: order.status,
            created_at: order.created_at,
            expires_at: order.expires_at,
            tx_hash: order.tx_hash,
            paid_at: order.paid_at,
            completed_at: order.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub price: String,
    pub duration_days: u32,
}

impl From<&Plan> for PlanResponse {
    fn from(plan: &Plan) -> Self {
        Self { id: plan.id.clone(), name: plan.name.clone(), price: plan.price.to_string(), duration_days: plan.duration_days }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}
