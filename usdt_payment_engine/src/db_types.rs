use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use upg_common::MicroUsdt;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been issued and is waiting for a matching on-chain transfer.
    Pending,
    /// A matching transfer has been confirmed. The entitlement has not been granted yet.
    Paid,
    /// The entitlement has been granted.
    Completed,
    /// No matching transfer arrived before the deadline.
    Expired,
    /// The requester abandoned the order.
    Cancelled,
}

impl OrderStatusType {
    /// The statuses an order may move into this status from.
    pub fn predecessors(&self) -> &'static [OrderStatusType] {
        match self {
            OrderStatusType::Pending => &[],
            OrderStatusType::Paid | OrderStatusType::Expired | OrderStatusType::Cancelled => {
                &[OrderStatusType::Pending]
            },
            OrderStatusType::Completed => &[OrderStatusType::Paid],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        next.predecessors().contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Completed | OrderStatusType::Expired | OrderStatusType::Cancelled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Expired => write!(f, "Expired"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Completed" => Ok(Self::Completed),
            "Expired" => Ok(Self::Expired),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// Order identifiers take the form `ORD-<requester>-<unix millis>-<8 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(requester_id: i64, created_at: DateTime<Utc>, suffix: u32) -> Self {
        Self(format!("ORD-{requester_id}-{}-{suffix:08x}", created_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      MessageRef       ---------------------------------------------------------
/// A handle to the chat message that displayed the payment instructions for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

impl Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    pub order_id: OrderId,
    /// The chat user that requested the order.
    pub requester_id: i64,
    pub plan_id: String,
    /// The exact amount the requester must transfer, including the disambiguating addend.
    pub amount: MicroUsdt,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub tx_hash: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub message_ref: Option<MessageRef>,
}

impl Order {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub requester_id: i64,
    pub plan_id: String,
    pub amount: MicroUsdt,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn is_equivalent(&self, order: &Order) -> bool {
        self.order_id == order.order_id &&
            self.requester_id == order.requester_id &&
            self.plan_id == order.plan_id &&
            self.amount == order.amount &&
            self.created_at == order.created_at &&
            self.expires_at == order.expires_at
    }
}

//-----------------------------------------   TransferDisposition   ---------------------------------------------------
/// What the reconciler decided to do with an observed transfer once it stopped being a candidate for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransferDisposition {
    /// Paid an order.
    Matched,
    /// Matched an order that could no longer move to `Paid`.
    Rejected,
    /// No pending order accepted the transfer.
    Unmatched,
    /// The transfer was for a token other than the configured USDT contract.
    ForeignAsset,
    /// The transfer was older than the maximum age when first considered.
    Stale,
}

impl Display for TransferDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferDisposition::Matched => write!(f, "Matched"),
            TransferDisposition::Rejected => write!(f, "Rejected"),
            TransferDisposition::Unmatched => write!(f, "Unmatched"),
            TransferDisposition::ForeignAsset => write!(f, "ForeignAsset"),
            TransferDisposition::Stale => write!(f, "Stale"),
        }
    }
}

//--------------------------------------   TransactionRecord   ---------------------------------------------------------
/// An inbound token transfer to the receiving wallet, as observed on the ledger.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TransactionRecord {
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: MicroUsdt,
    /// Block time of the transfer
    pub timestamp: DateTime<Utc>,
    pub block_number: i64,
    pub confirmations: i64,
    /// The token contract the transfer was made in
    pub contract_address: String,
    pub processed: bool,
    pub order_id: Option<OrderId>,
    pub disposition: Option<TransferDisposition>,
}

impl TransactionRecord {
    pub fn is_confirmed(&self, min_confirmations: u64) -> bool {
        u64::try_from(self.confirmations).map(|c| c >= min_confirmations).unwrap_or(false)
    }
}
