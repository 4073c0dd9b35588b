//! Test doubles for the engine's outbound collaborators, plus fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use upg_common::MicroUsdt;
use usdt_payment_engine::{
    db_types::{MessageRef, NewOrder, Order, OrderId, TransactionRecord},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    FulfillmentSink,
    GrantReceipt,
    LedgerError,
    LedgerSource,
    NotificationAction,
    NotificationError,
    NotificationSink,
    OrderManagement,
    SqliteDatabase,
};

pub const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const WALLET: &str = "TWalletAddressForPaymentsXYZ12345";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub async fn new_database() -> (String, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    (url, db)
}

/// Stores a pending order with an exact amount, bypassing the random addend.
pub async fn insert_order(
    db: &SqliteDatabase,
    order_id: &str,
    requester_id: i64,
    plan_id: &str,
    amount: i64,
    created_at: DateTime<Utc>,
) -> Order {
    let order = NewOrder {
        order_id: OrderId::from(order_id),
        requester_id,
        plan_id: plan_id.to_string(),
        amount: MicroUsdt::from(amount),
        created_at,
        expires_at: created_at + Duration::minutes(10),
    };
    db.create_order(order).await.expect("Error creating order")
}

pub fn transfer(tx_hash: &str, amount: i64, at: DateTime<Utc>, confirmations: i64) -> TransactionRecord {
    TransactionRecord {
        tx_hash: tx_hash.to_string(),
        from_address: "TSenderAddressAbcdefghijklmnop123".to_string(),
        to_address: WALLET.to_string(),
        amount: MicroUsdt::from(amount),
        timestamp: at,
        block_number: 1_000,
        confirmations,
        contract_address: USDT_CONTRACT.to_string(),
        processed: false,
        order_id: None,
        disposition: None,
    }
}

//--------------------------------------     FakeLedger       ---------------------------------------------------------
#[derive(Clone, Default)]
pub struct FakeLedger {
    transfers: Arc<Mutex<Vec<TransactionRecord>>>,
    polls: Arc<AtomicUsize>,
}

impl FakeLedger {
    pub fn set_transfers(&self, transfers: Vec<TransactionRecord>) {
        *self.transfers.lock().unwrap() = transfers;
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl LedgerSource for FakeLedger {
    async fn fetch_recent_transfers(&self, limit: usize) -> Vec<TransactionRecord> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.transfers.lock().unwrap().iter().take(limit).cloned().collect()
    }

    async fn current_block_height(&self) -> Result<u64, LedgerError> {
        Ok(1_100)
    }
}

//--------------------------------------  RecordingFulfillment  ------------------------------------------------------
#[derive(Debug, Error)]
#[error("The membership store is unavailable")]
pub struct GrantRefused;

#[derive(Clone, Default)]
pub struct RecordingFulfillment {
    failing: Arc<AtomicBool>,
    grants: Arc<Mutex<Vec<(i64, u32)>>>,
}

impl RecordingFulfillment {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn grants(&self) -> Vec<(i64, u32)> {
        self.grants.lock().unwrap().clone()
    }
}

impl FulfillmentSink for RecordingFulfillment {
    type Error = GrantRefused;

    async fn grant(&self, requester_id: i64, duration_days: u32) -> Result<GrantReceipt, Self::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GrantRefused);
        }
        self.grants.lock().unwrap().push((requester_id, duration_days));
        let expiry = t0() + Duration::days(i64::from(duration_days));
        Ok(GrantReceipt { entitlement_expires_at: Some(expiry) })
    }
}

//--------------------------------------  RecordingNotifier  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: i64, text: String },
    WithActions { to: i64, text: String, actions: Vec<NotificationAction> },
    Deleted { to: i64, message: MessageRef },
    Celebration { to: i64, asset: String },
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, recipient: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| match s {
                Sent::Text { to, .. } |
                Sent::WithActions { to, .. } |
                Sent::Deleted { to, .. } |
                Sent::Celebration { to, .. } => *to == recipient,
            })
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, sent: Sent) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("chat service unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl NotificationSink for RecordingNotifier {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<(), NotificationError> {
        self.record(Sent::Text { to: recipient, text: text.to_string() })
    }

    async fn send_text_with_actions(
        &self,
        recipient: i64,
        text: &str,
        actions: &[NotificationAction],
    ) -> Result<(), NotificationError> {
        self.record(Sent::WithActions { to: recipient, text: text.to_string(), actions: actions.to_vec() })
    }

    async fn delete_message(&self, recipient: i64, message: MessageRef) -> Result<(), NotificationError> {
        self.record(Sent::Deleted { to: recipient, message })
    }

    async fn send_celebration(&self, recipient: i64, asset: &str) -> Result<(), NotificationError> {
        self.record(Sent::Celebration { to: recipient, asset: asset.to_string() })
    }
}
