use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Duration, Utc};
use cucumber::World;
use log::*;
use usdt_payment_engine::{
    db_types::{Order, OrderId, TransactionRecord},
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    IssuanceError,
    IssuerConfig,
    OrderIssuerApi,
    PlanCatalog,
    ReconcileConfig,
    Reconciler,
    SqliteDatabase,
    TickReport,
};

use crate::support::{t0, FakeLedger, RecordingFulfillment, RecordingNotifier};

pub const OPERATOR_CHAT: i64 = -100_777;

#[derive(Default, Debug, World)]
pub struct PaymentWorld {
    pub system: Option<PaymentSystem>,
}

type WorldReconciler = Reconciler<SqliteDatabase, FakeLedger, RecordingFulfillment, RecordingNotifier>;

pub struct PaymentSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub issuer: OrderIssuerApi<SqliteDatabase>,
    pub reconciler: WorldReconciler,
    pub ledger: FakeLedger,
    pub grants: RecordingFulfillment,
    pub notifier: RecordingNotifier,
    /// The scenario's idea of the current time. Starts at [`t0`] and only moves when a step says so.
    pub now: DateTime<Utc>,
    /// Transfers visible on the fake ledger, oldest first.
    pub transfers: Vec<TransactionRecord>,
    /// The most recent order issued to (or inserted for) each requester.
    pub orders: HashMap<i64, OrderId>,
    pub last_issuance: Option<Result<Order, IssuanceError>>,
    pub last_report: Option<TickReport>,
}

impl Debug for PaymentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSystem({}, now: {}, {} transfers)", self.db_path, self.now, self.transfers.len())
    }
}

impl PaymentWorld {
    pub fn system(&mut self) -> &mut PaymentSystem {
        self.system.as_mut().expect("Payment system not initialised")
    }
}

impl PaymentSystem {
    pub async fn new(retry_unfulfilled: bool) -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let ledger = FakeLedger::default();
        let grants = RecordingFulfillment::default();
        let notifier = RecordingNotifier::default();
        let config = ReconcileConfig { operator_chat_id: Some(OPERATOR_CHAT), retry_unfulfilled, ..Default::default() };
        let reconciler = Reconciler::new(
            db.clone(),
            ledger.clone(),
            grants.clone(),
            notifier.clone(),
            PlanCatalog::default(),
            config,
        );
        let issuer = OrderIssuerApi::with_seed(db.clone(), PlanCatalog::default(), IssuerConfig::default(), 7);
        Self {
            db_path: url,
            db,
            issuer,
            reconciler,
            ledger,
            grants,
            notifier,
            now: t0(),
            transfers: vec![],
            orders: HashMap::new(),
            last_issuance: None,
            last_report: None,
        }
    }

    pub fn advance(&mut self, minutes: i64) {
        self.now += Duration::minutes(minutes);
    }

    pub fn order_id_for(&self, requester_id: i64) -> OrderId {
        self.orders.get(&requester_id).cloned().unwrap_or_else(|| panic!("No order recorded for {requester_id}"))
    }
}
