use std::{fmt::Display, time::Instant};

use chrono::{DateTime, Duration, Utc};
use log::*;
use tokio::sync::Mutex;
use upg_common::MicroUsdt;

use crate::{
    db::traits::{PaymentStore, StoreError},
    db_types::{Order, OrderStatusType, TransactionRecord, TransferDisposition},
    ledger::LedgerSource,
    plans::{Plan, PlanCatalog},
    sinks::{FulfillmentSink, GrantReceipt, NotificationSink},
    tpe_api::{errors::ReconcileError, messages},
};

/// A transfer pays an order if the amounts differ by less than this.
pub const AMOUNT_MATCH_TOLERANCE: MicroUsdt = MicroUsdt::new(100);
/// Transfers stamped up to this many seconds before an order was created still count towards it.
pub const ORDER_CLOCK_SKEW_GRACE_SECS: i64 = 60;

pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 20;
pub const DEFAULT_MAX_TRANSACTION_AGE_MINUTES: i64 = 15;
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub min_confirmations: u64,
    /// Transfers older than this when first considered are closed off without matching.
    pub max_transaction_age: Duration,
    pub batch_size: usize,
    /// The only token contract accepted as payment.
    pub contract_address: String,
    /// Chat that receives a notice for every completed payment.
    pub operator_chat_id: Option<i64>,
    /// Sticker sent to the requester ahead of the success message.
    pub celebration_asset: Option<String>,
    /// Re-attempt the grant for orders left `Paid` by an earlier failure.
    pub retry_unfulfilled: bool,
    pub explorer_tx_url: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            max_transaction_age: Duration::minutes(DEFAULT_MAX_TRANSACTION_AGE_MINUTES),
            batch_size: DEFAULT_BATCH_SIZE,
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            operator_chat_id: None,
            celebration_asset: None,
            retry_unfulfilled: false,
            explorer_tx_url: messages::DEFAULT_EXPLORER_TX_URL.to_string(),
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub expired: u64,
    pub retried: usize,
    pub transfers_seen: usize,
    pub already_processed: usize,
    pub awaiting_confirmation: usize,
    pub foreign_asset: usize,
    pub stale: usize,
    pub matched: usize,
    pub completed: usize,
    pub grant_failed: usize,
    pub rejected: usize,
    pub unmatched: usize,
    pub errors: usize,
}

impl Display for TickReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} expired, {} transfers seen ({} matched, {} completed, {} grant failures, {} rejected, {} unmatched, {} \
             stale, {} foreign, {} unconfirmed, {} already processed), {} retried, {} errors",
            self.expired,
            self.transfers_seen,
            self.matched,
            self.completed,
            self.grant_failed,
            self.rejected,
            self.unmatched,
            self.stale,
            self.foreign_asset,
            self.awaiting_confirmation,
            self.already_processed,
            self.retried,
            self.errors
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// There were no pending orders, so the ledger was not polled.
    Idle(TickReport),
    Reconciled(TickReport),
    /// Another tick was still running.
    Busy,
}

/// True if `tx` could be the payment for `order`: the amounts agree within [`AMOUNT_MATCH_TOLERANCE`] and the
/// transfer happened while the order was open (allowing [`ORDER_CLOCK_SKEW_GRACE_SECS`] before creation).
pub fn transfer_matches_order(order: &Order, tx: &TransactionRecord) -> bool {
    order.amount.abs_diff(tx.amount) < AMOUNT_MATCH_TOLERANCE &&
        tx.timestamp >= order.created_at - Duration::seconds(ORDER_CLOCK_SKEW_GRACE_SECS) &&
        tx.timestamp <= order.expires_at
}

/// The `Reconciler` matches confirmed inbound transfers to pending orders, drives matched orders through
/// `Paid → Completed` by granting the entitlement, and expires orders that ran out of time.
///
/// Call [`Reconciler::run_tick`] periodically. Ticks never overlap: a tick started while another is in progress
/// returns [`TickOutcome::Busy`] immediately.
pub struct Reconciler<B, L, F, N> {
    db: B,
    ledger: L,
    fulfillment: F,
    notifier: N,
    plans: PlanCatalog,
    config: ReconcileConfig,
    tick_guard: Mutex<()>,
}

impl<B, L, F, N> Reconciler<B, L, F, N> {
    pub fn new(db: B, ledger: L, fulfillment: F, notifier: N, plans: PlanCatalog, config: ReconcileConfig) -> Self {
        Self { db, ledger, fulfillment, notifier, plans, config, tick_guard: Mutex::new(()) }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }
}

impl<B, L, F, N> Reconciler<B, L, F, N>
where
    B: PaymentStore,
    L: LedgerSource,
    F: FulfillmentSink,
    N: NotificationSink,
{
    pub async fn run_tick(&self) -> Result<TickOutcome, ReconcileError> {
        self.run_tick_at(Utc::now()).await
    }

    /// Runs one reconciliation pass as though the tick started at `now`.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, ReconcileError> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            debug!("🔄️ A reconciliation tick is already running. Skipping this one");
            return Ok(TickOutcome::Busy);
        };
        let started = Instant::now();
        let mut report = TickReport::default();

        self.expire_overdue_orders(now, &mut report).await?;
        report.expired += self.db.expire_pending_orders(now).await?;
        if self.config.retry_unfulfilled {
            self.retry_unfulfilled_orders(now, &mut report).await;
        }

        let mut pending = self.db.fetch_pending_orders().await?;
        if pending.is_empty() {
            trace!("🔄️ No pending orders. Skipping the ledger poll");
            return Ok(TickOutcome::Idle(report));
        }
        let transfers = self.ledger.fetch_recent_transfers(self.config.batch_size).await;
        report.transfers_seen = transfers.len();
        trace!("🔄️ {} pending orders, {} recent transfers", pending.len(), transfers.len());
        for tx in &transfers {
            let at = Self::clock(now, started);
            if let Err(e) = self.process_transfer(tx, &mut pending, at, &mut report).await {
                report.errors += 1;
                error!("🔄️ Could not process transfer {}: {e}", tx.tx_hash);
            }
        }
        Ok(TickOutcome::Reconciled(report))
    }

    /// `now`, advanced by the time this tick has been running.
    fn clock(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
        now + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero())
    }

    /// Expires overdue orders one at a time so that each requester is told, and their payment prompt removed.
    async fn expire_overdue_orders(&self, now: DateTime<Utc>, report: &mut TickReport) -> Result<(), ReconcileError> {
        for order in self.db.fetch_expired_pending_orders(now).await? {
            match self.db.update_order_status(&order.order_id, OrderStatusType::Expired, None, now).await {
                Ok(Some(expired)) => {
                    report.expired += 1;
                    info!("🔄️ Order {} expired without payment", expired.order_id);
                    self.notify_expired(&expired).await;
                },
                Ok(None) => {},
                Err(StoreError::InvalidTransition { from, .. }) => {
                    debug!("🔄️ Order {} moved to {from} before it could expire", order.order_id);
                },
                Err(e) => {
                    report.errors += 1;
                    error!("🔄️ Could not expire order {}: {e}", order.order_id);
                },
            }
        }
        Ok(())
    }

    async fn notify_expired(&self, order: &Order) {
        if let Some(message) = order.message_ref {
            if let Err(e) = self.notifier.delete_message(order.requester_id, message).await {
                warn!("🔄️ Could not remove the payment prompt for expired order {}: {e}", order.order_id);
            }
        }
        let text = messages::order_expired_text(order);
        let actions = messages::order_expired_actions();
        if let Err(e) = self.notifier.send_text_with_actions(order.requester_id, &text, &actions).await {
            warn!("🔄️ Could not tell {} that order {} expired: {e}", order.requester_id, order.order_id);
        }
    }

    /// Re-attempts the grant for each `Paid` order. A failure with one order is logged and the next one proceeds.
    async fn retry_unfulfilled_orders(&self, now: DateTime<Utc>, report: &mut TickReport) {
        let orders = match self.db.fetch_paid_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                report.errors += 1;
                error!("🔄️ Could not fetch paid orders for the grant retry: {e}");
                return;
            },
        };
        for order in orders {
            info!("🔄️ Retrying the grant for paid order {}", order.order_id);
            report.retried += 1;
            let tx = match &order.tx_hash {
                Some(hash) => match self.db.fetch_transaction(hash).await {
                    Ok(tx) => tx,
                    Err(e) => {
                        report.errors += 1;
                        error!("🔄️ Could not load transfer {hash} for order {}. Skipping it: {e}", order.order_id);
                        continue;
                    },
                },
                None => None,
            };
            self.fulfil(&order, tx.as_ref(), now, report).await;
        }
    }

    async fn process_transfer(
        &self,
        tx: &TransactionRecord,
        pending: &mut Vec<Order>,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), ReconcileError> {
        if self.db.is_transaction_processed(&tx.tx_hash).await? {
            report.already_processed += 1;
            return Ok(());
        }
        self.db.upsert_transaction(tx).await?;
        if !tx.is_confirmed(self.config.min_confirmations) {
            trace!("🔄️ Transfer {} has {} confirmations. Waiting for more", tx.tx_hash, tx.confirmations);
            report.awaiting_confirmation += 1;
            return Ok(());
        }
        if tx.contract_address != self.config.contract_address {
            debug!("🔄️ Transfer {} is for token {}. Ignoring it", tx.tx_hash, tx.contract_address);
            self.db.mark_transaction_processed(&tx.tx_hash, TransferDisposition::ForeignAsset, None).await?;
            report.foreign_asset += 1;
            return Ok(());
        }
        if now - tx.timestamp > self.config.max_transaction_age {
            debug!("🔄️ Transfer {} from {} is too old to match an order", tx.tx_hash, tx.timestamp);
            self.db.mark_transaction_processed(&tx.tx_hash, TransferDisposition::Stale, None).await?;
            report.stale += 1;
            return Ok(());
        }
        match self.take_matching_order(tx, pending, now, report).await? {
            Some(order) => self.settle(order, tx, now, report).await,
            None => {
                info!("🔄️ Transfer {} of {} USDT does not match any pending order", tx.tx_hash, tx.amount);
                self.db.mark_transaction_processed(&tx.tx_hash, TransferDisposition::Unmatched, None).await?;
                report.unmatched += 1;
                Ok(())
            },
        }
    }

    /// Removes and returns the first order in the snapshot that `tx` pays. Orders found to have lapsed along the way
    /// are expired and dropped from the snapshot.
    async fn take_matching_order(
        &self,
        tx: &TransactionRecord,
        pending: &mut Vec<Order>,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<Option<Order>, ReconcileError> {
        let mut i = 0;
        while i < pending.len() {
            if pending[i].is_expired_at(now) {
                let lapsed = pending.remove(i);
                match self.db.update_order_status(&lapsed.order_id, OrderStatusType::Expired, None, now).await {
                    Ok(Some(_)) => {
                        report.expired += 1;
                        debug!("🔄️ Order {} lapsed during reconciliation", lapsed.order_id);
                    },
                    Ok(None) | Err(StoreError::InvalidTransition { .. }) => {},
                    Err(e) => return Err(e.into()),
                }
                continue;
            }
            if transfer_matches_order(&pending[i], tx) {
                return Ok(Some(pending.remove(i)));
            }
            i += 1;
        }
        Ok(None)
    }

    async fn settle(
        &self,
        order: Order,
        tx: &TransactionRecord,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), ReconcileError> {
        let paid = match self.db.update_order_status(&order.order_id, OrderStatusType::Paid, Some(&tx.tx_hash), now).await
        {
            Ok(Some(paid)) => paid,
            Ok(None) | Err(StoreError::InvalidTransition { .. }) => {
                warn!("🔄️ Transfer {} matched order {}, but the order can no longer be paid", tx.tx_hash, order.order_id);
                self.db
                    .mark_transaction_processed(&tx.tx_hash, TransferDisposition::Rejected, Some(&order.order_id))
                    .await?;
                report.rejected += 1;
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        };
        info!("🔄️ Order {} paid by transfer {} of {} USDT", paid.order_id, tx.tx_hash, tx.amount);
        report.matched += 1;
        self.fulfil(&paid, Some(tx), now, report).await;
        self.db.mark_transaction_processed(&tx.tx_hash, TransferDisposition::Matched, Some(&paid.order_id)).await?;
        Ok(())
    }

    /// Grants the entitlement for a paid order and completes it. A failed grant leaves the order `Paid`.
    ///
    /// Once the grant has gone through the requester is always told, even if the order cannot be marked `Completed`.
    async fn fulfil(&self, order: &Order, tx: Option<&TransactionRecord>, now: DateTime<Utc>, report: &mut TickReport) {
        let Some(plan) = self.plans.get(&order.plan_id) else {
            error!("🔄️ Order {} is for unknown plan {}. It stays Paid", order.order_id, order.plan_id);
            report.grant_failed += 1;
            return;
        };
        let receipt = match self.fulfillment.grant(order.requester_id, plan.duration_days).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(
                    "🔄️ Could not grant {} days to {} for order {}. It stays Paid. {e}",
                    plan.duration_days, order.requester_id, order.order_id
                );
                report.grant_failed += 1;
                return;
            },
        };
        match self.db.update_order_status(&order.order_id, OrderStatusType::Completed, None, now).await {
            Ok(_) => {
                let (order_id, days, requester) = (&order.order_id, plan.duration_days, order.requester_id);
                info!("🔄️ Order {order_id} completed. {days} days granted to {requester}");
                report.completed += 1;
            },
            Err(e) => {
                report.errors += 1;
                error!(
                    "🔄️ {} days were granted to {} for order {}, but the order could not be completed: {e}",
                    plan.duration_days, order.requester_id, order.order_id
                );
            },
        }
        self.notify_success(order, plan, &receipt, tx).await;
    }

    async fn notify_success(&self, order: &Order, plan: &Plan, receipt: &GrantReceipt, tx: Option<&TransactionRecord>) {
        let requester = order.requester_id;
        match self.db.fetch_order_message(&order.order_id).await {
            Ok(Some(message)) => {
                if let Err(e) = self.notifier.delete_message(requester, message).await {
                    warn!("🔄️ Could not remove the payment prompt for order {}: {e}", order.order_id);
                }
            },
            Ok(None) => {},
            Err(e) => warn!("🔄️ Could not look up the payment prompt for order {}: {e}", order.order_id),
        }
        if let Some(asset) = &self.config.celebration_asset {
            if let Err(e) = self.notifier.send_celebration(requester, asset).await {
                warn!("🔄️ Could not send the celebration to {requester}: {e}");
            }
        }
        let text = messages::payment_success_text(order, plan, receipt);
        if let Err(e) = self.notifier.send_text(requester, &text).await {
            warn!("🔄️ Could not tell {requester} that order {} is complete: {e}", order.order_id);
        }
        let (Some(chat), Some(tx)) = (self.config.operator_chat_id, tx) else {
            return;
        };
        let text = messages::operator_payment_text(order, plan, receipt, tx);
        let actions = messages::operator_payment_actions(&self.config.explorer_tx_url, &tx.tx_hash);
        if let Err(e) = self.notifier.send_text_with_actions(chat, &text, &actions).await {
            warn!("🔄️ Operator notice with actions failed ({e}). Sending it as plain text");
            if let Err(e) = self.notifier.send_text(chat, &text).await {
                warn!("🔄️ Could not send the operator notice for order {}: {e}", order.order_id);
            }
        }
    }
}
