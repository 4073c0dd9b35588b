use std::time::Duration;

use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use usdt_payment_engine::{Reconciler, SqliteDatabase, TickOutcome, TronGridClient};

use crate::{membership::MembershipLedger, telegram::TelegramNotifier};

pub type ServerReconciler = Reconciler<SqliteDatabase, TronGridClient, MembershipLedger, TelegramNotifier>;

/// Starts the reconciliation worker, which runs a reconciliation tick every `period` until `shutdown` is cancelled.
///
/// Cancellation is checked between ticks; a tick that is already running is allowed to finish.
pub fn start_reconciliation_worker(
    reconciler: ServerReconciler,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Reconciliation worker started. Ticking every {}s", period.as_secs());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {},
            }
            trace!("🕰️ Running reconciliation tick");
            match reconciler.run_tick().await {
                Ok(TickOutcome::Reconciled(report)) => debug!("🕰️ Tick complete: {report}"),
                Ok(TickOutcome::Idle(report)) if report.expired > 0 => info!("🕰️ {} orders expired", report.expired),
                Ok(TickOutcome::Idle(_)) => trace!("🕰️ Nothing pending"),
                Ok(TickOutcome::Busy) => warn!("🕰️ The previous tick is still running"),
                Err(e) => error!("🕰️ Error running reconciliation tick: {e}"),
            }
        }
        info!("🕰️ Reconciliation worker stopped");
    })
}
