use std::{fmt::Debug, sync::Mutex};

use chrono::{DateTime, Duration, Utc};
use log::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use upg_common::MicroUsdt;

use crate::{
    db::traits::{OrderManagement, StoreError},
    db_types::{MessageRef, NewOrder, Order, OrderId, OrderStatusType},
    plans::PlanCatalog,
    tpe_api::errors::IssuanceError,
};

/// Largest addend, in ten-thousandths of a USDT.
pub const MAX_AMOUNT_ADDEND: i64 = 9_999;
pub const DEFAULT_AMOUNT_ATTEMPTS: usize = 50;
pub const DEFAULT_ORDER_TIMEOUT_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub order_timeout: Duration,
    /// How many random amounts to try before giving up on finding an unreserved one.
    pub amount_attempts: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self { order_timeout: Duration::minutes(DEFAULT_ORDER_TIMEOUT_MINUTES), amount_attempts: DEFAULT_AMOUNT_ATTEMPTS }
    }
}

/// `OrderIssuerApi` creates payment orders whose amounts are unique among pending orders, so that an incoming
/// transfer can be attributed to an order by its amount alone.
pub struct OrderIssuerApi<B> {
    db: B,
    plans: PlanCatalog,
    config: IssuerConfig,
    rng: Mutex<StdRng>,
    /// Held while an order is issued, so that concurrent requests cannot reserve the same amount.
    issuance: tokio::sync::Mutex<()>,
}

impl<B> Debug for OrderIssuerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderIssuerApi ({} minute orders)", self.config.order_timeout.num_minutes())
    }
}

impl<B> OrderIssuerApi<B> {
    pub fn new(db: B, plans: PlanCatalog, config: IssuerConfig) -> Self {
        Self::with_rng(db, plans, config, StdRng::from_entropy())
    }

    /// An issuer whose amount and id draws are reproducible.
    pub fn with_seed(db: B, plans: PlanCatalog, config: IssuerConfig, seed: u64) -> Self {
        Self::with_rng(db, plans, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(db: B, plans: PlanCatalog, config: IssuerConfig, rng: StdRng) -> Self {
        Self { db, plans, config, rng: Mutex::new(rng), issuance: tokio::sync::Mutex::new(()) }
    }

    pub fn plans(&self) -> &PlanCatalog {
        &self.plans
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn draw<T, F: FnOnce(&mut StdRng) -> T>(&self, f: F) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl<B> OrderIssuerApi<B>
where B: OrderManagement
{
    pub async fn create_payment_order(&self, requester_id: i64, plan_id: &str) -> Result<Order, IssuanceError> {
        self.create_payment_order_at(requester_id, plan_id, Utc::now()).await
    }

    /// Issues a new `Pending` order for the requester as of `now`.
    ///
    /// A requester may only hold one unexpired pending order. A pending order that has passed its deadline is expired
    /// on the spot, and issuance proceeds.
    pub async fn create_payment_order_at(
        &self,
        requester_id: i64,
        plan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, IssuanceError> {
        let _guard = self.issuance.lock().await;
        if let Some(existing) = self.db.fetch_pending_order_for(requester_id).await? {
            if !existing.is_expired_at(now) {
                debug!("🧾 Requester {requester_id} still has order {} open", existing.order_id);
                return Err(IssuanceError::ActiveOrderExists { order: Box::new(existing) });
            }
            debug!("🧾 Order {} has lapsed. Expiring it before issuing a new one", existing.order_id);
            match self.db.update_order_status(&existing.order_id, OrderStatusType::Expired, None, now).await {
                // Paid or closed in the meantime. Either way it no longer blocks a new order.
                Ok(_) | Err(StoreError::InvalidTransition { .. }) => {},
                Err(e) => return Err(e.into()),
            }
        }
        let plan = self.plans.get(plan_id).ok_or_else(|| IssuanceError::InvalidPlan(plan_id.to_string()))?;
        let amount = self.reserve_amount(plan.price).await?.ok_or_else(|| {
            warn!("🧾 No free amount found for {plan_id} after {} attempts", self.config.amount_attempts);
            IssuanceError::AmountSpaceExhausted(plan_id.to_string())
        })?;
        let suffix = self.draw(|rng| rng.gen::<u32>());
        let order = NewOrder {
            order_id: OrderId::new(requester_id, now, suffix),
            requester_id,
            plan_id: plan.id.clone(),
            amount,
            created_at: now,
            expires_at: now + self.config.order_timeout,
        };
        let order = self.db.create_order(order).await?;
        info!("🧾 Order {} issued to {requester_id} for {} USDT ({})", order.order_id, order.amount, plan.name);
        Ok(order)
    }

    /// Draws `price + n/10_000` for random `n` in `1..=9999` until the amount is not reserved by another pending
    /// order, giving up after the configured number of attempts.
    async fn reserve_amount(&self, price: MicroUsdt) -> Result<Option<MicroUsdt>, IssuanceError> {
        for attempt in 1..=self.config.amount_attempts {
            let addend = self.draw(|rng| rng.gen_range(1..=MAX_AMOUNT_ADDEND));
            let candidate = price + MicroUsdt::from(addend * MicroUsdt::TEN_THOUSANDTH.value());
            if !self.db.is_amount_reserved(candidate).await? {
                return Ok(Some(candidate));
            }
            trace!("🧾 Amount {candidate} is taken (attempt {attempt})");
        }
        Ok(None)
    }

    /// Cancels a pending order. Cancelling an order that is already cancelled returns it unchanged.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, IssuanceError> {
        match self.db.update_order_status(order_id, OrderStatusType::Cancelled, None, Utc::now()).await? {
            Some(order) => {
                info!("🧾 Order {order_id} cancelled");
                Ok(order)
            },
            None => self.order(order_id).await,
        }
    }

    pub async fn attach_message(&self, order_id: &OrderId, message: MessageRef) -> Result<(), IssuanceError> {
        self.db.set_order_message(order_id, message).await?;
        Ok(())
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order, IssuanceError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| IssuanceError::OrderNotFound(order_id.clone()))
    }

    pub async fn pending_order_for(&self, requester_id: i64) -> Result<Option<Order>, IssuanceError> {
        Ok(self.db.fetch_pending_order_for(requester_id).await?)
    }
}
