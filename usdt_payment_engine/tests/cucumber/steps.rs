use std::str::FromStr;

use cucumber::{given, then, when};
use upg_common::MicroUsdt;
use usdt_payment_engine::{
    db_types::{MessageRef, OrderStatusType},
    IssuanceError,
    OrderManagement,
    TickOutcome,
    TransactionManagement,
};

use crate::{
    cucumber::{payment_world::OPERATOR_CHAT, PaymentWorld},
    support::{insert_order, transfer, Sent},
};

fn usdt(amount: &str) -> MicroUsdt {
    MicroUsdt::from_str(amount).expect("Not a valid USDT amount")
}

#[given(expr = "customer {int} has a pending order of {word} USDT for the {word} plan")]
async fn pending_order(world: &mut PaymentWorld, requester: i64, amount: String, plan: String) {
    let sys = world.system();
    let order_id = format!("ORD-{requester}-{}", sys.orders.len() + 1);
    let order = insert_order(&sys.db, &order_id, requester, &plan, usdt(&amount).value(), sys.now).await;
    sys.orders.insert(requester, order.order_id);
}

#[given(expr = "the payment prompt for customer {int} is message {int}")]
async fn payment_prompt(world: &mut PaymentWorld, requester: i64, message: i64) {
    let sys = world.system();
    let order_id = sys.order_id_for(requester);
    sys.issuer.attach_message(&order_id, MessageRef(message)).await.expect("Error attaching message");
}

#[given("fulfilment is failing")]
async fn fulfilment_failing(world: &mut PaymentWorld) {
    world.system().grants.set_failing(true);
}

#[when("fulfilment recovers")]
async fn fulfilment_recovers(world: &mut PaymentWorld) {
    world.system().grants.set_failing(false);
}

#[when(expr = "customer {int} orders the {word} plan")]
async fn order_plan(world: &mut PaymentWorld, requester: i64, plan: String) {
    let sys = world.system();
    let result = sys.issuer.create_payment_order_at(requester, &plan, sys.now).await;
    if let Ok(order) = &result {
        sys.orders.insert(requester, order.order_id.clone());
    }
    sys.last_issuance = Some(result);
}

#[when(expr = "{int} minute(s) pass(es)")]
async fn time_passes(world: &mut PaymentWorld, minutes: i64) {
    world.system().advance(minutes);
}

#[when(expr = "transfer [{word}] of {word} USDT arrives with {int} confirmations")]
async fn transfer_arrives(world: &mut PaymentWorld, tx_hash: String, amount: String, confirmations: i64) {
    let sys = world.system();
    let tx = transfer(&tx_hash, usdt(&amount).value(), sys.now, confirmations);
    sys.transfers.push(tx);
    sys.ledger.set_transfers(sys.transfers.clone());
}

#[when(expr = "customer {int} pays the exact amount in transfer [{word}]")]
async fn pays_exact_amount(world: &mut PaymentWorld, requester: i64, tx_hash: String) {
    let sys = world.system();
    let order_id = sys.order_id_for(requester);
    let order = sys.db.fetch_order(&order_id).await.expect("Error fetching order").expect("Order does not exist");
    sys.transfers.push(transfer(&tx_hash, order.amount.value(), sys.now, 25));
    sys.ledger.set_transfers(sys.transfers.clone());
}

#[when(expr = "transfer [{word}] reaches {int} confirmations")]
async fn transfer_confirms(world: &mut PaymentWorld, tx_hash: String, confirmations: i64) {
    let sys = world.system();
    let tx = sys.transfers.iter_mut().find(|t| t.tx_hash == tx_hash).expect("Unknown transfer");
    tx.confirmations = confirmations;
    sys.ledger.set_transfers(sys.transfers.clone());
}

#[when("the reconciler runs")]
async fn reconciler_runs(world: &mut PaymentWorld) {
    let sys = world.system();
    let report = match sys.reconciler.run_tick_at(sys.now).await.expect("Reconciliation tick failed") {
        TickOutcome::Idle(report) | TickOutcome::Reconciled(report) => report,
        TickOutcome::Busy => panic!("Reconciler was busy"),
    };
    sys.last_report = Some(report);
}

#[then(expr = "the order for customer {int} is {word}")]
async fn order_status(world: &mut PaymentWorld, requester: i64, status: String) {
    let sys = world.system();
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order_id = sys.order_id_for(requester);
    let order = sys.db.fetch_order(&order_id).await.expect("Error fetching order").expect("Order does not exist");
    assert_eq!(order.status, expected, "Order {order_id} has the wrong status");
}

#[then(expr = "the order for customer {int} was paid by [{word}]")]
async fn order_paid_by(world: &mut PaymentWorld, requester: i64, tx_hash: String) {
    let sys = world.system();
    let order_id = sys.order_id_for(requester);
    let order = sys.db.fetch_order(&order_id).await.expect("Error fetching order").expect("Order does not exist");
    assert_eq!(order.tx_hash.as_deref(), Some(tx_hash.as_str()));
}

#[then(expr = "the new order for customer {int} costs between {word} and {word} USDT")]
async fn order_amount_range(world: &mut PaymentWorld, requester: i64, low: String, high: String) {
    let sys = world.system();
    let order = match &sys.last_issuance {
        Some(Ok(order)) => order,
        other => panic!("Expected a new order, got {other:?}"),
    };
    assert_eq!(order.requester_id, requester);
    assert!(order.amount >= usdt(&low) && order.amount <= usdt(&high), "Amount {} is out of range", order.amount);
}

#[then("the order is refused because one is already active")]
async fn order_refused(world: &mut PaymentWorld) {
    let sys = world.system();
    assert!(
        matches!(sys.last_issuance, Some(Err(IssuanceError::ActiveOrderExists { .. }))),
        "Expected the order to be refused, got {:?}",
        sys.last_issuance
    );
}

#[then(expr = "transfer [{word}] is recorded as {word}")]
async fn transfer_disposition(world: &mut PaymentWorld, tx_hash: String, disposition: String) {
    let sys = world.system();
    let tx = sys.db.fetch_transaction(&tx_hash).await.expect("Error fetching transfer").expect("Transfer not stored");
    assert!(tx.processed, "Transfer {tx_hash} is not processed");
    let recorded = tx.disposition.map(|d| d.to_string()).unwrap_or_default();
    assert_eq!(recorded, disposition);
}

#[then(expr = "transfer [{word}] is still waiting")]
async fn transfer_waiting(world: &mut PaymentWorld, tx_hash: String) {
    let sys = world.system();
    let tx = sys.db.fetch_transaction(&tx_hash).await.expect("Error fetching transfer").expect("Transfer not stored");
    assert!(!tx.processed);
    assert!(tx.disposition.is_none());
}

#[then(expr = "customer {int} has been granted {int} days")]
async fn granted(world: &mut PaymentWorld, requester: i64, days: u32) {
    let grants = world.system().grants.grants();
    assert!(grants.contains(&(requester, days)), "No {days}-day grant for {requester} in {grants:?}");
}

#[then("nothing has been granted")]
async fn nothing_granted(world: &mut PaymentWorld) {
    assert!(world.system().grants.grants().is_empty());
}

#[then(expr = "customer {int} is told {string}")]
async fn customer_told(world: &mut PaymentWorld, requester: i64, phrase: String) {
    let sent = world.system().notifier.sent_to(requester);
    let found = sent.iter().any(|s| match s {
        Sent::Text { text, .. } | Sent::WithActions { text, .. } => text.contains(&phrase),
        _ => false,
    });
    assert!(found, "Customer {requester} was never told '{phrase}'. Sent: {sent:?}");
}

#[then(expr = "message {int} for customer {int} is deleted")]
async fn message_deleted(world: &mut PaymentWorld, message: i64, requester: i64) {
    let sent = world.system().notifier.sent_to(requester);
    assert!(sent.contains(&Sent::Deleted { to: requester, message: MessageRef(message) }), "Sent: {sent:?}");
}

#[then(expr = "the operator is shown transfer [{word}]")]
async fn operator_notified(world: &mut PaymentWorld, tx_hash: String) {
    let sent = world.system().notifier.sent_to(OPERATOR_CHAT);
    let found = sent.iter().any(|s| match s {
        Sent::WithActions { actions, .. } => actions.iter().any(|a| format!("{a:?}").contains(&tx_hash)),
        _ => false,
    });
    assert!(found, "The operator was not shown {tx_hash}. Sent: {sent:?}");
}

#[then(expr = "the last tick expired {int} order(s)")]
async fn tick_expired(world: &mut PaymentWorld, count: u64) {
    let report = world.system().last_report.clone().expect("The reconciler has not run");
    assert_eq!(report.expired, count, "Report: {report}");
}

#[then("the ledger was not polled")]
async fn ledger_not_polled(world: &mut PaymentWorld) {
    assert_eq!(world.system().ledger.polls(), 0);
}
