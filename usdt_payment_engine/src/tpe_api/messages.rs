//! Texts and buttons sent to requesters and the operator chat. Texts use Telegram's HTML parse mode.
use upg_common::helpers::mask_address;

use crate::{
    db_types::{Order, TransactionRecord},
    plans::Plan,
    sinks::{GrantReceipt, NotificationAction},
};

pub const BUY_AGAIN_CALLBACK: &str = "usdt_payment";
pub const MAIN_MENU_CALLBACK: &str = "back_to_main";
pub const DEFAULT_EXPLORER_TX_URL: &str = "https://tronscan.org/#/transaction/";

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn order_expired_text(order: &Order) -> String {
    format!(
        "⏰ <b>Order expired</b>\n\nOrder <code>{}</code> for {} USDT was not paid within the time limit and has been \
         closed.\n\nIf you already sent the payment, contact support with your transaction hash.",
        order.order_id, order.amount
    )
}

pub fn order_expired_actions() -> Vec<NotificationAction> {
    vec![
        NotificationAction::callback("🔄 Buy again", BUY_AGAIN_CALLBACK),
        NotificationAction::callback("🏠 Main menu", MAIN_MENU_CALLBACK),
    ]
}

pub fn payment_success_text(order: &Order, plan: &Plan, receipt: &GrantReceipt) -> String {
    let mut text = format!(
        "✅ <b>Payment received</b>\n\nOrder: <code>{}</code>\nPlan: {}\nAmount: {} USDT\nDuration: {} days",
        order.order_id,
        escape_html(&plan.name),
        order.amount,
        plan.duration_days
    );
    if let Some(expiry) = receipt.entitlement_expires_at {
        text.push_str(&format!("\nMembership valid until: {}", expiry.format("%Y-%m-%d %H:%M UTC")));
    }
    text.push_str("\n\nThank you for your purchase!");
    text
}

pub fn operator_payment_text(order: &Order, plan: &Plan, receipt: &GrantReceipt, tx: &TransactionRecord) -> String {
    let mut text = format!(
        "💰 <b>New USDT payment</b>\n\nUser: <code>{}</code>\nOrder: <code>{}</code>\nPlan: {} ({} days)\nAmount: {} \
         USDT\nFrom: <code>{}</code>\nTo: <code>{}</code>",
        order.requester_id,
        order.order_id,
        escape_html(&plan.name),
        plan.duration_days,
        tx.amount,
        mask_address(&tx.from_address),
        mask_address(&tx.to_address),
    );
    if let Some(expiry) = receipt.entitlement_expires_at {
        text.push_str(&format!("\nValid until: {}", expiry.format("%Y-%m-%d %H:%M UTC")));
    }
    text
}

pub fn operator_payment_actions(explorer_tx_url: &str, tx_hash: &str) -> Vec<NotificationAction> {
    vec![NotificationAction::link("🔍 View transaction".to_string(), format!("{explorer_tx_url}{tx_hash}"))]
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use upg_common::MicroUsdt;

    use super::*;
    use crate::db_types::{OrderId, OrderStatusType};

    fn order() -> Order {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Order {
            id: 1,
            order_id: OrderId::from("ORD-7-1709294400000-0000beef"),
            requester_id: 7,
            plan_id: "plan_7d".into(),
            amount: MicroUsdt::from(5_321_700),
            status: OrderStatusType::Completed,
            created_at: at,
            expires_at: at + chrono::Duration::minutes(10),
            tx_hash: Some("abc".into()),
            paid_at: Some(at),
            completed_at: Some(at),
            message_ref: None,
        }
    }

    #[test]
    fn success_text_mentions_order_and_expiry() {
        let plan = Plan::new("plan_7d", "7-day <VIP> membership", MicroUsdt::from_usdt(5), 7);
        let receipt =
            GrantReceipt { entitlement_expires_at: Some(Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap()) };
        let text = payment_success_text(&order(), &plan, &receipt);
        assert!(text.contains("ORD-7-1709294400000-0000beef"));
        assert!(text.contains("5.3217 USDT"));
        assert!(text.contains("7-day &lt;VIP&gt; membership"));
        assert!(text.contains("2024-03-08 12:00 UTC"));
    }

    #[test]
    fn operator_text_masks_addresses() {
        let plan = Plan::new("plan_7d", "7-day membership", MicroUsdt::from_usdt(5), 7);
        let tx = TransactionRecord {
            tx_hash: "abc".into(),
            from_address: "TXYZabcdefghijklmnopqrstuvwxyz1234".into(),
            to_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            amount: MicroUsdt::from(5_321_700),
            timestamp: Utc::now(),
            block_number: 1,
            confirmations: 20,
            contract_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".into(),
            processed: false,
            order_id: None,
            disposition: None,
        };
        let text = operator_payment_text(&order(), &plan, &GrantReceipt::default(), &tx);
        assert!(text.contains("TR7NHqje*****SzgjLj6t"));
        assert!(!text.contains("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"));
        let actions = operator_payment_actions(DEFAULT_EXPLORER_TX_URL, "abc");
        assert_eq!(actions, vec![NotificationAction::link("🔍 View transaction", "https://tronscan.org/#/transaction/abc")]);
    }

    #[test]
    fn expired_notice_actions() {
        let actions = order_expired_actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], NotificationAction::callback("🔄 Buy again", "usdt_payment"));
        assert_eq!(actions[1], NotificationAction::callback("🏠 Main menu", "back_to_main"));
    }
}
