//! A [`NotificationSink`] that talks to customers and the operator chat through the Telegram Bot API.
//!
//! Every call is retried a few times with a pause in between. Replies that say the customer has blocked the bot or
//! deleted their account are final, and a message that is already gone counts as deleted.
use std::time::Duration;

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use upg_common::Secret;
use usdt_payment_engine::{db_types::MessageRef, NotificationAction, NotificationError, NotificationSink};

use crate::config::TelegramConfig;

const MESSAGE_ATTEMPTS: usize = 3;
const MINOR_ATTEMPTS: usize = 2;
const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);

const UNREACHABLE_MARKERS: [&str; 2] = ["bot was blocked", "user is deactivated"];
const ALREADY_DELETED_MARKERS: [&str; 2] = ["message to delete not found", "message can't be deleted"];

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// How a Bot API method is called: how often, how long each attempt may take, and which failures mean success.
#[derive(Debug, Clone, Copy)]
struct CallPolicy {
    attempts: usize,
    timeout: Duration,
    /// Minor calls pause for half as long between attempts.
    minor: bool,
    already_done: &'static [&'static str],
}

const SEND_POLICY: CallPolicy =
    CallPolicy { attempts: MESSAGE_ATTEMPTS, timeout: Duration::from_secs(60), minor: false, already_done: &[] };
const STICKER_POLICY: CallPolicy =
    CallPolicy { attempts: MINOR_ATTEMPTS, timeout: Duration::from_secs(30), minor: true, already_done: &[] };
const DELETE_POLICY: CallPolicy = CallPolicy {
    attempts: MINOR_ATTEMPTS,
    timeout: Duration::from_secs(15),
    minor: true,
    already_done: &ALREADY_DELETED_MARKERS,
};

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    token: Secret<String>,
    retry_pause: Duration,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }

    /// Overrides the pause between attempts. Minor calls (stickers, deletions) pause for half as long.
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token.reveal())
    }

    async fn call(&self, method: &str, body: Value, policy: CallPolicy) -> Result<(), NotificationError> {
        if self.token.is_empty() {
            return Err(NotificationError::Transport("no bot token is configured".to_string()));
        }
        let pause = if policy.minor { self.retry_pause / 2 } else { self.retry_pause };
        let mut last_error = NotificationError::Transport("no request was sent".to_string());
        for attempt in 1..=policy.attempts {
            trace!("📨 {method} (attempt {attempt}/{})", policy.attempts);
            let result = self.client.post(self.method_url(method)).timeout(policy.timeout).json(&body).send().await;
            let error = match result {
                Err(e) if e.is_timeout() => NotificationError::Transport(format!("{method} timed out")),
                // The URL carries the bot token, so it is left out of the message
                Err(e) => NotificationError::Transport(e.without_url().to_string()),
                Ok(response) => match response.json::<BotApiResponse>().await {
                    Ok(reply) if reply.ok => return Ok(()),
                    Ok(reply) => {
                        let description = reply.description.unwrap_or_else(|| "no description".to_string());
                        let lower = description.to_lowercase();
                        if policy.already_done.iter().any(|m| lower.contains(m)) {
                            debug!("📨 {method}: {description}. Treating it as done");
                            return Ok(());
                        }
                        if UNREACHABLE_MARKERS.iter().any(|m| lower.contains(m)) {
                            return Err(NotificationError::Unreachable(description));
                        }
                        NotificationError::Rejected(description)
                    },
                    Err(e) => NotificationError::Transport(format!("unreadable reply to {method}: {}", e.without_url())),
                },
            };
            warn!("📨 {method} failed on attempt {attempt}/{}: {error}", policy.attempts);
            last_error = error;
            if attempt < policy.attempts {
                tokio::time::sleep(pause).await;
            }
        }
        Err(last_error)
    }
}

/// One button per row.
pub fn inline_keyboard(actions: &[NotificationAction]) -> Value {
    let rows = actions
        .iter()
        .map(|action| match action {
            NotificationAction::Callback { label, data } => json!([{ "text": label, "callback_data": data }]),
            NotificationAction::Link { label, url } => json!([{ "text": label, "url": url }]),
        })
        .collect::<Vec<_>>();
    json!({ "inline_keyboard": rows })
}

impl NotificationSink for TelegramNotifier {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<(), NotificationError> {
        let body = json!({ "chat_id": recipient, "text": text, "parse_mode": "HTML" });
        self.call("sendMessage", body, SEND_POLICY).await?;
        debug!("📨 Message sent to {recipient}");
        Ok(())
    }

    async fn send_text_with_actions(
        &self,
        recipient: i64,
        text: &str,
        actions: &[NotificationAction],
    ) -> Result<(), NotificationError> {
        let body = json!({
            "chat_id": recipient,
            "text": text,
            "parse_mode": "HTML",
            "reply_markup": inline_keyboard(actions),
        });
        self.call("sendMessage", body, SEND_POLICY).await?;
        debug!("📨 Message with {} buttons sent to {recipient}", actions.len());
        Ok(())
    }

    async fn delete_message(&self, recipient: i64, message: MessageRef) -> Result<(), NotificationError> {
        let body = json!({ "chat_id": recipient, "message_id": message.0 });
        self.call("deleteMessage", body, DELETE_POLICY).await?;
        debug!("📨 Message {message} deleted for {recipient}");
        Ok(())
    }

    async fn send_celebration(&self, recipient: i64, asset: &str) -> Result<(), NotificationError> {
        let body = json!({ "chat_id": recipient, "sticker": asset });
        self.call("sendSticker", body, STICKER_POLICY).await
    }
}
