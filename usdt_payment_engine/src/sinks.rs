//! Outbound collaborators of the reconciler.
//!
//! * [`FulfillmentSink`] grants the purchased entitlement once an order is paid.
//! * [`NotificationSink`] talks to people: the requester and, optionally, an operator chat.
//!
//! Notifications are best-effort. The reconciler logs a [`NotificationError`] and carries on.
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::MessageRef;

/// The outcome of a successful grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantReceipt {
    /// When the requester's entitlement now runs out, if the sink tracks it.
    pub entitlement_expires_at: Option<DateTime<Utc>>,
}

#[allow(async_fn_in_trait)]
pub trait FulfillmentSink {
    type Error: std::error::Error;

    /// Extends the requester's entitlement by `duration_days`.
    async fn grant(&self, requester_id: i64, duration_days: u32) -> Result<GrantReceipt, Self::Error>;
}

/// A button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    /// Sends `data` back to the bot when pressed.
    Callback { label: String, data: String },
    /// Opens `url`.
    Link { label: String, url: String },
}

impl NotificationAction {
    pub fn callback<S: Into<String>>(label: S, data: S) -> Self {
        Self::Callback { label: label.into(), data: data.into() }
    }

    pub fn link<S: Into<String>>(label: S, url: S) -> Self {
        Self::Link { label: label.into(), url: url.into() }
    }
}

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("The recipient cannot be reached: {0}")]
    Unreachable(String),
    #[error("The message was rejected: {0}")]
    Rejected(String),
    #[error("Could not deliver the message: {0}")]
    Transport(String),
}

#[cfg_attr(test, mockall::automock)]
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<(), NotificationError>;

    async fn send_text_with_actions(
        &self,
        recipient: i64,
        text: &str,
        actions: &[NotificationAction],
    ) -> Result<(), NotificationError>;

    /// Deleting a message that no longer exists counts as success.
    async fn delete_message(&self, recipient: i64, message: MessageRef) -> Result<(), NotificationError>;

    async fn send_celebration(&self, recipient: i64, asset: &str) -> Result<(), NotificationError>;
}
