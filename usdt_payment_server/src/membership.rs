//! The membership ledger: a [`FulfillmentSink`] that extends a user's membership in the bot's SQLite database.
//!
//! The table is shared with the chat bot, which reads `expiry_time` as a naive `%Y-%m-%d %H:%M:%S` timestamp in its
//! own local time (UTC+8 unless configured otherwise).
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::*;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use thiserror::Error;
use usdt_payment_engine::{FulfillmentSink, GrantReceipt};

const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const MEMBER_LEVEL: &str = "member";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("Could not open the membership database. {0}")]
    ConnectionError(String),
    #[error("Membership query failed. {0}")]
    QueryError(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct MembershipLedger {
    pool: SqlitePool,
    /// The bot's local time zone, which the naive timestamps in the table are written in.
    offset: FixedOffset,
}

/// The bot's local time zone for a whole-hour offset from UTC, if the offset is in range.
pub fn utc_offset(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

impl MembershipLedger {
    /// Opens (creating if needed) the membership database at `url`, with timestamps in UTC+8.
    pub async fn connect(url: &str) -> Result<Self, MembershipError> {
        let offset = utc_offset(DEFAULT_UTC_OFFSET_HOURS)
            .ok_or_else(|| MembershipError::ConnectionError("invalid default UTC offset".to_string()))?;
        Self::connect_with_offset(url, offset).await
    }

    /// Opens (creating if needed) the membership database at `url`. The table is created in the bot's layout if it
    /// does not exist, and the `expiry_time` column is added to an older table that lacks it.
    pub async fn connect_with_offset(url: &str, offset: FixedOffset) -> Result<Self, MembershipError> {
        let options =
            SqliteConnectOptions::from_str(url).map_err(|e| MembershipError::ConnectionError(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options.create_if_missing(true))
            .await
            .map_err(|e| MembershipError::ConnectionError(e.to_string()))?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS memberships (
                user_id INTEGER PRIMARY KEY,
                level TEXT,
                trial_expiry_time TEXT,
                created_at TEXT
            )"#,
        )
        .execute(&pool)
        .await?;
        let has_expiry: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info('memberships') WHERE name = 'expiry_time'")
                .fetch_one(&pool)
                .await?;
        if has_expiry == 0 {
            info!("🎟️ Adding the expiry_time column to the memberships table");
            sqlx::query("ALTER TABLE memberships ADD COLUMN expiry_time TEXT").execute(&pool).await?;
        }
        debug!("🎟️ Membership ledger ready at {url} (UTC{offset})");
        Ok(Self { pool, offset })
    }

    pub async fn expiry_for(&self, user_id: i64) -> Result<Option<DateTime<Utc>>, MembershipError> {
        let expiry: Option<Option<String>> =
            sqlx::query_scalar("SELECT expiry_time FROM memberships WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(expiry.flatten().and_then(|s| self.parse_expiry(user_id, &s)))
    }

    /// Extends the membership of `user_id` by `days`, counting from the current expiry if it lies in the future, or
    /// from `now` otherwise. Returns the new expiry.
    pub async fn grant_at(
        &self,
        user_id: i64,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, MembershipError> {
        let current = self.expiry_for(user_id).await?;
        let start = match current {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let new_expiry = start + Duration::days(i64::from(days));
        let expiry_text = self.local_text(new_expiry);
        sqlx::query(
            r#"INSERT INTO memberships (user_id, level, expiry_time, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT(user_id) DO UPDATE SET level = excluded.level, expiry_time = excluded.expiry_time"#,
        )
        .bind(user_id)
        .bind(MEMBER_LEVEL)
        .bind(&expiry_text)
        .bind(self.local_text(now))
        .execute(&self.pool)
        .await?;
        info!("🎟️ Membership for {user_id} extended by {days} days to {expiry_text} (UTC{})", self.offset);
        Ok(new_expiry)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn local_text(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format(EXPIRY_FORMAT).to_string()
    }

    fn parse_expiry(&self, user_id: i64, value: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(value.trim(), EXPIRY_FORMAT)
            .map_err(|e| warn!("🎟️ Ignoring unreadable expiry '{value}' for {user_id}. {e}"))
            .ok()?;
        self.offset.from_local_datetime(&naive).single().map(|local| local.with_timezone(&Utc))
    }
}

impl FulfillmentSink for MembershipLedger {
    type Error = MembershipError;

    async fn grant(&self, requester_id: i64, duration_days: u32) -> Result<GrantReceipt, Self::Error> {
        let expiry = self.grant_at(requester_id, duration_days, Utc::now()).await?;
        Ok(GrantReceipt { entitlement_expires_at: Some(expiry) })
    }
}
