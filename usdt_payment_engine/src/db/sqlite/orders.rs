use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use upg_common::MicroUsdt;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{MessageRef, NewOrder, Order, OrderId, OrderStatusType},
};

/// Two pending amounts closer than this are considered the same amount.
pub const AMOUNT_RESERVATION_EPSILON: MicroUsdt = MicroUsdt::new(10);

const ORDER_COLUMNS: &str = "id, order_id, requester_id, plan_id, amount, status, created_at, expires_at, tx_hash, \
                             paid_at, completed_at, message_ref";

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// Returns `None` if an order with the same `order_id` already exists.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let result = sqlx::query(
        r#"
            INSERT INTO orders (order_id, requester_id, plan_id, amount, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(order_id) DO NOTHING
        "#,
    )
    .bind(&order.order_id)
    .bind(order.requester_id)
    .bind(&order.plan_id)
    .bind(order.amount)
    .bind(OrderStatusType::Pending)
    .bind(order.created_at)
    .bind(order.expires_at)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1"))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

#[derive(Debug, Clone, Default)]
pub struct OrderQueryFilter {
    order_id: Option<OrderId>,
    requester_id: Option<i64>,
    expires_before: Option<DateTime<Utc>>,
    statuses: Vec<OrderStatusType>,
    newest_first: bool,
    limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_requester_id(mut self, requester_id: i64) -> Self {
        self.requester_id = Some(requester_id);
        self
    }

    pub fn with_expires_before(mut self, when: DateTime<Utc>) -> Self {
        self.expires_before = Some(when);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.requester_id.is_none() &&
            self.expires_before.is_none() &&
            self.statuses.is_empty()
    }
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order, unless `newest_first` was requested.
pub async fn fetch_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {ORDER_COLUMNS} FROM orders "));
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(id) = query.requester_id {
        where_clause.push("requester_id = ");
        where_clause.push_bind_unseparated(id);
    }
    if let Some(when) = query.expires_before {
        where_clause.push("expires_at < ");
        where_clause.push_bind_unseparated(when);
    }
    if !query.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in query.statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
        }
        where_clause.push_unseparated(")");
    }
    if query.newest_first {
        builder.push(" ORDER BY created_at DESC, id DESC");
    } else {
        builder.push(" ORDER BY created_at ASC, id ASC");
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_orders: {:?}", orders.len());
    Ok(orders)
}

/// Moves the order into `status`, provided its current status is one of `status`'s predecessors. Returns whether a
/// row was changed.
pub(crate) async fn transition_order_status(
    order_id: &OrderId,
    status: OrderStatusType,
    tx_hash: Option<&str>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let predecessors = status.predecessors();
    if predecessors.is_empty() {
        return Ok(false);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(status);
    match status {
        OrderStatusType::Paid => {
            builder.push(", paid_at = ");
            builder.push_bind(at);
            if let Some(hash) = tx_hash {
                builder.push(", tx_hash = ");
                builder.push_bind(hash.to_string());
            }
        },
        OrderStatusType::Completed => {
            builder.push(", completed_at = ");
            builder.push_bind(at);
        },
        _ => {},
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for s in predecessors {
        statuses.push_bind(*s);
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn expire_pending_orders(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET status = $1 WHERE status = $2 AND expires_at < $3")
        .bind(OrderStatusType::Expired)
        .bind(OrderStatusType::Pending)
        .bind(now)
        .execute(conn)
        .await?;
    let count = result.rows_affected();
    if count > 0 {
        debug!("🗃️ {count} pending orders marked as expired");
    }
    Ok(count)
}

pub(crate) async fn is_amount_reserved(
    amount: MicroUsdt,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let hit: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE status = $1 AND ABS(amount - $2) < $3 LIMIT 1")
        .bind(OrderStatusType::Pending)
        .bind(amount)
        .bind(AMOUNT_RESERVATION_EPSILON)
        .fetch_optional(conn)
        .await?;
    Ok(hit.is_some())
}

/// Returns whether the order exists.
pub(crate) async fn set_message_ref(
    order_id: &OrderId,
    message: MessageRef,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("UPDATE orders SET message_ref = $1 WHERE order_id = $2")
        .bind(message)
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
