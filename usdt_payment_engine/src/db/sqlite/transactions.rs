use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OrderId, TransactionRecord, TransferDisposition},
};

const TRANSACTION_COLUMNS: &str = "tx_hash, from_address, to_address, amount, timestamp, block_number, confirmations, \
                                   contract_address, processed, order_id, disposition";

/// Records a transfer, or refreshes the observation of one that has been seen before. A refresh never clears the
/// processed flag, the disposition or the order link.
pub async fn upsert_transaction(tx: &TransactionRecord, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO transactions (
                tx_hash,
                from_address,
                to_address,
                amount,
                timestamp,
                block_number,
                confirmations,
                contract_address,
                processed,
                order_id,
                disposition,
                observed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT(tx_hash) DO UPDATE SET
                block_number = excluded.block_number,
                confirmations = excluded.confirmations,
                observed_at = excluded.observed_at,
                processed = MAX(transactions.processed, excluded.processed),
                order_id = COALESCE(transactions.order_id, excluded.order_id),
                disposition = COALESCE(transactions.disposition, excluded.disposition)
        "#,
    )
    .bind(&tx.tx_hash)
    .bind(&tx.from_address)
    .bind(&tx.to_address)
    .bind(tx.amount)
    .bind(tx.timestamp)
    .bind(tx.block_number)
    .bind(tx.confirmations)
    .bind(&tx.contract_address)
    .bind(tx.processed)
    .bind(&tx.order_id)
    .bind(tx.disposition)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    trace!("🗃️ Transaction {} recorded with {} confirmations", tx.tx_hash, tx.confirmations);
    Ok(())
}

pub async fn fetch_transaction(
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<TransactionRecord>, SqliteDatabaseError> {
    let tx = sqlx::query_as::<_, TransactionRecord>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE tx_hash = $1"
    ))
    .bind(tx_hash)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn is_processed(tx_hash: &str, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let processed: Option<bool> = sqlx::query_scalar("SELECT processed FROM transactions WHERE tx_hash = $1")
        .bind(tx_hash)
        .fetch_optional(conn)
        .await?;
    Ok(processed.unwrap_or(false))
}

/// Returns whether the transaction exists.
pub(crate) async fn mark_processed(
    tx_hash: &str,
    disposition: TransferDisposition,
    order_id: Option<&OrderId>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE transactions SET processed = 1, disposition = $1, order_id = COALESCE($2, order_id) WHERE tx_hash = $3",
    )
    .bind(disposition)
    .bind(order_id)
    .bind(tx_hash)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
