//! The order-id counter.
//!
//! Ids come from a single-row table and are handed out through one atomic
//! increment-and-fetch statement. The allocation commits in its own
//! transaction *before* the order row does, so a creation that fails halfway
//! burns the id instead of ever reusing it.

use sea_orm::{ConnectionTrait, DatabaseConnection, Statement, TransactionTrait};

use crate::{EngineError, ResultEngine};

/// Allocates the next order id.
pub(crate) async fn next_order_id(db: &DatabaseConnection) -> ResultEngine<i64> {
    let tx = db.begin().await?;
    let backend = tx.get_database_backend();
    let row = tx
        .query_one(Statement::from_string(
            backend,
            "UPDATE order_counter SET value = value + 1 WHERE id = 1 RETURNING value",
        ))
        .await?
        .ok_or_else(|| EngineError::NotFound("order counter".to_string()))?;
    let value: i64 = row.try_get("", "value")?;
    tx.commit().await?;
    Ok(value)
}
