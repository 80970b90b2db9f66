//! The chat-scoped undo log.
//!
//! Every successful mutation records one entry carrying a JSON payload with
//! everything needed to invert it: the forward aggregate events, the prior
//! order fields, and the ids of the records it created. Undo consumes the
//! most recent unconsumed entry for a chat; entries are flagged, never
//! deleted, so the trail stays auditable.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, LedgerEvent, Money, OrderState, ResultEngine};

/// What kind of operation an entry reverses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    OrderCreated,
    Interest,
    PrincipalReduction,
    BreachSettlement,
    OrderCompleted,
    BreachCompleted,
    StateChanged,
    Expense,
    FundsAdjusted,
}

impl OperationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::Interest => "interest",
            Self::PrincipalReduction => "principal_reduction",
            Self::BreachSettlement => "breach_settlement",
            Self::OrderCompleted => "order_completed",
            Self::BreachCompleted => "breach_completed",
            Self::StateChanged => "state_changed",
            Self::Expense => "expense",
            Self::FundsAdjusted => "funds_adjusted",
        }
    }
}

impl TryFrom<&str> for OperationType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "order_created" => Ok(Self::OrderCreated),
            "interest" => Ok(Self::Interest),
            "principal_reduction" => Ok(Self::PrincipalReduction),
            "breach_settlement" => Ok(Self::BreachSettlement),
            "order_completed" => Ok(Self::OrderCompleted),
            "breach_completed" => Ok(Self::BreachCompleted),
            "state_changed" => Ok(Self::StateChanged),
            "expense" => Ok(Self::Expense),
            "funds_adjusted" => Ok(Self::FundsAdjusted),
            other => Err(EngineError::NotFound(format!("operation type {other}"))),
        }
    }
}

/// Everything needed to exactly invert one operation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct HistoryPayload {
    pub order_id: Option<i64>,
    /// Income record created by the operation; undo appends a reversing
    /// adjustment pointing at it.
    pub record_id: Option<i64>,
    /// Expense record created by the operation; undo removes it.
    pub expense_record_id: Option<i64>,
    /// Order state before the operation, when it changed one.
    pub old_state: Option<OrderState>,
    /// Outstanding principal before the operation, when it changed it.
    pub old_amount: Option<Money>,
    /// The operation created the order; undo removes the row.
    pub created_order: bool,
    /// Forward aggregate events, reverted one by one on undo.
    pub events: Vec<LedgerEvent>,
}

/// A history entry as read back for undo.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub id: i64,
    pub operation: OperationType,
    pub payload: HistoryPayload,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "operation_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub chat_id: i64,
    pub operation_type: String,
    pub payload: String,
    pub performed_at: DateTimeUtc,
    pub undone: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub(crate) async fn record(
    conn: &impl ConnectionTrait,
    chat_id: i64,
    operation: OperationType,
    payload: &HistoryPayload,
    performed_at: DateTime<Utc>,
) -> ResultEngine<i64> {
    let payload = serde_json::to_string(payload)
        .map_err(|err| EngineError::InvalidAmount(format!("unencodable undo payload: {err}")))?;
    let model = ActiveModel {
        id: ActiveValue::NotSet,
        chat_id: ActiveValue::Set(chat_id),
        operation_type: ActiveValue::Set(operation.as_str().to_string()),
        payload: ActiveValue::Set(payload),
        performed_at: ActiveValue::Set(performed_at),
        undone: ActiveValue::Set(false),
    };
    let result = Entity::insert(model).exec(conn).await?;
    Ok(result.last_insert_id)
}

/// The most recent unconsumed entry for a chat, if any.
pub(crate) async fn last_unconsumed(
    conn: &impl ConnectionTrait,
    chat_id: i64,
) -> ResultEngine<Option<Entry>> {
    let model = Entity::find()
        .filter(Column::ChatId.eq(chat_id))
        .filter(Column::Undone.eq(false))
        .order_by_desc(Column::PerformedAt)
        .order_by_desc(Column::Id)
        .one(conn)
        .await?;

    let Some(model) = model else {
        return Ok(None);
    };

    let payload: HistoryPayload = serde_json::from_str(&model.payload)
        .map_err(|err| EngineError::NotFound(format!("undo payload: {err}")))?;
    Ok(Some(Entry {
        id: model.id,
        operation: OperationType::try_from(model.operation_type.as_str())?,
        payload,
    }))
}

/// Flags an entry as consumed. The row itself stays.
pub(crate) async fn mark_consumed(conn: &impl ConnectionTrait, entry_id: i64) -> ResultEngine<()> {
    let model = ActiveModel {
        id: ActiveValue::Set(entry_id),
        undone: ActiveValue::Set(true),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}
