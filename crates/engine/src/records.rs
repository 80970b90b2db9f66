//! The append-only income/expense log.
//!
//! Records are the source of truth for every money figure: once appended they
//! are never mutated or deleted. Corrections happen by appending a reversing
//! `adjustment` record that points back at the record it neutralizes, so the
//! log stays replayable end to end.
//!
//! Appending performs no business validation; that is the ledger engine's
//! job before it writes anything.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{CustomerKind, EngineError, Money, ResultEngine};

/// Classification of an income record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Interest,
    PrincipalReduction,
    BreachSettlement,
    /// Order completed in good standing; the amount is the outstanding
    /// principal at completion.
    Completed,
    /// Breach order closed; the amount is the total settled against it.
    BreachEnd,
    /// Manual corrections, state reclassifications, and undo reversals.
    Adjustment,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interest => "interest",
            Self::PrincipalReduction => "principal_reduction",
            Self::BreachSettlement => "breach_settlement",
            Self::Completed => "completed",
            Self::BreachEnd => "breach_end",
            Self::Adjustment => "adjustment",
        }
    }
}

impl TryFrom<&str> for RecordKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "interest" => Ok(Self::Interest),
            "principal_reduction" => Ok(Self::PrincipalReduction),
            "breach_settlement" => Ok(Self::BreachSettlement),
            "completed" => Ok(Self::Completed),
            "breach_end" => Ok(Self::BreachEnd),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::NotFound(format!("record kind {other}"))),
        }
    }
}

/// Operating expense classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Company,
    Other,
}

impl ExpenseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for ExpenseKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "company" => Ok(Self::Company),
            "other" => Ok(Self::Other),
            other => Err(EngineError::NotFound(format!("expense kind {other}"))),
        }
    }
}

/// An immutable income log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    pub id: i64,
    pub order_id: Option<i64>,
    pub kind: RecordKind,
    pub amount: Money,
    pub customer: Option<CustomerKind>,
    pub group_id: Option<String>,
    /// Business date the record counts towards.
    pub occurred_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    /// Set on reversing adjustments appended by undo.
    pub reverses_record_id: Option<i64>,
    /// Set on state-reclassification adjustments, e.g. `normal>breach`.
    pub transition: Option<String>,
}

/// Fields for a record about to be appended; the id is assigned by storage.
#[derive(Clone, Debug)]
pub struct NewIncomeRecord {
    pub order_id: Option<i64>,
    pub kind: RecordKind,
    pub amount: Money,
    pub customer: Option<CustomerKind>,
    pub group_id: Option<String>,
    pub occurred_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub reverses_record_id: Option<i64>,
    pub transition: Option<String>,
}

pub mod income {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "income_records")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub order_id: Option<i64>,
        pub kind: String,
        pub amount: i64,
        pub customer: Option<String>,
        pub group_id: Option<String>,
        pub occurred_on: Date,
        pub occurred_at: DateTimeUtc,
        pub note: Option<String>,
        pub reverses_record_id: Option<i64>,
        pub transition: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl TryFrom<income::Model> for IncomeRecord {
    type Error = EngineError;

    fn try_from(model: income::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            order_id: model.order_id,
            kind: RecordKind::try_from(model.kind.as_str())?,
            amount: Money::new(model.amount),
            customer: model
                .customer
                .as_deref()
                .map(CustomerKind::try_from)
                .transpose()?,
            group_id: model.group_id,
            occurred_on: model.occurred_on,
            occurred_at: model.occurred_at,
            note: model.note,
            reverses_record_id: model.reverses_record_id,
            transition: model.transition,
        })
    }
}

/// An operating expense entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: i64,
    pub kind: ExpenseKind,
    pub amount: Money,
    pub occurred_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

pub mod expense {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "expense_records")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub kind: String,
        pub amount: i64,
        pub occurred_on: Date,
        pub occurred_at: DateTimeUtc,
        pub note: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl TryFrom<expense::Model> for ExpenseRecord {
    type Error = EngineError;

    fn try_from(model: expense::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            kind: ExpenseKind::try_from(model.kind.as_str())?,
            amount: Money::new(model.amount),
            occurred_on: model.occurred_on,
            occurred_at: model.occurred_at,
            note: model.note,
        })
    }
}

/// Criteria for [`query_income`]. Unset fields do not constrain the result.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    pub kind: Option<RecordKind>,
    pub group_id: Option<String>,
    pub order_id: Option<i64>,
    pub customer: Option<CustomerKind>,
    /// Inclusive business-date bounds.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Appends an income record and returns its storage id.
pub(crate) async fn append_income(
    conn: &impl ConnectionTrait,
    record: NewIncomeRecord,
) -> ResultEngine<i64> {
    let model = income::ActiveModel {
        id: ActiveValue::NotSet,
        order_id: ActiveValue::Set(record.order_id),
        kind: ActiveValue::Set(record.kind.as_str().to_string()),
        amount: ActiveValue::Set(record.amount.cents()),
        customer: ActiveValue::Set(record.customer.map(|c| c.as_str().to_string())),
        group_id: ActiveValue::Set(record.group_id),
        occurred_on: ActiveValue::Set(record.occurred_on),
        occurred_at: ActiveValue::Set(record.occurred_at),
        note: ActiveValue::Set(record.note),
        reverses_record_id: ActiveValue::Set(record.reverses_record_id),
        transition: ActiveValue::Set(record.transition),
    };
    let result = income::Entity::insert(model).exec(conn).await?;
    Ok(result.last_insert_id)
}

pub(crate) async fn append_expense(
    conn: &impl ConnectionTrait,
    kind: ExpenseKind,
    amount: Money,
    occurred_on: NaiveDate,
    occurred_at: DateTime<Utc>,
    note: Option<String>,
) -> ResultEngine<i64> {
    let model = expense::ActiveModel {
        id: ActiveValue::NotSet,
        kind: ActiveValue::Set(kind.as_str().to_string()),
        amount: ActiveValue::Set(amount.cents()),
        occurred_on: ActiveValue::Set(occurred_on),
        occurred_at: ActiveValue::Set(occurred_at),
        note: ActiveValue::Set(note),
    };
    let result = expense::Entity::insert(model).exec(conn).await?;
    Ok(result.last_insert_id)
}

pub(crate) async fn get_income(
    conn: &impl ConnectionTrait,
    record_id: i64,
) -> ResultEngine<IncomeRecord> {
    let model = income::Entity::find_by_id(record_id)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("income record {record_id}")))?;
    IncomeRecord::try_from(model)
}

/// Removes an expense row. Only the undo path uses this.
pub(crate) async fn delete_expense(
    conn: &impl ConnectionTrait,
    record_id: i64,
) -> ResultEngine<()> {
    expense::Entity::delete_by_id(record_id).exec(conn).await?;
    Ok(())
}

pub(crate) async fn get_expense(
    conn: &impl ConnectionTrait,
    record_id: i64,
) -> ResultEngine<ExpenseRecord> {
    let model = expense::Entity::find_by_id(record_id)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("expense record {record_id}")))?;
    ExpenseRecord::try_from(model)
}

/// Income records matching `filter`, ordered by `occurred_at` ascending.
///
/// Reversing adjustments and the records they neutralize are both returned;
/// netting them is the caller's concern.
pub(crate) async fn query_income(
    conn: &impl ConnectionTrait,
    filter: &RecordFilter,
) -> ResultEngine<Vec<IncomeRecord>> {
    let mut query = income::Entity::find();

    if let Some(kind) = filter.kind {
        query = query.filter(income::Column::Kind.eq(kind.as_str()));
    }
    if let Some(group_id) = &filter.group_id {
        query = query.filter(income::Column::GroupId.eq(group_id.clone()));
    }
    if let Some(order_id) = filter.order_id {
        query = query.filter(income::Column::OrderId.eq(order_id));
    }
    if let Some(customer) = filter.customer {
        query = query.filter(income::Column::Customer.eq(customer.as_str()));
    }
    if let Some((from, to)) = filter.date_range {
        query = query
            .filter(income::Column::OccurredOn.gte(from))
            .filter(income::Column::OccurredOn.lte(to));
    }

    let models = query
        .order_by_asc(income::Column::OccurredAt)
        .order_by_asc(income::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(IncomeRecord::try_from).collect()
}

pub(crate) async fn all_income(conn: &impl ConnectionTrait) -> ResultEngine<Vec<IncomeRecord>> {
    query_income(conn, &RecordFilter::default()).await
}

pub(crate) async fn all_expenses(conn: &impl ConnectionTrait) -> ResultEngine<Vec<ExpenseRecord>> {
    let models = expense::Entity::find()
        .order_by_asc(expense::Column::OccurredAt)
        .order_by_asc(expense::Column::Id)
        .all(conn)
        .await?;
    models.into_iter().map(ExpenseRecord::try_from).collect()
}
