//! Snapshot scopes and their persisted rows.
//!
//! A [`FinancialSnapshot`] is a materialized view over the income/expense log
//! at one of three granularities: Global (one row), Grouped (one row per
//! attribution id), Daily (one row per business date and attribution id).
//! Not every counter exists at every scope; fields a scope does not persist
//! read back as zero and writes to them are dropped.
//!
//! Nothing here derives values: the aggregation layer decides the deltas and
//! this module only loads and stores rows.

use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Money, ResultEngine};

/// Aggregation granularity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Group(String),
    /// `group_id` is `None` for events carrying no attribution (operating
    /// expenses, manual fund corrections).
    Daily {
        date: NaiveDate,
        group_id: Option<String>,
    },
}

/// Reconciled counters for one scope. All monetary fields are cents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    /// Orders currently in `normal` or `overdue`.
    pub valid_orders: i64,
    pub valid_amount: Money,
    /// The `overdue` subset of the valid bucket.
    pub overdue_orders: i64,
    pub overdue_amount: Money,
    /// Cash on hand (Global scope only).
    pub liquid_funds: Money,
    pub new_clients: i64,
    pub new_clients_amount: Money,
    pub old_clients: i64,
    pub old_clients_amount: Money,
    pub interest: Money,
    pub completed_orders: i64,
    pub completed_amount: Money,
    pub breach_orders: i64,
    pub breach_amount: Money,
    pub breach_end_orders: i64,
    pub breach_end_amount: Money,
    /// Net cash movement of the day (Daily scope only).
    pub liquid_flow: Money,
    pub company_expenses: Money,
    pub other_expenses: Money,
}

impl FinancialSnapshot {
    /// Derived profitability figure: interest plus settled breach money minus
    /// principal lost to breaches.
    #[must_use]
    pub fn surplus(&self) -> Money {
        self.interest + self.breach_end_amount - self.breach_amount
    }

    fn add(&mut self, other: &FinancialSnapshot) {
        self.valid_orders += other.valid_orders;
        self.valid_amount += other.valid_amount;
        self.overdue_orders += other.overdue_orders;
        self.overdue_amount += other.overdue_amount;
        self.liquid_funds += other.liquid_funds;
        self.new_clients += other.new_clients;
        self.new_clients_amount += other.new_clients_amount;
        self.old_clients += other.old_clients;
        self.old_clients_amount += other.old_clients_amount;
        self.interest += other.interest;
        self.completed_orders += other.completed_orders;
        self.completed_amount += other.completed_amount;
        self.breach_orders += other.breach_orders;
        self.breach_amount += other.breach_amount;
        self.breach_end_orders += other.breach_end_orders;
        self.breach_end_amount += other.breach_end_amount;
        self.liquid_flow += other.liquid_flow;
        self.company_expenses += other.company_expenses;
        self.other_expenses += other.other_expenses;
    }
}

pub mod global {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "financial_data")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub valid_orders: i64,
        pub valid_amount: i64,
        pub overdue_orders: i64,
        pub overdue_amount: i64,
        pub liquid_funds: i64,
        pub new_clients: i64,
        pub new_clients_amount: i64,
        pub old_clients: i64,
        pub old_clients_amount: i64,
        pub interest: i64,
        pub completed_orders: i64,
        pub completed_amount: i64,
        pub breach_orders: i64,
        pub breach_amount: i64,
        pub breach_end_orders: i64,
        pub breach_end_amount: i64,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod grouped {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "grouped_data")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub group_id: String,
        pub valid_orders: i64,
        pub valid_amount: i64,
        pub overdue_orders: i64,
        pub overdue_amount: i64,
        pub new_clients: i64,
        pub new_clients_amount: i64,
        pub old_clients: i64,
        pub old_clients_amount: i64,
        pub interest: i64,
        pub completed_orders: i64,
        pub completed_amount: i64,
        pub breach_orders: i64,
        pub breach_amount: i64,
        pub breach_end_orders: i64,
        pub breach_end_amount: i64,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod daily {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "daily_data")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub date: Date,
        pub group_id: Option<String>,
        pub new_clients: i64,
        pub new_clients_amount: i64,
        pub old_clients: i64,
        pub old_clients_amount: i64,
        pub interest: i64,
        pub completed_orders: i64,
        pub completed_amount: i64,
        pub breach_orders: i64,
        pub breach_amount: i64,
        pub breach_end_orders: i64,
        pub breach_end_amount: i64,
        pub liquid_flow: i64,
        pub company_expenses: i64,
        pub other_expenses: i64,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl From<global::Model> for FinancialSnapshot {
    fn from(model: global::Model) -> Self {
        Self {
            valid_orders: model.valid_orders,
            valid_amount: Money::new(model.valid_amount),
            overdue_orders: model.overdue_orders,
            overdue_amount: Money::new(model.overdue_amount),
            liquid_funds: Money::new(model.liquid_funds),
            new_clients: model.new_clients,
            new_clients_amount: Money::new(model.new_clients_amount),
            old_clients: model.old_clients,
            old_clients_amount: Money::new(model.old_clients_amount),
            interest: Money::new(model.interest),
            completed_orders: model.completed_orders,
            completed_amount: Money::new(model.completed_amount),
            breach_orders: model.breach_orders,
            breach_amount: Money::new(model.breach_amount),
            breach_end_orders: model.breach_end_orders,
            breach_end_amount: Money::new(model.breach_end_amount),
            ..Default::default()
        }
    }
}

impl From<grouped::Model> for FinancialSnapshot {
    fn from(model: grouped::Model) -> Self {
        Self {
            valid_orders: model.valid_orders,
            valid_amount: Money::new(model.valid_amount),
            overdue_orders: model.overdue_orders,
            overdue_amount: Money::new(model.overdue_amount),
            new_clients: model.new_clients,
            new_clients_amount: Money::new(model.new_clients_amount),
            old_clients: model.old_clients,
            old_clients_amount: Money::new(model.old_clients_amount),
            interest: Money::new(model.interest),
            completed_orders: model.completed_orders,
            completed_amount: Money::new(model.completed_amount),
            breach_orders: model.breach_orders,
            breach_amount: Money::new(model.breach_amount),
            breach_end_orders: model.breach_end_orders,
            breach_end_amount: Money::new(model.breach_end_amount),
            ..Default::default()
        }
    }
}

impl From<daily::Model> for FinancialSnapshot {
    fn from(model: daily::Model) -> Self {
        Self {
            new_clients: model.new_clients,
            new_clients_amount: Money::new(model.new_clients_amount),
            old_clients: model.old_clients,
            old_clients_amount: Money::new(model.old_clients_amount),
            interest: Money::new(model.interest),
            completed_orders: model.completed_orders,
            completed_amount: Money::new(model.completed_amount),
            breach_orders: model.breach_orders,
            breach_amount: Money::new(model.breach_amount),
            breach_end_orders: model.breach_end_orders,
            breach_end_amount: Money::new(model.breach_end_amount),
            liquid_flow: Money::new(model.liquid_flow),
            company_expenses: Money::new(model.company_expenses),
            other_expenses: Money::new(model.other_expenses),
            ..Default::default()
        }
    }
}

/// Loads the snapshot for a scope; a missing row reads as all zeroes.
pub(crate) async fn load(
    conn: &impl ConnectionTrait,
    scope: &Scope,
) -> ResultEngine<FinancialSnapshot> {
    match scope {
        Scope::Global => {
            let row = global::Entity::find_by_id(1).one(conn).await?;
            Ok(row.map(FinancialSnapshot::from).unwrap_or_default())
        }
        Scope::Group(group_id) => {
            let row = grouped::Entity::find_by_id(group_id.clone()).one(conn).await?;
            Ok(row.map(FinancialSnapshot::from).unwrap_or_default())
        }
        Scope::Daily { date, group_id } => {
            let row = find_daily(conn, *date, group_id.as_deref()).await?;
            Ok(row.map(FinancialSnapshot::from).unwrap_or_default())
        }
    }
}

/// Writes a snapshot back, creating the row when missing.
pub(crate) async fn save(
    conn: &impl ConnectionTrait,
    scope: &Scope,
    snapshot: &FinancialSnapshot,
) -> ResultEngine<()> {
    let now = Utc::now();
    match scope {
        Scope::Global => {
            let exists = global::Entity::find_by_id(1).one(conn).await?.is_some();
            let model = global::ActiveModel {
                id: ActiveValue::Set(1),
                valid_orders: ActiveValue::Set(snapshot.valid_orders),
                valid_amount: ActiveValue::Set(snapshot.valid_amount.cents()),
                overdue_orders: ActiveValue::Set(snapshot.overdue_orders),
                overdue_amount: ActiveValue::Set(snapshot.overdue_amount.cents()),
                liquid_funds: ActiveValue::Set(snapshot.liquid_funds.cents()),
                new_clients: ActiveValue::Set(snapshot.new_clients),
                new_clients_amount: ActiveValue::Set(snapshot.new_clients_amount.cents()),
                old_clients: ActiveValue::Set(snapshot.old_clients),
                old_clients_amount: ActiveValue::Set(snapshot.old_clients_amount.cents()),
                interest: ActiveValue::Set(snapshot.interest.cents()),
                completed_orders: ActiveValue::Set(snapshot.completed_orders),
                completed_amount: ActiveValue::Set(snapshot.completed_amount.cents()),
                breach_orders: ActiveValue::Set(snapshot.breach_orders),
                breach_amount: ActiveValue::Set(snapshot.breach_amount.cents()),
                breach_end_orders: ActiveValue::Set(snapshot.breach_end_orders),
                breach_end_amount: ActiveValue::Set(snapshot.breach_end_amount.cents()),
                updated_at: ActiveValue::Set(now),
            };
            if exists {
                model.update(conn).await?;
            } else {
                model.insert(conn).await?;
            }
        }
        Scope::Group(group_id) => {
            let exists = grouped::Entity::find_by_id(group_id.clone())
                .one(conn)
                .await?
                .is_some();
            let model = grouped::ActiveModel {
                group_id: ActiveValue::Set(group_id.clone()),
                valid_orders: ActiveValue::Set(snapshot.valid_orders),
                valid_amount: ActiveValue::Set(snapshot.valid_amount.cents()),
                overdue_orders: ActiveValue::Set(snapshot.overdue_orders),
                overdue_amount: ActiveValue::Set(snapshot.overdue_amount.cents()),
                new_clients: ActiveValue::Set(snapshot.new_clients),
                new_clients_amount: ActiveValue::Set(snapshot.new_clients_amount.cents()),
                old_clients: ActiveValue::Set(snapshot.old_clients),
                old_clients_amount: ActiveValue::Set(snapshot.old_clients_amount.cents()),
                interest: ActiveValue::Set(snapshot.interest.cents()),
                completed_orders: ActiveValue::Set(snapshot.completed_orders),
                completed_amount: ActiveValue::Set(snapshot.completed_amount.cents()),
                breach_orders: ActiveValue::Set(snapshot.breach_orders),
                breach_amount: ActiveValue::Set(snapshot.breach_amount.cents()),
                breach_end_orders: ActiveValue::Set(snapshot.breach_end_orders),
                breach_end_amount: ActiveValue::Set(snapshot.breach_end_amount.cents()),
                updated_at: ActiveValue::Set(now),
            };
            if exists {
                model.update(conn).await?;
            } else {
                model.insert(conn).await?;
            }
        }
        Scope::Daily { date, group_id } => {
            let existing = find_daily(conn, *date, group_id.as_deref()).await?;
            let id = existing.as_ref().map(|m| m.id);
            let model = daily::ActiveModel {
                id: id.map_or(ActiveValue::NotSet, ActiveValue::Set),
                date: ActiveValue::Set(*date),
                group_id: ActiveValue::Set(group_id.clone()),
                new_clients: ActiveValue::Set(snapshot.new_clients),
                new_clients_amount: ActiveValue::Set(snapshot.new_clients_amount.cents()),
                old_clients: ActiveValue::Set(snapshot.old_clients),
                old_clients_amount: ActiveValue::Set(snapshot.old_clients_amount.cents()),
                interest: ActiveValue::Set(snapshot.interest.cents()),
                completed_orders: ActiveValue::Set(snapshot.completed_orders),
                completed_amount: ActiveValue::Set(snapshot.completed_amount.cents()),
                breach_orders: ActiveValue::Set(snapshot.breach_orders),
                breach_amount: ActiveValue::Set(snapshot.breach_amount.cents()),
                breach_end_orders: ActiveValue::Set(snapshot.breach_end_orders),
                breach_end_amount: ActiveValue::Set(snapshot.breach_end_amount.cents()),
                liquid_flow: ActiveValue::Set(snapshot.liquid_flow.cents()),
                company_expenses: ActiveValue::Set(snapshot.company_expenses.cents()),
                other_expenses: ActiveValue::Set(snapshot.other_expenses.cents()),
                updated_at: ActiveValue::Set(now),
            };
            if id.is_some() {
                model.update(conn).await?;
            } else {
                model.insert(conn).await?;
            }
        }
    }
    Ok(())
}

async fn find_daily(
    conn: &impl ConnectionTrait,
    date: NaiveDate,
    group_id: Option<&str>,
) -> ResultEngine<Option<daily::Model>> {
    let mut query = daily::Entity::find().filter(daily::Column::Date.eq(date));
    query = match group_id {
        Some(group_id) => query.filter(daily::Column::GroupId.eq(group_id)),
        None => query.filter(daily::Column::GroupId.is_null()),
    };
    Ok(query.one(conn).await?)
}

/// Sums daily rows over an inclusive date range.
///
/// With a group the sum covers that attribution only; without one it covers
/// every row in the range, including the unattributed expense rows.
pub(crate) async fn sum_daily_range(
    conn: &impl ConnectionTrait,
    group_id: Option<&str>,
    from: NaiveDate,
    to: NaiveDate,
) -> ResultEngine<FinancialSnapshot> {
    let mut query = daily::Entity::find()
        .filter(daily::Column::Date.gte(from))
        .filter(daily::Column::Date.lte(to));
    if let Some(group_id) = group_id {
        query = query.filter(daily::Column::GroupId.eq(group_id));
    }
    let rows = query.all(conn).await?;

    let mut total = FinancialSnapshot::default();
    for row in rows {
        total.add(&FinancialSnapshot::from(row));
    }
    Ok(total)
}

/// Drops every snapshot row. Only the rebuild path uses this, inside the
/// rebuild transaction.
pub(crate) async fn clear_all(conn: &impl ConnectionTrait) -> ResultEngine<()> {
    global::Entity::delete_many().exec(conn).await?;
    grouped::Entity::delete_many().exec(conn).await?;
    daily::Entity::delete_many().exec(conn).await?;
    Ok(())
}
