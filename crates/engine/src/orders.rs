//! Order entities and their lifecycle.
//!
//! An order is the unit every other component keys off of. Its state machine
//! is validated centrally here; callers never compare state strings
//! themselves.
//!
//! States and permitted edges:
//!
//! ```text
//! normal <-> overdue
//! normal | overdue -> end
//! normal | overdue -> breach
//! breach -> breach_end
//! ```
//!
//! `end` and `breach_end` are terminal for an order instance. Terminal orders
//! are kept for reporting; a new order may then be created in the same chat.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine, dates};

/// Lifecycle state of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Normal,
    Overdue,
    Breach,
    End,
    BreachEnd,
}

impl OrderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Overdue => "overdue",
            Self::Breach => "breach",
            Self::End => "end",
            Self::BreachEnd => "breach_end",
        }
    }

    /// Terminal states keep the order around for reporting only.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::End | Self::BreachEnd)
    }

    /// Active orders accept interest and principal operations.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Normal | Self::Overdue)
    }

    /// The transition table. Everything not listed here is rejected.
    #[must_use]
    pub fn can_transition(self, to: OrderState) -> bool {
        matches!(
            (self, to),
            (Self::Normal, Self::Overdue)
                | (Self::Overdue, Self::Normal)
                | (Self::Normal | Self::Overdue, Self::End)
                | (Self::Normal | Self::Overdue, Self::Breach)
                | (Self::Breach, Self::BreachEnd)
        )
    }
}

impl TryFrom<&str> for OrderState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "normal" => Ok(Self::Normal),
            "overdue" => Ok(Self::Overdue),
            "breach" => Ok(Self::Breach),
            "end" => Ok(Self::End),
            "breach_end" => Ok(Self::BreachEnd),
            other => Err(EngineError::InvalidTransition(format!(
                "invalid order state: {other}"
            ))),
        }
    }
}

/// Customer classification carried on orders and income records.
///
/// `A` is a first-time customer, `B` a returning one; the letters follow the
/// chat command surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerKind {
    A,
    B,
}

impl CustomerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    #[must_use]
    pub fn is_new(self) -> bool {
        matches!(self, Self::A)
    }
}

impl TryFrom<&str> for CustomerKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid customer kind: {other}"
            ))),
        }
    }
}

/// A loan order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub group_id: String,
    pub chat_id: i64,
    pub customer: CustomerKind,
    /// Outstanding principal. Reduced by principal-reduction operations.
    pub amount: Money,
    pub state: OrderState,
    pub weekday_label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn new(
        id: i64,
        group_id: String,
        chat_id: i64,
        customer: CustomerKind,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        let weekday_label = dates::weekday_label(dates::business_date(created_at)).to_string();
        Self {
            id,
            group_id,
            chat_id,
            customer,
            amount,
            state: OrderState::Normal,
            weekday_label,
            created_at,
            updated_at: created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub group_id: String,
    pub chat_id: i64,
    pub customer: String,
    pub amount: i64,
    pub state: String,
    pub weekday_label: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Order> for ActiveModel {
    fn from(order: &Order) -> Self {
        Self {
            id: ActiveValue::Set(order.id),
            group_id: ActiveValue::Set(order.group_id.clone()),
            chat_id: ActiveValue::Set(order.chat_id),
            customer: ActiveValue::Set(order.customer.as_str().to_string()),
            amount: ActiveValue::Set(order.amount.cents()),
            state: ActiveValue::Set(order.state.as_str().to_string()),
            weekday_label: ActiveValue::Set(order.weekday_label.clone()),
            created_at: ActiveValue::Set(order.created_at),
            updated_at: ActiveValue::Set(order.updated_at),
        }
    }
}

impl TryFrom<Model> for Order {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            chat_id: model.chat_id,
            customer: CustomerKind::try_from(model.customer.as_str())?,
            amount: Money::new(model.amount),
            state: OrderState::try_from(model.state.as_str())?,
            weekday_label: model.weekday_label,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Criteria for [`find`]. Unset fields do not constrain the result.
///
/// Without an explicit `state`, only active orders (`normal`/`overdue`) match
/// unless `include_terminal` is set.
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub order_id: Option<i64>,
    pub group_id: Option<String>,
    pub customer: Option<CustomerKind>,
    pub state: Option<OrderState>,
    /// Inclusive business-date bounds on the creation date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub include_terminal: bool,
}

/// Validates a single state-machine edge.
pub fn transition(from: OrderState, to: OrderState) -> ResultEngine<()> {
    if from.can_transition(to) {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition(format!(
            "{} -> {}",
            from.as_str(),
            to.as_str()
        )))
    }
}

pub(crate) async fn insert(conn: &impl ConnectionTrait, order: &Order) -> ResultEngine<()> {
    ActiveModel::from(order).insert(conn).await?;
    Ok(())
}

pub(crate) async fn get(conn: &impl ConnectionTrait, order_id: i64) -> ResultEngine<Order> {
    let model = Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("order {order_id}")))?;
    Order::try_from(model)
}

/// The non-terminal order owned by a chat, if any.
pub(crate) async fn active_for_chat(
    conn: &impl ConnectionTrait,
    chat_id: i64,
) -> ResultEngine<Option<Order>> {
    let model = Entity::find()
        .filter(Column::ChatId.eq(chat_id))
        .filter(Column::State.is_not_in([OrderState::End.as_str(), OrderState::BreachEnd.as_str()]))
        .one(conn)
        .await?;
    model.map(Order::try_from).transpose()
}

pub(crate) async fn set_state(
    conn: &impl ConnectionTrait,
    order_id: i64,
    state: OrderState,
    updated_at: DateTime<Utc>,
) -> ResultEngine<()> {
    let model = ActiveModel {
        id: ActiveValue::Set(order_id),
        state: ActiveValue::Set(state.as_str().to_string()),
        updated_at: ActiveValue::Set(updated_at),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}

pub(crate) async fn set_amount(
    conn: &impl ConnectionTrait,
    order_id: i64,
    amount: Money,
    updated_at: DateTime<Utc>,
) -> ResultEngine<()> {
    let model = ActiveModel {
        id: ActiveValue::Set(order_id),
        amount: ActiveValue::Set(amount.cents()),
        updated_at: ActiveValue::Set(updated_at),
        ..Default::default()
    };
    model.update(conn).await?;
    Ok(())
}

/// Removes an order row. Only the undo path uses this, to compensate a
/// creation; lifecycle operations never delete.
pub(crate) async fn delete(conn: &impl ConnectionTrait, order_id: i64) -> ResultEngine<()> {
    Entity::delete_by_id(order_id).exec(conn).await?;
    Ok(())
}

/// Finds orders matching `filter`, ordered by `created_at` ascending.
pub(crate) async fn find(
    conn: &impl ConnectionTrait,
    filter: &OrderFilter,
) -> ResultEngine<Vec<Order>> {
    let mut query = Entity::find();

    if let Some(order_id) = filter.order_id {
        query = query.filter(Column::Id.eq(order_id));
    }
    if let Some(group_id) = &filter.group_id {
        query = query.filter(Column::GroupId.eq(group_id.clone()));
    }
    if let Some(customer) = filter.customer {
        query = query.filter(Column::Customer.eq(customer.as_str()));
    }
    match filter.state {
        Some(state) => query = query.filter(Column::State.eq(state.as_str())),
        None if !filter.include_terminal => {
            query = query.filter(
                Column::State.is_in([OrderState::Normal.as_str(), OrderState::Overdue.as_str()]),
            );
        }
        None => {}
    }
    if let Some((from, to)) = filter.date_range {
        // Creation timestamps are UTC; the business day shifts the boundaries.
        let (start, end) = business_range_utc(from, to);
        query = query
            .filter(Column::CreatedAt.gte(start))
            .filter(Column::CreatedAt.lt(end));
    }

    let models = query.order_by_asc(Column::CreatedAt).all(conn).await?;
    models.into_iter().map(Order::try_from).collect()
}

/// UTC instants bounding an inclusive business-date range.
fn business_range_utc(from: NaiveDate, to: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    use chrono::{Days, NaiveTime, TimeZone};

    let cutoff = NaiveTime::from_hms_opt(dates::DAILY_CUTOFF_HOUR, 0, 0).unwrap_or_default();
    // Business day D spans [D-1 23:00, D 23:00) local time.
    let start_local = from
        .checked_sub_days(Days::new(1))
        .unwrap_or(from)
        .and_time(cutoff);
    let end_local = to.and_time(cutoff);

    let tz = dates::BUSINESS_TZ;
    let start = tz
        .from_local_datetime(&start_local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();
    let end = tz
        .from_local_datetime(&end_local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_permits_documented_edges() {
        use OrderState::*;

        let permitted = [
            (Normal, Overdue),
            (Overdue, Normal),
            (Normal, End),
            (Overdue, End),
            (Normal, Breach),
            (Overdue, Breach),
            (Breach, BreachEnd),
        ];
        for (from, to) in permitted {
            assert!(transition(from, to).is_ok(), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn transition_table_rejects_everything_else() {
        use OrderState::*;

        let all = [Normal, Overdue, Breach, End, BreachEnd];
        let permitted = [
            (Normal, Overdue),
            (Overdue, Normal),
            (Normal, End),
            (Overdue, End),
            (Normal, Breach),
            (Overdue, Breach),
            (Breach, BreachEnd),
        ];
        for from in all {
            for to in all {
                if permitted.contains(&(from, to)) {
                    continue;
                }
                assert!(transition(from, to).is_err(), "{from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn terminal_states_are_not_active() {
        assert!(OrderState::End.is_terminal());
        assert!(OrderState::BreachEnd.is_terminal());
        assert!(!OrderState::Breach.is_terminal());
        assert!(OrderState::Normal.is_active());
        assert!(OrderState::Overdue.is_active());
        assert!(!OrderState::Breach.is_active());
    }
}
