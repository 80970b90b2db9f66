//! Ledger and order-state engine.
//!
//! The [`Engine`] owns every mutation of the order book: it validates an
//! incoming operation against the current order, appends the income/expense
//! record, pushes the matching deltas into every affected snapshot scope and
//! writes the undo entry, all inside one database transaction. Either all of
//! it commits or none of it does, so a concurrent reader never sees a log
//! record without its aggregate update.
//!
//! Reads go through [`Engine::reports`], which never mutates.

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};

pub use aggregates::LedgerEvent;
pub use dates::{BUSINESS_TZ, DAILY_CUTOFF_HOUR, business_date, weekday_label};
pub use error::EngineError;
pub use history::OperationType;
pub use money::Money;
pub use orders::{CustomerKind, Order, OrderFilter, OrderState};
pub use records::{
    ExpenseKind, ExpenseRecord, IncomeRecord, NewIncomeRecord, RecordFilter, RecordKind,
};
pub use reports::{InterestSummary, PeriodReport, Reports};
pub use snapshots::{FinancialSnapshot, Scope};

mod aggregates;
mod counter;
mod dates;
mod error;
mod history;
mod money;
mod orders;
mod records;
mod reports;
mod snapshots;

type ResultEngine<T> = Result<T, EngineError>;

use history::HistoryPayload;

/// Outcome of a successful undo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoResult {
    pub operation: OperationType,
    pub order_id: Option<i64>,
    /// Amount of the record the operation had created, if it created one.
    pub amount: Option<Money>,
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Read-only reporting façade.
    pub fn reports(&self) -> Reports<'_> {
        Reports {
            database: &self.database,
        }
    }

    /// Creates a new order in a chat.
    ///
    /// Fails with [`EngineError::Conflict`] while the chat still has a
    /// non-terminal order; the conflict is detected before the id counter
    /// moves, so a rejected creation burns nothing.
    pub async fn create_order(
        &self,
        group_id: &str,
        chat_id: i64,
        customer: CustomerKind,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> ResultEngine<Order> {
        let group_id = group_id.trim();
        if group_id.is_empty() {
            return Err(EngineError::InvalidAmount(
                "group id must not be empty".to_string(),
            ));
        }
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(
                "principal must be positive".to_string(),
            ));
        }
        if orders::active_for_chat(&self.database, chat_id)
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!(
                "chat {chat_id} already has an active order"
            )));
        }

        // Allocated and committed on its own: a failure past this point
        // burns the id rather than ever reusing it.
        let order_id = counter::next_order_id(&self.database).await?;
        let order = Order::new(
            order_id,
            group_id.to_string(),
            chat_id,
            customer,
            amount,
            created_at,
        );

        let tx = self.database.begin().await?;
        // Second look under the transaction; the first check ran outside it.
        if orders::active_for_chat(&tx, chat_id).await?.is_some() {
            return Err(EngineError::Conflict(format!(
                "chat {chat_id} already has an active order"
            )));
        }
        orders::insert(&tx, &order).await?;

        let event = LedgerEvent::OrderCreated {
            group_id: order.group_id.clone(),
            customer,
            amount,
            date: dates::business_date(created_at),
        };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            chat_id,
            OperationType::OrderCreated,
            &HistoryPayload {
                order_id: Some(order.id),
                created_order: true,
                events: vec![event],
                ..Default::default()
            },
            created_at,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = order.id, chat_id, group = %order.group_id, "order created");
        Ok(order)
    }

    /// Books interest income against an active order.
    pub async fn record_interest(
        &self,
        order_id: i64,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        require_positive(amount)?;

        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        require_active(&order)?;

        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: Some(order.id),
                kind: RecordKind::Interest,
                amount,
                customer: Some(order.customer),
                group_id: Some(order.group_id.clone()),
                occurred_on: date,
                occurred_at,
                note: None,
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let event = LedgerEvent::InterestRecorded {
            group_id: order.group_id.clone(),
            amount,
            date,
        };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            order.chat_id,
            OperationType::Interest,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id: Some(record_id),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;
        Ok(record_id)
    }

    /// Pays down part of the outstanding principal.
    ///
    /// The amount may not exceed what is outstanding; an over-payment is
    /// rejected with [`EngineError::ExceedsPrincipal`] and changes nothing.
    pub async fn reduce_principal(
        &self,
        order_id: i64,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Order> {
        require_positive(amount)?;

        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        require_active(&order)?;
        if amount > order.amount {
            return Err(EngineError::ExceedsPrincipal(format!(
                "{amount} > {}",
                order.amount
            )));
        }

        let remaining = order.amount - amount;
        orders::set_amount(&tx, order.id, remaining, occurred_at).await?;

        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: Some(order.id),
                kind: RecordKind::PrincipalReduction,
                amount,
                customer: Some(order.customer),
                group_id: Some(order.group_id.clone()),
                occurred_on: date,
                occurred_at,
                note: None,
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let event = LedgerEvent::PrincipalReduced {
            group_id: order.group_id.clone(),
            amount,
            date,
            overdue: order.state == OrderState::Overdue,
        };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            order.chat_id,
            OperationType::PrincipalReduction,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id: Some(record_id),
                old_amount: Some(order.amount),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;

        Ok(Order {
            amount: remaining,
            updated_at: occurred_at,
            ..order
        })
    }

    /// Books money recovered against a breached order.
    ///
    /// Does not transition the order; closing it stays an explicit
    /// [`Engine::complete_breach`] call.
    pub async fn breach_settlement(
        &self,
        order_id: i64,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        require_positive(amount)?;

        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        if order.state != OrderState::Breach {
            return Err(EngineError::InvalidTransition(format!(
                "settlement requires a breached order, order {} is {}",
                order.id,
                order.state.as_str()
            )));
        }

        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: Some(order.id),
                kind: RecordKind::BreachSettlement,
                amount,
                customer: Some(order.customer),
                group_id: Some(order.group_id.clone()),
                occurred_on: date,
                occurred_at,
                note: None,
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let event = LedgerEvent::BreachSettled {
            group_id: order.group_id.clone(),
            amount,
            date,
        };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            order.chat_id,
            OperationType::BreachSettlement,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id: Some(record_id),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;
        Ok(record_id)
    }

    /// Completes an order in good standing.
    ///
    /// The completion record captures the outstanding principal at the time,
    /// which is what the completion statistics count.
    pub async fn complete_order(
        &self,
        order_id: i64,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Order> {
        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        orders::transition(order.state, OrderState::End)?;
        orders::set_state(&tx, order.id, OrderState::End, occurred_at).await?;

        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: Some(order.id),
                kind: RecordKind::Completed,
                amount: order.amount,
                customer: Some(order.customer),
                group_id: Some(order.group_id.clone()),
                occurred_on: date,
                occurred_at,
                note: None,
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let mut events = vec![LedgerEvent::OrderCompleted {
            group_id: order.group_id.clone(),
            amount: order.amount,
            date,
        }];
        if order.state == OrderState::Overdue {
            events.push(LedgerEvent::OverdueCleared {
                group_id: order.group_id.clone(),
                amount: order.amount,
                date,
            });
        }
        for event in &events {
            aggregates::apply(&tx, event).await?;
        }

        history::record(
            &tx,
            order.chat_id,
            OperationType::OrderCompleted,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id: Some(record_id),
                old_state: Some(order.state),
                events,
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = order.id, chat_id = order.chat_id, "order completed");
        Ok(Order {
            state: OrderState::End,
            updated_at: occurred_at,
            ..order
        })
    }

    /// Closes a breached order.
    ///
    /// The completion record captures the total settled against the breach,
    /// feeding the surplus and completion statistics.
    pub async fn complete_breach(
        &self,
        order_id: i64,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Order> {
        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        orders::transition(order.state, OrderState::BreachEnd)?;
        orders::set_state(&tx, order.id, OrderState::BreachEnd, occurred_at).await?;

        let settled = settled_total(&tx, order.id).await?;
        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: Some(order.id),
                kind: RecordKind::BreachEnd,
                amount: settled,
                customer: Some(order.customer),
                group_id: Some(order.group_id.clone()),
                occurred_on: date,
                occurred_at,
                note: None,
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let event = LedgerEvent::BreachCompleted {
            group_id: order.group_id.clone(),
            date,
        };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            order.chat_id,
            OperationType::BreachCompleted,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id: Some(record_id),
                old_state: Some(order.state),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(order_id = order.id, chat_id = order.chat_id, "breach order closed");
        Ok(Order {
            state: OrderState::BreachEnd,
            updated_at: occurred_at,
            ..order
        })
    }

    /// Moves an order along the state machine without booking money.
    ///
    /// Edges that reclassify aggregate buckets (breach declaration, overdue
    /// flagging) leave an adjustment record behind so a replay sees them.
    /// Completion edges are rejected here: they go through
    /// [`Engine::complete_order`] and [`Engine::complete_breach`], which also
    /// write the completion record.
    pub async fn change_state(
        &self,
        order_id: i64,
        target: OrderState,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Order> {
        if target.is_terminal() {
            return Err(EngineError::InvalidTransition(format!(
                "{} is recorded through the completion operations",
                target.as_str()
            )));
        }

        let tx = self.database.begin().await?;
        let order = orders::get(&tx, order_id).await?;
        orders::transition(order.state, target)?;
        orders::set_state(&tx, order.id, target, occurred_at).await?;

        let date = dates::business_date(occurred_at);
        let events =
            aggregates::transition_events(order.state, target, &order.group_id, order.amount, date);

        let mut record_id = None;
        if !events.is_empty() {
            record_id = Some(
                records::append_income(
                    &tx,
                    NewIncomeRecord {
                        order_id: Some(order.id),
                        kind: RecordKind::Adjustment,
                        amount: order.amount,
                        customer: Some(order.customer),
                        group_id: Some(order.group_id.clone()),
                        occurred_on: date,
                        occurred_at,
                        note: None,
                        reverses_record_id: None,
                        transition: Some(aggregates::transition_tag(order.state, target)),
                    },
                )
                .await?,
            );
            for event in &events {
                aggregates::apply(&tx, event).await?;
            }
        }

        history::record(
            &tx,
            order.chat_id,
            OperationType::StateChanged,
            &HistoryPayload {
                order_id: Some(order.id),
                record_id,
                old_state: Some(order.state),
                events,
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;

        Ok(Order {
            state: target,
            updated_at: occurred_at,
            ..order
        })
    }

    /// Books an operating expense against the day it occurred.
    pub async fn record_expense(
        &self,
        chat_id: i64,
        kind: ExpenseKind,
        amount: Money,
        note: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        require_positive(amount)?;

        let tx = self.database.begin().await?;
        let date = dates::business_date(occurred_at);
        let record_id = records::append_expense(
            &tx,
            kind,
            amount,
            date,
            occurred_at,
            note.map(str::to_string),
        )
        .await?;

        let event = LedgerEvent::ExpenseRecorded { kind, amount, date };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            chat_id,
            OperationType::Expense,
            &HistoryPayload {
                expense_record_id: Some(record_id),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;
        Ok(record_id)
    }

    /// Manual liquid-funds correction; the amount is signed.
    pub async fn adjust_funds(
        &self,
        chat_id: i64,
        amount: Money,
        note: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        if amount.is_zero() {
            return Err(EngineError::InvalidAmount(
                "adjustment must not be zero".to_string(),
            ));
        }

        let tx = self.database.begin().await?;
        let date = dates::business_date(occurred_at);
        let record_id = records::append_income(
            &tx,
            NewIncomeRecord {
                order_id: None,
                kind: RecordKind::Adjustment,
                amount,
                customer: None,
                group_id: None,
                occurred_on: date,
                occurred_at,
                note: note.map(str::to_string),
                reverses_record_id: None,
                transition: None,
            },
        )
        .await?;

        let event = LedgerEvent::FundsAdjusted { amount, date };
        aggregates::apply(&tx, &event).await?;

        history::record(
            &tx,
            chat_id,
            OperationType::FundsAdjusted,
            &HistoryPayload {
                record_id: Some(record_id),
                events: vec![event],
                ..Default::default()
            },
            occurred_at,
        )
        .await?;
        tx.commit().await?;
        Ok(record_id)
    }

    /// Reverts the most recent not-yet-undone operation performed in a chat.
    ///
    /// The compensation restores the prior order fields, negates the forward
    /// aggregate deltas and appends a reversing adjustment instead of
    /// deleting the original record. A failed undo leaves the forward state
    /// and the history entry untouched.
    pub async fn undo_last(
        &self,
        chat_id: i64,
        performed_at: DateTime<Utc>,
    ) -> ResultEngine<UndoResult> {
        let tx = self.database.begin().await?;
        let entry = history::last_unconsumed(&tx, chat_id)
            .await?
            .ok_or(EngineError::NothingToUndo(chat_id))?;
        let payload = &entry.payload;

        let mut amount = None;

        if let Some(order_id) = payload.order_id {
            let order = orders::get(&tx, order_id).await?;
            if order.chat_id != chat_id {
                // The entry was recorded for this chat; a mismatch means the
                // order moved and compensation would hit the wrong book.
                return Err(EngineError::NotFound(format!(
                    "order {order_id} no longer belongs to chat {chat_id}"
                )));
            }
            if payload.created_order {
                orders::delete(&tx, order_id).await?;
            } else {
                if let Some(old_state) = payload.old_state {
                    orders::set_state(&tx, order_id, old_state, performed_at).await?;
                }
                if let Some(old_amount) = payload.old_amount {
                    orders::set_amount(&tx, order_id, old_amount, performed_at).await?;
                }
            }
        }

        for event in &payload.events {
            aggregates::revert(&tx, event).await?;
        }

        if let Some(record_id) = payload.record_id {
            let original = records::get_income(&tx, record_id).await?;
            amount = Some(original.amount);
            records::append_income(
                &tx,
                NewIncomeRecord {
                    order_id: original.order_id,
                    kind: RecordKind::Adjustment,
                    amount: -original.amount,
                    customer: original.customer,
                    group_id: original.group_id.clone(),
                    // Booked against the original date so the daily rows net
                    // out where the effect landed.
                    occurred_on: original.occurred_on,
                    occurred_at: performed_at,
                    note: Some("undo".to_string()),
                    reverses_record_id: Some(record_id),
                    transition: None,
                },
            )
            .await?;
        }

        if let Some(expense_id) = payload.expense_record_id {
            let expense = records::get_expense(&tx, expense_id).await?;
            amount = Some(expense.amount);
            records::delete_expense(&tx, expense_id).await?;
        }

        history::mark_consumed(&tx, entry.id).await?;
        tx.commit().await?;

        tracing::info!(
            chat_id,
            operation = entry.operation.as_str(),
            "operation undone"
        );
        Ok(UndoResult {
            operation: entry.operation,
            order_id: payload.order_id,
            amount,
        })
    }

    /// Return an order by id.
    pub async fn order(&self, order_id: i64) -> ResultEngine<Order> {
        orders::get(&self.database, order_id).await
    }

    /// The non-terminal order owned by a chat, if any.
    pub async fn active_order(&self, chat_id: i64) -> ResultEngine<Option<Order>> {
        orders::active_for_chat(&self.database, chat_id).await
    }

    /// Orders matching the filter, oldest first.
    pub async fn find_orders(&self, filter: &OrderFilter) -> ResultEngine<Vec<Order>> {
        orders::find(&self.database, filter).await
    }

    /// Snapshot for a scope; scopes nothing was booked under read as zeroes.
    pub async fn snapshot(&self, scope: &Scope) -> ResultEngine<FinancialSnapshot> {
        snapshots::load(&self.database, scope).await
    }

    /// Rebuilds every snapshot from the log, atomically.
    pub async fn rebuild_snapshots(&self) -> ResultEngine<()> {
        let tx = self.database.begin().await?;
        aggregates::rebuild(&tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn require_positive(amount: Money) -> ResultEngine<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(EngineError::InvalidAmount(
            "amount must be positive".to_string(),
        ))
    }
}

fn require_active(order: &Order) -> ResultEngine<()> {
    if order.state.is_active() {
        Ok(())
    } else {
        Err(EngineError::InvalidTransition(format!(
            "order {} is {}, needs normal or overdue",
            order.id,
            order.state.as_str()
        )))
    }
}

/// Total settled against a breached order, net of undone settlements.
async fn settled_total(
    conn: &impl sea_orm::ConnectionTrait,
    order_id: i64,
) -> ResultEngine<Money> {
    let all = records::query_income(
        conn,
        &RecordFilter {
            order_id: Some(order_id),
            ..Default::default()
        },
    )
    .await?;
    let reversed: std::collections::HashSet<i64> =
        all.iter().filter_map(|r| r.reverses_record_id).collect();
    Ok(all
        .iter()
        .filter(|r| r.kind == RecordKind::BreachSettlement && !reversed.contains(&r.id))
        .map(|r| r.amount)
        .fold(Money::ZERO, |acc, a| acc + a))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
