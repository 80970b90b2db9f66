//! The aggregation layer.
//!
//! Snapshots are a pure materialized view: every classified [`LedgerEvent`]
//! maps to per-field deltas in exactly one place ([`update`]) and the same
//! deltas feed every scope the event belongs to. There is no second
//! recomputation path to drift away from.
//!
//! [`rebuild`] replays the order rows and the income/expense log into fresh
//! snapshots. For any accepted operation sequence the result is identical to
//! the incrementally maintained rows; the integration tests lean on that.

use chrono::NaiveDate;
use sea_orm::ConnectionTrait;

use crate::{
    CustomerKind, EngineError, ExpenseKind, FinancialSnapshot, Money, OrderState, ResultEngine,
    Scope, dates, orders,
    records::{self, IncomeRecord, RecordKind},
    snapshots,
};

/// A classified monetary or state event, carrying everything the snapshot
/// update needs: attribution, amount, and the business date.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    OrderCreated {
        group_id: String,
        customer: CustomerKind,
        amount: Money,
        date: NaiveDate,
    },
    InterestRecorded {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    PrincipalReduced {
        group_id: String,
        amount: Money,
        date: NaiveDate,
        /// The order sat in `overdue` at the time, so the overdue bucket
        /// shrinks along with the valid one.
        overdue: bool,
    },
    BreachSettled {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    OrderCompleted {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    BreachDeclared {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    BreachCompleted {
        group_id: String,
        date: NaiveDate,
    },
    OverdueSet {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    OverdueCleared {
        group_id: String,
        amount: Money,
        date: NaiveDate,
    },
    ExpenseRecorded {
        kind: ExpenseKind,
        amount: Money,
        date: NaiveDate,
    },
    FundsAdjusted {
        amount: Money,
        date: NaiveDate,
    },
}

impl LedgerEvent {
    fn group_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { group_id, .. }
            | Self::InterestRecorded { group_id, .. }
            | Self::PrincipalReduced { group_id, .. }
            | Self::BreachSettled { group_id, .. }
            | Self::OrderCompleted { group_id, .. }
            | Self::BreachDeclared { group_id, .. }
            | Self::BreachCompleted { group_id, .. }
            | Self::OverdueSet { group_id, .. }
            | Self::OverdueCleared { group_id, .. } => Some(group_id),
            Self::ExpenseRecorded { .. } | Self::FundsAdjusted { .. } => None,
        }
    }

    fn date(&self) -> NaiveDate {
        match self {
            Self::OrderCreated { date, .. }
            | Self::InterestRecorded { date, .. }
            | Self::PrincipalReduced { date, .. }
            | Self::BreachSettled { date, .. }
            | Self::OrderCompleted { date, .. }
            | Self::BreachDeclared { date, .. }
            | Self::BreachCompleted { date, .. }
            | Self::OverdueSet { date, .. }
            | Self::OverdueCleared { date, .. }
            | Self::ExpenseRecorded { date, .. }
            | Self::FundsAdjusted { date, .. } => *date,
        }
    }

    /// Overdue reclassification moves no money and leaves no log record of
    /// its own; the rebuild derives the overdue bucket from current order
    /// states instead of replaying these.
    fn is_overdue_reclass(&self) -> bool {
        matches!(self, Self::OverdueSet { .. } | Self::OverdueCleared { .. })
    }
}

/// Applies one event's deltas to a snapshot.
///
/// This is the single source of truth for what each event does to the
/// counters. `negate` flips every delta for compensation. Fields a scope
/// does not persist are dropped on save.
fn update(snapshot: &mut FinancialSnapshot, event: &LedgerEvent, negate: bool) {
    let sign: i64 = if negate { -1 } else { 1 };
    let signed = |amount: Money| Money::new(amount.cents() * sign);

    match event {
        LedgerEvent::OrderCreated {
            customer, amount, ..
        } => {
            snapshot.valid_orders += sign;
            snapshot.valid_amount += signed(*amount);
            if customer.is_new() {
                snapshot.new_clients += sign;
                snapshot.new_clients_amount += signed(*amount);
            } else {
                snapshot.old_clients += sign;
                snapshot.old_clients_amount += signed(*amount);
            }
            // Lending money out drains the liquid pool.
            snapshot.liquid_funds -= signed(*amount);
            snapshot.liquid_flow -= signed(*amount);
        }
        LedgerEvent::InterestRecorded { amount, .. } => {
            snapshot.interest += signed(*amount);
            snapshot.liquid_funds += signed(*amount);
            snapshot.liquid_flow += signed(*amount);
        }
        LedgerEvent::PrincipalReduced {
            amount, overdue, ..
        } => {
            snapshot.valid_amount -= signed(*amount);
            snapshot.completed_amount += signed(*amount);
            snapshot.liquid_funds += signed(*amount);
            snapshot.liquid_flow += signed(*amount);
            if *overdue {
                snapshot.overdue_amount -= signed(*amount);
            }
        }
        LedgerEvent::BreachSettled { amount, .. } => {
            snapshot.breach_end_amount += signed(*amount);
            snapshot.liquid_funds += signed(*amount);
            snapshot.liquid_flow += signed(*amount);
        }
        LedgerEvent::OrderCompleted { amount, .. } => {
            snapshot.valid_orders -= sign;
            snapshot.valid_amount -= signed(*amount);
            snapshot.completed_orders += sign;
            snapshot.completed_amount += signed(*amount);
            snapshot.liquid_funds += signed(*amount);
            snapshot.liquid_flow += signed(*amount);
        }
        LedgerEvent::BreachDeclared { amount, .. } => {
            snapshot.valid_orders -= sign;
            snapshot.valid_amount -= signed(*amount);
            snapshot.breach_orders += sign;
            snapshot.breach_amount += signed(*amount);
        }
        LedgerEvent::BreachCompleted { .. } => {
            snapshot.breach_end_orders += sign;
        }
        LedgerEvent::OverdueSet { amount, .. } => {
            snapshot.overdue_orders += sign;
            snapshot.overdue_amount += signed(*amount);
        }
        LedgerEvent::OverdueCleared { amount, .. } => {
            snapshot.overdue_orders -= sign;
            snapshot.overdue_amount -= signed(*amount);
        }
        LedgerEvent::ExpenseRecorded { kind, amount, .. } => {
            snapshot.liquid_funds -= signed(*amount);
            snapshot.liquid_flow -= signed(*amount);
            match kind {
                ExpenseKind::Company => snapshot.company_expenses += signed(*amount),
                ExpenseKind::Other => snapshot.other_expenses += signed(*amount),
            }
        }
        LedgerEvent::FundsAdjusted { amount, .. } => {
            snapshot.liquid_funds += signed(*amount);
            snapshot.liquid_flow += signed(*amount);
        }
    }
}

/// Applies an event to every scope it belongs to, in one pass.
pub(crate) async fn apply(conn: &impl ConnectionTrait, event: &LedgerEvent) -> ResultEngine<()> {
    apply_signed(conn, event, false).await
}

/// Applies the exact negation of an event; the compensation arm of undo.
pub(crate) async fn revert(conn: &impl ConnectionTrait, event: &LedgerEvent) -> ResultEngine<()> {
    apply_signed(conn, event, true).await
}

async fn apply_signed(
    conn: &impl ConnectionTrait,
    event: &LedgerEvent,
    negate: bool,
) -> ResultEngine<()> {
    let mut scopes = vec![Scope::Global];
    if let Some(group_id) = event.group_id() {
        scopes.push(Scope::Group(group_id.to_string()));
    }
    scopes.push(Scope::Daily {
        date: event.date(),
        group_id: event.group_id().map(str::to_string),
    });

    for scope in scopes {
        let before = snapshots::load(conn, &scope).await?;
        let mut after = before.clone();
        update(&mut after, event, negate);
        // Scopes the event does not touch keep their row set untouched, so a
        // rebuild produces the same rows, not just the same sums.
        if after != before {
            snapshots::save(conn, &scope, &after).await?;
        }
    }

    tracing::debug!(?event, negate, "aggregates updated");
    Ok(())
}

/// Forward events for one state-machine edge.
///
/// The list is what the ledger engine applies incrementally; the rebuild
/// filters out the overdue reclassifications (see
/// [`LedgerEvent::is_overdue_reclass`]).
pub(crate) fn transition_events(
    from: OrderState,
    to: OrderState,
    group_id: &str,
    amount: Money,
    date: NaiveDate,
) -> Vec<LedgerEvent> {
    let group_id = group_id.to_string();
    match (from, to) {
        (OrderState::Normal, OrderState::Overdue) => vec![LedgerEvent::OverdueSet {
            group_id,
            amount,
            date,
        }],
        (OrderState::Overdue, OrderState::Normal) => vec![LedgerEvent::OverdueCleared {
            group_id,
            amount,
            date,
        }],
        (OrderState::Normal, OrderState::Breach) => vec![LedgerEvent::BreachDeclared {
            group_id,
            amount,
            date,
        }],
        (OrderState::Overdue, OrderState::Breach) => vec![
            LedgerEvent::OverdueCleared {
                group_id: group_id.clone(),
                amount,
                date,
            },
            LedgerEvent::BreachDeclared {
                group_id,
                amount,
                date,
            },
        ],
        _ => Vec::new(),
    }
}

/// Tag stored on state-reclassification adjustment records.
pub(crate) fn transition_tag(from: OrderState, to: OrderState) -> String {
    format!("{}>{}", from.as_str(), to.as_str())
}

fn parse_transition(tag: &str) -> ResultEngine<(OrderState, OrderState)> {
    let (from, to) = tag
        .split_once('>')
        .ok_or_else(|| EngineError::NotFound(format!("transition tag {tag}")))?;
    Ok((OrderState::try_from(from)?, OrderState::try_from(to)?))
}

/// Replay-scope events for one income record.
///
/// Reversing adjustments resolve against the record they point at; state
/// reclassification adjustments resolve through the transition table with
/// overdue movements filtered out (the rebuild derives those from current
/// order states).
fn record_events(
    record: &IncomeRecord,
    by_id: &std::collections::HashMap<i64, IncomeRecord>,
) -> ResultEngine<Vec<(LedgerEvent, bool)>> {
    let group = |record: &IncomeRecord| record.group_id.clone().unwrap_or_default();

    let events = match record.kind {
        RecordKind::Interest => vec![(
            LedgerEvent::InterestRecorded {
                group_id: group(record),
                amount: record.amount,
                date: record.occurred_on,
            },
            false,
        )],
        RecordKind::PrincipalReduction => vec![(
            LedgerEvent::PrincipalReduced {
                group_id: group(record),
                amount: record.amount,
                date: record.occurred_on,
                overdue: false,
            },
            false,
        )],
        RecordKind::BreachSettlement => vec![(
            LedgerEvent::BreachSettled {
                group_id: group(record),
                amount: record.amount,
                date: record.occurred_on,
            },
            false,
        )],
        RecordKind::Completed => vec![(
            LedgerEvent::OrderCompleted {
                group_id: group(record),
                amount: record.amount,
                date: record.occurred_on,
            },
            false,
        )],
        RecordKind::BreachEnd => vec![(
            LedgerEvent::BreachCompleted {
                group_id: group(record),
                date: record.occurred_on,
            },
            false,
        )],
        RecordKind::Adjustment => {
            if let Some(target_id) = record.reverses_record_id {
                let target = by_id.get(&target_id).ok_or_else(|| {
                    EngineError::NotFound(format!("reversed record {target_id}"))
                })?;
                record_events(target, by_id)?
                    .into_iter()
                    .map(|(event, negate)| (event, !negate))
                    .collect()
            } else if let Some(tag) = &record.transition {
                let (from, to) = parse_transition(tag)?;
                transition_events(from, to, &group(record), record.amount, record.occurred_on)
                    .into_iter()
                    .filter(|event| !event.is_overdue_reclass())
                    .map(|event| (event, false))
                    .collect()
            } else {
                vec![(
                    LedgerEvent::FundsAdjusted {
                        amount: record.amount,
                        date: record.occurred_on,
                    },
                    false,
                )]
            }
        }
    };
    Ok(events)
}

/// Rebuilds every snapshot from scratch by replaying the order rows and the
/// income/expense log.
///
/// Runs inside the caller's transaction; on any error the wipe rolls back
/// with everything else.
pub(crate) async fn rebuild(conn: &impl ConnectionTrait) -> ResultEngine<()> {
    use std::collections::HashMap;

    snapshots::clear_all(conn).await?;

    let income = records::all_income(conn).await?;
    let by_id: HashMap<i64, IncomeRecord> =
        income.iter().map(|r| (r.id, r.clone())).collect();

    // Net principal reductions per order, so creations replay with the
    // original principal rather than the current one.
    let mut net_reduction: HashMap<i64, Money> = HashMap::new();
    for record in &income {
        let target_kind = record
            .reverses_record_id
            .and_then(|id| by_id.get(&id))
            .map(|r| r.kind);
        let is_reduction = record.kind == RecordKind::PrincipalReduction
            || target_kind == Some(RecordKind::PrincipalReduction);
        if is_reduction && let Some(order_id) = record.order_id {
            *net_reduction.entry(order_id).or_default() += record.amount;
        }
    }

    let all_orders = orders::find(
        conn,
        &orders::OrderFilter {
            include_terminal: true,
            ..Default::default()
        },
    )
    .await?;

    for order in &all_orders {
        let original = order.amount + net_reduction.get(&order.id).copied().unwrap_or_default();
        apply(
            conn,
            &LedgerEvent::OrderCreated {
                group_id: order.group_id.clone(),
                customer: order.customer,
                amount: original,
                date: dates::business_date(order.created_at),
            },
        )
        .await?;
    }

    for record in &income {
        for (event, negate) in record_events(record, &by_id)? {
            apply_signed(conn, &event, negate).await?;
        }
    }

    for expense in records::all_expenses(conn).await? {
        apply(
            conn,
            &LedgerEvent::ExpenseRecorded {
                kind: expense.kind,
                amount: expense.amount,
                date: expense.occurred_on,
            },
        )
        .await?;
    }

    // The overdue bucket tracks the orders *currently* overdue; deriving it
    // from the final states is equivalent to replaying every reclassification.
    for order in &all_orders {
        if order.state == OrderState::Overdue {
            apply(
                conn,
                &LedgerEvent::OverdueSet {
                    group_id: order.group_id.clone(),
                    amount: order.amount,
                    date: dates::business_date(order.updated_at),
                },
            )
            .await?;
        }
    }

    tracing::info!(
        orders = all_orders.len(),
        records = income.len(),
        "snapshots rebuilt from log"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap() -> FinancialSnapshot {
        FinancialSnapshot::default()
    }

    #[test]
    fn creation_books_client_and_drains_liquidity() {
        let mut s = snap();
        update(
            &mut s,
            &LedgerEvent::OrderCreated {
                group_id: "S01".into(),
                customer: CustomerKind::A,
                amount: Money::new(10_000_00),
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            },
            false,
        );
        assert_eq!(s.valid_orders, 1);
        assert_eq!(s.valid_amount, Money::new(10_000_00));
        assert_eq!(s.new_clients, 1);
        assert_eq!(s.new_clients_amount, Money::new(10_000_00));
        assert_eq!(s.old_clients, 0);
        assert_eq!(s.liquid_funds, Money::new(-10_000_00));
        assert_eq!(s.liquid_flow, Money::new(-10_000_00));
    }

    #[test]
    fn revert_is_the_exact_negation() {
        let event = LedgerEvent::OrderCompleted {
            group_id: "S01".into(),
            amount: Money::new(5_000_00),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        };
        let mut s = snap();
        update(&mut s, &event, false);
        update(&mut s, &event, true);
        assert_eq!(s, snap());
    }

    #[test]
    fn breach_declaration_moves_no_money() {
        let mut s = snap();
        update(
            &mut s,
            &LedgerEvent::BreachDeclared {
                group_id: "S01".into(),
                amount: Money::new(1_50),
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            },
            false,
        );
        assert_eq!(s.liquid_funds, Money::ZERO);
        assert_eq!(s.breach_orders, 1);
        assert_eq!(s.breach_amount, Money::new(1_50));
        assert_eq!(s.valid_orders, -1);
    }

    #[test]
    fn surplus_formula() {
        let s = FinancialSnapshot {
            interest: Money::new(300_00),
            breach_end_amount: Money::new(200_00),
            breach_amount: Money::new(150_00),
            ..Default::default()
        };
        assert_eq!(s.surplus(), Money::new(350_00));
    }

    #[test]
    fn overdue_to_breach_clears_overdue_bucket() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let events = transition_events(
            OrderState::Overdue,
            OrderState::Breach,
            "S01",
            Money::new(1000_00),
            date,
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::OverdueCleared { .. }));
        assert!(matches!(events[1], LedgerEvent::BreachDeclared { .. }));
    }

    #[test]
    fn transition_tags_round_trip() {
        let tag = transition_tag(OrderState::Normal, OrderState::Breach);
        assert_eq!(tag, "normal>breach");
        assert_eq!(
            parse_transition(&tag).unwrap(),
            (OrderState::Normal, OrderState::Breach)
        );
        assert!(parse_transition("bogus").is_err());
    }
}
