use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sea_orm::Database;

use engine::{
    CustomerKind, Engine, EngineError, ExpenseKind, FinancialSnapshot, Money, OrderFilter,
    OrderState, RecordFilter, RecordKind, Scope,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

/// 06:00 UTC is mid-afternoon in the business timezone, safely inside the
/// business day of the same calendar date.
fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn cents(amount: i64) -> Money {
    Money::new(amount)
}

async fn scope_state(
    engine: &Engine,
    group: &str,
    date: NaiveDate,
) -> (FinancialSnapshot, FinancialSnapshot, FinancialSnapshot) {
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    let grouped = engine.snapshot(&Scope::Group(group.to_string())).await.unwrap();
    let daily = engine
        .snapshot(&Scope::Daily {
            date,
            group_id: Some(group.to_string()),
        })
        .await
        .unwrap();
    (global, grouped, daily)
}

#[tokio::test]
async fn lifecycle_scenario() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(10_000_00), at(10, 6))
        .await
        .unwrap();
    assert_eq!(order.state, OrderState::Normal);
    assert_eq!(order.amount, cents(10_000_00));
    assert_eq!(order.weekday_label, "Mon");

    engine
        .record_interest(order.id, cents(500_00), at(10, 7))
        .await
        .unwrap();
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    let grouped = engine
        .snapshot(&Scope::Group("S01".to_string()))
        .await
        .unwrap();
    assert_eq!(global.interest, cents(500_00));
    assert_eq!(grouped.interest, cents(500_00));

    let order = engine
        .change_state(order.id, OrderState::Breach, at(10, 8))
        .await
        .unwrap();
    assert_eq!(order.state, OrderState::Breach);

    engine
        .breach_settlement(order.id, cents(2_000_00), at(10, 9))
        .await
        .unwrap();
    let grouped = engine
        .snapshot(&Scope::Group("S01".to_string()))
        .await
        .unwrap();
    assert_eq!(grouped.breach_end_amount, cents(2_000_00));

    let order = engine.complete_breach(order.id, at(10, 10)).await.unwrap();
    assert_eq!(order.state, OrderState::BreachEnd);

    // The completion record captures the settled total.
    let completions = engine
        .reports()
        .income_records(&RecordFilter {
            kind: Some(RecordKind::BreachEnd),
            order_id: Some(order.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].amount, cents(2_000_00));

    // Terminal order frees the chat for a new one.
    let next = engine
        .create_order("S01", 77, CustomerKind::B, cents(3_000_00), at(11, 6))
        .await
        .unwrap();
    assert_eq!(next.id, order.id + 1);
}

#[tokio::test]
async fn second_active_order_is_rejected_without_burning_an_id() {
    let engine = engine_with_db().await;

    let first = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    let err = engine
        .create_order("S01", 77, CustomerKind::A, cents(2_000_00), at(10, 7))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // No second row for the chat, and the next id is still sequential.
    let orders = engine
        .find_orders(&OrderFilter {
            include_terminal: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);

    let other = engine
        .create_order("S02", 78, CustomerKind::B, cents(500_00), at(10, 8))
        .await
        .unwrap();
    assert_eq!(other.id, first.id + 1);
}

#[tokio::test]
async fn principal_reduction_is_bounded() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    let order = engine
        .reduce_principal(order.id, cents(400_00), at(10, 7))
        .await
        .unwrap();
    assert_eq!(order.amount, cents(600_00));

    let before = scope_state(&engine, "S01", day(10)).await;
    let err = engine
        .reduce_principal(order.id, cents(700_00), at(10, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExceedsPrincipal(_)));

    // Rejected operation left everything untouched.
    assert_eq!(engine.order(order.id).await.unwrap().amount, cents(600_00));
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);

    // Paying off the rest exactly is fine.
    let order = engine
        .reduce_principal(order.id, cents(600_00), at(10, 9))
        .await
        .unwrap();
    assert_eq!(order.amount, Money::ZERO);
}

#[tokio::test]
async fn interest_requires_an_active_order() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine
        .change_state(order.id, OrderState::Breach, at(10, 7))
        .await
        .unwrap();

    let err = engine
        .record_interest(order.id, cents(10_00), at(10, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let err = engine
        .record_interest(order.id, cents(0), at(10, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[tokio::test]
async fn settlement_requires_breach_state() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    let err = engine
        .breach_settlement(order.id, cents(100_00), at(10, 7))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn change_state_rejects_bad_edges_and_completions() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    let err = engine
        .change_state(order.id, OrderState::End, at(10, 7))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    // breach_end straight from normal is not an edge at all.
    let err = engine
        .change_state(order.id, OrderState::BreachEnd, at(10, 7))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    engine
        .change_state(order.id, OrderState::Breach, at(10, 8))
        .await
        .unwrap();
    let err = engine
        .change_state(order.id, OrderState::Normal, at(10, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));
}

#[tokio::test]
async fn overdue_reclassification_is_immediate() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    engine
        .change_state(order.id, OrderState::Overdue, at(10, 7))
        .await
        .unwrap();
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    assert_eq!(global.overdue_orders, 1);
    assert_eq!(global.overdue_amount, cents(1_000_00));
    // The valid bucket still covers overdue orders.
    assert_eq!(global.valid_orders, 1);
    assert_eq!(global.valid_amount, cents(1_000_00));

    // Paying down principal while overdue shrinks both buckets.
    engine
        .reduce_principal(order.id, cents(300_00), at(10, 8))
        .await
        .unwrap();
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    assert_eq!(global.overdue_amount, cents(700_00));
    assert_eq!(global.valid_amount, cents(700_00));

    engine
        .change_state(order.id, OrderState::Normal, at(10, 9))
        .await
        .unwrap();
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    assert_eq!(global.overdue_orders, 0);
    assert_eq!(global.overdue_amount, Money::ZERO);
}

#[tokio::test]
async fn undo_restores_exact_pre_operation_state() {
    let engine = engine_with_db().await;

    // Creation.
    let before = scope_state(&engine, "S01", day(10)).await;
    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine.undo_last(77, at(10, 7)).await.unwrap();
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);
    assert!(engine.active_order(77).await.unwrap().is_none());
    assert!(matches!(
        engine.order(order.id).await.unwrap_err(),
        EngineError::NotFound(_)
    ));

    // Interest.
    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 8))
        .await
        .unwrap();
    let before = scope_state(&engine, "S01", day(10)).await;
    engine
        .record_interest(order.id, cents(50_00), at(10, 9))
        .await
        .unwrap();
    engine.undo_last(77, at(10, 10)).await.unwrap();
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);

    // Principal reduction.
    let before = scope_state(&engine, "S01", day(10)).await;
    engine
        .reduce_principal(order.id, cents(200_00), at(10, 11))
        .await
        .unwrap();
    engine.undo_last(77, at(10, 12)).await.unwrap();
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);
    assert_eq!(engine.order(order.id).await.unwrap().amount, cents(1_000_00));

    // State change.
    let before = scope_state(&engine, "S01", day(10)).await;
    engine
        .change_state(order.id, OrderState::Breach, at(10, 13))
        .await
        .unwrap();
    engine.undo_last(77, at(10, 14)).await.unwrap();
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);
    assert_eq!(engine.order(order.id).await.unwrap().state, OrderState::Normal);

    // Completion.
    let before = scope_state(&engine, "S01", day(10)).await;
    engine.complete_order(order.id, at(10, 15)).await.unwrap();
    engine.undo_last(77, at(10, 16)).await.unwrap();
    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);
    assert_eq!(engine.order(order.id).await.unwrap().state, OrderState::Normal);
}

#[tokio::test]
async fn undo_walks_backwards_through_the_chat_history() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine
        .record_interest(order.id, cents(10_00), at(10, 7))
        .await
        .unwrap();
    engine
        .record_interest(order.id, cents(20_00), at(10, 8))
        .await
        .unwrap();

    let undone = engine.undo_last(77, at(10, 9)).await.unwrap();
    assert_eq!(undone.amount, Some(cents(20_00)));
    let undone = engine.undo_last(77, at(10, 10)).await.unwrap();
    assert_eq!(undone.amount, Some(cents(10_00)));

    // Next in line is the creation itself.
    engine.undo_last(77, at(10, 11)).await.unwrap();
    let err = engine.undo_last(77, at(10, 12)).await.unwrap_err();
    assert_eq!(err, EngineError::NothingToUndo(77));
}

#[tokio::test]
async fn undo_is_isolated_per_chat() {
    let engine = engine_with_db().await;

    engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();

    let err = engine.undo_last(78, at(10, 7)).await.unwrap_err();
    assert_eq!(err, EngineError::NothingToUndo(78));
    assert!(engine.active_order(77).await.unwrap().is_some());
}

#[tokio::test]
async fn undo_of_breach_completion_restores_breach_state() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine
        .change_state(order.id, OrderState::Breach, at(10, 7))
        .await
        .unwrap();
    engine
        .breach_settlement(order.id, cents(400_00), at(10, 8))
        .await
        .unwrap();

    let before = scope_state(&engine, "S01", day(10)).await;
    engine.complete_breach(order.id, at(10, 9)).await.unwrap();
    engine.undo_last(77, at(10, 10)).await.unwrap();

    assert_eq!(scope_state(&engine, "S01", day(10)).await, before);
    assert_eq!(engine.order(order.id).await.unwrap().state, OrderState::Breach);
}

#[tokio::test]
async fn surplus_formula_over_a_period() {
    let engine = engine_with_db().await;

    // Interest 300 on one order...
    let earner = engine
        .create_order("S01", 1, CustomerKind::B, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine
        .record_interest(earner.id, cents(300_00), at(10, 7))
        .await
        .unwrap();

    // ...a breach of 150 on another, with 200 settled against it.
    let breached = engine
        .create_order("S01", 2, CustomerKind::A, cents(150_00), at(10, 8))
        .await
        .unwrap();
    engine
        .change_state(breached.id, OrderState::Breach, at(10, 9))
        .await
        .unwrap();
    engine
        .breach_settlement(breached.id, cents(200_00), at(10, 10))
        .await
        .unwrap();

    let surplus = engine
        .reports()
        .surplus("S01", day(10), day(10))
        .await
        .unwrap();
    assert_eq!(surplus, cents(350_00));

    // Global period report carries no surplus by design.
    let report = engine
        .reports()
        .period(None, day(10), day(10))
        .await
        .unwrap();
    assert_eq!(report.surplus, None);
    let report = engine
        .reports()
        .period(Some("S01"), day(10), day(10))
        .await
        .unwrap();
    assert_eq!(report.surplus, Some(cents(350_00)));
}

#[tokio::test]
async fn period_report_sums_days_and_groups() {
    let engine = engine_with_db().await;

    let first = engine
        .create_order("S01", 1, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    let second = engine
        .create_order("S02", 2, CustomerKind::B, cents(2_000_00), at(11, 6))
        .await
        .unwrap();
    engine
        .record_interest(first.id, cents(10_00), at(10, 7))
        .await
        .unwrap();
    engine
        .record_interest(second.id, cents(20_00), at(11, 7))
        .await
        .unwrap();
    engine
        .record_expense(99, ExpenseKind::Company, cents(5_00), Some("rent"), at(11, 8))
        .await
        .unwrap();

    let s01 = engine
        .reports()
        .period(Some("S01"), day(10), day(11))
        .await
        .unwrap();
    assert_eq!(s01.stats.interest, cents(10_00));
    assert_eq!(s01.stats.new_clients, 1);

    let both = engine
        .reports()
        .period(None, day(10), day(11))
        .await
        .unwrap();
    assert_eq!(both.stats.interest, cents(30_00));
    assert_eq!(both.stats.new_clients, 1);
    assert_eq!(both.stats.old_clients, 1);
    assert_eq!(both.stats.company_expenses, cents(5_00));
    // Created 1000+2000 out, interest 30 in, expense 5 out.
    assert_eq!(both.stats.liquid_flow, cents(-2_975_00));

    let first_day_only = engine
        .reports()
        .period(None, day(10), day(10))
        .await
        .unwrap();
    assert_eq!(first_day_only.stats.interest, cents(10_00));
}

#[tokio::test]
async fn expense_and_funds_adjustment_round_trip() {
    let engine = engine_with_db().await;

    engine
        .record_expense(99, ExpenseKind::Other, cents(40_00), None, at(10, 6))
        .await
        .unwrap();
    engine
        .adjust_funds(99, cents(1_000_00), Some("opening float"), at(10, 7))
        .await
        .unwrap();

    let global = engine.snapshot(&Scope::Global).await.unwrap();
    assert_eq!(global.liquid_funds, cents(960_00));

    let daily = engine
        .snapshot(&Scope::Daily {
            date: day(10),
            group_id: None,
        })
        .await
        .unwrap();
    assert_eq!(daily.other_expenses, cents(40_00));
    assert_eq!(daily.liquid_flow, cents(960_00));

    // Undo the adjustment, then the expense.
    engine.undo_last(99, at(10, 8)).await.unwrap();
    engine.undo_last(99, at(10, 9)).await.unwrap();
    let global = engine.snapshot(&Scope::Global).await.unwrap();
    assert_eq!(global.liquid_funds, Money::ZERO);
}

#[tokio::test]
async fn interest_summary_nets_out_undone_entries() {
    let engine = engine_with_db().await;

    let order = engine
        .create_order("S01", 77, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    engine
        .record_interest(order.id, cents(100_00), at(10, 7))
        .await
        .unwrap();
    engine
        .record_interest(order.id, cents(50_00), at(11, 7))
        .await
        .unwrap();
    engine.undo_last(77, at(11, 8)).await.unwrap();

    let summary = engine.reports().interest_for_order(order.id).await.unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.total, cents(100_00));
    assert_eq!(summary.first, Some(day(10)));
    assert_eq!(summary.last, Some(day(10)));
}

#[tokio::test]
async fn order_search_by_criteria() {
    let engine = engine_with_db().await;

    let first = engine
        .create_order("S01", 1, CustomerKind::A, cents(1_000_00), at(10, 6))
        .await
        .unwrap();
    let second = engine
        .create_order("S02", 2, CustomerKind::B, cents(2_000_00), at(11, 6))
        .await
        .unwrap();
    engine.complete_order(first.id, at(11, 7)).await.unwrap();

    // Default search covers active orders only.
    let active = engine.find_orders(&OrderFilter::default()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);

    let completed = engine
        .find_orders(&OrderFilter {
            state: Some(OrderState::End),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, first.id);

    let by_group = engine
        .find_orders(&OrderFilter {
            group_id: Some("S02".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_group.len(), 1);

    let by_date = engine
        .find_orders(&OrderFilter {
            date_range: Some((day(10), day(10))),
            include_terminal: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_date.len(), 1);
    assert_eq!(by_date[0].id, first.id);

    // Oldest first.
    let all = engine
        .find_orders(&OrderFilter {
            include_terminal: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), vec![first.id, second.id]);
}

#[tokio::test]
async fn replay_reproduces_incremental_snapshots() {
    let engine = engine_with_db().await;

    // A messy sequence across two groups, with reductions, breaches,
    // expenses, and undos sprinkled in.
    let a = engine
        .create_order("S01", 1, CustomerKind::A, cents(10_000_00), at(10, 6))
        .await
        .unwrap();
    let b = engine
        .create_order("S02", 2, CustomerKind::B, cents(5_000_00), at(10, 7))
        .await
        .unwrap();

    engine.record_interest(a.id, cents(500_00), at(10, 8)).await.unwrap();
    engine.record_interest(b.id, cents(250_00), at(11, 6)).await.unwrap();
    engine.reduce_principal(a.id, cents(2_000_00), at(11, 7)).await.unwrap();

    engine.change_state(a.id, OrderState::Overdue, at(11, 8)).await.unwrap();
    engine.change_state(a.id, OrderState::Breach, at(12, 6)).await.unwrap();
    engine.breach_settlement(a.id, cents(3_000_00), at(12, 7)).await.unwrap();
    engine.complete_breach(a.id, at(12, 8)).await.unwrap();

    engine.complete_order(b.id, at(12, 9)).await.unwrap();
    // Changed our mind about closing b.
    engine.undo_last(2, at(12, 10)).await.unwrap();
    engine.change_state(b.id, OrderState::Overdue, at(12, 11)).await.unwrap();

    engine
        .record_expense(99, ExpenseKind::Company, cents(80_00), None, at(12, 12))
        .await
        .unwrap();
    engine
        .adjust_funds(99, cents(-100_00), None, at(12, 13))
        .await
        .unwrap();
    // An undone interest entry leaves a reversal pair in the log.
    engine.record_interest(b.id, cents(999_00), at(12, 14)).await.unwrap();
    engine.undo_last(2, at(12, 15)).await.unwrap();

    let mut scopes = vec![
        Scope::Global,
        Scope::Group("S01".to_string()),
        Scope::Group("S02".to_string()),
    ];
    for d in [10, 11, 12] {
        for group in [Some("S01"), Some("S02"), None] {
            scopes.push(Scope::Daily {
                date: day(d),
                group_id: group.map(str::to_string),
            });
        }
    }

    let mut incremental = Vec::new();
    for scope in &scopes {
        incremental.push(engine.snapshot(scope).await.unwrap());
    }

    engine.rebuild_snapshots().await.unwrap();

    for (scope, expected) in scopes.iter().zip(incremental) {
        let rebuilt = engine.snapshot(scope).await.unwrap();
        assert_eq!(rebuilt, expected, "scope {scope:?} drifted on replay");
    }
}

#[tokio::test]
async fn missing_scope_reads_as_zeroes() {
    let engine = engine_with_db().await;

    let snapshot = engine
        .snapshot(&Scope::Group("S99".to_string()))
        .await
        .unwrap();
    assert_eq!(snapshot, FinancialSnapshot::default());
}
