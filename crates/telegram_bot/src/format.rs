//! Plain-text rendering for chat replies.

use engine::{
    FinancialSnapshot, IncomeRecord, InterestSummary, Order, PeriodReport, RecordKind, UndoResult,
};

pub(crate) fn help_text() -> String {
    "Order commands:\n\
     /neworder <group> <A|B> <amount> - open an order in this chat\n\
     /order - show the active order\n\
     +500 - book interest, +500x - pay down principal, +2000c - breach settlement\n\
     /normal /overdue /breach - change state, /end /breach_end - close\n\
     /undo - revert the last operation in this chat\n\
     \n\
     Reports:\n\
     /report [group] [today|YYYY-MM-DD [YYYY-MM-DD]]\n\
     /search <group|state|A|B|#id|date [date]>\n\
     \n\
     Admin:\n\
     /expense <company|other> <amount> [note]\n\
     /funds <±amount> [note]\n\
     /income [YYYY-MM-DD [YYYY-MM-DD]]\n\
     /rebuild"
        .to_string()
}

pub(crate) fn render_order(order: &Order, interest: &InterestSummary) -> String {
    let mut out = format!(
        "📋 Order #{}\n\
         Group: {}\n\
         Customer: {}\n\
         Outstanding: {}\n\
         State: {}\n\
         Weekday: {}",
        order.id,
        order.group_id,
        order.customer.as_str(),
        order.amount,
        order.state.as_str(),
        order.weekday_label,
    );
    if interest.count > 0 {
        out.push_str(&format!(
            "\n💰 Interest: {} over {} payment(s)",
            interest.total, interest.count
        ));
    }
    out
}

pub(crate) fn render_period_report(
    title: &str,
    report: &PeriodReport,
    liquid_funds: Option<&FinancialSnapshot>,
) -> String {
    let stats = &report.stats;
    let mut out = format!(
        "📊 {title}\n\
         ━━━━━━━━━━━━━━━\n\
         New clients: {} ({})\n\
         Returning clients: {} ({})\n\
         Interest: {}\n\
         Completed: {} ({})\n\
         Breach: {} ({})\n\
         Breach closed: {} ({})",
        stats.new_clients,
        stats.new_clients_amount,
        stats.old_clients,
        stats.old_clients_amount,
        stats.interest,
        stats.completed_orders,
        stats.completed_amount,
        stats.breach_orders,
        stats.breach_amount,
        stats.breach_end_orders,
        stats.breach_end_amount,
    );
    if let Some(surplus) = report.surplus {
        out.push_str(&format!("\nSurplus: {surplus}"));
    }
    // Only the global report shows the cash position.
    if let Some(global) = liquid_funds {
        out.push_str(&format!(
            "\n━━━━━━━━━━━━━━━\n\
             Active orders: {} ({})\n\
             Liquid funds: {}\n\
             Day flow: {}\n\
             Expenses: company {}, other {}",
            global.valid_orders,
            global.valid_amount,
            global.liquid_funds,
            stats.liquid_flow,
            stats.company_expenses,
            stats.other_expenses,
        ));
    }
    out
}

pub(crate) fn render_orders(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "No matching orders.".to_string();
    }
    let mut out = format!("🔍 {} order(s)\n", orders.len());
    for order in orders.iter().take(20) {
        out.push_str(&format!(
            "#{} {} {} {} {} [{}]\n",
            order.id,
            order.group_id,
            order.customer.as_str(),
            order.amount,
            order.state.as_str(),
            order.created_at.format("%Y-%m-%d"),
        ));
    }
    if orders.len() > 20 {
        out.push_str(&format!("… and {} more", orders.len() - 20));
    }
    out
}

pub(crate) fn render_income_records(records: &[IncomeRecord]) -> String {
    if records.is_empty() {
        return "No income records in that period.".to_string();
    }

    let kinds = [
        RecordKind::Completed,
        RecordKind::BreachEnd,
        RecordKind::Interest,
        RecordKind::PrincipalReduction,
        RecordKind::Adjustment,
    ];

    let mut out = String::from("💰 Income detail\n━━━━━━━━━━━━━━━\n");
    for kind in kinds {
        let matching: Vec<&IncomeRecord> = records.iter().filter(|r| r.kind == kind).collect();
        if matching.is_empty() {
            continue;
        }
        let total = matching
            .iter()
            .fold(engine::Money::ZERO, |acc, r| acc + r.amount);
        out.push_str(&format!(
            "{}: {} ({} record(s))\n",
            kind.as_str(),
            total,
            matching.len()
        ));
        for record in matching.iter().take(10) {
            out.push_str(&format!(
                "  {} {}{}\n",
                record.occurred_on,
                record.amount,
                record
                    .order_id
                    .map(|id| format!(" order #{id}"))
                    .unwrap_or_default(),
            ));
        }
        if matching.len() > 10 {
            out.push_str(&format!("  … and {} more\n", matching.len() - 10));
        }
    }
    out
}

pub(crate) fn describe_undo(result: &UndoResult) -> String {
    let what = match result.operation {
        engine::OperationType::OrderCreated => "order creation",
        engine::OperationType::Interest => "interest income",
        engine::OperationType::PrincipalReduction => "principal reduction",
        engine::OperationType::BreachSettlement => "breach settlement",
        engine::OperationType::OrderCompleted => "order completion",
        engine::OperationType::BreachCompleted => "breach completion",
        engine::OperationType::StateChanged => "state change",
        engine::OperationType::Expense => "expense",
        engine::OperationType::FundsAdjusted => "funds adjustment",
    };
    match result.amount {
        Some(amount) => format!("✅ Undone {what} of {amount}"),
        None => format!("✅ Undone {what}"),
    }
}

pub(crate) fn state_updated(order: &Order) -> String {
    format!(
        "✅ Status updated: {}\nOrder #{}",
        order.state.as_str(),
        order.id
    )
}
