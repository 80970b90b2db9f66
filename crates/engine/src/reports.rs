//! Read-only reporting façade.
//!
//! Composes over the snapshots and the income log; never mutates, so callers
//! may run these concurrently with writers. Authorization for the privileged
//! queries (global summaries, income detail) happens at the chat boundary,
//! not here.

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

use crate::{
    FinancialSnapshot, Money, Order, OrderFilter, ResultEngine, Scope, orders,
    records::{self, IncomeRecord, RecordFilter, RecordKind},
    snapshots,
};

pub struct Reports<'a> {
    pub(crate) database: &'a DatabaseConnection,
}

/// Aggregated figures over a date range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodReport {
    pub stats: FinancialSnapshot,
    /// Only grouped reports carry a surplus; global reports omit it by
    /// design.
    pub surplus: Option<Money>,
}

/// Per-order interest rollup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterestSummary {
    pub count: usize,
    pub total: Money,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
}

impl Reports<'_> {
    /// Lifetime totals for a scope. A scope nothing was ever booked under
    /// reads as all zeroes.
    pub async fn summary(&self, scope: &Scope) -> ResultEngine<FinancialSnapshot> {
        snapshots::load(self.database, scope).await
    }

    /// Sums the daily rows over an inclusive business-date range.
    pub async fn period(
        &self,
        group_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<PeriodReport> {
        let stats = snapshots::sum_daily_range(self.database, group_id, from, to).await?;
        let surplus = group_id.is_some().then(|| stats.surplus());
        Ok(PeriodReport { stats, surplus })
    }

    /// Derived profitability for one attribution over a period.
    pub async fn surplus(
        &self,
        group_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Money> {
        let stats = snapshots::sum_daily_range(self.database, Some(group_id), from, to).await?;
        Ok(stats.surplus())
    }

    /// Multi-dimensional income-record detail query.
    pub async fn income_records(&self, filter: &RecordFilter) -> ResultEngine<Vec<IncomeRecord>> {
        records::query_income(self.database, filter).await
    }

    /// Interest booked against one order, net of undone entries.
    pub async fn interest_for_order(&self, order_id: i64) -> ResultEngine<InterestSummary> {
        let all = records::query_income(
            self.database,
            &RecordFilter {
                order_id: Some(order_id),
                ..Default::default()
            },
        )
        .await?;

        let reversed: std::collections::HashSet<i64> = all
            .iter()
            .filter_map(|record| record.reverses_record_id)
            .collect();

        let mut summary = InterestSummary::default();
        for record in all
            .iter()
            .filter(|r| r.kind == RecordKind::Interest && !reversed.contains(&r.id))
        {
            summary.count += 1;
            summary.total += record.amount;
            if summary.first.is_none_or(|d| record.occurred_on < d) {
                summary.first = Some(record.occurred_on);
            }
            if summary.last.is_none_or(|d| record.occurred_on > d) {
                summary.last = Some(record.occurred_on);
            }
        }
        Ok(summary)
    }

    /// Orders matching the filter, oldest first.
    pub async fn find_orders(&self, filter: &OrderFilter) -> ResultEngine<Vec<Order>> {
        orders::find(self.database, filter).await
    }
}
