//! Adds the overdue sub-bucket to the lifetime snapshots.
//!
//! `normal <-> overdue` reclassification now moves counters immediately
//! instead of waiting for the next rollup; these columns hold the overdue
//! subset of the valid bucket. Daily rows are untouched, overdue has no
//! per-day meaning.

use sea_orm_migration::prelude::*;

use crate::m20250608_091500_snapshots::{FinancialData, GroupedData};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum NewColumns {
    OverdueOrders,
    OverdueAmount,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(FinancialData::Table)
                    .add_column(
                        ColumnDef::new(NewColumns::OverdueOrders)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(FinancialData::Table)
                    .add_column(
                        ColumnDef::new(NewColumns::OverdueAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(GroupedData::Table)
                    .add_column(
                        ColumnDef::new(NewColumns::OverdueOrders)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(GroupedData::Table)
                    .add_column(
                        ColumnDef::new(NewColumns::OverdueAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(GroupedData::Table)
                    .drop_column(NewColumns::OverdueAmount)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(GroupedData::Table)
                    .drop_column(NewColumns::OverdueOrders)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(FinancialData::Table)
                    .drop_column(NewColumns::OverdueAmount)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(FinancialData::Table)
                    .drop_column(NewColumns::OverdueOrders)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
