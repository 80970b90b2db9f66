use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum IncomeRecords {
    Table,
    Id,
    OrderId,
    Kind,
    Amount,
    Customer,
    GroupId,
    OccurredOn,
    OccurredAt,
    Note,
    ReversesRecordId,
    Transition,
}

#[derive(Iden)]
enum ExpenseRecords {
    Table,
    Id,
    Kind,
    Amount,
    OccurredOn,
    OccurredAt,
    Note,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(IncomeRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IncomeRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IncomeRecords::OrderId).big_integer())
                    .col(ColumnDef::new(IncomeRecords::Kind).string().not_null())
                    .col(
                        ColumnDef::new(IncomeRecords::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IncomeRecords::Customer).string())
                    .col(ColumnDef::new(IncomeRecords::GroupId).string())
                    .col(ColumnDef::new(IncomeRecords::OccurredOn).date().not_null())
                    .col(
                        ColumnDef::new(IncomeRecords::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(IncomeRecords::Note).string())
                    .col(ColumnDef::new(IncomeRecords::ReversesRecordId).big_integer())
                    .col(ColumnDef::new(IncomeRecords::Transition).string())
                    .to_owned(),
            )
            .await?;

        for (name, columns) in [
            ("idx-income_records-occurred_on", vec![IncomeRecords::OccurredOn]),
            ("idx-income_records-kind", vec![IncomeRecords::Kind]),
            ("idx-income_records-group_id", vec![IncomeRecords::GroupId]),
            ("idx-income_records-order_id", vec![IncomeRecords::OrderId]),
            (
                "idx-income_records-occurred_on-kind",
                vec![IncomeRecords::OccurredOn, IncomeRecords::Kind],
            ),
        ] {
            let mut index = Index::create();
            index.name(name).table(IncomeRecords::Table);
            for column in columns {
                index.col(column);
            }
            manager.create_index(index.to_owned()).await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(ExpenseRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseRecords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExpenseRecords::Kind).string().not_null())
                    .col(
                        ColumnDef::new(ExpenseRecords::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseRecords::OccurredOn)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExpenseRecords::OccurredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseRecords::Note).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expense_records-occurred_on")
                    .table(ExpenseRecords::Table)
                    .col(ExpenseRecords::OccurredOn)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExpenseRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IncomeRecords::Table).to_owned())
            .await?;
        Ok(())
    }
}
