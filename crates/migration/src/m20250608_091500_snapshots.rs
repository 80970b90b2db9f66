use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum FinancialData {
    Table,
    Id,
    ValidOrders,
    ValidAmount,
    LiquidFunds,
    NewClients,
    NewClientsAmount,
    OldClients,
    OldClientsAmount,
    Interest,
    CompletedOrders,
    CompletedAmount,
    BreachOrders,
    BreachAmount,
    BreachEndOrders,
    BreachEndAmount,
    UpdatedAt,
}

#[derive(Iden)]
pub enum GroupedData {
    Table,
    GroupId,
    ValidOrders,
    ValidAmount,
    NewClients,
    NewClientsAmount,
    OldClients,
    OldClientsAmount,
    Interest,
    CompletedOrders,
    CompletedAmount,
    BreachOrders,
    BreachAmount,
    BreachEndOrders,
    BreachEndAmount,
    UpdatedAt,
}

#[derive(Iden)]
enum DailyData {
    Table,
    Id,
    Date,
    GroupId,
    NewClients,
    NewClientsAmount,
    OldClients,
    OldClientsAmount,
    Interest,
    CompletedOrders,
    CompletedAmount,
    BreachOrders,
    BreachAmount,
    BreachEndOrders,
    BreachEndAmount,
    LiquidFlow,
    CompanyExpenses,
    OtherExpenses,
    UpdatedAt,
}

fn counter(def: &mut ColumnDef) -> &mut ColumnDef {
    def.big_integer().not_null().default(0)
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FinancialData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FinancialData::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(counter(&mut ColumnDef::new(FinancialData::ValidOrders)))
                    .col(counter(&mut ColumnDef::new(FinancialData::ValidAmount)))
                    .col(counter(&mut ColumnDef::new(FinancialData::LiquidFunds)))
                    .col(counter(&mut ColumnDef::new(FinancialData::NewClients)))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::NewClientsAmount,
                    )))
                    .col(counter(&mut ColumnDef::new(FinancialData::OldClients)))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::OldClientsAmount,
                    )))
                    .col(counter(&mut ColumnDef::new(FinancialData::Interest)))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::CompletedOrders,
                    )))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::CompletedAmount,
                    )))
                    .col(counter(&mut ColumnDef::new(FinancialData::BreachOrders)))
                    .col(counter(&mut ColumnDef::new(FinancialData::BreachAmount)))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::BreachEndOrders,
                    )))
                    .col(counter(&mut ColumnDef::new(
                        FinancialData::BreachEndAmount,
                    )))
                    .col(
                        ColumnDef::new(FinancialData::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupedData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupedData::GroupId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(counter(&mut ColumnDef::new(GroupedData::ValidOrders)))
                    .col(counter(&mut ColumnDef::new(GroupedData::ValidAmount)))
                    .col(counter(&mut ColumnDef::new(GroupedData::NewClients)))
                    .col(counter(&mut ColumnDef::new(GroupedData::NewClientsAmount)))
                    .col(counter(&mut ColumnDef::new(GroupedData::OldClients)))
                    .col(counter(&mut ColumnDef::new(GroupedData::OldClientsAmount)))
                    .col(counter(&mut ColumnDef::new(GroupedData::Interest)))
                    .col(counter(&mut ColumnDef::new(GroupedData::CompletedOrders)))
                    .col(counter(&mut ColumnDef::new(GroupedData::CompletedAmount)))
                    .col(counter(&mut ColumnDef::new(GroupedData::BreachOrders)))
                    .col(counter(&mut ColumnDef::new(GroupedData::BreachAmount)))
                    .col(counter(&mut ColumnDef::new(GroupedData::BreachEndOrders)))
                    .col(counter(&mut ColumnDef::new(GroupedData::BreachEndAmount)))
                    .col(
                        ColumnDef::new(GroupedData::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DailyData::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyData::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DailyData::Date).date().not_null())
                    .col(ColumnDef::new(DailyData::GroupId).string())
                    .col(counter(&mut ColumnDef::new(DailyData::NewClients)))
                    .col(counter(&mut ColumnDef::new(DailyData::NewClientsAmount)))
                    .col(counter(&mut ColumnDef::new(DailyData::OldClients)))
                    .col(counter(&mut ColumnDef::new(DailyData::OldClientsAmount)))
                    .col(counter(&mut ColumnDef::new(DailyData::Interest)))
                    .col(counter(&mut ColumnDef::new(DailyData::CompletedOrders)))
                    .col(counter(&mut ColumnDef::new(DailyData::CompletedAmount)))
                    .col(counter(&mut ColumnDef::new(DailyData::BreachOrders)))
                    .col(counter(&mut ColumnDef::new(DailyData::BreachAmount)))
                    .col(counter(&mut ColumnDef::new(DailyData::BreachEndOrders)))
                    .col(counter(&mut ColumnDef::new(DailyData::BreachEndAmount)))
                    .col(counter(&mut ColumnDef::new(DailyData::LiquidFlow)))
                    .col(counter(&mut ColumnDef::new(DailyData::CompanyExpenses)))
                    .col(counter(&mut ColumnDef::new(DailyData::OtherExpenses)))
                    .col(ColumnDef::new(DailyData::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-daily_data-date-group_id")
                    .table(DailyData::Table)
                    .col(DailyData::Date)
                    .col(DailyData::GroupId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyData::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupedData::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FinancialData::Table).to_owned())
            .await?;
        Ok(())
    }
}
