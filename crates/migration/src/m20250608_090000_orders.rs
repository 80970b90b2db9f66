use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Orders {
    Table,
    Id,
    GroupId,
    ChatId,
    Customer,
    Amount,
    State,
    WeekdayLabel,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum OrderCounter {
    Table,
    Id,
    Value,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Orders::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Orders::GroupId).string().not_null())
                    .col(ColumnDef::new(Orders::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(Orders::Customer).string().not_null())
                    .col(ColumnDef::new(Orders::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Orders::State).string().not_null())
                    .col(ColumnDef::new(Orders::WeekdayLabel).string().not_null())
                    .col(ColumnDef::new(Orders::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Orders::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-chat_id-state")
                    .table(Orders::Table)
                    .col(Orders::ChatId)
                    .col(Orders::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-group_id")
                    .table(Orders::Table)
                    .col(Orders::GroupId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-orders-created_at")
                    .table(Orders::Table)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderCounter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderCounter::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrderCounter::Value)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed the single counter row; allocation is UPDATE + RETURNING.
        let insert = Query::insert()
            .into_table(OrderCounter::Table)
            .columns([OrderCounter::Id, OrderCounter::Value])
            .values_panic([1.into(), 0.into()])
            .to_owned();
        manager.exec_stmt(insert).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderCounter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        Ok(())
    }
}
