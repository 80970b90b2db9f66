use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub(crate) enum OperationHistory {
    Table,
    Id,
    OperationType,
    Payload,
    PerformedAt,
    Undone,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OperationHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OperationHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OperationHistory::OperationType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OperationHistory::Payload)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OperationHistory::PerformedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OperationHistory::Undone)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-operation_history-undone-performed_at")
                    .table(OperationHistory::Table)
                    .col(OperationHistory::Undone)
                    .col(OperationHistory::PerformedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OperationHistory::Table).to_owned())
            .await?;
        Ok(())
    }
}
