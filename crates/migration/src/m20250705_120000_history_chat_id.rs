//! Adds the chat isolation column to the undo log.
//!
//! Undo was originally scoped per installation; entries now carry the chat
//! they were performed in, so `/undo` in one group can never revert another
//! group's operation. Existing rows default to chat 0 and simply never match
//! a real chat again.

use sea_orm_migration::prelude::*;

use crate::m20250608_094500_operation_history::OperationHistory;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum NewColumns {
    ChatId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(OperationHistory::Table)
                    .add_column(
                        ColumnDef::new(NewColumns::ChatId)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-operation_history-chat_id-performed_at")
                    .table(OperationHistory::Table)
                    .col(NewColumns::ChatId)
                    .col(OperationHistory::PerformedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-operation_history-chat_id-performed_at")
                    .table(OperationHistory::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(OperationHistory::Table)
                    .drop_column(NewColumns::ChatId)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
