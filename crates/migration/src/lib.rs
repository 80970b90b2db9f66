pub use sea_orm_migration::prelude::*;

mod m20250608_090000_orders;
mod m20250608_091500_snapshots;
mod m20250608_093000_records;
mod m20250608_094500_operation_history;
mod m20250705_120000_history_chat_id;
mod m20250720_090000_overdue_buckets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250608_090000_orders::Migration),
            Box::new(m20250608_091500_snapshots::Migration),
            Box::new(m20250608_093000_records::Migration),
            Box::new(m20250608_094500_operation_history::Migration),
            Box::new(m20250705_120000_history_chat_id::Migration),
            Box::new(m20250720_090000_overdue_buckets::Migration),
        ]
    }
}
