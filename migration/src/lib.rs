pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_accounts_table;
mod m20240101_000002_create_api_keys_table;
mod m20240101_000003_create_subscriptions_table;
mod m20240101_000004_create_usage_records_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_accounts_table::Migration),
            Box::new(m20240101_000002_create_api_keys_table::Migration),
            Box::new(m20240101_000003_create_subscriptions_table::Migration),
            Box::new(m20240101_000004_create_usage_records_table::Migration),
        ]
    }
}
