use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageRecords::AccountId).integer())
                    .col(ColumnDef::new(UsageRecords::ApiKeyId).integer())
                    .col(
                        ColumnDef::new(UsageRecords::Language)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::Formatter)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::InputBytes)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::OutputBytes)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::ExecutionTimeMs)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UsageRecords::ClientIp).string_len(45))
                    .col(ColumnDef::new(UsageRecords::UserAgent).string_len(255))
                    .col(
                        ColumnDef::new(UsageRecords::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_records_account_id")
                            .from(UsageRecords::Table, UsageRecords::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_usage_records_api_key_id")
                            .from(UsageRecords::Table, UsageRecords::ApiKeyId)
                            .to(ApiKeys::Table, ApiKeys::Id)
                            .on_update(ForeignKeyAction::Cascade)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建索引
        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_account_id")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_api_key_id")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::ApiKeyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_records_created_at")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageRecords {
    Table,
    Id,
    AccountId,
    ApiKeyId,
    Language,
    Formatter,
    InputBytes,
    OutputBytes,
    ExecutionTimeMs,
    ClientIp,
    UserAgent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum ApiKeys {
    Table,
    Id,
}
