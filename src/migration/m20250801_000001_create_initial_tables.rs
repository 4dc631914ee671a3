// ABOUTME: Initial migration to create the accounts and evidence tables
// ABOUTME: Sets up the uniqueness constraints that reconciliation relies on

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create accounts table. The primary key is the stable
        // per-platform-identity id; duplicate provisioning attempts must
        // hit this constraint, never create a second row.
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Accounts::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Accounts::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Accounts::DisplayName).string().not_null())
                    .col(ColumnDef::new(Accounts::PrefLanguage).string())
                    .col(ColumnDef::new(Accounts::PrefCalendar).string())
                    .col(ColumnDef::new(Accounts::CreatedAt).big_integer().not_null().default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Create evidence table
        manager
            .create_table(
                Table::create()
                    .table(Evidence::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Evidence::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Evidence::AccountId).string().not_null())
                    .col(ColumnDef::new(Evidence::StorageKey).string().not_null())
                    .col(ColumnDef::new(Evidence::IncidentKind).string().not_null())
                    .col(ColumnDef::new(Evidence::Description).string().not_null().default(""))
                    .col(ColumnDef::new(Evidence::ThreatLevel).integer().not_null())
                    .col(ColumnDef::new(Evidence::Archived).boolean().not_null().default(false))
                    .col(ColumnDef::new(Evidence::CapturedAt).big_integer().not_null().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_evidence_account_id")
                            .from(Evidence::Table, Evidence::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_evidence_account")
                    .table(Evidence::Table)
                    .col(Evidence::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Evidence::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Email,
    PasswordHash,
    DisplayName,
    PrefLanguage,
    PrefCalendar,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Evidence {
    Table,
    Id,
    AccountId,
    StorageKey,
    IncidentKind,
    Description,
    ThreatLevel,
    Archived,
    CapturedAt,
}
