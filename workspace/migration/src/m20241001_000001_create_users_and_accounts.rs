use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_uuid(Users::Id))
                    .col(string(Users::Name))
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::Username).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string_len(Users::Role, 20).default("user"))
                    .col(boolean(Users::IsActive).default(false))
                    .col(string_null(Users::VerificationToken))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .col(timestamp_with_time_zone(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create connected_accounts table
        manager
            .create_table(
                Table::create()
                    .table(ConnectedAccounts::Table)
                    .if_not_exists()
                    .col(pk_uuid(ConnectedAccounts::Id))
                    .col(string(ConnectedAccounts::Email))
                    .col(string_null(ConnectedAccounts::Name))
                    .col(string_null(ConnectedAccounts::Picture))
                    .col(text_null(ConnectedAccounts::AccessToken))
                    .col(text_null(ConnectedAccounts::RefreshToken))
                    .col(timestamp_with_time_zone_null(ConnectedAccounts::TokenExpiry))
                    .col(boolean(ConnectedAccounts::IsActive).default(true))
                    .col(timestamp_with_time_zone_null(ConnectedAccounts::LastSyncedAt))
                    .col(uuid(ConnectedAccounts::CreatedBy))
                    .col(timestamp_with_time_zone(ConnectedAccounts::CreatedAt))
                    .col(timestamp_with_time_zone(ConnectedAccounts::UpdatedAt))
                    .col(timestamp_with_time_zone_null(ConnectedAccounts::DeletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connected_account_owner")
                            .from(ConnectedAccounts::Table, ConnectedAccounts::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One live row per (email, owner)
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_connected_accounts_email_owner \
                 ON connected_accounts (email, created_by) WHERE deleted_at IS NULL",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConnectedAccounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Name,
    Email,
    Username,
    PasswordHash,
    Role,
    IsActive,
    VerificationToken,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ConnectedAccounts {
    Table,
    Id,
    Email,
    Name,
    Picture,
    AccessToken,
    RefreshToken,
    TokenExpiry,
    IsActive,
    LastSyncedAt,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
