use sea_orm_migration::{prelude::*, schema::*};

use crate::m20241001_000001_create_users_and_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create models table
        manager
            .create_table(
                Table::create()
                    .table(Models::Table)
                    .if_not_exists()
                    .col(pk_uuid(Models::Id))
                    .col(string(Models::ComcardNo))
                    .col(string(Models::NameEng))
                    .col(string_null(Models::NameKor))
                    .col(string_null(Models::National))
                    .col(string_null(Models::Stage))
                    .col(text_null(Models::AdditionalPic))
                    .col(text_null(Models::ComcardUrl))
                    .col(text_null(Models::ComcardPic))
                    .col(text_null(Models::Download))
                    .col(text_null(Models::HtmlUrl))
                    .col(uuid_null(Models::CreatedBy))
                    .col(timestamp_with_time_zone(Models::CreatedAt))
                    .col(timestamp_with_time_zone(Models::UpdatedAt))
                    .col(timestamp_with_time_zone_null(Models::DeletedAt))
                    .to_owned(),
            )
            .await?;

        // Create posts table
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(pk_uuid(Posts::Id))
                    .col(string(Posts::PostId))
                    .col(json_binary(Posts::Data))
                    .col(string_null(Posts::PostDate))
                    .col(boolean(Posts::IsFavorite).default(false))
                    .col(boolean(Posts::IsEmailSent).default(false))
                    .col(text_null(Posts::Memo))
                    .col(uuid(Posts::CreatedBy))
                    .col(timestamp_with_time_zone(Posts::CreatedAt))
                    .col(timestamp_with_time_zone(Posts::UpdatedAt))
                    .col(timestamp_with_time_zone_null(Posts::DeletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_owner")
                            .from(Posts::Table, Posts::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_owner_created_at")
                    .table(Posts::Table)
                    .col(Posts::CreatedBy)
                    .col(Posts::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Create email_templates table
        manager
            .create_table(
                Table::create()
                    .table(EmailTemplates::Table)
                    .if_not_exists()
                    .col(pk_auto(EmailTemplates::Id))
                    .col(string(EmailTemplates::Title))
                    .col(string(EmailTemplates::Subject))
                    .col(text(EmailTemplates::Template))
                    .col(text_null(EmailTemplates::HtmlTemplate))
                    .col(json(EmailTemplates::Variables))
                    .col(boolean(EmailTemplates::IsDefault).default(false))
                    .col(boolean(EmailTemplates::IsActive).default(true))
                    .col(uuid(EmailTemplates::CreatedBy))
                    .col(timestamp_with_time_zone(EmailTemplates::CreatedAt))
                    .col(timestamp_with_time_zone(EmailTemplates::UpdatedAt))
                    .col(timestamp_with_time_zone_null(EmailTemplates::DeletedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_template_owner")
                            .from(EmailTemplates::Table, EmailTemplates::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural keys are unique among live rows only
        let db = manager.get_connection();
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_models_comcard_no \
             ON models (comcard_no) WHERE deleted_at IS NULL",
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_posts_post_id \
             ON posts (post_id) WHERE deleted_at IS NULL",
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_email_templates_one_default \
             ON email_templates (created_by) WHERE is_default = TRUE AND deleted_at IS NULL",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmailTemplates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Models::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Models {
    Table,
    Id,
    ComcardNo,
    NameEng,
    NameKor,
    National,
    Stage,
    AdditionalPic,
    ComcardUrl,
    ComcardPic,
    Download,
    HtmlUrl,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    PostId,
    Data,
    PostDate,
    IsFavorite,
    IsEmailSent,
    Memo,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum EmailTemplates {
    Table,
    Id,
    Title,
    Subject,
    Template,
    HtmlTemplate,
    Variables,
    IsDefault,
    IsActive,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
