use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Videos::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Videos::OwnerId).integer().not_null())
                    .col(ColumnDef::new(Videos::Sport).string().not_null())
                    .col(ColumnDef::new(Videos::ContentHash).string().not_null())
                    .col(ColumnDef::new(Videos::Revision).integer().not_null())
                    .col(ColumnDef::new(Videos::StorageKey).string().not_null())
                    .col(ColumnDef::new(Videos::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(Videos::ContentType).string().not_null())
                    .col(ColumnDef::new(Videos::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Videos::FailureReason).string().null())
                    .col(ColumnDef::new(Videos::Version).integer().not_null())
                    .col(
                        ColumnDef::new(Videos::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Videos::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-video-owner_id")
                            .from(Videos::Table, Videos::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        // Same bytes can only appear once per revision
        manager
            .create_index(
                Index::create()
                    .name("idx-videos-content_hash-revision")
                    .table(Videos::Table)
                    .col(Videos::ContentHash)
                    .col(Videos::Revision)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Videos {
    Table,
    Id,
    OwnerId,
    Sport,
    ContentHash,
    Revision,
    StorageKey,
    SizeBytes,
    ContentType,
    Status,
    FailureReason,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
