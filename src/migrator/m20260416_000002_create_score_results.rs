use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScoreResults::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScoreResults::JobId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScoreResults::VideoId).uuid().not_null())
                    .col(ColumnDef::new(ScoreResults::Overall).double().not_null())
                    .col(ColumnDef::new(ScoreResults::Technical).double().not_null())
                    .col(ColumnDef::new(ScoreResults::Physical).double().not_null())
                    .col(ColumnDef::new(ScoreResults::Tactical).double().not_null())
                    .col(ColumnDef::new(ScoreResults::Mental).double().not_null())
                    .col(
                        ColumnDef::new(ScoreResults::LowConfidence)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScoreResults::Feedback).text().not_null())
                    .col(
                        ColumnDef::new(ScoreResults::Recommendations)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScoreResults::ModelVersion)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScoreResults::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-score_result-job_id")
                            .from(ScoreResults::Table, ScoreResults::JobId)
                            .to(AnalysisJobs::Table, AnalysisJobs::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-score_results-video_id")
                    .table(ScoreResults::Table)
                    .col(ScoreResults::VideoId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScoreResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScoreResults {
    Table,
    JobId,
    VideoId,
    Overall,
    Technical,
    Physical,
    Tactical,
    Mental,
    LowConfidence,
    Feedback,
    Recommendations,
    ModelVersion,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AnalysisJobs {
    Table,
    Id,
}
