use sea_orm_migration::prelude::*;

mod m20260415_000001_create_users;
mod m20260415_000002_create_videos;
mod m20260416_000001_create_analysis_jobs;
mod m20260416_000002_create_score_results;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260415_000001_create_users::Migration),
            Box::new(m20260415_000002_create_videos::Migration),
            Box::new(m20260416_000001_create_analysis_jobs::Migration),
            Box::new(m20260416_000002_create_score_results::Migration),
        ]
    }
}
