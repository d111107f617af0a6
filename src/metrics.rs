use crate::entities::analysis_job::JobState;
use crate::entities::video::VideoStatus;
use crate::entities::{analysis_job, user, video};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// Seed the totals gauges from the database at startup; handlers and workers
/// keep them moving from there.
pub async fn init_metrics(db: &DatabaseConnection) {
    let user_count = user::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("gar_users_total").set(user_count as f64);

    let video_count = video::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("gar_videos_total").set(video_count as f64);

    for status in [
        VideoStatus::Uploaded,
        VideoStatus::Queued,
        VideoStatus::Analyzing,
        VideoStatus::Scored,
        VideoStatus::Failed,
    ] {
        let label = format!("{:?}", status).to_lowercase();
        let count = video::Entity::find()
            .filter(video::Column::Status.eq(status))
            .count(db)
            .await
            .unwrap_or(0);
        metrics::gauge!("gar_videos_by_status", "status" => label).set(count as f64);
    }

    let active_jobs = analysis_job::Entity::find()
        .filter(analysis_job::Column::State.is_in([JobState::Pending, JobState::Running]))
        .count(db)
        .await
        .unwrap_or(0);
    metrics::gauge!("gar_active_jobs").set(active_jobs as f64);

    tracing::info!(
        "Initialized metrics: Users={}, Videos={}, ActiveJobs={}",
        user_count,
        video_count,
        active_jobs
    );
}

pub fn increment_notifications_sent(channel: &str) {
    metrics::counter!("gar_notifications_sent_total", "channel" => channel.to_string())
        .increment(1);
}

pub fn increment_notifications_failed(channel: &str) {
    metrics::counter!("gar_notifications_failed_total", "channel" => channel.to_string())
        .increment(1);
}
