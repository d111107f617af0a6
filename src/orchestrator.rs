use crate::config::{AnalysisConfig, QueueConfig};
use crate::entities::analysis_job::JobState;
use crate::entities::video::VideoStatus;
use crate::entities::{analysis_job, user, video, AnalysisJob, Video};
use crate::error::{AppError, Result};
use crate::notifications::Notifier;
use crate::results;
use crate::scoring::ScoreEngine;
use crate::storage::ObjectStore;
use chrono::Utc;
use redis::AsyncCommands;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Everything a worker needs, injected once at startup.
#[derive(Clone)]
pub struct WorkerContext {
    pub db: Arc<DatabaseConnection>,
    pub redis_client: Arc<redis::Client>,
    pub store: Arc<dyn ObjectStore>,
    pub engine: Arc<ScoreEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub analysis: AnalysisConfig,
    pub queue: QueueConfig,
}

/// Wire format for the redis analysis queue.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: Uuid,
    pub video_id: Uuid,
}

/// Move a video to `queued` and create its job row. Idempotent: a video that
/// is already queued, analyzing, or terminal is left alone and `None` comes
/// back. Two concurrent calls race on the version column and the partial
/// unique job index; exactly one wins.
pub async fn enqueue(
    db: &DatabaseConnection,
    redis_client: &redis::Client,
    queue: &QueueConfig,
    video_id: Uuid,
) -> Result<Option<Uuid>> {
    let Some(job_id) = claim_for_queue(db, video_id).await? else {
        return Ok(None);
    };

    let mut conn = redis_client.get_multiplexed_async_connection().await?;
    let payload = serde_json::to_string(&JobMessage { job_id, video_id })
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let _: () = conn.rpush(&queue.analysis_queue, payload).await?;

    metrics::counter!("gar_videos_enqueued_total").increment(1);
    tracing::info!(video_id = %video_id, job_id = %job_id, "enqueued video for analysis");
    Ok(Some(job_id))
}

/// Database half of `enqueue`, separated so the state machine is testable
/// without a queue.
pub(crate) async fn claim_for_queue(
    db: &DatabaseConnection,
    video_id: Uuid,
) -> Result<Option<Uuid>> {
    let video = Video::find_by_id(video_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("video".to_string()))?;

    if video.status != VideoStatus::Uploaded {
        return Ok(None);
    }

    if !transition_video(
        db,
        video_id,
        VideoStatus::Uploaded,
        video.version,
        VideoStatus::Queued,
        None,
    )
    .await?
    {
        // Lost the race to another enqueue
        return Ok(None);
    }

    let now = Utc::now();
    let job = analysis_job::ActiveModel {
        id: Set(Uuid::new_v4()),
        video_id: Set(video_id),
        state: Set(JobState::Pending),
        attempts: Set(0),
        started_at: Set(None),
        finished_at: Set(None),
        failure_reason: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    match job.insert(db).await {
        Ok(job) => Ok(Some(job.id)),
        // The partial unique index rejects a second active job for the video
        Err(e) if e.to_string().contains("duplicate key value") => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Cancel a video that has not started analyzing. Queued videos move straight
/// to `failed` with reason "cancelled"; anything already analyzing finishes or
/// times out on its own (no hard kill, no partial writes).
pub async fn cancel(db: &DatabaseConnection, video_id: Uuid) -> Result<bool> {
    let video = Video::find_by_id(video_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("video".to_string()))?;

    if video.status != VideoStatus::Queued {
        return Ok(false);
    }

    let cancelled = transition_video(
        db,
        video_id,
        VideoStatus::Queued,
        video.version,
        VideoStatus::Failed,
        Some("cancelled"),
    )
    .await?;

    if cancelled {
        AnalysisJob::update_many()
            .col_expr(
                analysis_job::Column::State,
                Expr::value(JobState::Failed),
            )
            .col_expr(
                analysis_job::Column::FailureReason,
                Expr::value("cancelled"),
            )
            .col_expr(
                analysis_job::Column::FinishedAt,
                Expr::value(Utc::now()),
            )
            .col_expr(
                analysis_job::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(analysis_job::Column::VideoId.eq(video_id))
            .filter(analysis_job::Column::State.eq(JobState::Pending))
            .exec(db)
            .await?;
        metrics::counter!("gar_videos_cancelled_total").increment(1);
    }
    Ok(cancelled)
}

/// Conditional status update guarded by the version column. Returns false when
/// another writer got there first (rows_affected == 0), which callers treat as
/// "someone else owns this transition now".
async fn transition_video(
    db: &DatabaseConnection,
    video_id: Uuid,
    from: VideoStatus,
    from_version: i32,
    to: VideoStatus,
    reason: Option<&str>,
) -> Result<bool> {
    let mut update = Video::update_many()
        .col_expr(video::Column::Status, Expr::value(to))
        .col_expr(video::Column::Version, Expr::value(from_version + 1))
        .col_expr(video::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(video::Column::Id.eq(video_id))
        .filter(video::Column::Status.eq(from))
        .filter(video::Column::Version.eq(from_version));

    if let Some(reason) = reason {
        update = update.col_expr(video::Column::FailureReason, Expr::value(reason));
    }

    let res = update.exec(db).await?;
    Ok(res.rows_affected == 1)
}

/// Delay before re-running a job whose nth attempt just failed.
fn backoff_delay(base_secs: u64, attempt: i32) -> Duration {
    let exp = (attempt - 1).clamp(0, 10) as u32;
    Duration::from_secs((base_secs << exp).min(60))
}

// Queue depth gauge, sampled every 15s
pub async fn start_queue_monitor(redis_client: Arc<redis::Client>, queue: QueueConfig) {
    tokio::spawn(async move {
        tracing::info!("queue monitor started");
        loop {
            match redis_client.get_multiplexed_async_connection().await {
                Ok(mut conn) => {
                    let len: redis::RedisResult<u64> = conn.llen(&queue.analysis_queue).await;
                    match len {
                        Ok(len) => metrics::gauge!("gar_queue_depth", "queue" => queue.analysis_queue.clone())
                            .set(len as f64),
                        Err(e) => tracing::error!("queue monitor: llen failed: {}", e),
                    }
                }
                Err(e) => tracing::error!("queue monitor: redis conn failed: {}", e),
            }
            tokio::time::sleep(Duration::from_secs(15)).await;
        }
    });
}

pub async fn start_workers(ctx: WorkerContext) {
    start_queue_monitor(ctx.redis_client.clone(), ctx.queue.clone()).await;

    for i in 0..ctx.analysis.worker_concurrency {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tracing::info!("worker {} started", i);
            loop {
                let mut conn = match ctx.redis_client.get_multiplexed_async_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("worker {}: redis conn failed: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let result: redis::RedisResult<(String, String)> =
                    conn.blpop(&ctx.queue.analysis_queue, 0.0).await;

                match result {
                    Ok((_key, payload)) => {
                        let msg: JobMessage = match serde_json::from_str(&payload) {
                            Ok(m) => m,
                            Err(e) => {
                                tracing::error!("worker {}: bad payload: {}", i, e);
                                continue;
                            }
                        };
                        process_job(&ctx, msg).await;
                    }
                    Err(e) => {
                        tracing::error!("worker {}: redis error: {}", i, e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }
}

async fn process_job(ctx: &WorkerContext, msg: JobMessage) {
    let span = tracing::info_span!(
        "process_analysis_job",
        "otel.name" = "process_analysis_job",
        video_id = %msg.video_id,
        job_id = %msg.job_id,
    );

    async move {
        let start_time = std::time::Instant::now();
        match run_job(ctx, &msg).await {
            Ok(JobOutcome::Scored) => {
                metrics::counter!("gar_videos_scored_total").increment(1);
                metrics::histogram!("gar_analysis_duration_seconds", "outcome" => "scored")
                    .record(start_time.elapsed().as_secs_f64());
            }
            Ok(JobOutcome::Skipped) => {
                tracing::info!("job no longer claimable, skipping");
            }
            Ok(JobOutcome::Requeued) => {
                metrics::counter!("gar_analysis_retries_total").increment(1);
            }
            Ok(JobOutcome::Failed) => {
                metrics::counter!("gar_videos_failed_total").increment(1);
                metrics::histogram!("gar_analysis_duration_seconds", "outcome" => "failed")
                    .record(start_time.elapsed().as_secs_f64());
            }
            Err(e) => {
                // Infrastructure refused even the bookkeeping writes; the job
                // message is gone, but the video row still shows its last
                // consistent state.
                tracing::error!("job processing aborted: {}", e);
                metrics::counter!("gar_analysis_errors_total", "stage" => "bookkeeping")
                    .increment(1);
            }
        }
    }
    .instrument(span)
    .await
}

enum JobOutcome {
    Scored,
    Skipped,
    Requeued,
    Failed,
}

async fn run_job(ctx: &WorkerContext, msg: &JobMessage) -> Result<JobOutcome> {
    let db = ctx.db.as_ref();

    let Some(video) = Video::find_by_id(msg.video_id).one(db).await? else {
        tracing::error!("video {} not found", msg.video_id);
        return Ok(JobOutcome::Skipped);
    };
    let Some(job) = AnalysisJob::find_by_id(msg.job_id).one(db).await? else {
        tracing::error!("job {} not found", msg.job_id);
        return Ok(JobOutcome::Skipped);
    };

    // Cancelled while queued, or a stale message for a finished job
    if job.state.is_terminal() || video.status != VideoStatus::Queued {
        return Ok(JobOutcome::Skipped);
    }

    if !transition_video(
        db,
        video.id,
        VideoStatus::Queued,
        video.version,
        VideoStatus::Analyzing,
        None,
    )
    .await?
    {
        return Ok(JobOutcome::Skipped);
    }

    let attempts = job.attempts + 1;
    let mut running: analysis_job::ActiveModel = job.clone().into();
    running.state = Set(JobState::Running);
    running.attempts = Set(attempts);
    running.started_at = Set(Some(Utc::now().into()));
    running.updated_at = Set(Utc::now().into());
    let job = running.update(db).await?;

    tracing::info!(attempt = attempts, "analyzing video");

    let outcome = analyze(ctx, &video).await;

    match outcome {
        Ok(card) => {
            let inserted = results::upsert_result(db, job.id, video.id, &card).await?;

            finish_job(db, &job, JobState::Succeeded, None).await?;
            let current = Video::find_by_id(video.id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::NotFound("video".to_string()))?;
            transition_video(
                db,
                video.id,
                VideoStatus::Analyzing,
                current.version,
                VideoStatus::Scored,
                None,
            )
            .await?;

            // Only the write that actually landed the row notifies; a retried
            // job can never send twice.
            if inserted {
                notify_scored(ctx, &video, &card).await;
            }
            Ok(JobOutcome::Scored)
        }
        Err(err) if err.is_retryable() && attempts < ctx.analysis.max_attempts => {
            tracing::warn!(attempt = attempts, "analysis failed, will retry: {}", err);

            let mut back: analysis_job::ActiveModel = job.into();
            back.state = Set(JobState::Pending);
            back.failure_reason = Set(Some(err.to_string()));
            back.updated_at = Set(Utc::now().into());
            back.update(db).await?;

            let current = Video::find_by_id(video.id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::NotFound("video".to_string()))?;
            transition_video(
                db,
                video.id,
                VideoStatus::Analyzing,
                current.version,
                VideoStatus::Queued,
                None,
            )
            .await?;

            requeue_after(ctx, msg, backoff_delay(ctx.analysis.backoff_base_secs, attempts));
            Ok(JobOutcome::Requeued)
        }
        Err(err) => {
            let terminal_state = if err.is_retryable() {
                // Retries exhausted
                JobState::Abandoned
            } else {
                JobState::Failed
            };
            tracing::error!(attempt = attempts, "analysis failed terminally: {}", err);

            let reason = err.to_string();
            finish_job(db, &job, terminal_state, Some(&reason)).await?;
            let current = Video::find_by_id(video.id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::NotFound("video".to_string()))?;
            transition_video(
                db,
                video.id,
                VideoStatus::Analyzing,
                current.version,
                VideoStatus::Failed,
                Some(&reason),
            )
            .await?;

            notify_failed(ctx, &video, &reason).await;
            Ok(JobOutcome::Failed)
        }
    }
}

/// Fetch the bytes and run the engine under the per-job timeout. A stuck
/// scoring call is abandoned at the deadline and retried like any other
/// transient failure.
async fn analyze(ctx: &WorkerContext, video: &video::Model) -> Result<crate::scoring::Scorecard> {
    let bytes = ctx.store.get(&video.storage_key).await?;

    let engine = ctx.engine.clone();
    let sport = video.sport.clone();
    let scoring = tokio::task::spawn_blocking(move || engine.score(&bytes, &sport));

    match tokio::time::timeout(
        Duration::from_secs(ctx.analysis.job_timeout_secs),
        scoring,
    )
    .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(AppError::Model(format!("scoring task died: {}", join_err))),
        Err(_) => Err(AppError::Model(format!(
            "scoring timed out after {}s",
            ctx.analysis.job_timeout_secs
        ))),
    }
}

async fn finish_job(
    db: &DatabaseConnection,
    job: &analysis_job::Model,
    state: JobState,
    reason: Option<&str>,
) -> Result<()> {
    let mut finished: analysis_job::ActiveModel = job.clone().into();
    finished.state = Set(state);
    finished.failure_reason = Set(reason.map(|r| r.to_string()));
    finished.finished_at = Set(Some(Utc::now().into()));
    finished.updated_at = Set(Utc::now().into());
    finished.update(db).await?;
    Ok(())
}

fn requeue_after(ctx: &WorkerContext, msg: &JobMessage, delay: Duration) {
    let redis_client = ctx.redis_client.clone();
    let queue = ctx.queue.analysis_queue.clone();
    let payload = serde_json::to_string(&JobMessage {
        job_id: msg.job_id,
        video_id: msg.video_id,
    })
    .expect("job message serializes");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match redis_client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let pushed: redis::RedisResult<()> = conn.rpush(&queue, payload).await;
                if let Err(e) = pushed {
                    tracing::error!("requeue push failed: {}", e);
                }
            }
            Err(e) => tracing::error!("requeue conn failed: {}", e),
        }
    });
}

async fn notify_scored(ctx: &WorkerContext, video: &video::Model, card: &crate::scoring::Scorecard) {
    match user::Entity::find_by_id(video.owner_id).one(ctx.db.as_ref()).await {
        Ok(Some(owner)) => ctx.notifier.video_scored(&owner, video, card).await,
        Ok(None) => tracing::warn!("owner {} missing, skipping notification", video.owner_id),
        Err(e) => tracing::error!("owner lookup failed: {}", e),
    }
}

async fn notify_failed(ctx: &WorkerContext, video: &video::Model, reason: &str) {
    match user::Entity::find_by_id(video.owner_id).one(ctx.db.as_ref()).await {
        Ok(Some(owner)) => ctx.notifier.video_failed(&owner, video, reason).await,
        Ok(None) => tracing::warn!("owner {} missing, skipping notification", video.owner_id),
        Err(e) => tracing::error!("owner lookup failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, QueueConfig};
    use crate::notifications::NoopNotifier;
    use crate::storage::memory::MemoryStore;
    use bytes::Bytes;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    fn uploaded_video(id: Uuid, version: i32) -> video::Model {
        video::Model {
            id,
            owner_id: 1,
            sport: "basketball".to_string(),
            content_hash: "abc123".to_string(),
            revision: 0,
            storage_key: "videos/abc123".to_string(),
            size_bytes: 5 * 1024 * 1024,
            content_type: "video/mp4".to_string(),
            status: VideoStatus::Uploaded,
            failure_reason: None,
            version,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn pending_job(id: Uuid, video_id: Uuid) -> analysis_job::Model {
        analysis_job::Model {
            id,
            video_id,
            state: JobState::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            failure_reason: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt_and_caps() {
        assert_eq!(backoff_delay(2, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(2, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(2, 12), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn enqueue_creates_one_job_for_a_fresh_upload() {
        let video_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![uploaded_video(video_id, 0)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![pending_job(job_id, video_id)]])
            .into_connection();

        let claimed = claim_for_queue(&db, video_id).await.unwrap();
        assert_eq!(claimed, Some(job_id));
    }

    #[tokio::test]
    async fn enqueue_is_a_noop_for_non_uploaded_videos() {
        let video_id = Uuid::new_v4();
        let mut queued = uploaded_video(video_id, 3);
        queued.status = VideoStatus::Queued;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .into_connection();

        let claimed = claim_for_queue(&db, video_id).await.unwrap();
        assert_eq!(claimed, None);
    }

    #[tokio::test]
    async fn losing_the_version_race_enqueues_nothing() {
        let video_id = Uuid::new_v4();
        // Status still reads `uploaded`, but the conditional update misses
        // because another enqueue bumped the version first.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![uploaded_video(video_id, 0)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let claimed = claim_for_queue(&db, video_id).await.unwrap();
        assert_eq!(claimed, None);
    }

    #[tokio::test]
    async fn missing_video_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<video::Model>::new()])
            .into_connection();

        let err = claim_for_queue(&db, Uuid::new_v4()).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn cancel_only_touches_queued_videos() {
        let video_id = Uuid::new_v4();
        let mut analyzing = uploaded_video(video_id, 2);
        analyzing.status = VideoStatus::Analyzing;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![analyzing]])
            .into_connection();

        let cancelled = cancel(&db, video_id).await.unwrap();
        assert!(!cancelled, "an analyzing video finishes or times out");
    }

    fn owner() -> user::Model {
        user::Model {
            id: 1,
            email: "dana@example.com".to_string(),
            password_hash: "argon2-hash".to_string(),
            name: "Dana".to_string(),
            phone: None,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    fn worker_ctx(db: DatabaseConnection, store: MemoryStore) -> WorkerContext {
        WorkerContext {
            db: Arc::new(db),
            // Never connected to; job bookkeeping happens before any push
            redis_client: Arc::new(redis::Client::open("redis://127.0.0.1:1").unwrap()),
            store: Arc::new(store),
            engine: Arc::new(ScoreEngine::new()),
            notifier: Arc::new(NoopNotifier),
            analysis: AnalysisConfig {
                worker_concurrency: 1,
                max_attempts: 3,
                job_timeout_secs: 5,
                backoff_base_secs: 0,
            },
            queue: QueueConfig {
                redis_url: "redis://127.0.0.1:1".to_string(),
                analysis_queue: "analysis_queue".to_string(),
            },
        }
    }

    fn analyzable_mp4() -> Bytes {
        let mut bytes = vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm',
        ];
        bytes.extend((0..crate::scoring::features::FRAME_SIZE * 12).map(|i| (i * 13 % 255) as u8));
        Bytes::from(bytes)
    }

    #[tokio::test]
    async fn happy_path_scores_the_video() {
        let video_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        let mut queued = uploaded_video(video_id, 1);
        queued.status = VideoStatus::Queued;
        let mut running = pending_job(job_id, video_id);
        running.state = JobState::Running;
        running.attempts = 1;
        let mut succeeded = running.clone();
        succeeded.state = JobState::Succeeded;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_query_results([vec![pending_job(job_id, video_id)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![running.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![succeeded]])
            .append_query_results([vec![{
                let mut v = uploaded_video(video_id, 2);
                v.status = VideoStatus::Analyzing;
                v
            }]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![owner()]])
            .into_connection();

        let store = MemoryStore::new();
        store
            .put("videos/abc123", analyzable_mp4(), "video/mp4")
            .await
            .unwrap();
        let ctx = worker_ctx(db, store);

        let outcome = run_job(&ctx, &JobMessage { job_id, video_id }).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Scored));
    }

    #[tokio::test]
    async fn transient_storage_failure_requeues_with_attempts_left() {
        let video_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        let mut queued = uploaded_video(video_id, 1);
        queued.status = VideoStatus::Queued;
        let mut running = pending_job(job_id, video_id);
        running.state = JobState::Running;
        running.attempts = 1;
        let mut back_to_pending = running.clone();
        back_to_pending.state = JobState::Pending;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_query_results([vec![pending_job(job_id, video_id)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![running]])
            .append_query_results([vec![back_to_pending]])
            .append_query_results([vec![{
                let mut v = uploaded_video(video_id, 2);
                v.status = VideoStatus::Analyzing;
                v
            }]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let ctx = worker_ctx(db, MemoryStore::failing());

        let outcome = run_job(&ctx, &JobMessage { job_id, video_id }).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Requeued));
    }

    #[tokio::test]
    async fn exhausted_retries_abandon_the_job_and_fail_the_video() {
        let video_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();

        let mut queued = uploaded_video(video_id, 5);
        queued.status = VideoStatus::Queued;
        // Two failed attempts behind it; this run is the third and last
        let mut job = pending_job(job_id, video_id);
        job.attempts = 2;
        let mut running = job.clone();
        running.state = JobState::Running;
        running.attempts = 3;
        let mut abandoned = running.clone();
        abandoned.state = JobState::Abandoned;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_query_results([vec![job]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![running]])
            .append_query_results([vec![abandoned]])
            .append_query_results([vec![{
                let mut v = uploaded_video(video_id, 6);
                v.status = VideoStatus::Analyzing;
                v
            }]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![owner()]])
            .into_connection();

        let ctx = worker_ctx(db, MemoryStore::failing());

        let outcome = run_job(&ctx, &JobMessage { job_id, video_id }).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed));
    }

    #[tokio::test]
    async fn cancel_moves_a_queued_video_to_failed() {
        let video_id = Uuid::new_v4();
        let mut queued = uploaded_video(video_id, 1);
        queued.status = VideoStatus::Queued;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let cancelled = cancel(&db, video_id).await.unwrap();
        assert!(cancelled);
    }
}
