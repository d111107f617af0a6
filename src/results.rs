use crate::entities::{score_result, ScoreResult};
use crate::error::{AppError, Result};
use crate::scoring::Scorecard;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Persist a scorecard for a job. Keyed by job id with ON CONFLICT DO NOTHING,
/// so a retried or raced write is a no-op; the returned flag tells the caller
/// whether this call actually inserted the row (side effects such as
/// notifications must only fire when it did).
pub async fn upsert_result(
    db: &DatabaseConnection,
    job_id: Uuid,
    video_id: Uuid,
    card: &Scorecard,
) -> Result<bool> {
    let model = score_result::ActiveModel {
        job_id: Set(job_id),
        video_id: Set(video_id),
        overall: Set(card.overall),
        technical: Set(card.technical),
        physical: Set(card.physical),
        tactical: Set(card.tactical),
        mental: Set(card.mental),
        low_confidence: Set(card.low_confidence),
        feedback: Set(card.feedback.clone()),
        recommendations: Set(serde_json::to_value(&card.recommendations)
            .map_err(|e| AppError::Internal(e.to_string()))?),
        model_version: Set(card.model_version.clone()),
        created_at: Set(Utc::now().into()),
    };

    let inserted = ScoreResult::insert(model)
        .on_conflict(
            OnConflict::column(score_result::Column::JobId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(inserted > 0)
}

/// Latest result for a video, across revisions of the same job chain.
pub async fn find_by_video(
    db: &DatabaseConnection,
    video_id: Uuid,
) -> Result<Option<score_result::Model>> {
    let result = ScoreResult::find()
        .filter(score_result::Column::VideoId.eq(video_id))
        .order_by_desc(score_result::Column::CreatedAt)
        .one(db)
        .await?;
    Ok(result)
}

pub async fn get_result(db: &DatabaseConnection, video_id: Uuid) -> Result<score_result::Model> {
    find_by_video(db, video_id)
        .await?
        .ok_or_else(|| AppError::NotFound("score result".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::MODEL_VERSION;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn card() -> Scorecard {
        Scorecard {
            overall: 74.2,
            technical: 70.1,
            physical: 81.0,
            tactical: 69.9,
            mental: 75.5,
            low_confidence: false,
            feedback: "Solid basketball performance.".to_string(),
            recommendations: vec!["Work on tactical awareness and positioning".to_string()],
            model_version: MODEL_VERSION.to_string(),
        }
    }

    #[tokio::test]
    async fn second_upsert_with_same_job_id_is_a_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let job_id = Uuid::new_v4();
        let video_id = Uuid::new_v4();

        let first = upsert_result(&db, job_id, video_id, &card()).await.unwrap();
        let second = upsert_result(&db, job_id, video_id, &card()).await.unwrap();

        assert!(first, "first write inserts");
        assert!(!second, "second write is swallowed by the conflict clause");
    }

    #[tokio::test]
    async fn missing_result_maps_to_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<score_result::Model>::new()])
            .into_connection();

        let err = get_result(&db, Uuid::new_v4()).await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }
}
