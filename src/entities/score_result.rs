use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Composite GAR score for one successful job. Keyed by job id and written
/// with ON CONFLICT DO NOTHING, so a retried write can never produce a second
/// row or a second notification.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "score_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_deserializing)]
    pub job_id: Uuid,
    pub video_id: Uuid,
    pub overall: f64,
    pub technical: f64,
    pub physical: f64,
    pub tactical: f64,
    pub mental: f64,
    pub low_confidence: bool,
    #[sea_orm(column_type = "Text")]
    pub feedback: String,
    // Ordered list of strings
    #[sea_orm(column_type = "JsonBinary")]
    pub recommendations: serde_json::Value,
    pub model_version: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::analysis_job::Entity",
        from = "Column::JobId",
        to = "super::analysis_job::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    AnalysisJob,
}

impl Related<super::analysis_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
