use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded video. Only the orchestrator mutates this after
/// upload; a `scored` video never changes again (re-analysis inserts a new
/// revision row instead).
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    #[sea_orm(string_value = "uploaded")]
    Uploaded,
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "analyzing")]
    Analyzing,
    #[sea_orm(string_value = "scored")]
    Scored,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Scored | VideoStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    /// uuid v5 of "<content_hash>/<revision>", so identical bytes always map
    /// to the same row id.
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_deserializing)]
    pub id: Uuid,
    pub owner_id: i32,
    pub sport: String,
    pub content_hash: String,
    pub revision: i32,
    pub storage_key: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub status: VideoStatus,
    pub failure_reason: Option<String>,
    /// Bumped on every status transition; conditional updates filter on it.
    pub version: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::analysis_job::Entity")]
    AnalysisJob,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::analysis_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AnalysisJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
