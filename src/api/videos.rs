use crate::config::Config;
use crate::entities::video::VideoStatus;
use crate::entities::{video, Video};
use crate::error::{AppError, Result};
use crate::orchestrator;
use crate::results;
use crate::storage::ObjectStore;
use axum::{
    body::Body,
    extract::{Extension, Multipart, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Sniffed-or-guessed content types accepted for upload.
const ALLOWED_TYPES: [&str; 4] = [
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-matroska",
];

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    10
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub video_id: Uuid,
    pub status: VideoStatus,
}

#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    #[serde(flatten)]
    pub video: video::Model,
    pub result: Option<crate::entities::score_result::Model>,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<video::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Multipart upload: `video` (bytes) and `sport` (text) fields. Identical
/// bytes map to the same video id and storage object, so re-uploading is safe
/// and free.
pub async fn upload_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(redis_client): Extension<Arc<redis::Client>>,
    Extension(store): Extension<Arc<dyn ObjectStore>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(owner_id): Extension<i32>,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut data: Option<Bytes> = None;
    let mut file_name = String::new();
    let mut sport = "general".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => {
                file_name = field.file_name().unwrap_or("video.mp4").to_string();
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "sport" => {
                sport = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.to_string()))?
                    .trim()
                    .to_ascii_lowercase();
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| AppError::Validation("no video field found".to_string()))?;

    if data.len() > config.ingest.max_upload_bytes {
        return Err(AppError::PayloadTooLarge {
            size: data.len(),
            limit: config.ingest.max_upload_bytes,
        });
    }
    let content_type = validate_content_type(&data, &file_name)?;

    let content_hash = hex::encode(Sha256::digest(&data));
    let video_id = derive_video_id(&content_hash, 0);
    let storage_key = format!("videos/{}", content_hash);

    // Same bytes, same row: hand back the existing video without touching
    // storage again.
    if let Some(existing) = Video::find_by_id(video_id).one(&db).await? {
        tracing::info!(video_id = %video_id, "duplicate upload, reusing existing video");
        return Ok((
            StatusCode::OK,
            Json(UploadResponse {
                video_id: existing.id,
                status: existing.status,
            }),
        )
            .into_response());
    }

    store.put(&storage_key, data.clone(), content_type).await?;

    let now = Utc::now();
    let new_video = video::ActiveModel {
        id: Set(video_id),
        owner_id: Set(owner_id),
        sport: Set(sport),
        content_hash: Set(content_hash),
        revision: Set(0),
        storage_key: Set(storage_key),
        size_bytes: Set(data.len() as i64),
        content_type: Set(content_type.to_string()),
        status: Set(VideoStatus::Uploaded),
        failure_reason: Set(None),
        version: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let saved = match new_video.insert(&db).await {
        Ok(v) => v,
        // Concurrent upload of the same bytes; the other writer's row wins
        Err(e) if e.to_string().contains("duplicate key value") => Video::find_by_id(video_id)
            .one(&db)
            .await?
            .ok_or_else(|| AppError::NotFound("video".to_string()))?,
        Err(e) => return Err(e.into()),
    };

    metrics::counter!("gar_videos_uploaded_total").increment(1);

    // Analysis is triggered by the upload itself; there is no separate public
    // trigger endpoint.
    let status = match orchestrator::enqueue(&db, &redis_client, &config.queue, saved.id).await {
        Ok(_) => VideoStatus::Queued,
        Err(e) => {
            tracing::error!(video_id = %saved.id, "enqueue after upload failed: {}", e);
            saved.status
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            video_id: saved.id,
            status,
        }),
    )
        .into_response())
}

/// Current state plus, once scored, the result.
pub async fn get_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(owner_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<VideoStatusResponse>> {
    let video = find_owned_video(&db, owner_id, video_id).await?;

    let result = if video.status == VideoStatus::Scored {
        results::find_by_video(&db, video.id).await?
    } else {
        None
    };

    Ok(Json(VideoStatusResponse { video, result }))
}

pub async fn list_videos(
    Extension(db): Extension<DatabaseConnection>,
    Extension(owner_id): Extension<i32>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<VideoListResponse>> {
    let paginator = Video::find()
        .filter(video::Column::OwnerId.eq(owner_id))
        .order_by_desc(video::Column::CreatedAt)
        .paginate(&db, params.per_page.max(1));

    let total_pages = paginator.num_pages().await?;
    let videos = paginator.fetch_page(params.page.saturating_sub(1)).await?;

    let total = Video::find()
        .filter(video::Column::OwnerId.eq(owner_id))
        .count(&db)
        .await?;

    Ok(Json(VideoListResponse {
        videos,
        total,
        page: params.page,
        per_page: params.per_page,
        total_pages,
    }))
}

pub async fn stream_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(store): Extension<Arc<dyn ObjectStore>>,
    Extension(owner_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Response> {
    let video = find_owned_video(&db, owner_id, video_id).await?;

    let data = store.get(&video.storage_key).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, video.content_type.clone()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
            (header::CONTENT_LENGTH, data.len().to_string()),
        ],
        Body::from(data),
    )
        .into_response())
}

/// Cancel a queued analysis. `cancelled: false` means the video was past the
/// point of no return (already analyzing or terminal).
pub async fn cancel_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(owner_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Json<CancelResponse>> {
    find_owned_video(&db, owner_id, video_id).await?;
    let cancelled = orchestrator::cancel(&db, video_id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

/// Request a fresh analysis of a finished video. Creates a new revision row
/// over the same stored bytes; the original row and its result stay frozen.
pub async fn reanalyze_video(
    Extension(db): Extension<DatabaseConnection>,
    Extension(redis_client): Extension<Arc<redis::Client>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(owner_id): Extension<i32>,
    Path(video_id): Path<Uuid>,
) -> Result<Response> {
    let video = find_owned_video(&db, owner_id, video_id).await?;

    if !video.status.is_terminal() {
        return Err(AppError::Conflict(
            "video is still being analyzed".to_string(),
        ));
    }

    let latest_revision = Video::find()
        .filter(video::Column::ContentHash.eq(video.content_hash.clone()))
        .order_by_desc(video::Column::Revision)
        .one(&db)
        .await?
        .map(|v| v.revision)
        .unwrap_or(video.revision);

    let revision = latest_revision + 1;
    let new_id = derive_video_id(&video.content_hash, revision);
    let now = Utc::now();
    let new_video = video::ActiveModel {
        id: Set(new_id),
        owner_id: Set(video.owner_id),
        sport: Set(video.sport.clone()),
        content_hash: Set(video.content_hash.clone()),
        revision: Set(revision),
        storage_key: Set(video.storage_key.clone()),
        size_bytes: Set(video.size_bytes),
        content_type: Set(video.content_type.clone()),
        status: Set(VideoStatus::Uploaded),
        failure_reason: Set(None),
        version: Set(0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let saved = match new_video.insert(&db).await {
        Ok(v) => v,
        Err(e) if e.to_string().contains("duplicate key value") => {
            return Err(AppError::Conflict(
                "re-analysis already requested".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let status = match orchestrator::enqueue(&db, &redis_client, &config.queue, saved.id).await {
        Ok(_) => VideoStatus::Queued,
        Err(e) => {
            tracing::error!(video_id = %saved.id, "enqueue after reanalyze failed: {}", e);
            saved.status
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            video_id: saved.id,
            status,
        }),
    )
        .into_response())
}

async fn find_owned_video(
    db: &DatabaseConnection,
    owner_id: i32,
    video_id: Uuid,
) -> Result<video::Model> {
    let video = Video::find_by_id(video_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("video".to_string()))?;
    if video.owner_id != owner_id {
        // Other people's videos do not exist as far as this caller knows
        return Err(AppError::NotFound("video".to_string()));
    }
    Ok(video)
}

/// Magic bytes first, extension as fallback; anything outside the allow-list
/// is refused before a row or object is created.
fn validate_content_type(data: &[u8], file_name: &str) -> Result<&'static str> {
    let sniffed = infer::get(data)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Video)
        .map(|kind| kind.mime_type());

    let candidate = match sniffed {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    };

    ALLOWED_TYPES
        .iter()
        .find(|&&allowed| allowed == candidate)
        .copied()
        .ok_or(AppError::UnsupportedMediaType(candidate))
}

/// Stable row id for (content hash, revision), so identical uploads collide by
/// construction.
fn derive_video_id(content_hash: &str, revision: i32) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}/{}", content_hash, revision).as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4_header() -> Vec<u8> {
        let mut bytes = vec![
            0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm',
        ];
        bytes.extend(std::iter::repeat(0u8).take(64));
        bytes
    }

    #[test]
    fn mp4_magic_bytes_pass_validation() {
        let mime = validate_content_type(&mp4_header(), "clip.mp4").unwrap();
        assert_eq!(mime, "video/mp4");
    }

    #[test]
    fn text_files_are_rejected() {
        let err = validate_content_type(b"hello, world", "notes.txt");
        assert!(matches!(err, Err(AppError::UnsupportedMediaType(_))));
    }

    #[test]
    fn unknown_bytes_with_video_extension_fall_back_to_guess() {
        // No recognizable magic; .webm extension carries it
        let err_or_mime = validate_content_type(&[0u8; 32], "clip.webm");
        assert_eq!(err_or_mime.unwrap(), "video/webm");
    }

    #[test]
    fn video_ids_are_content_derived() {
        let a = derive_video_id("deadbeef", 0);
        let b = derive_video_id("deadbeef", 0);
        let c = derive_video_id("deadbeef", 1);
        let d = derive_video_id("cafebabe", 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
