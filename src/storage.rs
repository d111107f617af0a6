use crate::config::StorageConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::Client as GcsClient;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

/// Narrow put/get-by-key interface over the video object store. Handlers and
/// the worker only see this trait; tests swap in `MemoryStore`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Bytes>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

pub struct GcsStore {
    client: GcsClient,
    bucket: String,
}

impl GcsStore {
    pub fn new(client: GcsClient, config: &StorageConfig) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let upload_type = UploadType::Simple(Media {
            name: key.to_string().into(),
            content_type: content_type.to_string().into(),
            content_length: Some(data.len() as u64),
        });

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &upload_type,
            )
            .await
            .map_err(|e| AppError::Storage(format!("gcs upload failed: {}", e)))?;

        tracing::info!(key = %key, "uploaded object to gcs");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let data = self
            .client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: key.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| AppError::Storage(format!("gcs download failed: {}", e)))?;

        Ok(Bytes::from(data))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let found = self
            .client
            .get_object(&GetObjectRequest {
                bucket: self.bucket.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await
            .is_ok();
        Ok(found)
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store for tests. `failing()` simulates an outage so the
    /// ingest path's StorageUnavailable branch can be exercised.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<HashMap<String, Bytes>>,
        fail: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                objects: Mutex::new(HashMap::new()),
                fail: true,
            }
        }

        pub fn object_count(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
            if self.fail {
                return Err(AppError::Storage("simulated outage".into()));
            }
            self.objects.lock().unwrap().insert(key.to_string(), data);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Bytes> {
            if self.fail {
                return Err(AppError::Storage("simulated outage".into()));
            }
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("object {}", key)))
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            Ok(self.objects.lock().unwrap().contains_key(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .put("videos/abc", Bytes::from_static(b"clip"), "video/mp4")
            .await
            .unwrap();

        assert!(store.exists("videos/abc").await.unwrap());
        assert_eq!(store.get("videos/abc").await.unwrap(), "clip");
    }

    #[tokio::test]
    async fn repeated_put_of_same_key_keeps_a_single_object() {
        let store = MemoryStore::new();
        store
            .put("videos/abc", Bytes::from_static(b"clip"), "video/mp4")
            .await
            .unwrap();
        store
            .put("videos/abc", Bytes::from_static(b"clip"), "video/mp4")
            .await
            .unwrap();

        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn outage_surfaces_as_storage_error() {
        let store = MemoryStore::failing();
        let err = store
            .put("videos/abc", Bytes::from_static(b"clip"), "video/mp4")
            .await;
        assert!(matches!(err, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("videos/missing").await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }
}
