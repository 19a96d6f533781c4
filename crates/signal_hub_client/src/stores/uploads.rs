//! crates/signal_hub_client/src/stores/uploads.rs
//!
//! Material upload/download orchestration for the admin back office. Each
//! (chapter, material-kind) pair carries a pending guard so duplicate
//! concurrent operations on the same key are rejected instead of racing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};

use signal_hub_core::domain::{Chapter, ChapterId, MaterialKind};
use signal_hub_core::ports::{DataGateway, StorageGateway};

use crate::error::{ClientError, ClientResult};

pub struct UploadStore {
    data: Arc<dyn DataGateway>,
    storage: Arc<dyn StorageGateway>,
    bucket: String,
    max_upload_bytes: usize,
    signed_url_ttl: Duration,
    pending: Mutex<HashSet<(ChapterId, MaterialKind)>>,
}

/// Removes its key from the pending set when the operation settles.
struct UploadGuard<'a> {
    pending: &'a Mutex<HashSet<(ChapterId, MaterialKind)>>,
    key: (ChapterId, MaterialKind),
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .expect("upload pending lock poisoned")
            .remove(&self.key);
    }
}

impl UploadStore {
    pub fn new(
        data: Arc<dyn DataGateway>,
        storage: Arc<dyn StorageGateway>,
        bucket: impl Into<String>,
        max_upload_bytes: usize,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            data,
            storage,
            bucket: bucket.into(),
            max_upload_bytes,
            signed_url_ttl,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Validates and uploads a material blob, then writes the chapter's
    /// material column. Returns the stored path. Re-uploading a kind that
    /// already has a file overwrites it.
    pub async fn upload_material(
        &self,
        chapter: &Chapter,
        kind: MaterialKind,
        file_name: &str,
        data: Bytes,
    ) -> ClientResult<String> {
        let _guard = self.acquire(chapter.id, kind)?;

        if !file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(ClientError::InvalidInput(
                "only PDF files can be uploaded".to_string(),
            ));
        }
        if data.len() > self.max_upload_bytes {
            return Err(ClientError::InvalidInput(format!(
                "file exceeds the {} byte upload limit",
                self.max_upload_bytes
            )));
        }

        let path = format!(
            "chapters/{}-{}/{}-{}.pdf",
            chapter.order,
            slug(&chapter.title),
            kind.as_str(),
            Utc::now().timestamp_millis()
        );
        let stored = self.storage.upload(&self.bucket, &path, data).await?;
        info!(chapter = chapter.id, kind = kind.as_str(), path = %stored, "Material uploaded");

        let mut materials = chapter.materials.clone();
        materials.set(kind, Some(stored.clone()));
        self.data
            .update_chapter_materials(chapter.id, &materials)
            .await?;
        Ok(stored)
    }

    /// Deletes the material blob and clears the chapter's column. A chapter
    /// with no file for this kind is a no-op success.
    pub async fn delete_material(&self, chapter: &Chapter, kind: MaterialKind) -> ClientResult<()> {
        let _guard = self.acquire(chapter.id, kind)?;

        let Some(path) = chapter.materials.get(kind).map(str::to_string) else {
            return Ok(());
        };
        self.storage.delete(&self.bucket, &path).await?;
        info!(chapter = chapter.id, kind = kind.as_str(), path = %path, "Material deleted");

        let mut materials = chapter.materials.clone();
        materials.set(kind, None);
        self.data
            .update_chapter_materials(chapter.id, &materials)
            .await?;
        Ok(())
    }

    /// Time-limited signed URL for in-browser viewing; `None` when the
    /// chapter has no file of this kind.
    pub async fn material_url(
        &self,
        chapter: &Chapter,
        kind: MaterialKind,
    ) -> ClientResult<Option<String>> {
        let Some(path) = chapter.materials.get(kind) else {
            return Ok(None);
        };
        let url = self
            .storage
            .signed_url(&self.bucket, path, self.signed_url_ttl)
            .await?;
        Ok(Some(url))
    }

    /// Same as [`material_url`](Self::material_url) but forces a download.
    pub async fn material_download_url(
        &self,
        chapter: &Chapter,
        kind: MaterialKind,
    ) -> ClientResult<Option<String>> {
        let Some(path) = chapter.materials.get(kind) else {
            return Ok(None);
        };
        let url = self
            .storage
            .signed_download_url(&self.bucket, path, self.signed_url_ttl)
            .await?;
        Ok(Some(url))
    }

    /// Whether an operation is currently in flight for this key.
    pub fn is_busy(&self, chapter_id: ChapterId, kind: MaterialKind) -> bool {
        self.pending
            .lock()
            .expect("upload pending lock poisoned")
            .contains(&(chapter_id, kind))
    }

    fn acquire(&self, chapter_id: ChapterId, kind: MaterialKind) -> ClientResult<UploadGuard<'_>> {
        let mut pending = self.pending.lock().expect("upload pending lock poisoned");
        if !pending.insert((chapter_id, kind)) {
            warn!(chapter = chapter_id, kind = kind.as_str(), "Duplicate material operation rejected");
            return Err(ClientError::OperationPending {
                operation: "material",
                key: format!("{}/{}", chapter_id, kind.as_str()),
            });
        }
        Ok(UploadGuard {
            pending: &self.pending,
            key: (chapter_id, kind),
        })
    }
}

/// Lowercases and collapses anything non-alphanumeric to `-`, matching the
/// storage path scheme of existing uploads.
fn slug(title: &str) -> String {
    title
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
