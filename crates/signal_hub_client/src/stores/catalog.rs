//! crates/signal_hub_client/src/stores/catalog.rs
//!
//! The chapter-catalog cache: owns the in-memory chapter list for the
//! current session, shaped for UI consumption. Every mutation re-derives
//! the list from a fresh full load instead of patching local state, so the
//! cache always reflects server-assigned fields.

use std::sync::{Arc, RwLock};

use tracing::{error, info};

use signal_hub_core::domain::{Chapter, ChapterDraft, ChapterId, ChapterUpdate};
use signal_hub_core::ports::DataGateway;

use crate::error::ClientResult;

struct CatalogInner {
    chapters: Vec<Chapter>,
    loading: bool,
    last_error: Option<String>,
}

pub struct CatalogStore {
    data: Arc<dyn DataGateway>,
    inner: RwLock<CatalogInner>,
}

impl CatalogStore {
    pub fn new(data: Arc<dyn DataGateway>) -> Self {
        Self {
            data,
            inner: RwLock::new(CatalogInner {
                chapters: Vec::new(),
                loading: false,
                last_error: None,
            }),
        }
    }

    /// Fetches all chapters ordered by their sequence field and replaces
    /// the in-memory list atomically. On failure the previous list is kept
    /// and the error message is retained for the UI.
    pub async fn load(&self) -> ClientResult<()> {
        self.write().loading = true;
        let result = self.data.list_chapters().await;
        let mut inner = self.write();
        inner.loading = false;
        match result {
            Ok(chapters) => {
                info!(count = chapters.len(), "Catalog loaded");
                inner.chapters = chapters;
                inner.last_error = None;
                Ok(())
            }
            Err(err) => {
                error!("Catalog load failed: {err}");
                inner.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Creates a chapter, then re-loads the full list so server-assigned
    /// fields (id, timestamps) are reflected. Returns the created chapter.
    pub async fn add(&self, draft: ChapterDraft) -> ClientResult<Chapter> {
        let created = self.guarded(self.data.create_chapter(&draft).await)?;
        self.load().await?;
        Ok(created)
    }

    /// Applies a sparse update (absent fields are untouched server-side),
    /// then re-loads the full list.
    pub async fn update(&self, id: ChapterId, updates: ChapterUpdate) -> ClientResult<Chapter> {
        let updated = self.guarded(self.data.update_chapter(id, &updates).await)?;
        self.load().await?;
        Ok(updated)
    }

    /// Deletes by id, then re-loads the full list.
    pub async fn remove(&self, id: ChapterId) -> ClientResult<()> {
        self.guarded(self.data.delete_chapter(id).await)?;
        self.load().await
    }

    //-------------------------------------------------------------------------------------
    // Read-only queries
    //-------------------------------------------------------------------------------------

    pub fn chapters(&self) -> Vec<Chapter> {
        self.read().chapters.clone()
    }

    pub fn get(&self, id: ChapterId) -> Option<Chapter> {
        self.read()
            .chapters
            .iter()
            .find(|chapter| chapter.id == id)
            .cloned()
    }

    pub fn loading(&self) -> bool {
        self.read().loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    //-------------------------------------------------------------------------------------
    // Internals
    //-------------------------------------------------------------------------------------

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CatalogInner> {
        self.inner.read().expect("catalog lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CatalogInner> {
        self.inner.write().expect("catalog lock poisoned")
    }

    /// Records the gateway's error message before handing it back.
    fn guarded<T>(
        &self,
        result: Result<T, signal_hub_core::ports::GatewayError>,
    ) -> ClientResult<T> {
        result.map_err(|err| {
            error!("Catalog mutation failed: {err}");
            self.write().last_error = Some(err.to_string());
            err.into()
        })
    }
}
