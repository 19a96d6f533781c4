//! crates/signal_hub_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the hosted gateway.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! stores to be independent of the gateway's own protocol and wire format.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    AuthEvent, Bookmark, Chapter, ChapterDraft, ChapterId, ChapterMaterials, ChapterUpdate,
    Identity, Profile, ProfileUpdate, ProgressRecord, SignUpMetadata, UserStats,
};

//=========================================================================================
// Generic Gateway Error and Result Types
//=========================================================================================

/// A generic error type for all gateway operations.
/// This abstracts away the specific errors of the hosted service's protocol.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Bad credentials, unconfirmed email, expired session. Never retried
    /// automatically; the caller surfaces it to the user.
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// Missing row. For profile reads this is the provisioning trigger,
    /// not a failure.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Malformed mutation payload, surfaced verbatim from the gateway.
    #[error("Invalid request: {0}")]
    Validation(String),
    /// Transport failure. No automatic retry or backoff.
    #[error("Network failure: {0}")]
    Network(String),
    /// Blob upload/delete/signing failure, with the attempted path for
    /// diagnostics.
    #[error("Storage failure at '{path}': {message}")]
    Storage { path: String, message: String },
    /// A catch-all for anything the gateway reports that fits no bucket.
    #[error("Unexpected gateway error: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The auth-change notification stream delivered by `AuthGateway::subscribe`.
pub type AuthEventStream = Pin<Box<dyn Stream<Item = AuthEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Creates a remote identity. Success does not imply the email has been
    /// confirmed yet, and it does not create the profile row.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> GatewayResult<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity>;

    /// Invalidates the remote session. Idempotent.
    async fn sign_out(&self) -> GatewayResult<()>;

    async fn reset_password(&self, email: &str) -> GatewayResult<()>;

    /// Updates the current credential; only meaningful during password
    /// recovery.
    async fn update_password(&self, new_password: &str) -> GatewayResult<()>;

    /// Subscribes to auth-change notifications pushed by the gateway.
    async fn subscribe(&self) -> GatewayResult<AuthEventStream>;
}

#[async_trait]
pub trait DataGateway: Send + Sync {
    // --- Profiles ---
    async fn get_profile(&self, user_id: Uuid) -> GatewayResult<Profile>;

    async fn create_profile(&self, profile: &Profile) -> GatewayResult<Profile>;

    async fn update_profile(
        &self,
        user_id: Uuid,
        updates: &ProfileUpdate,
    ) -> GatewayResult<Profile>;

    // --- Chapters ---
    /// Lists all chapters ordered by their sequence field.
    async fn list_chapters(&self) -> GatewayResult<Vec<Chapter>>;

    async fn get_chapter(&self, id: ChapterId) -> GatewayResult<Chapter>;

    async fn create_chapter(&self, draft: &ChapterDraft) -> GatewayResult<Chapter>;

    async fn update_chapter(
        &self,
        id: ChapterId,
        updates: &ChapterUpdate,
    ) -> GatewayResult<Chapter>;

    /// Writes all three material columns at once (absent = cleared).
    async fn update_chapter_materials(
        &self,
        id: ChapterId,
        materials: &ChapterMaterials,
    ) -> GatewayResult<Chapter>;

    async fn delete_chapter(&self, id: ChapterId) -> GatewayResult<()>;

    /// Keyword search over chapters, ranked by the gateway.
    async fn search_chapters(&self, term: &str) -> GatewayResult<Vec<Chapter>>;

    // --- Progress ---
    /// Lists the user's progress records joined with chapter data.
    async fn list_progress(&self, user_id: Uuid) -> GatewayResult<Vec<ProgressRecord>>;

    /// Upserts the (user, chapter) progress row.
    async fn upsert_progress(&self, record: &ProgressRecord) -> GatewayResult<ProgressRecord>;

    // --- Bookmarks ---
    /// Lists the user's bookmarks joined with chapter data.
    async fn list_bookmarks(&self, user_id: Uuid) -> GatewayResult<Vec<Bookmark>>;

    async fn bookmark_exists(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<bool>;

    async fn insert_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()>;

    async fn delete_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()>;

    // --- Admin analytics ---
    /// Fetches every profile and progress row for the back-office screens.
    async fn user_stats(&self) -> GatewayResult<UserStats>;
}

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Uploads a blob, overwriting any existing object at the path.
    /// Returns the stored path.
    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> GatewayResult<String>;

    async fn delete(&self, bucket: &str, path: &str) -> GatewayResult<()>;

    /// Time-limited signed URL for in-browser viewing.
    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> GatewayResult<String>;

    /// Time-limited signed URL that forces a download.
    async fn signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> GatewayResult<String>;

    async fn list(&self, bucket: &str, prefix: &str) -> GatewayResult<Vec<String>>;
}
