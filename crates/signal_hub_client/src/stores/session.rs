//! crates/signal_hub_client/src/stores/session.rs
//!
//! The session/state store: single source of truth for who is signed in and
//! what they know. It mirrors the gateway's authoritative records (profile,
//! progress, bookmarks) into memory and exposes derived read-only queries
//! plus the mutation actions that keep the two sides consistent.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use signal_hub_core::domain::{
    AuthEvent, Bookmark, BookmarkToggle, ChapterId, Identity, Profile, ProfileUpdate,
    ProgressRecord, SignUpMetadata, Tier,
};
use signal_hub_core::ports::{AuthGateway, DataGateway, GatewayError};

use crate::error::{ClientError, ClientResult};

//=========================================================================================
// Identity Lifecycle
//=========================================================================================

/// The identity lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initial state, before the first auth notification arrives.
    Unknown,
    /// An identity is known; profile/progress/bookmarks are being fetched.
    Loading,
    /// Identity, profile, and derived collections are all in memory.
    Ready,
    /// No session. All collections are cleared.
    Anonymous,
    /// A password-recovery notification arrived. The identity is retained
    /// but normal profile loading is suspended until an explicit password
    /// update forces a fresh sign-in.
    RecoveryMode,
}

struct SessionInner {
    phase: SessionPhase,
    identity: Option<Identity>,
    profile: Option<Profile>,
    progress: Vec<ProgressRecord>,
    bookmarks: Vec<Bookmark>,
    /// Bumped on every identity transition. Reload results carrying a stale
    /// epoch are discarded wholesale, never merged ("latest request wins").
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PendingOp {
    Progress,
    Bookmark,
}

impl PendingOp {
    fn name(self) -> &'static str {
        match self {
            PendingOp::Progress => "progress",
            PendingOp::Bookmark => "bookmark",
        }
    }
}

/// Removes its key from the pending set when the operation settles.
struct OpGuard<'a> {
    pending: &'a Mutex<HashSet<(ChapterId, PendingOp)>>,
    key: (ChapterId, PendingOp),
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .expect("pending-op lock poisoned")
            .remove(&self.key);
    }
}

//=========================================================================================
// SessionStore
//=========================================================================================

pub struct SessionStore {
    auth: Arc<dyn AuthGateway>,
    data: Arc<dyn DataGateway>,
    inner: RwLock<SessionInner>,
    /// Per-chapter in-flight guard, so two mutations on the same key never
    /// race each other from this client.
    pending: Mutex<HashSet<(ChapterId, PendingOp)>>,
    /// Metadata from the last sign-up, used to seed the auto-provisioned
    /// profile on the next load.
    signup_metadata: Mutex<SignUpMetadata>,
}

impl SessionStore {
    pub fn new(auth: Arc<dyn AuthGateway>, data: Arc<dyn DataGateway>) -> Self {
        Self {
            auth,
            data,
            inner: RwLock::new(SessionInner {
                phase: SessionPhase::Unknown,
                identity: None,
                profile: None,
                progress: Vec::new(),
                bookmarks: Vec::new(),
                epoch: 0,
            }),
            pending: Mutex::new(HashSet::new()),
            signup_metadata: Mutex::new(SignUpMetadata::default()),
        }
    }

    /// Spawns a task that pumps the gateway's auth notifications into the
    /// store for as long as the subscription stays open.
    pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut events = match store.auth.subscribe().await {
                Ok(stream) => stream,
                Err(err) => {
                    error!("Failed to subscribe to auth events: {err}");
                    return;
                }
            };
            while let Some(event) = events.next().await {
                store.apply_auth_event(event).await;
            }
            debug!("Auth event stream closed");
        })
    }

    //-------------------------------------------------------------------------------------
    // Auth actions
    //-------------------------------------------------------------------------------------

    /// Signs in and resolves only after the full reload sequence (profile,
    /// progress, bookmarks) has completed. On failure the local state is
    /// left unchanged; there is no automatic retry.
    pub async fn sign_in(&self, email: &str, password: &str) -> ClientResult<()> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "email and password must be non-empty".to_string(),
            ));
        }
        let identity = self.auth.sign_in(email, password).await?;
        info!(user = %identity.user_id, "Signed in");
        let epoch = self.begin_session(identity);
        self.reload_all(epoch).await
    }

    /// Creates a remote identity. The profile row is not created here;
    /// provisioning happens on the next successful load if the profile read
    /// returns not-found. Success may still mean a pending email
    /// confirmation, which the caller must surface.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> ClientResult<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "email and password must be non-empty".to_string(),
            ));
        }
        let identity = self.auth.sign_up(email, password, &metadata).await?;
        info!(user = %identity.user_id, "Signed up");
        *self
            .signup_metadata
            .lock()
            .expect("signup metadata lock poisoned") = metadata;
        Ok(identity)
    }

    /// Clears the local identity and all derived collections synchronously,
    /// then tells the gateway. Idempotent; a gateway refusal does not bring
    /// the session back.
    pub async fn sign_out(&self) -> ClientResult<()> {
        self.clear_session();
        if let Err(err) = self.auth.sign_out().await {
            warn!("Gateway sign-out failed (local session already cleared): {err}");
        }
        Ok(())
    }

    pub async fn reset_password_for_email(&self, email: &str) -> ClientResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::InvalidInput("email must be non-empty".to_string()));
        }
        Ok(self.auth.reset_password(email).await?)
    }

    /// Updates the credential (only meaningful during recovery mode), then
    /// forces a sign-out so the new password is exercised on the next login.
    pub async fn update_user_password(&self, new_password: &str) -> ClientResult<()> {
        if new_password.is_empty() {
            return Err(ClientError::InvalidInput("password must be non-empty".to_string()));
        }
        self.auth.update_password(new_password).await?;
        info!("Password updated, forcing sign-out");
        self.sign_out().await
    }

    /// Applies a gateway auth notification to the identity lifecycle.
    pub async fn apply_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(identity) => {
                info!(user = %identity.user_id, "Auth event: signed in");
                let epoch = self.begin_session(identity);
                if let Err(err) = self.reload_all(epoch).await {
                    warn!("Session reload after sign-in event failed: {err}");
                }
            }
            AuthEvent::SignedOut => {
                info!("Auth event: signed out");
                self.clear_session();
            }
            AuthEvent::PasswordRecovery(identity) => {
                info!(user = %identity.user_id, "Auth event: password recovery");
                let mut inner = self.write();
                inner.epoch += 1;
                inner.identity = Some(identity);
                inner.profile = None;
                inner.progress.clear();
                inner.bookmarks.clear();
                inner.phase = SessionPhase::RecoveryMode;
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Mutation actions
    //-------------------------------------------------------------------------------------

    /// Upserts the (user, chapter) progress row at 100% with a completion
    /// timestamp, then reloads progress. Idempotent on an already-completed
    /// chapter.
    pub async fn mark_chapter_complete(&self, chapter_id: ChapterId) -> ClientResult<()> {
        let (identity, epoch) = self.require_identity()?;
        let _guard = self.acquire_op(chapter_id, PendingOp::Progress)?;
        let record = ProgressRecord {
            user_id: identity.user_id,
            chapter_id,
            progress_percentage: 100,
            completed_at: Some(Utc::now()),
            chapter: None,
        };
        self.data.upsert_progress(&record).await?;
        self.reload_progress(&identity, epoch).await
    }

    /// Upserts an arbitrary progress percentage (clamped to 0..=100). The
    /// completion timestamp is set only when the clamped value is 100.
    pub async fn update_progress(&self, chapter_id: ChapterId, percentage: u8) -> ClientResult<()> {
        let (identity, epoch) = self.require_identity()?;
        let _guard = self.acquire_op(chapter_id, PendingOp::Progress)?;
        let percentage = percentage.min(100);
        let record = ProgressRecord {
            user_id: identity.user_id,
            chapter_id,
            progress_percentage: percentage,
            completed_at: (percentage == 100).then(Utc::now),
            chapter: None,
        };
        self.data.upsert_progress(&record).await?;
        self.reload_progress(&identity, epoch).await
    }

    /// Reads the bookmark's existence, then deletes or inserts it, reloads
    /// bookmarks, and reports the net effect. The pending guard serializes
    /// toggles per chapter from this client, closing the read-then-write
    /// lost-update window.
    pub async fn toggle_bookmark(&self, chapter_id: ChapterId) -> ClientResult<BookmarkToggle> {
        let (identity, epoch) = self.require_identity()?;
        let _guard = self.acquire_op(chapter_id, PendingOp::Bookmark)?;
        let toggle = if self
            .data
            .bookmark_exists(identity.user_id, chapter_id)
            .await?
        {
            self.data
                .delete_bookmark(identity.user_id, chapter_id)
                .await?;
            BookmarkToggle::Removed
        } else {
            self.data
                .insert_bookmark(identity.user_id, chapter_id)
                .await?;
            BookmarkToggle::Added
        };
        self.reload_bookmarks(&identity, epoch).await?;
        Ok(toggle)
    }

    /// Applies a sparse profile edit and re-syncs the in-memory profile
    /// from the gateway's response.
    pub async fn update_profile(&self, updates: ProfileUpdate) -> ClientResult<Profile> {
        let (identity, epoch) = self.require_identity()?;
        let profile = self.data.update_profile(identity.user_id, &updates).await?;
        let mut inner = self.write();
        if inner.epoch == epoch {
            inner.profile = Some(profile.clone());
        }
        Ok(profile)
    }

    //-------------------------------------------------------------------------------------
    // Derived read-only queries (pure over in-memory collections)
    //-------------------------------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.read().profile.clone()
    }

    pub fn progress(&self) -> Vec<ProgressRecord> {
        self.read().progress.clone()
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.read().bookmarks.clone()
    }

    pub fn is_chapter_completed(&self, chapter_id: ChapterId) -> bool {
        self.read()
            .progress
            .iter()
            .any(|record| record.chapter_id == chapter_id && record.is_completed())
    }

    pub fn is_chapter_bookmarked(&self, chapter_id: ChapterId) -> bool {
        self.read()
            .bookmarks
            .iter()
            .any(|bookmark| bookmark.chapter_id == chapter_id)
    }

    /// Chapter ids whose progress record sits at exactly 100, sorted.
    pub fn completed_chapter_ids(&self) -> Vec<ChapterId> {
        let inner = self.read();
        let mut ids: Vec<ChapterId> = inner
            .progress
            .iter()
            .filter(|record| record.is_completed())
            .map(|record| record.chapter_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Chapter ids present in the bookmark collection, sorted.
    pub fn bookmarked_chapter_ids(&self) -> Vec<ChapterId> {
        let inner = self.read();
        let mut ids: Vec<ChapterId> = inner
            .bookmarks
            .iter()
            .map(|bookmark| bookmark.chapter_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn chapter_progress(&self, chapter_id: ChapterId) -> Option<u8> {
        self.read()
            .progress
            .iter()
            .find(|record| record.chapter_id == chapter_id)
            .map(|record| record.progress_percentage)
    }

    //-------------------------------------------------------------------------------------
    // Internals
    //-------------------------------------------------------------------------------------

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionInner> {
        self.inner.read().expect("session state lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().expect("session state lock poisoned")
    }

    /// Installs a new identity, clears everything derived from the previous
    /// one, and returns the new epoch.
    fn begin_session(&self, identity: Identity) -> u64 {
        let mut inner = self.write();
        inner.epoch += 1;
        inner.identity = Some(identity);
        inner.profile = None;
        inner.progress.clear();
        inner.bookmarks.clear();
        inner.phase = SessionPhase::Loading;
        inner.epoch
    }

    fn clear_session(&self) {
        let mut inner = self.write();
        inner.epoch += 1;
        inner.identity = None;
        inner.profile = None;
        inner.progress.clear();
        inner.bookmarks.clear();
        inner.phase = SessionPhase::Anonymous;
    }

    fn require_identity(&self) -> ClientResult<(Identity, u64)> {
        let inner = self.read();
        inner
            .identity
            .clone()
            .map(|identity| (identity, inner.epoch))
            .ok_or(ClientError::Unauthenticated)
    }

    fn acquire_op(&self, chapter_id: ChapterId, op: PendingOp) -> ClientResult<OpGuard<'_>> {
        let mut pending = self.pending.lock().expect("pending-op lock poisoned");
        if !pending.insert((chapter_id, op)) {
            return Err(ClientError::OperationPending {
                operation: op.name(),
                key: chapter_id.to_string(),
            });
        }
        Ok(OpGuard {
            pending: &self.pending,
            key: (chapter_id, op),
        })
    }

    /// Fetches profile, progress, and bookmarks for the identity that owns
    /// `epoch`, then applies all three atomically if the epoch is still
    /// current. A stale epoch means another transition won; the result is
    /// discarded wholesale.
    async fn reload_all(&self, epoch: u64) -> ClientResult<()> {
        let Some(identity) = self.identity_at(epoch) else {
            return Ok(());
        };
        let profile = match self.data.get_profile(identity.user_id).await {
            Ok(profile) => profile,
            // A missing profile row is the provisioning trigger, not a failure.
            Err(GatewayError::NotFound(_)) => self.provision_profile(&identity).await?,
            Err(err) => return Err(err.into()),
        };
        let progress = self.data.list_progress(identity.user_id).await?;
        let bookmarks = self.data.list_bookmarks(identity.user_id).await?;

        let mut inner = self.write();
        if inner.epoch != epoch {
            debug!("Discarding stale session reload (epoch {epoch} superseded)");
            return Ok(());
        }
        inner.profile = Some(profile);
        inner.progress = progress;
        inner.bookmarks = bookmarks;
        inner.phase = SessionPhase::Ready;
        Ok(())
    }

    async fn reload_progress(&self, identity: &Identity, epoch: u64) -> ClientResult<()> {
        let progress = self.data.list_progress(identity.user_id).await?;
        let mut inner = self.write();
        if inner.epoch == epoch {
            inner.progress = progress;
        }
        Ok(())
    }

    async fn reload_bookmarks(&self, identity: &Identity, epoch: u64) -> ClientResult<()> {
        let bookmarks = self.data.list_bookmarks(identity.user_id).await?;
        let mut inner = self.write();
        if inner.epoch == epoch {
            inner.bookmarks = bookmarks;
        }
        Ok(())
    }

    fn identity_at(&self, epoch: u64) -> Option<Identity> {
        let inner = self.read();
        if inner.epoch == epoch {
            inner.identity.clone()
        } else {
            None
        }
    }

    /// Creates the tier=free profile for an identity whose profile read
    /// came back not-found, seeding the name from signup metadata when
    /// available and from the email's local part otherwise.
    async fn provision_profile(&self, identity: &Identity) -> ClientResult<Profile> {
        let metadata = self
            .signup_metadata
            .lock()
            .expect("signup metadata lock poisoned")
            .clone();
        let name = metadata.name.unwrap_or_else(|| {
            identity
                .email
                .split('@')
                .next()
                .unwrap_or("")
                .to_string()
        });
        info!(user = %identity.user_id, "Auto-provisioning profile");
        let profile = Profile {
            user_id: identity.user_id,
            name,
            email: identity.email.clone(),
            tier: Tier::Free,
            university: metadata.university,
            student_number: metadata.student_number,
        };
        Ok(self.data.create_profile(&profile).await?)
    }
}
