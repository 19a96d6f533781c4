//! Shared in-memory test doubles for the gateway ports.
//!
//! `MockGateway` implements all three ports over locked maps, counts the
//! calls the properties care about, and can hold named operations on a
//! semaphore so tests can interleave concurrent actions deterministically.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::{broadcast, Semaphore};
use uuid::Uuid;

use signal_hub_core::domain::{
    AuthEvent, Bookmark, Chapter, ChapterDraft, ChapterId, ChapterMaterials, ChapterUpdate,
    Identity, Profile, ProfileUpdate, ProgressRecord, SignUpMetadata, Tier, UserStats,
};
use signal_hub_core::ports::{
    AuthEventStream, AuthGateway, DataGateway, GatewayError, GatewayResult, StorageGateway,
};

#[derive(Default)]
struct MockState {
    /// email -> (password, user id)
    accounts: HashMap<String, (String, Uuid)>,
    profiles: HashMap<Uuid, Profile>,
    chapters: Vec<Chapter>,
    next_chapter_id: ChapterId,
    progress: HashMap<(Uuid, ChapterId), ProgressRecord>,
    bookmarks: HashSet<(Uuid, ChapterId)>,
    /// "bucket/path" -> blob size
    blobs: HashMap<String, usize>,
}

pub struct MockGateway {
    state: Mutex<MockState>,
    pub search_calls: AtomicUsize,
    pub last_search_term: Mutex<Option<String>>,
    pub password_updates: AtomicUsize,
    pub reset_requests: Mutex<Vec<String>>,
    /// Makes `list_chapters` answer with a network error while set.
    pub fail_list_chapters: AtomicBool,
    /// Makes `search_chapters` answer with a network error while set.
    pub fail_search: AtomicBool,
    events: broadcast::Sender<AuthEvent>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// One-time tracing setup so failing tests show the stores' log output
/// under `RUST_LOG`.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        init_tracing();
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_chapter_id: 1,
                ..MockState::default()
            }),
            search_calls: AtomicUsize::new(0),
            last_search_term: Mutex::new(None),
            password_updates: AtomicUsize::new(0),
            reset_requests: Mutex::new(Vec::new()),
            fail_list_chapters: AtomicBool::new(false),
            fail_search: AtomicBool::new(false),
            events,
            gates: Mutex::new(HashMap::new()),
        })
    }

    //-------------------------------------------------------------------------------------
    // Seeding and inspection helpers
    //-------------------------------------------------------------------------------------

    pub fn add_account(&self, email: &str, password: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), (password.to_string(), user_id));
        user_id
    }

    pub fn add_profile(&self, profile: Profile) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(profile.user_id, profile);
    }

    /// Seeds `count` chapters with ids and orders 1..=count.
    pub fn seed_chapters(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        for index in 1..=count as ChapterId {
            state.chapters.push(make_chapter(index, index as i32));
        }
        state.next_chapter_id = count as ChapterId + 1;
    }

    pub fn add_chapter(&self, chapter: Chapter) {
        let mut state = self.state.lock().unwrap();
        state.next_chapter_id = state.next_chapter_id.max(chapter.id + 1);
        state.chapters.push(chapter);
    }

    pub fn progress_total(&self) -> usize {
        self.state.lock().unwrap().progress.len()
    }

    pub fn chapters_snapshot(&self) -> Vec<Chapter> {
        self.state.lock().unwrap().chapters.clone()
    }

    pub fn profile_of(&self, user_id: Uuid) -> Option<Profile> {
        self.state.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn progress_records_for(&self, user_id: Uuid) -> Vec<ProgressRecord> {
        let state = self.state.lock().unwrap();
        state
            .progress
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn has_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> bool {
        self.state
            .lock()
            .unwrap()
            .bookmarks
            .contains(&(user_id, chapter_id))
    }

    pub fn blob_exists(&self, bucket: &str, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .blobs
            .contains_key(&format!("{bucket}/{path}"))
    }

    pub fn send_event(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    /// Installs a semaphore gate; the named operation blocks until the test
    /// adds a permit.
    pub fn install_gate(&self, operation: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(operation.to_string(), Arc::clone(&gate));
        gate
    }

    async fn pass_gate(&self, operation: &str) {
        let gate = self.gates.lock().unwrap().get(operation).cloned();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.expect("gate semaphore closed");
            permit.forget();
        }
    }

    fn joined_chapter(state: &MockState, chapter_id: ChapterId) -> Option<Chapter> {
        state
            .chapters
            .iter()
            .find(|chapter| chapter.id == chapter_id)
            .cloned()
    }
}

pub fn make_chapter(id: ChapterId, order: i32) -> Chapter {
    Chapter {
        id,
        title: format!("Chapter {id}"),
        description: format!("Signals topic number {id}"),
        order,
        unlocked: true,
        materials: ChapterMaterials::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

//=========================================================================================
// AuthGateway
//=========================================================================================

#[async_trait]
impl AuthGateway for MockGateway {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: &SignUpMetadata,
    ) -> GatewayResult<Identity> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.contains_key(email) {
            return Err(GatewayError::Validation(format!(
                "{email} is already registered"
            )));
        }
        let user_id = Uuid::new_v4();
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user_id));
        Ok(Identity {
            user_id,
            email: email.to_string(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<Identity> {
        let identity = {
            let state = self.state.lock().unwrap();
            match state.accounts.get(email) {
                Some((stored, user_id)) if stored == password => Identity {
                    user_id: *user_id,
                    email: email.to_string(),
                },
                _ => return Err(GatewayError::Auth("Invalid login credentials".to_string())),
            }
        };
        self.send_event(AuthEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.send_event(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> GatewayResult<()> {
        self.reset_requests.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn update_password(&self, _new_password: &str) -> GatewayResult<()> {
        self.password_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self) -> GatewayResult<AuthEventStream> {
        let receiver = self.events.subscribe();
        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        let stream: AuthEventStream = Box::pin(stream);
        Ok(stream)
    }
}

//=========================================================================================
// DataGateway
//=========================================================================================

#[async_trait]
impl DataGateway for MockGateway {
    async fn get_profile(&self, user_id: Uuid) -> GatewayResult<Profile> {
        self.pass_gate("get_profile").await;
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("Profile {user_id} not found")))
    }

    async fn create_profile(&self, profile: &Profile) -> GatewayResult<Profile> {
        let mut state = self.state.lock().unwrap();
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        updates: &ProfileUpdate,
    ) -> GatewayResult<Profile> {
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Profile {user_id} not found")))?;
        if let Some(name) = &updates.name {
            profile.name = name.clone();
        }
        if let Some(university) = &updates.university {
            profile.university = Some(university.clone());
        }
        if let Some(student_number) = &updates.student_number {
            profile.student_number = Some(student_number.clone());
        }
        Ok(profile.clone())
    }

    async fn list_chapters(&self) -> GatewayResult<Vec<Chapter>> {
        self.pass_gate("list_chapters").await;
        if self.fail_list_chapters.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        let mut chapters = self.state.lock().unwrap().chapters.clone();
        chapters.sort_by_key(|chapter| chapter.order);
        Ok(chapters)
    }

    async fn get_chapter(&self, id: ChapterId) -> GatewayResult<Chapter> {
        self.state
            .lock()
            .unwrap()
            .chapters
            .iter()
            .find(|chapter| chapter.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("Chapter {id} not found")))
    }

    async fn create_chapter(&self, draft: &ChapterDraft) -> GatewayResult<Chapter> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_chapter_id;
        state.next_chapter_id += 1;
        let chapter = Chapter {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            order: draft.order,
            unlocked: draft.unlocked,
            materials: draft.materials.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn update_chapter(
        &self,
        id: ChapterId,
        updates: &ChapterUpdate,
    ) -> GatewayResult<Chapter> {
        let mut state = self.state.lock().unwrap();
        let chapter = state
            .chapters
            .iter_mut()
            .find(|chapter| chapter.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("Chapter {id} not found")))?;
        if let Some(title) = &updates.title {
            chapter.title = title.clone();
        }
        if let Some(description) = &updates.description {
            chapter.description = description.clone();
        }
        if let Some(order) = updates.order {
            chapter.order = order;
        }
        if let Some(unlocked) = updates.unlocked {
            chapter.unlocked = unlocked;
        }
        if let Some(notes) = &updates.notes {
            chapter.materials.notes = Some(notes.clone());
        }
        if let Some(solutions) = &updates.solutions {
            chapter.materials.solutions = Some(solutions.clone());
        }
        if let Some(formulas) = &updates.formulas {
            chapter.materials.formulas = Some(formulas.clone());
        }
        chapter.updated_at = Utc::now();
        Ok(chapter.clone())
    }

    async fn update_chapter_materials(
        &self,
        id: ChapterId,
        materials: &ChapterMaterials,
    ) -> GatewayResult<Chapter> {
        let mut state = self.state.lock().unwrap();
        let chapter = state
            .chapters
            .iter_mut()
            .find(|chapter| chapter.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("Chapter {id} not found")))?;
        chapter.materials = materials.clone();
        chapter.updated_at = Utc::now();
        Ok(chapter.clone())
    }

    async fn delete_chapter(&self, id: ChapterId) -> GatewayResult<()> {
        self.state
            .lock()
            .unwrap()
            .chapters
            .retain(|chapter| chapter.id != id);
        Ok(())
    }

    async fn search_chapters(&self, term: &str) -> GatewayResult<Vec<Chapter>> {
        self.pass_gate(&format!("search:{term}")).await;
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(GatewayError::Network("connection reset".to_string()));
        }
        *self.last_search_term.lock().unwrap() = Some(term.to_string());
        let needle = term.to_lowercase();
        let state = self.state.lock().unwrap();
        Ok(state
            .chapters
            .iter()
            .filter(|chapter| {
                chapter.title.to_lowercase().contains(&needle)
                    || chapter.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn list_progress(&self, user_id: Uuid) -> GatewayResult<Vec<ProgressRecord>> {
        self.pass_gate("list_progress").await;
        let state = self.state.lock().unwrap();
        Ok(state
            .progress
            .values()
            .filter(|record| record.user_id == user_id)
            .map(|record| ProgressRecord {
                chapter: Self::joined_chapter(&state, record.chapter_id),
                ..record.clone()
            })
            .collect())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> GatewayResult<ProgressRecord> {
        let mut state = self.state.lock().unwrap();
        let stored = ProgressRecord {
            chapter: None,
            ..record.clone()
        };
        state
            .progress
            .insert((record.user_id, record.chapter_id), stored.clone());
        Ok(stored)
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> GatewayResult<Vec<Bookmark>> {
        self.pass_gate("list_bookmarks").await;
        let state = self.state.lock().unwrap();
        Ok(state
            .bookmarks
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(owner, chapter_id)| Bookmark {
                user_id: *owner,
                chapter_id: *chapter_id,
                chapter: Self::joined_chapter(&state, *chapter_id),
            })
            .collect())
    }

    async fn bookmark_exists(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<bool> {
        self.pass_gate("bookmark_exists").await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .bookmarks
            .contains(&(user_id, chapter_id)))
    }

    async fn insert_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.bookmarks.insert((user_id, chapter_id)) {
            return Err(GatewayError::Validation(
                "duplicate bookmark key".to_string(),
            ));
        }
        Ok(())
    }

    async fn delete_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()> {
        self.state
            .lock()
            .unwrap()
            .bookmarks
            .remove(&(user_id, chapter_id));
        Ok(())
    }

    async fn user_stats(&self) -> GatewayResult<UserStats> {
        let state = self.state.lock().unwrap();
        Ok(UserStats {
            profiles: state.profiles.values().cloned().collect(),
            progress: state.progress.values().cloned().collect(),
        })
    }
}

//=========================================================================================
// StorageGateway
//=========================================================================================

#[async_trait]
impl StorageGateway for MockGateway {
    async fn upload(&self, bucket: &str, path: &str, data: Bytes) -> GatewayResult<String> {
        self.pass_gate("upload").await;
        self.state
            .lock()
            .unwrap()
            .blobs
            .insert(format!("{bucket}/{path}"), data.len());
        Ok(path.to_string())
    }

    async fn delete(&self, bucket: &str, path: &str) -> GatewayResult<()> {
        let removed = self
            .state
            .lock()
            .unwrap()
            .blobs
            .remove(&format!("{bucket}/{path}"));
        if removed.is_none() {
            return Err(GatewayError::Storage {
                path: path.to_string(),
                message: "object not found".to_string(),
            });
        }
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> GatewayResult<String> {
        if !self.blob_exists(bucket, path) {
            return Err(GatewayError::Storage {
                path: path.to_string(),
                message: "object not found".to_string(),
            });
        }
        Ok(format!(
            "https://mock.storage/{bucket}/{path}?expires={}",
            ttl.as_secs()
        ))
    }

    async fn signed_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> GatewayResult<String> {
        let url = self.signed_url(bucket, path, ttl).await?;
        Ok(format!("{url}&download="))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> GatewayResult<Vec<String>> {
        let full_prefix = format!("{bucket}/{prefix}");
        Ok(self
            .state
            .lock()
            .unwrap()
            .blobs
            .keys()
            .filter(|key| key.starts_with(&full_prefix))
            .map(|key| key[bucket.len() + 1..].to_string())
            .collect())
    }
}

/// A profile row the way the gateway would hold it.
pub fn make_profile(user_id: Uuid, email: &str, tier: Tier) -> Profile {
    Profile {
        user_id,
        name: email.split('@').next().unwrap_or("").to_string(),
        email: email.to_string(),
        tier,
        university: None,
        student_number: None,
    }
}
