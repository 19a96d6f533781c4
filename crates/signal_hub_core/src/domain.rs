//! crates/signal_hub_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of the gateway's wire format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Chapter ids are assigned by the gateway's chapter table.
pub type ChapterId = i64;

/// The signed-in user as reported by the auth service.
/// Owned exclusively by the session store; everything else only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

/// Subscription tier stored on the profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }

    /// Parses the tier column value. Unknown values fall back to `Free`
    /// rather than failing the whole profile load.
    pub fn parse(value: &str) -> Tier {
        match value {
            "premium" => Tier::Premium,
            _ => Tier::Free,
        }
    }
}

/// One profile per identity, persisted remotely across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub tier: Tier,
    pub university: Option<String>,
    pub student_number: Option<String>,
}

/// Optional signup metadata, used to seed the auto-provisioned profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpMetadata {
    pub name: Option<String>,
    pub university: Option<String>,
    pub student_number: Option<String>,
}

/// Sparse profile edit; absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub university: Option<String>,
    pub student_number: Option<String>,
}

/// The three kinds of study material a chapter can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Notes,
    Solutions,
    Formulas,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Notes => "notes",
            MaterialKind::Solutions => "solutions",
            MaterialKind::Formulas => "formulas",
        }
    }
}

/// Storage paths of a chapter's materials; `None` means not uploaded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterMaterials {
    pub notes: Option<String>,
    pub solutions: Option<String>,
    pub formulas: Option<String>,
}

impl ChapterMaterials {
    pub fn get(&self, kind: MaterialKind) -> Option<&str> {
        match kind {
            MaterialKind::Notes => self.notes.as_deref(),
            MaterialKind::Solutions => self.solutions.as_deref(),
            MaterialKind::Formulas => self.formulas.as_deref(),
        }
    }

    pub fn set(&mut self, kind: MaterialKind, path: Option<String>) {
        match kind {
            MaterialKind::Notes => self.notes = path,
            MaterialKind::Solutions => self.solutions = path,
            MaterialKind::Formulas => self.formulas = path,
        }
    }
}

/// A course chapter in the UI's semantic shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    pub description: String,
    /// Display sequence; the admin UI reorders by swapping values.
    pub order: i32,
    pub unlocked: bool,
    pub materials: ChapterMaterials,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for chapter creation. The gateway assigns the
/// id and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterDraft {
    pub title: String,
    pub description: String,
    pub order: i32,
    pub unlocked: bool,
    pub materials: ChapterMaterials,
}

/// Sparse chapter edit; absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
    pub unlocked: Option<bool>,
    pub notes: Option<String>,
    pub solutions: Option<String>,
    pub formulas: Option<String>,
}

/// At most one record per (user, chapter) pair; upsert semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub user_id: Uuid,
    pub chapter_id: ChapterId,
    /// 0..=100.
    pub progress_percentage: u8,
    pub completed_at: Option<DateTime<Utc>>,
    /// Joined chapter row, when the listing endpoint provides it.
    pub chapter: Option<Chapter>,
}

impl ProgressRecord {
    /// A chapter is completed iff its progress is exactly 100.
    pub fn is_completed(&self) -> bool {
        self.progress_percentage == 100
    }
}

/// Existence is binary: a row present means the chapter is bookmarked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub user_id: Uuid,
    pub chapter_id: ChapterId,
    pub chapter: Option<Chapter>,
}

/// Net effect of a bookmark toggle, reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkToggle {
    Added,
    Removed,
}

/// Auth-service notifications pushed into the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
    PasswordRecovery(Identity),
}

/// Raw inputs for the admin analytics screens.
#[derive(Debug, Clone, Default)]
pub struct UserStats {
    pub profiles: Vec<Profile>,
    pub progress: Vec<ProgressRecord>,
}
