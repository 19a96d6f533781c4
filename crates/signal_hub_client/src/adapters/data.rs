//! crates/signal_hub_client/src/adapters/data.rs
//!
//! Data adapter: the concrete implementation of the `DataGateway` port.
//! It speaks the hosted service's row-oriented REST dialect and converts
//! each remote row into the domain shape with `into_domain`, which is the
//! single mapping shared by the catalog listing and the search procedure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use signal_hub_core::domain::{
    Bookmark, Chapter, ChapterDraft, ChapterId, ChapterMaterials, ChapterUpdate, Profile,
    ProfileUpdate, ProgressRecord, Tier, UserStats,
};
use signal_hub_core::ports::{DataGateway, GatewayError, GatewayResult};

use super::http::{self, HttpGateway};

pub struct RestDataGateway {
    http: Arc<HttpGateway>,
}

impl RestDataGateway {
    pub fn new(http: Arc<HttpGateway>) -> Self {
        Self { http }
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<Vec<T>> {
        let response = self.http.execute(builder).await?;
        response.json::<Vec<T>>().await.map_err(http::decode)
    }

    /// POST/PATCH with `Prefer: return=representation` answers with the
    /// affected rows; exactly one is expected here.
    async fn fetch_one<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        let rows: Vec<T> = self.fetch_rows(builder).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| GatewayError::Unexpected("Gateway returned no representation".to_string()))
    }
}

//=========================================================================================
// "Impure" Remote Row Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ChapterRow {
    id: i64,
    title: String,
    description: String,
    chapter_order: i32,
    is_unlocked: bool,
    notes_file_path: Option<String>,
    solutions_file_path: Option<String>,
    formulas_file_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChapterRow {
    fn into_domain(self) -> Chapter {
        Chapter {
            id: self.id,
            title: self.title,
            description: self.description,
            order: self.chapter_order,
            unlocked: self.is_unlocked,
            materials: ChapterMaterials {
                notes: self.notes_file_path,
                solutions: self.solutions_file_path,
                formulas: self.formulas_file_path,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize)]
struct NewChapterRow<'a> {
    title: &'a str,
    description: &'a str,
    chapter_order: i32,
    is_unlocked: bool,
    notes_file_path: Option<&'a str>,
    solutions_file_path: Option<&'a str>,
    formulas_file_path: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    id: Uuid,
    name: String,
    email: String,
    tier: String,
    university: Option<String>,
    student_number: Option<String>,
}

impl ProfileRow {
    fn into_domain(self) -> Profile {
        Profile {
            user_id: self.id,
            name: self.name,
            email: self.email,
            tier: Tier::parse(&self.tier),
            university: self.university,
            student_number: self.student_number,
        }
    }

    fn from_domain(profile: &Profile) -> Self {
        Self {
            id: profile.user_id,
            name: profile.name.clone(),
            email: profile.email.clone(),
            tier: profile.tier.as_str().to_string(),
            university: profile.university.clone(),
            student_number: profile.student_number.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProgressRow {
    user_id: Uuid,
    chapter_id: i64,
    progress_percentage: i16,
    completed_at: Option<DateTime<Utc>>,
    /// Joined chapter row when the query selects `chapters(*)`.
    chapters: Option<ChapterRow>,
}

impl ProgressRow {
    fn into_domain(self) -> ProgressRecord {
        ProgressRecord {
            user_id: self.user_id,
            chapter_id: self.chapter_id,
            progress_percentage: self.progress_percentage.clamp(0, 100) as u8,
            completed_at: self.completed_at,
            chapter: self.chapters.map(ChapterRow::into_domain),
        }
    }
}

#[derive(Serialize)]
struct NewProgressRow {
    user_id: Uuid,
    chapter_id: i64,
    progress_percentage: i16,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BookmarkRow {
    user_id: Uuid,
    chapter_id: i64,
    chapters: Option<ChapterRow>,
}

impl BookmarkRow {
    fn into_domain(self) -> Bookmark {
        Bookmark {
            user_id: self.user_id,
            chapter_id: self.chapter_id,
            chapter: self.chapters.map(ChapterRow::into_domain),
        }
    }
}

#[derive(Deserialize)]
struct BookmarkKeyRow {
    #[allow(dead_code)]
    chapter_id: i64,
}

fn eq<T: std::fmt::Display>(value: T) -> String {
    format!("eq.{value}")
}

//=========================================================================================
// `DataGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataGateway for RestDataGateway {
    async fn get_profile(&self, user_id: Uuid) -> GatewayResult<Profile> {
        let rows: Vec<ProfileRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("profiles"))
                    .query(&[("select", "*".to_string()), ("id", eq(user_id))]),
            )
            .await?;
        rows.into_iter()
            .next()
            .map(ProfileRow::into_domain)
            .ok_or_else(|| GatewayError::NotFound(format!("Profile {user_id} not found")))
    }

    async fn create_profile(&self, profile: &Profile) -> GatewayResult<Profile> {
        let row: ProfileRow = self
            .fetch_one(
                self.http
                    .client()
                    .post(self.http.rest_url("profiles"))
                    .header("Prefer", "return=representation")
                    .json(&[ProfileRow::from_domain(profile)]),
            )
            .await?;
        Ok(row.into_domain())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        updates: &ProfileUpdate,
    ) -> GatewayResult<Profile> {
        let mut body = serde_json::Map::new();
        if let Some(name) = &updates.name {
            body.insert("name".to_string(), json!(name));
        }
        if let Some(university) = &updates.university {
            body.insert("university".to_string(), json!(university));
        }
        if let Some(student_number) = &updates.student_number {
            body.insert("student_number".to_string(), json!(student_number));
        }
        if body.is_empty() {
            return self.get_profile(user_id).await;
        }
        let row: ProfileRow = self
            .fetch_one(
                self.http
                    .client()
                    .patch(self.http.rest_url("profiles"))
                    .query(&[("id", eq(user_id))])
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        Ok(row.into_domain())
    }

    async fn list_chapters(&self) -> GatewayResult<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("chapters"))
                    .query(&[("select", "*"), ("order", "chapter_order")]),
            )
            .await?;
        Ok(rows.into_iter().map(ChapterRow::into_domain).collect())
    }

    async fn get_chapter(&self, id: ChapterId) -> GatewayResult<Chapter> {
        let rows: Vec<ChapterRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("chapters"))
                    .query(&[("select", "*".to_string()), ("id", eq(id))]),
            )
            .await?;
        rows.into_iter()
            .next()
            .map(ChapterRow::into_domain)
            .ok_or_else(|| GatewayError::NotFound(format!("Chapter {id} not found")))
    }

    async fn create_chapter(&self, draft: &ChapterDraft) -> GatewayResult<Chapter> {
        let row = NewChapterRow {
            title: &draft.title,
            description: &draft.description,
            chapter_order: draft.order,
            is_unlocked: draft.unlocked,
            notes_file_path: draft.materials.notes.as_deref(),
            solutions_file_path: draft.materials.solutions.as_deref(),
            formulas_file_path: draft.materials.formulas.as_deref(),
        };
        let created: ChapterRow = self
            .fetch_one(
                self.http
                    .client()
                    .post(self.http.rest_url("chapters"))
                    .header("Prefer", "return=representation")
                    .json(&[row]),
            )
            .await?;
        Ok(created.into_domain())
    }

    async fn update_chapter(
        &self,
        id: ChapterId,
        updates: &ChapterUpdate,
    ) -> GatewayResult<Chapter> {
        let mut body = serde_json::Map::new();
        if let Some(title) = &updates.title {
            body.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &updates.description {
            body.insert("description".to_string(), json!(description));
        }
        if let Some(order) = updates.order {
            body.insert("chapter_order".to_string(), json!(order));
        }
        if let Some(unlocked) = updates.unlocked {
            body.insert("is_unlocked".to_string(), json!(unlocked));
        }
        if let Some(notes) = &updates.notes {
            body.insert("notes_file_path".to_string(), json!(notes));
        }
        if let Some(solutions) = &updates.solutions {
            body.insert("solutions_file_path".to_string(), json!(solutions));
        }
        if let Some(formulas) = &updates.formulas {
            body.insert("formulas_file_path".to_string(), json!(formulas));
        }
        if body.is_empty() {
            return self.get_chapter(id).await;
        }
        let updated: ChapterRow = self
            .fetch_one(
                self.http
                    .client()
                    .patch(self.http.rest_url("chapters"))
                    .query(&[("id", eq(id))])
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        Ok(updated.into_domain())
    }

    async fn update_chapter_materials(
        &self,
        id: ChapterId,
        materials: &ChapterMaterials,
    ) -> GatewayResult<Chapter> {
        // All three columns are written at once; an absent path clears one.
        let body = json!({
            "notes_file_path": materials.notes,
            "solutions_file_path": materials.solutions,
            "formulas_file_path": materials.formulas,
            "updated_at": Utc::now(),
        });
        let updated: ChapterRow = self
            .fetch_one(
                self.http
                    .client()
                    .patch(self.http.rest_url("chapters"))
                    .query(&[("id", eq(id))])
                    .header("Prefer", "return=representation")
                    .json(&body),
            )
            .await?;
        Ok(updated.into_domain())
    }

    async fn delete_chapter(&self, id: ChapterId) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .delete(self.http.rest_url("chapters"))
                    .query(&[("id", eq(id))]),
            )
            .await?;
        Ok(())
    }

    async fn search_chapters(&self, term: &str) -> GatewayResult<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .post(self.http.rpc_url("search_chapters"))
                    .json(&json!({ "search_term": term })),
            )
            .await?;
        Ok(rows.into_iter().map(ChapterRow::into_domain).collect())
    }

    async fn list_progress(&self, user_id: Uuid) -> GatewayResult<Vec<ProgressRecord>> {
        let rows: Vec<ProgressRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("user_progress"))
                    .query(&[
                        ("select", "*,chapters(*)".to_string()),
                        ("user_id", eq(user_id)),
                    ]),
            )
            .await?;
        Ok(rows.into_iter().map(ProgressRow::into_domain).collect())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> GatewayResult<ProgressRecord> {
        let row = NewProgressRow {
            user_id: record.user_id,
            chapter_id: record.chapter_id,
            progress_percentage: i16::from(record.progress_percentage),
            completed_at: record.completed_at,
        };
        let stored: ProgressRow = self
            .fetch_one(
                self.http
                    .client()
                    .post(self.http.rest_url("user_progress"))
                    .header("Prefer", "resolution=merge-duplicates,return=representation")
                    .json(&[row]),
            )
            .await?;
        Ok(stored.into_domain())
    }

    async fn list_bookmarks(&self, user_id: Uuid) -> GatewayResult<Vec<Bookmark>> {
        let rows: Vec<BookmarkRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("bookmarks"))
                    .query(&[
                        ("select", "*,chapters(*)".to_string()),
                        ("user_id", eq(user_id)),
                    ]),
            )
            .await?;
        Ok(rows.into_iter().map(BookmarkRow::into_domain).collect())
    }

    async fn bookmark_exists(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<bool> {
        let rows: Vec<BookmarkKeyRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("bookmarks"))
                    .query(&[
                        ("select", "chapter_id".to_string()),
                        ("user_id", eq(user_id)),
                        ("chapter_id", eq(chapter_id)),
                    ]),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .post(self.http.rest_url("bookmarks"))
                    .header("Prefer", "return=minimal")
                    .json(&[json!({ "user_id": user_id, "chapter_id": chapter_id })]),
            )
            .await?;
        Ok(())
    }

    async fn delete_bookmark(&self, user_id: Uuid, chapter_id: ChapterId) -> GatewayResult<()> {
        self.http
            .execute(
                self.http
                    .client()
                    .delete(self.http.rest_url("bookmarks"))
                    .query(&[("user_id", eq(user_id)), ("chapter_id", eq(chapter_id))]),
            )
            .await?;
        Ok(())
    }

    async fn user_stats(&self) -> GatewayResult<UserStats> {
        let profiles: Vec<ProfileRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("profiles"))
                    .query(&[("select", "*")]),
            )
            .await?;
        let progress: Vec<ProgressRow> = self
            .fetch_rows(
                self.http
                    .client()
                    .get(self.http.rest_url("user_progress"))
                    .query(&[("select", "*")]),
            )
            .await?;
        Ok(UserStats {
            profiles: profiles.into_iter().map(ProfileRow::into_domain).collect(),
            progress: progress.into_iter().map(ProgressRow::into_domain).collect(),
        })
    }
}
