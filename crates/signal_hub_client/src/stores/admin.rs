//! crates/signal_hub_client/src/stores/admin.rs
//!
//! Read-only back-office queries: the user listing and the coarse
//! analytics numbers the admin overview renders.

use std::sync::Arc;

use signal_hub_core::domain::Profile;
use signal_hub_core::ports::DataGateway;

use crate::error::ClientResult;

/// Coarse analytics derived from every profile and progress row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSummary {
    pub total_users: usize,
    pub premium_users: usize,
    pub completed_chapters: usize,
    /// Mean progress percentage across all records; 0.0 with no records.
    pub average_progress: f64,
}

pub struct AdminStore {
    data: Arc<dyn DataGateway>,
}

impl AdminStore {
    pub fn new(data: Arc<dyn DataGateway>) -> Self {
        Self { data }
    }

    pub async fn list_users(&self) -> ClientResult<Vec<Profile>> {
        Ok(self.data.user_stats().await?.profiles)
    }

    pub async fn overview(&self) -> ClientResult<AnalyticsSummary> {
        let stats = self.data.user_stats().await?;
        let completed_chapters = stats
            .progress
            .iter()
            .filter(|record| record.is_completed())
            .count();
        let average_progress = if stats.progress.is_empty() {
            0.0
        } else {
            let total: u64 = stats
                .progress
                .iter()
                .map(|record| u64::from(record.progress_percentage))
                .sum();
            total as f64 / stats.progress.len() as f64
        };
        Ok(AnalyticsSummary {
            total_users: stats.profiles.len(),
            premium_users: stats
                .profiles
                .iter()
                .filter(|profile| profile.tier == signal_hub_core::domain::Tier::Premium)
                .count(),
            completed_chapters,
            average_progress,
        })
    }
}
