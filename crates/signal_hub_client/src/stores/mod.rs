//! crates/signal_hub_client/src/stores/mod.rs
//!
//! The client-side state stores. UI components treat every field these
//! stores expose as read-only and funnel all state changes through the
//! action methods.

pub mod admin;
pub mod catalog;
pub mod search;
pub mod session;
pub mod uploads;

pub use admin::{AdminStore, AnalyticsSummary};
pub use catalog::CatalogStore;
pub use search::SearchStore;
pub use session::{SessionPhase, SessionStore};
pub use uploads::UploadStore;
