//! Client-state crate for the Signal Hub learning portal: the session
//! store, catalog cache, search state, material uploads, and the REST
//! adapters that connect them to the hosted gateway.
//!
//! Data flow: UI action → store action → gateway call → on success the
//! store re-reads authoritative state from the gateway → the UI re-renders
//! from the updated store.

pub mod adapters;
pub mod config;
pub mod error;
pub mod stores;

pub use config::{Config, ConfigError};
pub use error::{ClientError, ClientResult};
pub use stores::{AdminStore, AnalyticsSummary, CatalogStore, SearchStore, SessionPhase, SessionStore, UploadStore};
