//! crates/signal_hub_client/src/adapters/mod.rs
//!
//! Concrete implementations of the core's gateway ports against the hosted
//! service's HTTP endpoints.

pub mod auth;
pub mod data;
pub mod http;
pub mod storage;

pub use auth::RestAuthGateway;
pub use data::RestDataGateway;
pub use http::HttpGateway;
pub use storage::RestStorageGateway;
