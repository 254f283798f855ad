//! Class-manager record exporter.
//!
//! This crate provides:
//! - QR-code login with cached-credential reuse and silent re-auth
//! - Paginated retrieval of per-class records
//! - Normalization of score sheets, student-info sheets and class
//!   rosters into one tabular model
//! - Spreadsheet export of the normalized tables

pub mod auth;
pub mod export;
pub mod gateway;
pub mod normalize;
pub mod pagination;
pub mod pipeline;
pub mod ui;

// Re-export main types
pub use auth::{CredentialStore, Credentials, Session, SessionManager, SessionState};
pub use gateway::{Backend, GatewayError, HttpGateway, LoginPoll};
pub use normalize::{Normalizer, RecordKind, Table};
pub use pipeline::{ExportConfig, Exporter, RunSummary};
