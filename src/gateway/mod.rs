//! Backend gateway for the class-manager service.
//!
//! The [`Backend`] trait is the seam between the session/normalization
//! logic and the real HTTP service, so both can be driven by stubs in
//! tests. [`HttpGateway`] is the production implementation.

mod http;
pub mod types;

pub use http::HttpGateway;
pub use types::{
    ClassInfo, ClassMember, GuardianContact, QrTicket, RecordSummary, ScoreEntry,
};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the backend gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the request at the HTTP layer
    #[error("backend returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of one login-status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPoll {
    /// Scan approved; the backend issued a session token.
    Success(String),
    /// Ticket not scanned yet; poll again later.
    NotScanned,
    /// Any other status; terminal for the login flow.
    Rejected(String),
}

/// Backend operations consumed by the session manager and the
/// normalization pipeline.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Obtain a fresh QR login ticket.
    async fn qr_ticket(&self) -> Result<QrTicket, GatewayError>;

    /// Poll login status for the ticket's nonce.
    async fn poll_login(&self, nonce: &str) -> Result<LoginPoll, GatewayError>;

    /// Cheap authenticated call used to decide whether a cached token is
    /// still accepted.
    async fn probe(&self, token: &str) -> Result<(), GatewayError>;

    /// Member ids of the children bound to the account.
    async fn child_member_ids(&self, token: &str) -> Result<Vec<String>, GatewayError>;

    /// One page of the record list for the given member set.
    async fn record_page(
        &self,
        token: &str,
        members: &[String],
        page: u32,
        size: u32,
    ) -> Result<Vec<RecordSummary>, GatewayError>;

    /// Classes the member set belongs to.
    async fn classes_by_members(
        &self,
        token: &str,
        members: &[String],
    ) -> Result<Vec<ClassInfo>, GatewayError>;

    /// Ordered student-name roster for a class.
    async fn class_roster(&self, token: &str, cid: &str) -> Result<Vec<String>, GatewayError>;

    /// Full member dump (teachers, students, guardian contacts) for a
    /// class.
    async fn class_members(
        &self,
        token: &str,
        cid: &str,
    ) -> Result<Vec<ClassMember>, GatewayError>;

    /// Per-subject scores for one student on one score sheet.
    ///
    /// Authenticated by the imprint, not the session token.
    async fn student_score(
        &self,
        imprint: &str,
        score_id: &str,
        student: &str,
    ) -> Result<Vec<ScoreEntry>, GatewayError>;
}
