//! Session lifecycle: cache check, probe, QR login polling.

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::gateway::{Backend, LoginPoll};

use super::credentials::{CredentialStore, Credentials};

/// Where the session manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing established yet.
    Unauthenticated,
    /// Deciding whether the cached record is usable.
    CacheCheck,
    /// Cached record adopted, pending a probe call.
    CacheValid,
    /// No usable cache; a fresh login is required.
    CacheInvalid,
    /// QR ticket requested and rendered to the operator.
    LoginPending,
    /// Waiting for the operator to scan and advance.
    Polling,
    /// Token usable by downstream calls.
    Authenticated,
    /// Terminal: the backend rejected the login.
    LoginFailed,
}

/// An established session: the two tokens held in memory for the run.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token for authenticated calls.
    pub token: String,
    /// Secondary identity token for the score-detail endpoint.
    pub imprint: String,
}

impl From<&Credentials> for Session {
    fn from(credentials: &Credentials) -> Self {
        Self {
            token: credentials.token.clone(),
            imprint: credentials.imprint.clone(),
        }
    }
}

/// Presents the QR ticket and paces the login poll.
///
/// The poll is operator-paced, one poll per advance, so the machine can
/// be driven by a terminal or by synthetic events in tests.
pub trait LoginPrompter {
    /// Show the scannable URL to the operator.
    fn present_qr(&self, url: &str) -> Result<()>;

    /// Block until the operator asks for the next status check.
    fn wait_for_advance(&self) -> Result<()>;

    /// Tell the operator the ticket has not been scanned yet.
    fn notify_waiting(&self);
}

/// Owns the authentication state machine and the credential cache.
pub struct SessionManager {
    store: CredentialStore,
    state: SessionState,
    credentials: Option<Credentials>,
}

impl SessionManager {
    /// Create a manager over the given credential store.
    #[must_use]
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            state: SessionState::Unauthenticated,
            credentials: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Produce a usable session: reuse the cached record when the backend
    /// still accepts it, otherwise run the QR login flow.
    pub async fn establish(
        &mut self,
        backend: &dyn Backend,
        prompter: &dyn LoginPrompter,
    ) -> Result<Session> {
        self.state = SessionState::CacheCheck;

        if let Some(cached) = self.store.load().filter(Credentials::is_valid) {
            self.state = SessionState::CacheValid;
            match backend.probe(&cached.token).await {
                Ok(()) => {
                    info!("cached session accepted");
                    self.state = SessionState::Authenticated;
                    let session = Session::from(&cached);
                    self.credentials = Some(cached);
                    return Ok(session);
                }
                Err(err) => {
                    // Not an operator-facing error: the fallback is the
                    // normal login flow.
                    info!(error = %err, "cached session rejected, falling back to QR login");
                    self.state = SessionState::CacheInvalid;
                }
            }
        } else {
            self.state = SessionState::CacheInvalid;
        }

        self.login(backend, prompter).await
    }

    /// Run the QR login flow unconditionally, ignoring any cached record.
    pub async fn force_login(
        &mut self,
        backend: &dyn Backend,
        prompter: &dyn LoginPrompter,
    ) -> Result<Session> {
        self.state = SessionState::CacheInvalid;
        self.login(backend, prompter).await
    }

    async fn login(
        &mut self,
        backend: &dyn Backend,
        prompter: &dyn LoginPrompter,
    ) -> Result<Session> {
        self.state = SessionState::LoginPending;
        let ticket = backend.qr_ticket().await?;
        prompter.present_qr(&ticket.scan_url())?;

        self.state = SessionState::Polling;
        loop {
            prompter.wait_for_advance()?;

            match backend.poll_login(&ticket.random).await? {
                LoginPoll::Success(token) => {
                    info!("login approved");
                    let credentials = Credentials::new(token);
                    if let Err(err) = self.store.save(&credentials) {
                        warn!(error = %err, "failed to persist credentials; session will not survive this run");
                    }
                    self.state = SessionState::Authenticated;
                    let session = Session::from(&credentials);
                    self.credentials = Some(credentials);
                    return Ok(session);
                }
                LoginPoll::NotScanned => {
                    prompter.notify_waiting();
                }
                LoginPoll::Rejected(msg) => {
                    self.state = SessionState::LoginFailed;
                    bail!("login rejected by backend: {msg}");
                }
            }
        }
    }

    /// Record the imprint issued alongside a selected score sheet so the
    /// next run can skip straight to score fetches.
    pub fn adopt_imprint(&mut self, imprint: &str) {
        if let Some(credentials) = self.credentials.as_mut() {
            if credentials.imprint == imprint {
                return;
            }
            credentials.imprint = imprint.to_string();
            if let Err(err) = self.store.save(credentials) {
                warn!(error = %err, "failed to persist refreshed imprint");
            }
        }
    }
}
