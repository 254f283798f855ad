//! Cached session credentials.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How long a cached credential record stays usable.
const MAX_AGE_HOURS: i64 = 24;

/// One cached credential record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Session token presented on authenticated calls.
    pub token: String,
    /// Secondary identity token required by the score-detail endpoint.
    #[serde(rename = "secondaryToken", default)]
    pub imprint: String,
    /// When the backend issued the token.
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

impl Credentials {
    /// Create a fresh record issued now.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            imprint: String::new(),
            issued_at: Utc::now(),
        }
    }

    /// Whether the record is usable at `now`.
    ///
    /// A record is valid while its age is inside `[0, 24h)`; a record
    /// stamped in the future is treated as invalid.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let age = now - self.issued_at;
        age >= Duration::zero() && age < Duration::hours(MAX_AGE_HOURS)
    }

    /// Whether the record is usable right now.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// On-disk store holding at most one credential record.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached record.
    ///
    /// A missing or unreadable file means "no cached session"; corruption
    /// is warned about but never fatal.
    #[must_use]
    pub fn load(&self) -> Option<Credentials> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached credentials");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read cached credentials");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cached credentials are corrupt, ignoring");
                None
            }
        }
    }

    /// Persist a record, overwriting any previous one.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let content = serde_json::to_string_pretty(credentials)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// Remove the backing file (logout).
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_issued_at(issued_at: DateTime<Utc>) -> Credentials {
        Credentials {
            token: "jwt".to_string(),
            imprint: String::new(),
            issued_at,
        }
    }

    #[test]
    fn test_valid_inside_window() {
        let now = Utc::now();
        assert!(record_issued_at(now).is_valid_at(now));
        assert!(record_issued_at(now - Duration::hours(23)).is_valid_at(now));
        assert!(
            record_issued_at(now - Duration::milliseconds(86_399_999)).is_valid_at(now)
        );
    }

    #[test]
    fn test_invalid_at_exact_boundary() {
        let now = Utc::now();
        assert!(!record_issued_at(now - Duration::milliseconds(86_400_000)).is_valid_at(now));
        assert!(!record_issued_at(now - Duration::hours(25)).is_valid_at(now));
    }

    #[test]
    fn test_future_record_is_invalid() {
        let now = Utc::now();
        assert!(!record_issued_at(now + Duration::seconds(1)).is_valid_at(now));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));

        assert!(store.load().is_none());

        let mut credentials = Credentials::new("jwt".to_string());
        credentials.imprint = "openid".to_string();
        store.save(&credentials).unwrap();

        assert_eq!(store.load(), Some(credentials));

        store.clear().unwrap();
        assert!(store.load().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_store_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(CredentialStore::new(path).load().is_none());
    }

    #[test]
    fn test_wire_shape() {
        let credentials = Credentials::new("jwt".to_string());
        let json = serde_json::to_value(&credentials).unwrap();
        assert!(json.get("token").is_some());
        assert!(json.get("secondaryToken").is_some());
        assert!(json.get("issuedAt").is_some());
    }
}
