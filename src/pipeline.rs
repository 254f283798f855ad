//! Export pipeline - session, retrieval, selection, normalization,
//! export.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{CredentialStore, LoginPrompter, SessionManager};
use crate::export::SheetWriter;
use crate::gateway::types::RecordSummary;
use crate::gateway::Backend;
use crate::normalize::{Normalizer, RecordKind, Table};
use crate::pagination::drain_pages;

/// Configuration for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory workbooks are written to.
    pub output_dir: PathBuf,
    /// Credential cache file.
    pub credentials_path: PathBuf,
    /// Record-list page size.
    pub page_size: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            credentials_path: PathBuf::from(".credentials.json"),
            page_size: 20,
        }
    }
}

/// What the operator chose from the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Run the roster algorithm for every known class.
    AllClasses,
    /// Export one record (zero-based index into the record list).
    One(usize),
}

/// Chooses a record from the fetched list.
///
/// Implemented by the interactive menu and by the `--pick` flag so the
/// pipeline itself never touches the terminal.
pub trait RecordSelector {
    fn select(
        &self,
        records: &[RecordSummary],
        class_map: &HashMap<String, String>,
    ) -> Result<Selection>;
}

/// Selector preconfigured with the operator's 1-indexed choice; `0`
/// means every class.
pub struct PresetSelector(pub usize);

impl RecordSelector for PresetSelector {
    fn select(
        &self,
        _records: &[RecordSummary],
        _class_map: &HashMap<String, String>,
    ) -> Result<Selection> {
        match self.0 {
            0 => Ok(Selection::AllClasses),
            n => Ok(Selection::One(n - 1)),
        }
    }
}

/// Result of one export run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Tables written out.
    pub exported: usize,
    /// Records skipped (unsupported kind or malformed payload).
    pub skipped: usize,
    /// Per-item errors; the run keeps going past them.
    pub errors: Vec<String>,
    /// Paths of the written workbooks.
    pub paths: Vec<PathBuf>,
}

/// Pipeline orchestrator.
pub struct Exporter {
    config: ExportConfig,
    backend: Arc<dyn Backend>,
}

impl Exporter {
    /// Create an exporter over the given backend.
    #[must_use]
    pub fn new(config: ExportConfig, backend: Arc<dyn Backend>) -> Self {
        Self { config, backend }
    }

    /// Run the full pipeline once.
    pub async fn run(
        &self,
        prompter: &dyn LoginPrompter,
        selector: &dyn RecordSelector,
    ) -> Result<RunSummary> {
        let store = CredentialStore::new(self.config.credentials_path.clone());
        let mut manager = SessionManager::new(store);
        let mut session = manager.establish(self.backend.as_ref(), prompter).await?;

        let backend = self.backend.as_ref();
        let members = backend.child_member_ids(&session.token).await?;
        if members.is_empty() {
            bail!("no children are bound to this account");
        }

        let classes = backend.classes_by_members(&session.token, &members).await?;
        let class_map: HashMap<String, String> = classes
            .iter()
            .map(|class| (class.id.clone(), class.class_name.clone()))
            .collect();

        let token = session.token.clone();
        let size = self.config.page_size;
        let records =
            drain_pages(|page| backend.record_page(&token, &members, page, size)).await?;
        info!(
            records = records.len(),
            classes = classes.len(),
            "record list fetched"
        );

        let selection = selector.select(&records, &class_map)?;

        let normalizer = Normalizer::new(backend, &class_map);
        let writer = SheetWriter::new(self.config.output_dir.clone());
        let mut summary = RunSummary::default();

        match selection {
            Selection::AllClasses => {
                for class in &classes {
                    match normalizer.roster_for_class(&session, &class.id).await {
                        Ok(table) => Self::export(&writer, &table, &mut summary),
                        Err(err) => {
                            warn!(class = %class.class_name, error = %err, "roster export failed");
                            summary
                                .errors
                                .push(format!("{}: {err}", class.class_name));
                        }
                    }
                }
            }
            Selection::One(index) => {
                let Some(record) = records.get(index) else {
                    bail!("selection {} is out of range", index + 1);
                };

                // The score-detail endpoint authenticates with the sheet
                // creator's openid rather than the session token.
                if RecordKind::from(record.kind) == RecordKind::ScoreSheet
                    && !record.creator_wx_openid.is_empty()
                {
                    session.imprint = record.creator_wx_openid.clone();
                    manager.adopt_imprint(&record.creator_wx_openid);
                }

                match normalizer.normalize(&session, record).await {
                    Ok(Some(table)) => Self::export(&writer, &table, &mut summary),
                    Ok(None) => summary.skipped += 1,
                    Err(err) => {
                        warn!(title = %record.title, error = %err, "record export failed");
                        summary.errors.push(format!("{}: {err}", record.title));
                    }
                }
            }
        }

        Ok(summary)
    }

    fn export(writer: &SheetWriter, table: &Table, summary: &mut RunSummary) {
        match writer.write(table) {
            Ok(path) => {
                info!(path = %path.display(), rows = table.rows.len(), "exported");
                summary.exported += 1;
                summary.paths.push(path);
            }
            Err(err) => {
                warn!(stem = %table.file_stem, error = %err, "write failed");
                summary.errors.push(format!("{}: {err}", table.file_stem));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::{ClassInfo, ClassMember, QrTicket, ScoreEntry};
    use crate::gateway::{GatewayError, LoginPoll};
    use async_trait::async_trait;

    struct PipelineBackend;

    #[async_trait]
    impl Backend for PipelineBackend {
        async fn qr_ticket(&self) -> Result<QrTicket, GatewayError> {
            Ok(QrTicket {
                ticket: "t".to_string(),
                random: "r".to_string(),
            })
        }

        async fn poll_login(&self, _nonce: &str) -> Result<LoginPoll, GatewayError> {
            Ok(LoginPoll::Success("jwt".to_string()))
        }

        async fn probe(&self, _token: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn child_member_ids(&self, _token: &str) -> Result<Vec<String>, GatewayError> {
            Ok(vec!["m1".to_string()])
        }

        async fn record_page(
            &self,
            _token: &str,
            _members: &[String],
            page: u32,
            _size: u32,
        ) -> Result<Vec<RecordSummary>, GatewayError> {
            if page > 0 {
                return Ok(Vec::new());
            }
            Ok(vec![RecordSummary {
                kind: 99,
                cls: "c1".to_string(),
                title: "Mystery".to_string(),
                creator_wx_name: "X".to_string(),
                creator_wx_openid: "o".to_string(),
                score: None,
                heads: None,
                student_infos: None,
            }])
        }

        async fn classes_by_members(
            &self,
            _token: &str,
            _members: &[String],
        ) -> Result<Vec<ClassInfo>, GatewayError> {
            Ok(vec![ClassInfo {
                id: "c1".to_string(),
                class_name: "Class One".to_string(),
            }])
        }

        async fn class_roster(
            &self,
            _token: &str,
            _cid: &str,
        ) -> Result<Vec<String>, GatewayError> {
            Ok(Vec::new())
        }

        async fn class_members(
            &self,
            _token: &str,
            _cid: &str,
        ) -> Result<Vec<ClassMember>, GatewayError> {
            Ok(vec![ClassMember {
                name: "Solo".to_string(),
                phone: None,
                wx_name: None,
                avatar: None,
                identity: None,
                parents: Vec::new(),
            }])
        }

        async fn student_score(
            &self,
            _imprint: &str,
            _score_id: &str,
            _student: &str,
        ) -> Result<Vec<ScoreEntry>, GatewayError> {
            unimplemented!()
        }
    }

    struct SilentPrompter;

    impl LoginPrompter for SilentPrompter {
        fn present_qr(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn wait_for_advance(&self) -> Result<()> {
            Ok(())
        }

        fn notify_waiting(&self) {}
    }

    fn exporter(dir: &std::path::Path) -> Exporter {
        let config = ExportConfig {
            output_dir: dir.join("out"),
            credentials_path: dir.join("credentials.json"),
            page_size: 20,
        };
        Exporter::new(config, Arc::new(PipelineBackend))
    }

    #[tokio::test]
    async fn test_all_classes_exports_one_roster_per_class() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = exporter(dir.path());

        let summary = exporter
            .run(&SilentPrompter, &PresetSelector(0))
            .await
            .unwrap();

        assert_eq!(summary.exported, 1);
        assert!(summary.errors.is_empty());
        assert!(summary.paths[0].exists());
    }

    #[tokio::test]
    async fn test_unsupported_record_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = exporter(dir.path());

        let summary = exporter
            .run(&SilentPrompter, &PresetSelector(1))
            .await
            .unwrap();

        assert_eq!(summary.exported, 0);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_selection_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = exporter(dir.path());

        let err = exporter
            .run(&SilentPrompter, &PresetSelector(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
