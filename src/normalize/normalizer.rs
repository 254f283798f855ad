//! Per-kind normalization of raw records into tables.

use std::collections::HashMap;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::auth::Session;
use crate::gateway::types::{scalar_text, RecordSummary};
use crate::gateway::Backend;

use super::table::{ColumnSet, Table, IDENTITY_COLUMN};
use super::RecordKind;

/// Cell value standing in for a student whose score fetch failed.
const ERROR_MARKER: &str = "error";

/// Fixed column set of the roster/member dump.
const ROSTER_COLUMNS: [&str; 5] = [IDENTITY_COLUMN, "phone", "chat name", "avatar", "role"];

/// Role label for members without a teaching role.
const STUDENT_ROLE: &str = "student";

/// Turns raw records into normalized tables, fetching whatever
/// kind-specific data the record itself does not carry.
pub struct Normalizer<'a> {
    backend: &'a dyn Backend,
    class_map: &'a HashMap<String, String>,
}

impl<'a> Normalizer<'a> {
    /// Create a normalizer over the given backend and class-name map.
    #[must_use]
    pub fn new(backend: &'a dyn Backend, class_map: &'a HashMap<String, String>) -> Self {
        Self { backend, class_map }
    }

    /// Normalize one record, dispatching on its declared kind.
    ///
    /// Returns `Ok(None)` when the record is skipped (unsupported kind or
    /// structural malformation); sibling records are unaffected either
    /// way.
    pub async fn normalize(
        &self,
        session: &Session,
        record: &RecordSummary,
    ) -> Result<Option<Table>> {
        match RecordKind::from(record.kind) {
            RecordKind::RosterDump => {
                Ok(Some(self.roster_for_class(session, &record.cls).await?))
            }
            RecordKind::ScoreSheet => self.score_sheet(session, record).await,
            RecordKind::StudentInfoSheet => Ok(self.student_info_sheet(record)),
            RecordKind::Unsupported(discriminant) => {
                warn!(
                    kind = discriminant,
                    title = %record.title,
                    "unsupported record kind, skipping"
                );
                Ok(None)
            }
        }
    }

    /// Normalize the roster/member dump for one class.
    ///
    /// Also the unit of the "every class" batch mode, which runs this
    /// once per known class id.
    pub async fn roster_for_class(&self, session: &Session, cid: &str) -> Result<Table> {
        let members = self.backend.class_members(&session.token, cid).await?;
        let class_name = self.class_name(cid);
        debug!(class = %class_name, members = members.len(), "normalizing roster");

        let columns: Vec<String> = ROSTER_COLUMNS.iter().map(ToString::to_string).collect();
        let mut table = Table::new(columns, format!("{class_name} members"));

        // Teachers first, then students; relative order within each group
        // follows the backend, and every member's guardians come right
        // after the member itself.
        let teachers = members.iter().filter(|m| m.teaching_role().is_some());
        let students = members.iter().filter(|m| m.teaching_role().is_none());

        for member in teachers.chain(students) {
            let role = match member.teaching_role() {
                Some(subject) => format!("{subject} teacher"),
                None => STUDENT_ROLE.to_string(),
            };

            let mut row = HashMap::new();
            row.insert(IDENTITY_COLUMN.to_string(), member.name.clone());
            if let Some(phone) = &member.phone {
                row.insert("phone".to_string(), scalar_text(phone));
            }
            if let Some(wx_name) = &member.wx_name {
                row.insert("chat name".to_string(), wx_name.clone());
            }
            if let Some(avatar) = &member.avatar {
                row.insert("avatar".to_string(), avatar.clone());
            }
            row.insert("role".to_string(), role);
            table.push_row(row);

            for guardian in &member.parents {
                let mut row = HashMap::new();
                // Guardian rows carry no identity of their own; the role
                // label ties them back to the member.
                row.insert(IDENTITY_COLUMN.to_string(), String::new());
                if let Some(phone) = &guardian.phone {
                    row.insert("phone".to_string(), scalar_text(phone));
                }
                if let Some(wx_name) = &guardian.wx_name {
                    row.insert("chat name".to_string(), wx_name.clone());
                }
                if let Some(avatar) = &guardian.avatar {
                    row.insert("avatar".to_string(), avatar.clone());
                }
                row.insert("role".to_string(), format!("{}'s guardian", member.name));
                table.push_row(row);
            }
        }

        Ok(table)
    }

    /// Normalize a score sheet: roster order, one row per student, one
    /// column per subject in first-seen order.
    async fn score_sheet(
        &self,
        session: &Session,
        record: &RecordSummary,
    ) -> Result<Option<Table>> {
        let Some(score_id) = record.score.as_deref() else {
            warn!(title = %record.title, "score sheet carries no score id, skipping");
            return Ok(None);
        };

        let roster = self.backend.class_roster(&session.token, &record.cls).await?;
        debug!(title = %record.title, students = roster.len(), "fetching scores");

        let bar = ProgressBar::new(roster.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("[{bar:20}] {percent}% {msg}") {
            bar.set_style(style);
        }

        // Sequential on purpose: the bar stays accurate and the backend
        // sees one request at a time.
        let mut fetched = Vec::with_capacity(roster.len());
        for student in roster {
            bar.set_message(student.clone());
            let scores = match self
                .backend
                .student_score(&session.imprint, score_id, &student)
                .await
            {
                Ok(details) => Some(details),
                Err(err) => {
                    warn!(student = %student, error = %err, "score fetch failed");
                    None
                }
            };
            fetched.push((student, scores));
            bar.inc(1);
        }
        bar.finish_and_clear();

        // Columns are the order-preserving union of subjects from the
        // students that answered; failed students never contribute one.
        let mut subjects = ColumnSet::with_identity();
        for (_, scores) in &fetched {
            if let Some(details) = scores {
                for detail in details {
                    subjects.insert(&detail.subject);
                }
            }
        }
        let columns = subjects.into_columns();

        let stem = format!(
            "{}_{}_{}_{} students",
            record.title,
            self.class_name(&record.cls),
            record.creator_wx_name,
            fetched.len()
        );
        let mut table = Table::new(columns, stem);

        for (student, scores) in fetched {
            let mut row = HashMap::new();
            row.insert(IDENTITY_COLUMN.to_string(), student);
            match scores {
                Some(details) => {
                    for detail in details {
                        row.insert(detail.subject, scalar_text(&detail.score));
                    }
                }
                None => {
                    // Every subject cell reads as the error marker so the
                    // student is visibly present rather than dropped.
                    for column in table.columns.iter().skip(1) {
                        row.insert(column.clone(), ERROR_MARKER.to_string());
                    }
                }
            }
            table.push_row(row);
        }

        Ok(Some(table))
    }

    /// Normalize a student-info sheet from the detail attached to the
    /// record itself; no extra fetches.
    fn student_info_sheet(&self, record: &RecordSummary) -> Option<Table> {
        let (Some(heads), Some(student_infos)) = (&record.heads, &record.student_infos) else {
            warn!(
                title = %record.title,
                "student info sheet is missing its headers or detail, skipping"
            );
            return None;
        };

        let mut columns = Vec::with_capacity(heads.len() + 1);
        columns.push(IDENTITY_COLUMN.to_string());
        columns.extend(heads.iter().cloned());

        let stem = format!("{}_{}", record.title, self.class_name(&record.cls));
        let mut table = Table::new(columns, stem);

        for entry in student_infos {
            let mut row = HashMap::new();
            row.insert(IDENTITY_COLUMN.to_string(), entry.name.clone());
            // Positional alignment with the header list; a short info
            // list just leaves the trailing columns blank.
            for (head, cell) in heads.iter().zip(&entry.infos) {
                let value = cell.last_value.as_ref().map(scalar_text).unwrap_or_default();
                row.insert(head.clone(), value);
            }
            table.push_row(row);
        }

        Some(table)
    }

    fn class_name(&self, cid: &str) -> String {
        self.class_map
            .get(cid)
            .cloned()
            .unwrap_or_else(|| "unknown class".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::{
        ClassInfo, ClassMember, GuardianContact, InfoCell, QrTicket, ScoreEntry,
        StudentInfoEntry,
    };
    use crate::gateway::{GatewayError, LoginPoll};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixtureBackend;

    fn member(
        name: &str,
        identity: Option<&str>,
        guardians: usize,
    ) -> ClassMember {
        ClassMember {
            name: name.to_string(),
            phone: Some(json!("13800000000")),
            wx_name: Some(format!("{name}-wx")),
            avatar: Some("http://avatar".to_string()),
            identity: identity.map(ToString::to_string),
            parents: (0..guardians)
                .map(|i| GuardianContact {
                    phone: Some(json!(format!("1390000000{i}"))),
                    wx_name: Some(format!("{name}-guardian-{i}")),
                    avatar: None,
                })
                .collect(),
        }
    }

    #[async_trait]
    impl Backend for FixtureBackend {
        async fn qr_ticket(&self) -> Result<QrTicket, GatewayError> {
            unimplemented!()
        }

        async fn poll_login(&self, _nonce: &str) -> Result<LoginPoll, GatewayError> {
            unimplemented!()
        }

        async fn probe(&self, _token: &str) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn child_member_ids(&self, _token: &str) -> Result<Vec<String>, GatewayError> {
            unimplemented!()
        }

        async fn record_page(
            &self,
            _token: &str,
            _members: &[String],
            _page: u32,
            _size: u32,
        ) -> Result<Vec<RecordSummary>, GatewayError> {
            unimplemented!()
        }

        async fn classes_by_members(
            &self,
            _token: &str,
            _members: &[String],
        ) -> Result<Vec<ClassInfo>, GatewayError> {
            unimplemented!()
        }

        async fn class_roster(
            &self,
            _token: &str,
            _cid: &str,
        ) -> Result<Vec<String>, GatewayError> {
            Ok(vec![
                "alpha".to_string(),
                "beta".to_string(),
                "gamma".to_string(),
            ])
        }

        async fn class_members(
            &self,
            _token: &str,
            _cid: &str,
        ) -> Result<Vec<ClassMember>, GatewayError> {
            Ok(vec![
                member("Xiao Ming", None, 2),
                member("Ms. Wang", Some("Math"), 1),
            ])
        }

        async fn student_score(
            &self,
            imprint: &str,
            _score_id: &str,
            student: &str,
        ) -> Result<Vec<ScoreEntry>, GatewayError> {
            assert_eq!(imprint, "imprint-1");
            match student {
                "alpha" => Ok(vec![
                    ScoreEntry {
                        subject: "math".to_string(),
                        score: json!("90"),
                    },
                    ScoreEntry {
                        subject: "english".to_string(),
                        score: json!(80),
                    },
                ]),
                "beta" => Err(GatewayError::Api {
                    status: 500,
                    message: "boom".to_string(),
                }),
                _ => Ok(vec![
                    ScoreEntry {
                        subject: "math".to_string(),
                        score: json!("85"),
                    },
                    ScoreEntry {
                        subject: "physics".to_string(),
                        score: json!("70"),
                    },
                ]),
            }
        }
    }

    fn session() -> Session {
        Session {
            token: "jwt".to_string(),
            imprint: "imprint-1".to_string(),
        }
    }

    fn class_map() -> HashMap<String, String> {
        HashMap::from([("c1".to_string(), "Class One".to_string())])
    }

    fn score_record() -> RecordSummary {
        RecordSummary {
            kind: 4,
            cls: "c1".to_string(),
            title: "Midterm".to_string(),
            creator_wx_name: "Ms. Li".to_string(),
            creator_wx_openid: "openid-1".to_string(),
            score: Some("score-1".to_string()),
            heads: None,
            student_infos: None,
        }
    }

    #[tokio::test]
    async fn test_score_sheet_failed_student_kept_with_error_marker() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let table = normalizer
            .normalize(&session(), &score_record())
            .await
            .unwrap()
            .unwrap();

        // Union of subjects from the two answering students, first-seen
        // order; the failed student contributes no column.
        assert_eq!(table.columns, vec!["name", "math", "english", "physics"]);
        assert_eq!(table.rows.len(), 3);

        assert_eq!(table.cell(0, "name"), "alpha");
        assert_eq!(table.cell(0, "math"), "90");
        assert_eq!(table.cell(0, "english"), "80");
        assert_eq!(table.cell(0, "physics"), "");

        assert_eq!(table.cell(1, "name"), "beta");
        for subject in ["math", "english", "physics"] {
            assert_eq!(table.cell(1, subject), ERROR_MARKER);
        }

        assert_eq!(table.cell(2, "physics"), "70");
    }

    #[tokio::test]
    async fn test_score_sheet_is_idempotent() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let record = score_record();

        let first = normalizer.normalize(&session(), &record).await.unwrap();
        let second = normalizer.normalize(&session(), &record).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_score_sheet_without_score_id_is_rejected() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let record = RecordSummary {
            score: None,
            ..score_record()
        };

        assert!(normalizer.normalize(&session(), &record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roster_teachers_first_guardians_inline() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let table = normalizer.roster_for_class(&session(), "c1").await.unwrap();

        assert_eq!(
            table.columns,
            vec!["name", "phone", "chat name", "avatar", "role"]
        );
        // 1 teacher + 1 guardian + 1 student + 2 guardians.
        assert_eq!(table.rows.len(), 5);

        assert_eq!(table.cell(0, "name"), "Ms. Wang");
        assert_eq!(table.cell(0, "role"), "Math teacher");
        assert_eq!(table.cell(1, "name"), "");
        assert_eq!(table.cell(1, "role"), "Ms. Wang's guardian");
        assert_eq!(table.cell(2, "name"), "Xiao Ming");
        assert_eq!(table.cell(2, "role"), "student");
        assert_eq!(table.cell(3, "role"), "Xiao Ming's guardian");
        assert_eq!(table.cell(4, "role"), "Xiao Ming's guardian");
        assert_eq!(table.file_stem, "Class One members");
    }

    #[tokio::test]
    async fn test_student_info_sheet_positional_alignment() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let record = RecordSummary {
            kind: 15,
            score: None,
            heads: Some(vec![
                "height".to_string(),
                "weight".to_string(),
                "allergy".to_string(),
            ]),
            student_infos: Some(vec![
                StudentInfoEntry {
                    name: "alpha".to_string(),
                    infos: vec![
                        InfoCell {
                            last_value: Some(json!("140")),
                        },
                        InfoCell {
                            last_value: Some(json!(35)),
                        },
                        InfoCell { last_value: None },
                    ],
                },
                StudentInfoEntry {
                    name: "beta".to_string(),
                    // Shorter than the header list: trailing columns stay
                    // blank, no error.
                    infos: vec![InfoCell {
                        last_value: Some(json!("150")),
                    }],
                },
            ]),
            ..score_record()
        };

        let table = normalizer
            .normalize(&session(), &record)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(table.columns, vec!["name", "height", "weight", "allergy"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, "height"), "140");
        assert_eq!(table.cell(0, "weight"), "35");
        assert_eq!(table.cell(0, "allergy"), "");
        assert_eq!(table.cell(1, "height"), "150");
        assert_eq!(table.cell(1, "weight"), "");
    }

    #[tokio::test]
    async fn test_malformed_info_sheet_is_rejected() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let record = RecordSummary {
            kind: 15,
            heads: None,
            student_infos: None,
            ..score_record()
        };

        assert!(normalizer.normalize(&session(), &record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_skipped() {
        let map = class_map();
        let normalizer = Normalizer::new(&FixtureBackend, &map);
        let record = RecordSummary {
            kind: 7,
            ..score_record()
        };

        assert!(normalizer.normalize(&session(), &record).await.unwrap().is_none());
    }
}
