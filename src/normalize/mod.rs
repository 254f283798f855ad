//! Record classification and normalization.
//!
//! Every supported record kind is flattened into the same [`Table`]
//! model so the export sink never needs to know where the rows came
//! from.

mod normalizer;
mod table;

pub use normalizer::Normalizer;
pub use table::{ColumnSet, Table, IDENTITY_COLUMN};

/// Closed set of record kinds the backend can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Class roster/member dump.
    RosterDump,
    /// Score sheet with per-student subject scores.
    ScoreSheet,
    /// Student-info sheet with attached headers and detail.
    StudentInfoSheet,
    /// Anything else; skipped with a notice.
    Unsupported(i64),
}

impl From<i64> for RecordKind {
    fn from(discriminant: i64) -> Self {
        match discriminant {
            0 => Self::RosterDump,
            4 => Self::ScoreSheet,
            15 => Self::StudentInfoSheet,
            other => Self::Unsupported(other),
        }
    }
}

impl RecordKind {
    /// Short operator-facing label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::RosterDump => "roster",
            Self::ScoreSheet => "score sheet",
            Self::StudentInfoSheet => "student info sheet",
            Self::Unsupported(_) => "unsupported",
        }
    }
}
