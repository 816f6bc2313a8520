// Evaluation Report
//
// Structured outcome of a plan evaluation: one record per entry plus the
// folded verdict. Rendering is left to callers.

use serde::Serialize;

use crate::diff::DiffItem;
use crate::plan::{ActionSet, Section};
use crate::policy::matcher::WhenOutcome;
use crate::policy::Category;

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Allowed,
    Denied,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allowed => f.write_str("Allowed"),
            Verdict::Denied => f.write_str("DENIED"),
        }
    }
}

/// Decision for one diff item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffVerdict {
    #[serde(flatten)]
    pub item: DiffItem,
    pub allowed: bool,
    /// `when` conditions evaluated while looking for a covering rule.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub when: Vec<WhenOutcome>,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// `no-op` or `read` change.
    Ignored,

    /// Drift on a resource that a change deletes.
    SkippedPendingDelete,

    /// Gate-only decision for creates, deletes and drift deletes.
    Existence { category: Category, allowed: bool },

    /// Update with no gated element at all.
    NoMatchingRule { category: Category },

    /// Field-by-field decision for updates and drift updates.
    Fields {
        category: Category,
        diffs: Vec<DiffVerdict>,
    },

    /// Action combination with no route.
    UnknownAction,
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        match self {
            Decision::Ignored | Decision::SkippedPendingDelete => false,
            Decision::Existence { allowed, .. } => !allowed,
            Decision::NoMatchingRule { .. } | Decision::UnknownAction => true,
            Decision::Fields { diffs, .. } => diffs.iter().any(|d| !d.allowed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub section: Section,
    pub index: usize,
    pub address: String,
    pub resource_type: String,
    pub actions: ActionSet,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationReport {
    pub entries: Vec<EntryReport>,
    pub verdict: Verdict,
}

impl EvaluationReport {
    pub fn denied(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| e.decision.is_denied())
    }
}
