// Plan Evaluation
//
// Routes every drift and change entry by its action set, drives the differ
// and the rule matcher, and folds the per-entry decisions into a single
// verdict. Every entry is evaluated, even after a denial.

use std::borrow::Cow;

use tracing::{debug, info, info_span, warn};

use crate::diff::{diff_masked, DiffError, DiffItem};
use crate::plan::{Action, ActionSet, Plan, ResourceEntry, Section};
use crate::policy::matcher::{gated, match_fields, matches_item, MatchError};
use crate::policy::{Category, Gated, Policy, UpdateElement};
use crate::tree::mask::{mask, Masked};
use crate::tree::TreeValue;

pub mod report;

pub use report::{Decision, DiffVerdict, EntryReport, EvaluationReport, Verdict};

static ABSENT: TreeValue = TreeValue::Null;

/// How a drift entry is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftRoute {
    Update,
    Delete,
    Unknown,
}

/// How a change entry is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRoute {
    Ignore,
    Update,
    Create,
    Delete,
    Unknown,
}

/// Drift entries must carry exactly one of `update` or `delete`.
pub fn route_drift(actions: &ActionSet) -> DriftRoute {
    if actions.is_exactly(&Action::Update) {
        DriftRoute::Update
    } else if actions.is_exactly(&Action::Delete) {
        DriftRoute::Delete
    } else {
        DriftRoute::Unknown
    }
}

/// Change entries route on the most significant action they contain:
/// update, then create, then delete.
pub fn route_change(actions: &ActionSet) -> ChangeRoute {
    if actions.is_exactly(&Action::NoOp) || actions.is_exactly(&Action::Read) {
        ChangeRoute::Ignore
    } else if actions.contains(&Action::Update) {
        ChangeRoute::Update
    } else if actions.contains(&Action::Create) {
        ChangeRoute::Create
    } else if actions.contains(&Action::Delete) {
        ChangeRoute::Delete
    } else {
        ChangeRoute::Unknown
    }
}

/// Fatal failure while evaluating one entry.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Match(#[from] MatchError),
}

#[derive(Debug, thiserror::Error)]
#[error("{section} entry {index} (`{address}`): {source}")]
pub struct EvaluateError {
    pub section: Section,
    pub index: usize,
    pub address: String,
    #[source]
    pub source: EntryError,
}

/// Evaluate all drift entries, then all change entries.
pub fn evaluate_plan(plan: &Plan<'_>, policy: &Policy) -> Result<EvaluationReport, EvaluateError> {
    let mut entries = Vec::with_capacity(plan.drift.len() + plan.changes.len());
    let mut failed = false;

    for entry in plan.drift.iter().chain(&plan.changes) {
        let span = info_span!(
            "entry",
            section = %entry.section,
            index = entry.index,
            address = entry.address
        );
        let _guard = span.enter();

        let decision = match entry.section {
            Section::Drift => evaluate_drift(entry, plan, policy),
            Section::Change => evaluate_change(entry, policy),
        }
        .map_err(|source| EvaluateError {
            section: entry.section,
            index: entry.index,
            address: entry.address.to_string(),
            source,
        })?;

        if decision.is_denied() {
            warn!(resource_type = entry.resource_type, actions = %entry.actions, "entry denied");
            failed = true;
        } else {
            info!(resource_type = entry.resource_type, ?decision, "entry evaluated");
        }

        entries.push(EntryReport {
            section: entry.section,
            index: entry.index,
            address: entry.address.to_string(),
            resource_type: entry.resource_type.to_string(),
            actions: entry.actions.clone(),
            decision,
        });
    }

    let verdict = if failed {
        Verdict::Denied
    } else {
        Verdict::Allowed
    };
    info!(%verdict, entries = entries.len(), "plan evaluated");

    Ok(EvaluationReport { entries, verdict })
}

fn evaluate_drift(
    entry: &ResourceEntry<'_>,
    plan: &Plan<'_>,
    policy: &Policy,
) -> Result<Decision, EntryError> {
    match route_drift(&entry.actions) {
        DriftRoute::Update => {
            if plan.is_deleted(entry.address) {
                debug!("ignoring drift on resource being deleted");
                return Ok(Decision::SkippedPendingDelete);
            }

            let rules: Vec<_> = gated(&policy.permitted_drifts, entry.address, entry.resource_type)
                .flat_map(|element| &element.items)
                .collect();

            let sides = MaskedSides::of(entry);
            let diffs = sides
                .diff(entry.resource_type)?
                .into_iter()
                .map(|item| {
                    let allowed = rules.iter().any(|rule| match_fields(&item, rule).is_some());
                    log_diff(&item, allowed);
                    DiffVerdict {
                        item,
                        allowed,
                        when: Vec::new(),
                    }
                })
                .collect();

            Ok(Decision::Fields {
                category: Category::Drifts,
                diffs,
            })
        }
        DriftRoute::Delete => Ok(existence(
            Category::DriftDeletes,
            &policy.permitted_drift_deletes,
            entry,
        )),
        DriftRoute::Unknown => Ok(Decision::UnknownAction),
    }
}

fn evaluate_change(entry: &ResourceEntry<'_>, policy: &Policy) -> Result<Decision, EntryError> {
    match route_change(&entry.actions) {
        ChangeRoute::Ignore => Ok(Decision::Ignored),
        ChangeRoute::Update => evaluate_update(entry, &policy.permitted_updates),
        ChangeRoute::Create => Ok(existence(Category::Creates, &policy.permitted_creates, entry)),
        ChangeRoute::Delete => Ok(existence(Category::Deletes, &policy.permitted_deletes, entry)),
        ChangeRoute::Unknown => Ok(Decision::UnknownAction),
    }
}

fn evaluate_update(
    entry: &ResourceEntry<'_>,
    elements: &[UpdateElement],
) -> Result<Decision, EntryError> {
    let elements: Vec<_> = gated(elements, entry.address, entry.resource_type).collect();
    if elements.is_empty() {
        return Ok(Decision::NoMatchingRule {
            category: Category::Updates,
        });
    }

    let sides = MaskedSides::of(entry);
    let before_root = sides.before().unwrap_or(Masked::plain(&ABSENT));
    let after_root = sides.after().unwrap_or(Masked::plain(&ABSENT));

    let mut diffs = Vec::new();
    for item in sides.diff(entry.resource_type)? {
        let mut allowed = false;
        let mut when = Vec::new();
        for rule in elements.iter().flat_map(|element| &element.items) {
            let result = matches_item(&item, rule, before_root, after_root)?;
            when.extend(result.when);
            if result.matched {
                allowed = true;
                break;
            }
        }
        log_diff(&item, allowed);
        diffs.push(DiffVerdict {
            item,
            allowed,
            when,
        });
    }

    Ok(Decision::Fields {
        category: Category::Updates,
        diffs,
    })
}

/// Gate-only check: allowed iff any element of the category selects the
/// resource.
fn existence<T: Gated>(category: Category, list: &[T], entry: &ResourceEntry<'_>) -> Decision {
    let allowed = gated(list, entry.address, entry.resource_type).next().is_some();
    Decision::Existence { category, allowed }
}

/// Both sides of an entry, each masked with its own sensitivity tree and
/// kept next to its original.
struct MaskedSides<'a> {
    before: Option<(&'a TreeValue, Cow<'a, TreeValue>)>,
    after: Option<(&'a TreeValue, Cow<'a, TreeValue>)>,
}

impl<'a> MaskedSides<'a> {
    fn of(entry: &ResourceEntry<'a>) -> Self {
        Self {
            before: entry.before.map(|v| (v, mask(v, entry.before_sensitive))),
            after: entry.after.map(|v| (v, mask(v, entry.after_sensitive))),
        }
    }

    fn before(&self) -> Option<Masked<'_>> {
        pair(&self.before)
    }

    fn after(&self) -> Option<Masked<'_>> {
        pair(&self.after)
    }

    /// Diff from the root.
    fn diff(&self, resource_type: &str) -> Result<Vec<DiffItem>, DiffError> {
        diff_masked(resource_type, "", self.before(), self.after())
    }
}

fn pair<'s>(side: &'s Option<(&TreeValue, Cow<'_, TreeValue>)>) -> Option<Masked<'s>> {
    side.as_ref().map(|(original, shown)| Masked {
        shown: &**shown,
        original: *original,
    })
}

fn log_diff(item: &DiffItem, allowed: bool) {
    if allowed {
        debug!(address = %item.address, before = %item.before, after = %item.after, "diff allowed");
    } else {
        warn!(address = %item.address, before = %item.before, after = %item.after, "diff denied");
    }
}
