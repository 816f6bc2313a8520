// End-to-End Plan Check
//
// Runs the full pipeline over already-parsed documents:
// policy documents → merged policy → plan entries → evaluation report

use crate::evaluate::{evaluate_plan, EvaluateError, EvaluationReport};
use crate::plan::{Plan, PlanError};
use crate::policy::{Policy, PolicyDocument, PolicyError};
use crate::tree::TreeValue;

/// Errors that abort a check. No verdict is produced.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("policy rejected: {0}")]
    Policy(#[from] PolicyError),

    #[error("malformed plan: {0}")]
    Plan(#[from] PlanError),

    #[error("evaluation failed: {0}")]
    Evaluate(#[from] EvaluateError),
}

/// Check a plan document against one or more policy documents.
///
/// This function is:
/// - deterministic
/// - side-effect free
/// - stateless across calls
pub fn check_plan<I>(plan: &TreeValue, documents: I) -> Result<EvaluationReport, CheckError>
where
    I: IntoIterator<Item = PolicyDocument>,
{
    // 1. Merge and compile policy
    let policy = Policy::merge(documents)?;

    // 2. Extract entries
    let plan = Plan::from_tree(plan)?;

    // 3. Evaluate
    Ok(evaluate_plan(&plan, &policy)?)
}
