// Rule Matching
//
// Decides whether a resource passes a gate and whether a single diff item
// is covered by a field rule. Field rules may carry `when` conditions that
// look up other fields of the before/after trees: matching reads the
// unmasked values, the recorded outcome carries the masked ones.

use regex::Captures;
use serde::Serialize;
use tracing::debug;

use super::pattern::accepts;
use super::{Gated, PolicyElement, PolicyItem, PolicyItemWhen};
use crate::diff::DiffItem;
use crate::tree::mask::Masked;
use crate::tree::path::{resolve, PathError};

/// Before or after side of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Before,
    After,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Before => f.write_str("before"),
            Side::After => f.write_str("after"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("`when` address `{address}` does not resolve in the {side} tree: {source}")]
    Unresolvable {
        address: String,
        side: Side,
        #[source]
        source: PathError,
    },
}

/// Record of one evaluated `when` condition. `before` and `after` are the
/// masked texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhenOutcome {
    pub address: String,
    pub before: String,
    pub after: String,
    pub before_regex: Option<String>,
    pub after_regex: Option<String>,
    pub matched: bool,
}

/// Result of matching one diff item against one field rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMatch {
    pub matched: bool,
    /// Conditions evaluated, in order, up to and including the first failure.
    pub when: Vec<WhenOutcome>,
}

/// Both the address and type patterns of the gate must match.
pub fn matches_element(address: &str, resource_type: &str, element: &PolicyElement) -> bool {
    element.address.is_match(address) && element.resource_type.is_match(resource_type)
}

/// Elements of `list` whose gate selects the resource.
pub fn gated<'p, T: Gated>(
    list: &'p [T],
    address: &'p str,
    resource_type: &'p str,
) -> impl Iterator<Item = &'p T> {
    list.iter()
        .filter(move |element| matches_element(address, resource_type, element.gate()))
}

/// Address, before and after patterns only. Returns the address captures on
/// success.
pub fn match_fields<'t>(item: &'t DiffItem, rule: &PolicyItem) -> Option<Captures<'t>> {
    let captures = rule.address.captures(&item.address)?;
    let covered =
        accepts(rule.before.as_ref(), &item.before) && accepts(rule.after.as_ref(), &item.after);
    covered.then_some(captures)
}

/// Full field-rule match, including `when` conditions.
///
/// Conditions are evaluated in order and stop at the first one that fails.
/// A condition address that does not resolve aborts with an error.
pub fn matches_item(
    item: &DiffItem,
    rule: &PolicyItem,
    before_root: Masked<'_>,
    after_root: Masked<'_>,
) -> Result<ItemMatch, MatchError> {
    let Some(captures) = match_fields(item, rule) else {
        return Ok(ItemMatch::default());
    };

    let mut outcomes = Vec::with_capacity(rule.when.len());
    for condition in &rule.when {
        let outcome = evaluate_when(condition, &captures, before_root, after_root)?;
        let matched = outcome.matched;
        outcomes.push(outcome);
        if !matched {
            return Ok(ItemMatch {
                matched: false,
                when: outcomes,
            });
        }
    }

    Ok(ItemMatch {
        matched: true,
        when: outcomes,
    })
}

fn evaluate_when(
    condition: &PolicyItemWhen,
    captures: &Captures<'_>,
    before_root: Masked<'_>,
    after_root: Masked<'_>,
) -> Result<WhenOutcome, MatchError> {
    let address = substitute_captures(&condition.address, captures);
    let (before, before_shown) = lookup(before_root, &address, Side::Before)?;
    let (after, after_shown) = lookup(after_root, &address, Side::After)?;

    let matched = accepts(condition.before.as_ref(), &before)
        && accepts(condition.after.as_ref(), &after);
    debug!(
        %address,
        before = %before_shown,
        after = %after_shown,
        matched,
        "evaluated when condition"
    );

    Ok(WhenOutcome {
        before_regex: condition.before.as_ref().map(|p| p.as_str().to_string()),
        after_regex: condition.after.as_ref().map(|p| p.as_str().to_string()),
        address,
        before: before_shown,
        after: after_shown,
        matched,
    })
}

/// Unmasked and masked text at `address`.
fn lookup(root: Masked<'_>, address: &str, side: Side) -> Result<(String, String), MatchError> {
    let unresolvable = |source| MatchError::Unresolvable {
        address: address.to_string(),
        side,
        source,
    };
    let original = resolve(root.original, address).map_err(unresolvable)?;
    let shown = resolve(root.shown, address).map_err(unresolvable)?;
    Ok((original.text(), shown.text()))
}

/// Replace `$1`, `$2`, ... in `template` with the text of the matching
/// capture group. Groups that did not participate, or do not exist, become
/// empty. A `$` not followed by a digit is kept as is.
pub fn substitute_captures(template: &str, captures: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            out.push('$');
        } else {
            let group = after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|n| captures.get(n));
            out.push_str(group.map_or("", |m| m.as_str()));
        }
        rest = &after[digits..];
    }
    out.push_str(rest);
    out
}
