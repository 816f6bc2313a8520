// Structural Diff
//
// Recursively compares two trees and reports every leaf-level difference
// as an address plus before/after text. Equal subtrees produce nothing.
// Masked trees are walked in step with their originals: text comes from
// the masked side, collection keys from the original.

use serde::Serialize;

use crate::tree::mask::Masked;
use crate::tree::TreeValue;

/// Text used for an absent or null side of a difference.
pub const NULL_TEXT: &str = "NULL";

/// Resource type whose `.set` list is compared by element name.
const KEYED_RESOURCE_TYPE: &str = "helm_release";
const KEYED_PATH: &str = ".set";
const KEY_FIELD: &str = "name";

/// One leaf-level discrepancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffItem {
    pub address: String,
    pub before: String,
    pub after: String,
}

impl DiffItem {
    pub fn new(
        address: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            before: before.into(),
            after: after.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("element {index} of `{address}` has no scalar `name` field")]
    MissingKey { address: String, index: usize },
}

/// Diff `before` against `after`, starting at `base_path`.
///
/// Absent and null sides are equivalent. Each call performs a fresh
/// traversal.
pub fn diff(
    resource_type: &str,
    base_path: &str,
    before: Option<&TreeValue>,
    after: Option<&TreeValue>,
) -> Result<Vec<DiffItem>, DiffError> {
    diff_masked(
        resource_type,
        base_path,
        before.map(Masked::plain),
        after.map(Masked::plain),
    )
}

/// Diff two masked trees. Keyed collections group on the unmasked key, so
/// masking a `name` does not turn a reorder into a change.
pub fn diff_masked(
    resource_type: &str,
    base_path: &str,
    before: Option<Masked<'_>>,
    after: Option<Masked<'_>>,
) -> Result<Vec<DiffItem>, DiffError> {
    let mut items = Vec::new();
    Differ {
        resource_type,
        items: &mut items,
    }
    .walk(base_path, before, after)?;
    Ok(items)
}

struct Differ<'r, 'o> {
    resource_type: &'r str,
    items: &'o mut Vec<DiffItem>,
}

impl Differ<'_, '_> {
    fn walk(
        &mut self,
        address: &str,
        before: Option<Masked<'_>>,
        after: Option<Masked<'_>>,
    ) -> Result<(), DiffError> {
        let before = before.filter(|v| !v.shown.is_null());
        let after = after.filter(|v| !v.shown.is_null());

        let (before, after) = match (before, after) {
            (None, None) => return Ok(()),
            (None, Some(after)) => {
                self.emit(address, NULL_TEXT, after.shown.text());
                return Ok(());
            }
            (Some(before), None) => {
                self.emit(address, before.shown.text(), NULL_TEXT);
                return Ok(());
            }
            (Some(before), Some(after)) if before.shown.kind() != after.shown.kind() => {
                self.emit(address, before.shown.kind().name(), after.shown.kind().name());
                return Ok(());
            }
            (Some(before), Some(after)) => (before, after),
        };

        match (before.shown, after.shown) {
            (TreeValue::Array(_), TreeValue::Array(_))
                if self.resource_type == KEYED_RESOURCE_TYPE && address == KEYED_PATH =>
            {
                self.walk_keyed(address, before, after)
            }
            (TreeValue::Array(left), TreeValue::Array(right)) => {
                for index in 0..left.len().max(right.len()) {
                    self.walk(
                        &format!("{address}[{}]", index + 1),
                        before.element(index),
                        after.element(index),
                    )?;
                }
                Ok(())
            }
            (TreeValue::Object(left), TreeValue::Object(right)) => {
                let only_right = right
                    .iter()
                    .filter(|(name, _)| before.shown.get(name).is_none())
                    .map(|(name, _)| name.as_str());
                let names = left.iter().map(|(name, _)| name.as_str()).chain(only_right);
                for name in names {
                    self.walk(
                        &format!("{address}.{name}"),
                        before.member(name),
                        after.member(name),
                    )?;
                }
                Ok(())
            }
            (before, after) => {
                let (before, after) = (before.text(), after.text());
                if before != after {
                    self.emit(address, before, after);
                }
                Ok(())
            }
        }
    }

    /// Pair list elements by their `name` field, then by position within
    /// each name, so that reordering alone yields no difference.
    fn walk_keyed(
        &mut self,
        address: &str,
        before: Masked<'_>,
        after: Masked<'_>,
    ) -> Result<(), DiffError> {
        let left = group_by_key(address, before)?;
        let right = group_by_key(address, after)?;

        let mut keys: Vec<(&str, &str)> = left
            .iter()
            .map(|group| (group.key.as_str(), group.label.as_str()))
            .collect();
        for group in &right {
            if !keys.iter().any(|(key, _)| *key == group.key) {
                keys.push((group.key.as_str(), group.label.as_str()));
            }
        }

        for (key, label) in keys {
            let before = lookup_group(&left, key).unwrap_or(&[]);
            let after = lookup_group(&right, key).unwrap_or(&[]);
            for index in 0..before.len().max(after.len()) {
                self.walk(
                    &format!("{address}[{label}][{index}]"),
                    before.get(index).copied(),
                    after.get(index).copied(),
                )?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, address: &str, before: impl Into<String>, after: impl Into<String>) {
        self.items.push(DiffItem::new(address, before, after));
    }
}

/// Elements sharing one key. `label` is the key as it appears in output,
/// which is the masked text when the name itself is sensitive.
struct Group<'a> {
    key: String,
    label: String,
    members: Vec<Masked<'a>>,
}

/// Stable grouping by unmasked key, in first-encounter order.
fn group_by_key<'a>(address: &str, list: Masked<'a>) -> Result<Vec<Group<'a>>, DiffError> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    for index in 0..list.element_count() {
        let Some(item) = list.element(index) else {
            continue;
        };
        let key = key_text(item.original).ok_or_else(|| DiffError::MissingKey {
            address: address.to_string(),
            index,
        })?;
        match groups.iter_mut().find(|group| group.key == key) {
            Some(group) => group.members.push(item),
            None => groups.push(Group {
                label: key_text(item.shown).unwrap_or_else(|| key.clone()),
                key,
                members: vec![item],
            }),
        }
    }
    Ok(groups)
}

fn key_text(item: &TreeValue) -> Option<String> {
    match item.get(KEY_FIELD) {
        Some(key @ (TreeValue::String(_) | TreeValue::Number(_) | TreeValue::Bool(_))) => {
            Some(key.text())
        }
        _ => None,
    }
}

fn lookup_group<'g, 'a>(groups: &'g [Group<'a>], key: &str) -> Option<&'g [Masked<'a>]> {
    groups
        .iter()
        .find(|group| group.key == key)
        .map(|group| group.members.as_slice())
}
