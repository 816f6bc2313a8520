// Sensitive Value Masking
//
// Walks a value tree alongside its sensitivity tree and replaces every
// scalar flagged `true` with a fixed sentinel. Shape disagreements between
// the two trees mean "not sensitive" at that position.

use std::borrow::Cow;

use super::TreeValue;

/// Text that replaces every sensitive scalar.
pub const REDACTED: &str = "(sensitive value)";

/// Mask `value` using `sensitivity`.
///
/// Without a sensitivity tree the value is returned borrowed and untouched.
/// Otherwise a masked copy is returned; the input is never modified.
pub fn mask<'a>(value: &'a TreeValue, sensitivity: Option<&TreeValue>) -> Cow<'a, TreeValue> {
    match sensitivity {
        None => Cow::Borrowed(value),
        Some(sensitivity) => Cow::Owned(mask_node(value, Some(sensitivity))),
    }
}

/// A masked tree walked in step with the original it was masked from.
///
/// Masking never changes shape, so every position reachable in `shown` is
/// reachable in `original`. Output text comes from `shown`; keys and
/// conditions are read from `original`.
#[derive(Debug, Clone, Copy)]
pub struct Masked<'a> {
    pub shown: &'a TreeValue,
    pub original: &'a TreeValue,
}

impl<'a> Masked<'a> {
    /// A tree with nothing masked.
    pub fn plain(value: &'a TreeValue) -> Self {
        Self {
            shown: value,
            original: value,
        }
    }

    pub fn member(self, name: &str) -> Option<Masked<'a>> {
        let shown = self.shown.get(name)?;
        Some(Masked {
            shown,
            original: self.original.get(name).unwrap_or(shown),
        })
    }

    pub fn element(self, index: usize) -> Option<Masked<'a>> {
        let shown = self.shown.as_array()?.get(index)?;
        let original = self
            .original
            .as_array()
            .and_then(|items| items.get(index))
            .unwrap_or(shown);
        Some(Masked { shown, original })
    }

    pub fn element_count(self) -> usize {
        self.shown.as_array().map_or(0, <[TreeValue]>::len)
    }
}

fn mask_node(value: &TreeValue, sensitivity: Option<&TreeValue>) -> TreeValue {
    match (value, sensitivity) {
        (TreeValue::Object(members), Some(flags @ TreeValue::Object(_))) => TreeValue::Object(
            members
                .iter()
                .map(|(name, member)| (name.clone(), mask_node(member, flags.get(name))))
                .collect(),
        ),
        (TreeValue::Array(items), Some(TreeValue::Array(flags))) => TreeValue::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| mask_node(item, flags.get(index)))
                .collect(),
        ),
        (
            TreeValue::Bool(_) | TreeValue::Number(_) | TreeValue::String(_),
            Some(TreeValue::Bool(true)),
        ) => TreeValue::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> TreeValue {
        TreeValue::from(value)
    }

    #[test]
    fn absent_mask_borrows_input() {
        let value = tree(json!({"a": "secret"}));
        assert!(matches!(mask(&value, None), Cow::Borrowed(_)));
    }

    #[test]
    fn flagged_scalars_are_replaced() {
        let value = tree(json!({"a": "secret", "b": 1}));
        let flags = tree(json!({"a": true}));

        let masked = mask(&value, Some(&flags));
        assert_eq!(masked.get("a").unwrap().text(), REDACTED);
        assert_eq!(masked.get("b").unwrap().text(), "1");
        // original untouched
        assert_eq!(value.get("a").unwrap().text(), "secret");
    }

    #[test]
    fn arrays_match_by_position() {
        let value = tree(json!(["x", "y", "z"]));
        let flags = tree(json!([false, true]));

        let masked = mask(&value, Some(&flags));
        assert_eq!(masked.into_owned(), tree(json!(["x", REDACTED, "z"])));
    }

    #[test]
    fn containers_flagged_true_are_left_alone() {
        let value = tree(json!({"nested": {"k": "v"}}));
        let flags = tree(json!({"nested": true}));

        let masked = mask(&value, Some(&flags));
        assert_eq!(masked.into_owned(), value);
    }

    #[test]
    fn masked_pair_walks_both_trees() {
        let value = tree(json!({"list": [{"k": "secret"}], "open": 1}));
        let flags = tree(json!({"list": [{"k": true}]}));
        let shown = mask(&value, Some(&flags));

        let pair = Masked {
            shown: &shown,
            original: &value,
        };
        let k = pair
            .member("list")
            .and_then(|list| list.element(0))
            .and_then(|entry| entry.member("k"))
            .unwrap();
        assert_eq!(k.shown.text(), REDACTED);
        assert_eq!(k.original.text(), "secret");
        assert_eq!(pair.member("list").unwrap().element_count(), 1);
        assert!(pair.member("missing").is_none());
    }

    #[test]
    fn shape_mismatch_degrades_to_unmasked() {
        let value = tree(json!({"list": ["a"], "s": "plain"}));
        let flags = tree(json!({"list": {"0": true}, "s": "yes"}));

        let masked = mask(&value, Some(&flags));
        assert_eq!(masked.into_owned(), value);
    }
}
