// Address Paths
//
// Resolves addresses of the form `.name[0].other` against a tree.
//
//   path := ( '.' name | '[' digits ']' )*
//
// Indices are 0-based. One segment is consumed per step until the path is
// exhausted.

use super::TreeValue;

/// A single step of an address path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'p> {
    Member(&'p str),
    Index(usize),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path `{path}` not found: `{segment}` does not exist at `{at}`")]
    NotFound {
        path: String,
        at: String,
        segment: String,
    },

    #[error("invalid path `{path}` at offset {offset}: {reason}")]
    Syntax {
        path: String,
        offset: usize,
        reason: &'static str,
    },
}

/// Resolve `path` against `root`.
///
/// Descending into a null node, a missing member, a member whose value is
/// null, or an index outside the array all fail with `NotFound`.
pub fn resolve<'a>(root: &'a TreeValue, path: &str) -> Result<&'a TreeValue, PathError> {
    resolve_from(root, path, 0)
}

fn resolve_from<'a>(
    node: &'a TreeValue,
    path: &str,
    offset: usize,
) -> Result<&'a TreeValue, PathError> {
    if offset == path.len() {
        return Ok(node);
    }

    let (segment, next) = parse_segment(path, offset)?;
    let child = match (&segment, node) {
        (Segment::Member(name), TreeValue::Object(_)) => node.get(name),
        (Segment::Index(index), TreeValue::Array(items)) => items.get(*index),
        _ => None,
    };

    match child {
        Some(child) if !child.is_null() => resolve_from(child, path, next),
        _ => Err(PathError::NotFound {
            path: path.to_string(),
            at: path[..offset].to_string(),
            segment: path[offset..next].to_string(),
        }),
    }
}

/// Parse the segment starting at `offset`, returning it together with the
/// offset of the following segment.
fn parse_segment(path: &str, offset: usize) -> Result<(Segment<'_>, usize), PathError> {
    let rest = &path[offset..];
    let syntax = |at: usize, reason: &'static str| PathError::Syntax {
        path: path.to_string(),
        offset: at,
        reason,
    };

    if let Some(body) = rest.strip_prefix('.') {
        let len = body.find(&['.', '[', ']'][..]).unwrap_or(body.len());
        Ok((Segment::Member(&body[..len]), offset + 1 + len))
    } else if let Some(body) = rest.strip_prefix('[') {
        let close = body
            .find(']')
            .ok_or_else(|| syntax(offset, "unterminated index"))?;
        let digits = &body[..close];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(syntax(offset + 1, "index must be a non-negative integer"));
        }
        let index = digits
            .parse::<usize>()
            .map_err(|_| syntax(offset + 1, "index out of range"))?;
        Ok((Segment::Index(index), offset + 1 + close + 1))
    } else {
        Err(syntax(offset, "expected `.` or `[`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> TreeValue {
        TreeValue::from(json!({
            "tags": {"env": "prod"},
            "rules": [{"port": 80}, {"port": 443}, {"port": 8080}],
            "gone": null
        }))
    }

    #[test]
    fn empty_path_is_root() {
        let root = tree();
        assert_eq!(resolve(&root, "").unwrap(), &root);
    }

    #[test]
    fn resolves_members_and_indices() {
        let root = tree();
        assert_eq!(resolve(&root, ".tags.env").unwrap().text(), "prod");
        assert_eq!(resolve(&root, ".rules[0].port").unwrap().text(), "80");
        assert_eq!(resolve(&root, ".rules[2].port").unwrap().text(), "8080");
    }

    #[test]
    fn index_bounds_are_conventional() {
        let root = tree();
        assert!(resolve(&root, ".rules[1]").is_ok());
        let err = resolve(&root, ".rules[3]").unwrap_err();
        assert_eq!(
            err,
            PathError::NotFound {
                path: ".rules[3]".into(),
                at: ".rules".into(),
                segment: "[3]".into(),
            }
        );
    }

    #[test]
    fn missing_member_fails() {
        let root = tree();
        assert!(matches!(
            resolve(&root, ".tags.owner"),
            Err(PathError::NotFound { .. })
        ));
    }

    #[test]
    fn null_nodes_do_not_resolve() {
        let root = tree();
        assert!(resolve(&root, ".gone").is_err());
        assert!(resolve(&root, ".gone.deeper").is_err());
    }

    #[test]
    fn kind_mismatch_fails() {
        let root = tree();
        assert!(resolve(&root, ".tags[0]").is_err());
        assert!(resolve(&root, ".rules.port").is_err());
    }

    #[test]
    fn malformed_paths_are_syntax_errors() {
        let root = tree();
        assert!(matches!(
            resolve(&root, "tags"),
            Err(PathError::Syntax { offset: 0, .. })
        ));
        assert!(matches!(
            resolve(&root, ".rules[x]"),
            Err(PathError::Syntax { .. })
        ));
        assert!(matches!(
            resolve(&root, ".rules[1"),
            Err(PathError::Syntax { .. })
        ));
    }
}
