// Document Loading
//
// Reads plan and policy files. Both tolerate `//` and `/* */` comments and
// trailing commas, which are removed before the JSON is parsed.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use plangate_kernel::policy::PolicyDocument;
use plangate_kernel::tree::TreeValue;

pub fn load_plan(path: &Path) -> Result<TreeValue> {
    let text = read(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing plan {}", path.display()))?;
    Ok(TreeValue::from(value))
}

pub fn load_policy(path: &Path) -> Result<PolicyDocument> {
    let text = read(path)?;
    serde_json::from_str(&text).with_context(|| format!("parsing policy {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    debug!(path = %path.display(), bytes = raw.len(), "loaded document");
    Ok(strip_trailing_commas(&strip_comments(&raw)))
}

/// Remove line and block comments outside string literals. Line breaks
/// inside comments are kept so parse errors report the original line.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

/// Drop commas that directly precede `}` or `]` (ignoring whitespace),
/// outside string literals.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}
