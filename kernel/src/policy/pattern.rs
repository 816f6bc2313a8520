// Anchored Patterns
//
// Every regex in a policy must match the whole subject string, never a
// substring. Patterns are wrapped as `^(?:...)$` when compiled.
//
// Syntax is that of the `regex` crate: no lookaround and no
// backreferences. Policies using either are rejected when compiled.

use std::fmt;

use regex::{Captures, Regex};
use serde::{Serialize, Serializer};

/// A compiled, fully anchored policy regex.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.regex.captures(text)
    }

    /// The pattern as written in the policy document.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// Whether an optional pattern accepts `text`. A missing pattern accepts
/// everything.
pub fn accepts(pattern: Option<&Pattern>, text: &str) -> bool {
    pattern.map_or(true, |pattern| pattern.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_are_anchored() {
        let pattern = Pattern::new(".tags.env").unwrap();
        assert!(pattern.is_match(".tags.env"));
        assert!(!pattern.is_match(".tags.env.extra"));
        assert!(!pattern.is_match("x.tags.env"));
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let pattern = Pattern::new("dev|prod").unwrap();
        assert!(pattern.is_match("dev"));
        assert!(pattern.is_match("prod"));
        assert!(!pattern.is_match("devprod"));
        assert!(!pattern.is_match("production"));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(Pattern::new("(unclosed").is_err());
    }

    #[test]
    fn lookaround_and_backreferences_are_rejected() {
        assert!(Pattern::new(r"aws_(?!iam).*").is_err());
        assert!(Pattern::new(r"(a)\1").is_err());
    }

    #[test]
    fn keeps_source_text() {
        let pattern = Pattern::new(r"\.tags\.(.*)").unwrap();
        assert_eq!(pattern.as_str(), r"\.tags\.(.*)");
        assert_eq!(&pattern.captures(".tags.env").unwrap()[1], "env");
    }

    #[test]
    fn missing_pattern_accepts_anything() {
        assert!(accepts(None, "anything"));
        let pattern = Pattern::new("a+").unwrap();
        assert!(!accepts(Some(&pattern), "b"));
    }
}
