// Plan Entries
//
// Extracts resource entries from a parsed plan document by direct field
// access. Only the fields the decision engine reads are validated.

use std::fmt;

use serde::Serialize;

use crate::tree::TreeValue;

const CHANGES_FIELD: &str = "resource_changes";
const DRIFT_FIELD: &str = "resource_drift";

/// Which list of the plan an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Drift,
    Change,
}

impl Section {
    pub fn field(&self) -> &'static str {
        match self {
            Section::Drift => DRIFT_FIELD,
            Section::Change => CHANGES_FIELD,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Drift => f.write_str("drift"),
            Section::Change => f.write_str("change"),
        }
    }
}

/// A single action keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Read,
    Create,
    Update,
    Delete,
    /// Any keyword outside the known set.
    Other(String),
}

impl Action {
    pub fn parse(keyword: &str) -> Self {
        match keyword {
            "no-op" => Action::NoOp,
            "read" => Action::Read,
            "create" => Action::Create,
            "update" => Action::Update,
            "delete" => Action::Delete,
            other => Action::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::NoOp => "no-op",
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Other(other) => other,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Ordered, non-empty list of actions proposed for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionSet(Vec<Action>);

impl ActionSet {
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    pub fn is_exactly(&self, action: &Action) -> bool {
        self.0.len() == 1 && &self.0[0] == action
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.0.contains(action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.0.iter()
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// A proposed change or a detected drift for one resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry<'a> {
    pub section: Section,
    pub index: usize,
    pub address: &'a str,
    pub resource_type: &'a str,
    pub actions: ActionSet,
    pub before: Option<&'a TreeValue>,
    pub after: Option<&'a TreeValue>,
    pub before_sensitive: Option<&'a TreeValue>,
    pub after_sensitive: Option<&'a TreeValue>,
}

/// All entries of a plan, borrowed from the parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan<'a> {
    pub drift: Vec<ResourceEntry<'a>>,
    pub changes: Vec<ResourceEntry<'a>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan document is not an object")]
    NotAnObject,

    #[error("`{field}` is not an array")]
    SectionNotArray { field: &'static str },

    #[error("{section} entry {index}: missing `{field}`")]
    MissingField {
        section: Section,
        index: usize,
        field: &'static str,
    },

    #[error("{section} entry {index}: `{field}` must be {expected}")]
    WrongKind {
        section: Section,
        index: usize,
        field: &'static str,
        expected: &'static str,
    },
}

impl<'a> Plan<'a> {
    /// Extract drift and change entries. Missing lists are empty.
    pub fn from_tree(document: &'a TreeValue) -> Result<Self, PlanError> {
        if !matches!(document, TreeValue::Object(_)) {
            return Err(PlanError::NotAnObject);
        }

        Ok(Self {
            drift: entries(document, Section::Drift)?,
            changes: entries(document, Section::Change)?,
        })
    }

    /// Whether any proposed change deletes the resource at `address`.
    pub fn is_deleted(&self, address: &str) -> bool {
        self.changes
            .iter()
            .any(|change| change.address == address && change.actions.contains(&Action::Delete))
    }
}

fn entries(document: &TreeValue, section: Section) -> Result<Vec<ResourceEntry<'_>>, PlanError> {
    let items = match document.get(section.field()) {
        None | Some(TreeValue::Null) => return Ok(Vec::new()),
        Some(TreeValue::Array(items)) => items,
        Some(_) => {
            return Err(PlanError::SectionNotArray {
                field: section.field(),
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| EntryReader { section, index }.read(item))
        .collect()
}

struct EntryReader {
    section: Section,
    index: usize,
}

impl EntryReader {
    fn read<'a>(&self, item: &'a TreeValue) -> Result<ResourceEntry<'a>, PlanError> {
        if !matches!(item, TreeValue::Object(_)) {
            return Err(self.wrong_kind("entry", "an object"));
        }

        let address = self.string(item, "address")?;
        let resource_type = self.string(item, "type")?;
        let change = self.required(item, "change")?;
        if !matches!(change, TreeValue::Object(_)) {
            return Err(self.wrong_kind("change", "an object"));
        }

        let actions = match self.required(change, "actions")? {
            TreeValue::Array(items) if !items.is_empty() => items
                .iter()
                .map(|action| {
                    action
                        .as_str()
                        .map(Action::parse)
                        .ok_or_else(|| self.wrong_kind("actions", "an array of strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(self.wrong_kind("actions", "a non-empty array of strings")),
        };

        Ok(ResourceEntry {
            section: self.section,
            index: self.index,
            address,
            resource_type,
            actions: ActionSet::new(actions),
            before: optional(change, "before"),
            after: optional(change, "after"),
            before_sensitive: optional(change, "before_sensitive"),
            after_sensitive: optional(change, "after_sensitive"),
        })
    }

    fn required<'a>(
        &self,
        node: &'a TreeValue,
        field: &'static str,
    ) -> Result<&'a TreeValue, PlanError> {
        optional(node, field).ok_or(PlanError::MissingField {
            section: self.section,
            index: self.index,
            field,
        })
    }

    fn string<'a>(&self, node: &'a TreeValue, field: &'static str) -> Result<&'a str, PlanError> {
        self.required(node, field)?
            .as_str()
            .ok_or_else(|| self.wrong_kind(field, "a string"))
    }

    fn wrong_kind(&self, field: &'static str, expected: &'static str) -> PlanError {
        PlanError::WrongKind {
            section: self.section,
            index: self.index,
            field,
            expected,
        }
    }
}

fn optional<'a>(node: &'a TreeValue, field: &str) -> Option<&'a TreeValue> {
    node.get(field).filter(|value| !value.is_null())
}
