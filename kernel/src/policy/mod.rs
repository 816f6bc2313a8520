// Policy Model
//
// Policy documents list what a plan may do, per category. Several
// documents merge by plain concatenation: no deduplication, no precedence.
// Every regex is compiled once, when the merged policy is built.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod matcher;
pub mod pattern;

pub use pattern::Pattern;

/// One of the five rule lists of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    #[serde(rename = "permittedCreates")]
    Creates,
    #[serde(rename = "permittedDeletes")]
    Deletes,
    #[serde(rename = "permittedUpdates")]
    Updates,
    #[serde(rename = "permittedDrifts")]
    Drifts,
    #[serde(rename = "permittedDriftDeletes")]
    DriftDeletes,
}

impl Category {
    pub fn field(&self) -> &'static str {
        match self {
            Category::Creates => "permittedCreates",
            Category::Deletes => "permittedDeletes",
            Category::Updates => "permittedUpdates",
            Category::Drifts => "permittedDrifts",
            Category::DriftDeletes => "permittedDriftDeletes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

// ----------------------------
// Document shape
// ----------------------------

/// A policy document as written on disk. Absent lists behave as empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub permitted_creates: Option<Vec<ElementSpec>>,
    pub permitted_deletes: Option<Vec<ElementSpec>>,
    pub permitted_updates: Option<Vec<UpdateElementSpec>>,
    pub permitted_drifts: Option<Vec<UpdateElementSpec>>,
    pub permitted_drift_deletes: Option<Vec<ElementSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    pub address_regex: String,
    pub type_regex: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateElementSpec {
    pub address_regex: String,
    pub type_regex: String,
    pub permitted_updates: Option<Vec<ItemSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub address_regex: String,
    pub before_regex: Option<String>,
    pub after_regex: Option<String>,
    pub when: Option<Vec<WhenSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhenSpec {
    pub address: String,
    pub before_regex: Option<String>,
    pub after_regex: Option<String>,
}

// ----------------------------
// Compiled policy
// ----------------------------

/// Gate selecting resources by address and type.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyElement {
    pub address: Pattern,
    pub resource_type: Pattern,
}

/// Gate plus the field rules that apply to gated resources.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateElement {
    pub gate: PolicyElement,
    pub items: Vec<PolicyItem>,
}

/// Field-level rule for one diffed address.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyItem {
    pub address: Pattern,
    pub before: Option<Pattern>,
    pub after: Option<Pattern>,
    pub when: Vec<PolicyItemWhen>,
}

/// Condition on another field of the same resource. `address` may refer to
/// capture groups of the item's address pattern as `$1`, `$2`, ...
#[derive(Debug, Clone, Serialize)]
pub struct PolicyItemWhen {
    pub address: String,
    pub before: Option<Pattern>,
    pub after: Option<Pattern>,
}

/// Anything carrying an address/type gate.
pub trait Gated {
    fn gate(&self) -> &PolicyElement;
}

impl Gated for PolicyElement {
    fn gate(&self) -> &PolicyElement {
        self
    }
}

impl Gated for UpdateElement {
    fn gate(&self) -> &PolicyElement {
        &self.gate
    }
}

/// The merged rule set used for one evaluation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub permitted_creates: Vec<PolicyElement>,
    pub permitted_deletes: Vec<PolicyElement>,
    pub permitted_updates: Vec<UpdateElement>,
    pub permitted_drifts: Vec<UpdateElement>,
    pub permitted_drift_deletes: Vec<PolicyElement>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error(
        "policy document {document}: {category}[{element}].{field}: invalid regex `{pattern}`: {source}"
    )]
    InvalidRegex {
        document: usize,
        category: Category,
        element: usize,
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl Policy {
    /// Merge documents in order and compile every pattern.
    ///
    /// Compilation is eager: an invalid regex fails the merge even when no
    /// entry of the plan would ever reach it, instead of failing at first
    /// use during evaluation.
    pub fn merge<I>(documents: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = PolicyDocument>,
    {
        let mut policy = Policy::default();

        for (document_index, document) in documents.into_iter().enumerate() {
            let at = |category, element| Compiler {
                document: document_index,
                category,
                element,
            };

            for (i, spec) in document.permitted_creates.unwrap_or_default().iter().enumerate() {
                let element = compile_element(&at(Category::Creates, i), spec)?;
                policy.permitted_creates.push(element);
            }
            for (i, spec) in document.permitted_deletes.unwrap_or_default().iter().enumerate() {
                let element = compile_element(&at(Category::Deletes, i), spec)?;
                policy.permitted_deletes.push(element);
            }
            for (i, spec) in document.permitted_updates.unwrap_or_default().into_iter().enumerate() {
                let element = compile_update(&at(Category::Updates, i), spec)?;
                policy.permitted_updates.push(element);
            }
            for (i, spec) in document.permitted_drifts.unwrap_or_default().into_iter().enumerate() {
                let element = compile_update(&at(Category::Drifts, i), spec)?;
                policy.permitted_drifts.push(element);
            }
            let drift_deletes = document.permitted_drift_deletes.unwrap_or_default();
            for (i, spec) in drift_deletes.iter().enumerate() {
                let element = compile_element(&at(Category::DriftDeletes, i), spec)?;
                policy.permitted_drift_deletes.push(element);
            }
        }

        Ok(policy)
    }

    pub fn is_empty(&self) -> bool {
        self.permitted_creates.is_empty()
            && self.permitted_deletes.is_empty()
            && self.permitted_updates.is_empty()
            && self.permitted_drifts.is_empty()
            && self.permitted_drift_deletes.is_empty()
    }
}

/// Compiles patterns of one element, tagging errors with its location.
struct Compiler {
    document: usize,
    category: Category,
    element: usize,
}

impl Compiler {
    fn pattern(&self, field: impl Into<String>, source: &str) -> Result<Pattern, PolicyError> {
        Pattern::new(source).map_err(|source_err| PolicyError::InvalidRegex {
            document: self.document,
            category: self.category,
            element: self.element,
            field: field.into(),
            pattern: source.to_string(),
            source: source_err,
        })
    }

    fn optional(
        &self,
        field: impl Into<String>,
        source: Option<&str>,
    ) -> Result<Option<Pattern>, PolicyError> {
        source.map(|source| self.pattern(field, source)).transpose()
    }
}

fn compile_element(compiler: &Compiler, spec: &ElementSpec) -> Result<PolicyElement, PolicyError> {
    gate(compiler, &spec.address_regex, &spec.type_regex)
}

fn gate(
    compiler: &Compiler,
    address: &str,
    resource_type: &str,
) -> Result<PolicyElement, PolicyError> {
    Ok(PolicyElement {
        address: compiler.pattern("addressRegex", address)?,
        resource_type: compiler.pattern("typeRegex", resource_type)?,
    })
}

fn compile_update(
    compiler: &Compiler,
    spec: UpdateElementSpec,
) -> Result<UpdateElement, PolicyError> {
    let gate = gate(compiler, &spec.address_regex, &spec.type_regex)?;

    let items = spec
        .permitted_updates
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, item)| compile_item(compiler, index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UpdateElement { gate, items })
}

fn compile_item(
    compiler: &Compiler,
    index: usize,
    spec: ItemSpec,
) -> Result<PolicyItem, PolicyError> {
    let prefix = format!("permittedUpdates[{index}]");
    let when = spec
        .when
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(w, when)| compile_when(compiler, &format!("{prefix}.when[{w}]"), when))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PolicyItem {
        address: compiler.pattern(format!("{prefix}.addressRegex"), &spec.address_regex)?,
        before: compiler.optional(
            format!("{prefix}.beforeRegex"),
            spec.before_regex.as_deref(),
        )?,
        after: compiler.optional(format!("{prefix}.afterRegex"), spec.after_regex.as_deref())?,
        when,
    })
}

fn compile_when(
    compiler: &Compiler,
    prefix: &str,
    spec: WhenSpec,
) -> Result<PolicyItemWhen, PolicyError> {
    Ok(PolicyItemWhen {
        before: compiler.optional(
            format!("{prefix}.beforeRegex"),
            spec.before_regex.as_deref(),
        )?,
        after: compiler.optional(format!("{prefix}.afterRegex"), spec.after_regex.as_deref())?,
        address: spec.address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> PolicyDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn absent_lists_are_empty() {
        let policy = Policy::merge([document("{}")]).unwrap();
        assert!(policy.is_empty());
    }

    #[test]
    fn documents_concatenate_in_order() {
        let first = document(
            r#"{"permittedCreates": [{"addressRegex": "a\\..*", "typeRegex": ".*"}]}"#,
        );
        let second = document(
            r#"{
                "permittedCreates": [{"addressRegex": "b\\..*", "typeRegex": ".*"}],
                "permittedDriftDeletes": [{"addressRegex": ".*", "typeRegex": "aws_.*"}]
            }"#,
        );

        let policy = Policy::merge([first, second]).unwrap();
        let creates: Vec<_> = policy
            .permitted_creates
            .iter()
            .map(|e| e.address.as_str())
            .collect();
        assert_eq!(creates, vec![r"a\..*", r"b\..*"]);
        assert_eq!(policy.permitted_drift_deletes.len(), 1);
    }

    #[test]
    fn nested_items_and_when_clauses_compile() {
        let doc = document(
            r#"{
                "permittedUpdates": [{
                    "addressRegex": ".*",
                    "typeRegex": "aws_security_group",
                    "permittedUpdates": [{
                        "addressRegex": "\\.ingress\\[(\\d+)\\]\\.description",
                        "afterRegex": ".*",
                        "when": [{"address": ".ingress[$1].from_port", "beforeRegex": "443"}]
                    }]
                }]
            }"#,
        );

        let policy = Policy::merge([doc]).unwrap();
        let item = &policy.permitted_updates[0].items[0];
        assert!(item.before.is_none());
        assert_eq!(item.when.len(), 1);
        assert_eq!(item.when[0].address, ".ingress[$1].from_port");
        assert!(item.when[0].after.is_none());
    }

    #[test]
    fn invalid_regex_names_its_location() {
        let doc = document(
            r#"{
                "permittedDrifts": [{
                    "addressRegex": ".*",
                    "typeRegex": ".*",
                    "permittedUpdates": [
                        {"addressRegex": ".ok"},
                        {"addressRegex": ".x", "afterRegex": "(open"}
                    ]
                }]
            }"#,
        );

        let err = Policy::merge([doc]).unwrap_err();
        let PolicyError::InvalidRegex {
            category, field, ..
        } = &err;
        assert_eq!(*category, Category::Drifts);
        assert_eq!(field, "permittedUpdates[1].afterRegex");
        assert!(err
            .to_string()
            .starts_with("policy document 0: permittedDrifts[0].permittedUpdates[1]"));
    }

    #[test]
    fn missing_required_regex_is_rejected() {
        let result: Result<PolicyDocument, _> =
            serde_json::from_str(r#"{"permittedCreates": [{"addressRegex": ".*"}]}"#);
        assert!(result.is_err());
    }
}
