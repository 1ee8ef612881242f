//! Fact types — the fundamental unit of the tenet knowledge base.
//!
//! A fact is a discrete, versioned statement of engineering convention
//! ("use PostgreSQL"). Each fact carries a strictness grade, a semantic
//! version window in which it applies, dependency conditions on other
//! facts, and acceptance criteria that decide whether a piece of content
//! satisfies it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, version::VersionRange};

// ─── Strictness ──────────────────────────────────────────────────────────────

/// How mandatory a fact is. Variants are declared in ascending ordinal
/// order (informational < advisory < mandatory) so `Ord` is meaningful.
///
/// Some deployments spell the levels `STRICT`/`MODERATE`/`LENIENT`; the
/// serde aliases accept those on input while always emitting the primary
/// spelling.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strictness {
  #[serde(alias = "LENIENT")]
  Optional,
  #[serde(alias = "MODERATE")]
  Recommended,
  #[serde(alias = "STRICT")]
  Required,
}

// ─── Conditions ──────────────────────────────────────────────────────────────

/// The relation a condition expresses towards its target fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
  Requires,
  ConflictsWith,
}

/// A directed dependency edge from one fact to another, evaluated against
/// the target's `applicable` flag. The target id is not guaranteed to
/// resolve — deleting a fact leaves other facts' edges dangling, and the
/// resolver surfaces those rather than repairing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
  pub target_fact_id: String,
  pub relation:       ConditionKind,
}

// ─── Acceptance criteria ─────────────────────────────────────────────────────

/// How an acceptance criterion is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
  /// Surfaced to a human reviewer; never passes automatically.
  Manual,
  /// Checked by evaluating the criterion's validation script.
  Automated,
  /// Checked by a script that inspects a URL in the content.
  UrlCheck,
}

/// A named check that decides whether supplied content satisfies a fact.
/// Non-manual criteria must carry a non-empty `validation_script`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
  pub id:                String,
  pub description:       String,
  pub validation_type:   ValidationType,
  pub validation_script: Option<String>,
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// The default category catalog. Deployments may replace this wholesale
/// via [`CategorySet::new`]; adding a category never requires a rebuild.
pub const DEFAULT_CATEGORIES: &[&str] = &[
  // Architecture layers
  "FRONTEND",
  "BACKEND",
  "DATABASE",
  "FULL_STACK",
  // Development patterns
  "DESIGN_PATTERN",
  "ARCHITECTURE_PATTERN",
  "TESTING_PATTERN",
  // Code organization
  "NAMING_CONVENTION",
  "PROJECT_STRUCTURE",
  "CODE_STYLE",
  // Operations
  "DEPLOYMENT",
  "CI_CD",
  "MONITORING",
  "SECURITY",
  // Development process
  "GIT_WORKFLOW",
  "CODE_REVIEW",
  "DOCUMENTATION",
  // Dependencies
  "PACKAGE_MANAGEMENT",
  "VERSIONING",
  // Performance
  "OPTIMIZATION",
  "CACHING",
  // Cross-cutting
  "ACCESSIBILITY",
  "INTERNATIONALIZATION",
  "ERROR_HANDLING",
];

/// The closed set of categories a deployment accepts, fixed at store
/// construction. `required` controls whether fact validation reports a
/// missing category as an error.
#[derive(Debug, Clone)]
pub struct CategorySet {
  names:    BTreeSet<String>,
  required: bool,
}

impl CategorySet {
  pub fn new(
    names: impl IntoIterator<Item = impl Into<String>>,
    required: bool,
  ) -> Self {
    Self {
      names: names.into_iter().map(Into::into).collect(),
      required,
    }
  }

  pub fn contains(&self, name: &str) -> bool { self.names.contains(name) }

  pub fn is_required(&self) -> bool { self.required }

  /// Reject a category name that is not in the set. `None` always passes;
  /// whether a category must be present is a validation-time concern.
  pub fn check(&self, category: Option<&str>) -> Result<()> {
    match category {
      Some(name) if !self.contains(name) => {
        Err(Error::UnknownCategory(name.to_owned()))
      }
      _ => Ok(()),
    }
  }
}

impl Default for CategorySet {
  fn default() -> Self { Self::new(DEFAULT_CATEGORIES.iter().copied(), true) }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// A stored convention statement. Replaced wholesale by `put`; never
/// patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
  pub id:                  String,
  pub content:             String,
  /// Free-text classification tag; not enumerated.
  pub fact_type:           String,
  /// Closed-set classification, validated against the deployment's
  /// [`CategorySet`]. Optional in some deployments.
  pub category:            Option<String>,
  pub strictness:          Strictness,
  /// Inclusive lower bound of the applicability window.
  pub min_version:         String,
  /// Exclusive upper bound; `"*"` means unbounded above.
  pub max_version:         String,
  pub conditions:          Vec<Condition>,
  pub acceptance_criteria: Vec<AcceptanceCriterion>,
  /// Whether the fact is currently in force. Independent of the
  /// dependency graph; toggled only via the store, never recomputed.
  pub applicable:          bool,
  /// Optional embedding used for similarity search.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_embedding:   Option<Vec<f32>>,
  /// Set once at creation; preserved across replaces.
  pub created_at:          DateTime<Utc>,
  /// Refreshed on every replace.
  pub updated_at:          DateTime<Utc>,
}

// ─── NewFact ─────────────────────────────────────────────────────────────────

/// Input to [`crate::store::FactStore::put`] — the complete field set.
/// Timestamps and the `applicable` flag are managed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFact {
  pub id:                  String,
  pub content:             String,
  pub fact_type:           String,
  #[serde(default)]
  pub category:            Option<String>,
  pub strictness:          Strictness,
  pub min_version:         String,
  pub max_version:         String,
  #[serde(default)]
  pub conditions:          Vec<Condition>,
  #[serde(default)]
  pub acceptance_criteria: Vec<AcceptanceCriterion>,
  #[serde(default)]
  pub content_embedding:   Option<Vec<f32>>,
}

impl NewFact {
  /// Convenience constructor with no category, conditions, criteria, or
  /// embedding.
  pub fn new(
    id: impl Into<String>,
    content: impl Into<String>,
    fact_type: impl Into<String>,
    strictness: Strictness,
    min_version: impl Into<String>,
    max_version: impl Into<String>,
  ) -> Self {
    Self {
      id: id.into(),
      content: content.into(),
      fact_type: fact_type.into(),
      category: None,
      strictness,
      min_version: min_version.into(),
      max_version: max_version.into(),
      conditions: Vec::new(),
      acceptance_criteria: Vec::new(),
      content_embedding: None,
    }
  }

  /// Check the input against the deployment's category set before it is
  /// written. A failed check rejects the whole write; nothing is partially
  /// applied.
  pub fn validate(&self, categories: &CategorySet) -> Result<()> {
    if self.id.trim().is_empty() {
      return Err(Error::MissingField("id"));
    }
    if self.content.trim().is_empty() {
      return Err(Error::MissingField("content"));
    }
    if self.fact_type.trim().is_empty() {
      return Err(Error::MissingField("type"));
    }

    // Both bounds must parse; this also rejects a wildcard min_version.
    VersionRange::parse(&self.min_version, &self.max_version)?;

    categories.check(self.category.as_deref())?;

    let mut seen = BTreeSet::new();
    for criterion in &self.acceptance_criteria {
      if !seen.insert(criterion.id.as_str()) {
        return Err(Error::DuplicateCriterion(criterion.id.clone()));
      }
      let has_script = criterion
        .validation_script
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
      if criterion.validation_type != ValidationType::Manual && !has_script {
        return Err(Error::MissingScript(criterion.id.clone()));
      }
    }

    Ok(())
  }

  /// Build the stored record. `created_at` and `applicable` come from the
  /// previous record when this is a replace.
  pub fn into_fact(
    self,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    applicable: bool,
  ) -> Fact {
    Fact {
      id: self.id,
      content: self.content,
      fact_type: self.fact_type,
      category: self.category,
      strictness: self.strictness,
      min_version: self.min_version,
      max_version: self.max_version,
      conditions: self.conditions,
      acceptance_criteria: self.acceptance_criteria,
      applicable,
      content_embedding: self.content_embedding,
      created_at,
      updated_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn minimal() -> NewFact {
    NewFact::new(
      "use-postgres",
      "Use PostgreSQL for relational data",
      "database-choice",
      Strictness::Required,
      "1.0.0",
      "*",
    )
  }

  #[test]
  fn minimal_fact_validates() {
    minimal().validate(&CategorySet::default()).unwrap();
  }

  #[test]
  fn empty_required_fields_are_rejected() {
    let mut input = minimal();
    input.content = "  ".into();
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::MissingField("content")));

    let mut input = minimal();
    input.fact_type = String::new();
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::MissingField("type")));
  }

  #[test]
  fn unknown_category_is_rejected() {
    let mut input = minimal();
    input.category = Some("ASTROLOGY".into());
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::UnknownCategory(name) if name == "ASTROLOGY"));
  }

  #[test]
  fn custom_category_set_accepts_its_own_names() {
    let categories = CategorySet::new(["ASTROLOGY"], false);
    let mut input = minimal();
    input.category = Some("ASTROLOGY".into());
    input.validate(&categories).unwrap();
  }

  #[test]
  fn malformed_version_bound_is_rejected() {
    let mut input = minimal();
    input.min_version = "one.two".into();
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::MalformedVersion(_)));
  }

  #[test]
  fn automated_criterion_without_script_is_rejected() {
    let mut input = minimal();
    input.acceptance_criteria.push(AcceptanceCriterion {
      id:                "ac-1".into(),
      description:       "has content".into(),
      validation_type:   ValidationType::Automated,
      validation_script: Some("   ".into()),
    });
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::MissingScript(id) if id == "ac-1"));
  }

  #[test]
  fn duplicate_criterion_ids_are_rejected() {
    let mut input = minimal();
    for _ in 0..2 {
      input.acceptance_criteria.push(AcceptanceCriterion {
        id:                "ac-1".into(),
        description:       "manual check".into(),
        validation_type:   ValidationType::Manual,
        validation_script: None,
      });
    }
    let err = input.validate(&CategorySet::default()).unwrap_err();
    assert!(matches!(err, Error::DuplicateCriterion(id) if id == "ac-1"));
  }

  #[test]
  fn strictness_accepts_alternate_spelling() {
    let s: Strictness = serde_json::from_str("\"STRICT\"").unwrap();
    assert_eq!(s, Strictness::Required);
    let s: Strictness = serde_json::from_str("\"RECOMMENDED\"").unwrap();
    assert_eq!(s, Strictness::Recommended);
  }

  #[test]
  fn strictness_is_ordinal() {
    assert!(Strictness::Required > Strictness::Recommended);
    assert!(Strictness::Recommended > Strictness::Optional);
  }
}
