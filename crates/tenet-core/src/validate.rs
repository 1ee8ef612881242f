//! Condition resolution and the validation orchestrator.
//!
//! Invalidity is a normal, fully-described result value: these functions
//! only `Err` on missing facts, malformed caller input, or backend
//! failures — never because a fact turned out to be invalid.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  criteria::{ValidationResult, evaluate_criteria},
  fact::{CategorySet, Condition, ConditionKind, Fact},
  store::FactStore,
  version::{Version, VersionRange},
};

// ─── ValidationResponse ──────────────────────────────────────────────────────

/// The fact-level verdict: valid iff no errors accumulated. Error order
/// is stable (presence, then version, then conditions, then criteria).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
  pub is_valid: bool,
  pub errors:   Vec<String>,
}

impl ValidationResponse {
  pub fn from_errors(errors: Vec<String>) -> Self {
    Self { is_valid: errors.is_empty(), errors }
  }
}

// ─── Condition resolution ────────────────────────────────────────────────────

/// Check each condition against the target fact's `applicable` flag, in
/// declaration order, collecting every error — a dangling reference does
/// not abort the pass.
///
/// Single-hop by design: no transitive walk of the dependency graph and
/// no cycle detection. A REQUIRES chain is validated one edge at a time,
/// by the caller validating each fact.
pub async fn resolve_conditions<S: FactStore>(
  store: &S,
  conditions: &[Condition],
) -> Result<ValidationResponse> {
  let mut errors = Vec::new();

  for condition in conditions {
    let target_id = &condition.target_fact_id;
    match store.get(target_id).await.map_err(Error::store)? {
      None => {
        errors.push(format!("Referenced fact '{target_id}' not found"));
      }
      Some(target) => match condition.relation {
        ConditionKind::Requires if !target.applicable => {
          errors
            .push(format!("Required fact '{target_id}' is not applicable"));
        }
        ConditionKind::ConflictsWith if target.applicable => {
          errors.push(format!(
            "Fact conflicts with active fact '{target_id}'"
          ));
        }
        _ => {}
      },
    }
  }

  Ok(ValidationResponse::from_errors(errors))
}

/// Resolve the conditions of a stored fact. A missing root fact is fatal
/// for this call, unlike a missing condition target.
pub async fn resolve<S: FactStore>(
  store: &S,
  fact_id: &str,
) -> Result<ValidationResponse> {
  let fact = store
    .get(fact_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::FactNotFound(fact_id.to_owned()))?;
  resolve_conditions(store, &fact.conditions).await
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Validate a fact, optionally against a target version. All checks run
/// and all errors accumulate; nothing short-circuits.
///
/// Checks, in order: required-field presence, version compatibility,
/// condition resolution, acceptance criteria against `fact.content`.
/// Manual criteria fold into the same failure path as automated ones, so
/// a fact carrying any manual criterion always reports invalid —
/// downstream callers depend on that.
pub async fn validate_fact<S: FactStore>(
  store: &S,
  categories: &CategorySet,
  fact: &Fact,
  version: Option<&str>,
) -> Result<ValidationResponse> {
  let mut errors = Vec::new();

  if fact.content.trim().is_empty() {
    errors.push("Missing required field: content".to_owned());
  }
  if categories.is_required() && fact.category.is_none() {
    errors.push("Missing required field: category".to_owned());
  }
  if fact.fact_type.trim().is_empty() {
    errors.push("Missing required field: type".to_owned());
  }

  if let Some(v) = version {
    let version = Version::parse(v)?;
    let range = VersionRange::parse(&fact.min_version, &fact.max_version)?;
    if !range.contains(version) {
      errors.push(match range.max {
        Some(max) => format!(
          "Version {version} is not compatible (requires >={} <{max})",
          range.min
        ),
        None => format!(
          "Version {version} is not compatible (requires >={})",
          range.min
        ),
      });
    }
  }

  let conditions = resolve_conditions(store, &fact.conditions).await?;
  errors.extend(conditions.errors);

  if !fact.acceptance_criteria.is_empty() {
    let results = evaluate_criteria(&fact.content, &fact.acceptance_criteria)?;
    for result in results {
      if !result.passed {
        errors.push(format!(
          "Acceptance criterion \"{}\" failed validation: {}",
          result.criterion_id,
          result.message.as_deref().unwrap_or("no details"),
        ));
      }
    }
  }

  Ok(ValidationResponse::from_errors(errors))
}

/// Evaluate a stored fact's acceptance criteria against supplied content
/// — the criterion-evaluation convenience entry point.
pub async fn validate_against<S: FactStore>(
  store: &S,
  fact_id: &str,
  content: &str,
) -> Result<Vec<ValidationResult>> {
  let fact = store
    .get(fact_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::FactNotFound(fact_id.to_owned()))?;
  evaluate_criteria(content, &fact.acceptance_criteria)
}
