//! Acceptance-criteria evaluation.
//!
//! One [`ValidationResult`] per input criterion, order preserved. A single
//! criterion's script failure never aborts the batch; a missing script on
//! a non-manual criterion is a configuration error and does.

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  fact::{AcceptanceCriterion, ValidationType},
  script::ScriptPredicate,
};

/// The outcome of evaluating one acceptance criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
  pub criterion_id: String,
  pub passed:       bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub message:      Option<String>,
}

/// Evaluate `content` against each criterion in order.
///
/// Manual criteria always fail with a fixed message — they exist to
/// surface a checklist item to a human reviewer, not to be satisfied
/// automatically. Non-manual criteria (automated and URL checks) run
/// their validation script through the restricted interpreter; parse and
/// evaluation failures are captured in the per-criterion result.
pub fn evaluate_criteria(
  content: &str,
  criteria: &[AcceptanceCriterion],
) -> Result<Vec<ValidationResult>> {
  let mut results = Vec::with_capacity(criteria.len());

  for criterion in criteria {
    if criterion.validation_type == ValidationType::Manual {
      results.push(ValidationResult {
        criterion_id: criterion.id.clone(),
        passed:       false,
        message:      Some("Manual validation required".into()),
      });
      continue;
    }

    let script = criterion
      .validation_script
      .as_deref()
      .filter(|s| !s.trim().is_empty())
      .ok_or_else(|| Error::MissingScript(criterion.id.clone()))?;

    // Each invocation is isolated: the predicate is re-parsed from the
    // stored text and holds no state between calls.
    let outcome =
      ScriptPredicate::parse(script).and_then(|p| p.invoke(content));

    results.push(match outcome {
      Ok(passed) => ValidationResult {
        criterion_id: criterion.id.clone(),
        passed,
        message: Some(
          if passed { "Validation passed" } else { "Validation failed" }
            .into(),
        ),
      },
      Err(e) => ValidationResult {
        criterion_id: criterion.id.clone(),
        passed:       false,
        message:      Some(format!("Validation error: {e}")),
      },
    });
  }

  Ok(results)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn manual(id: &str) -> AcceptanceCriterion {
    AcceptanceCriterion {
      id:                id.into(),
      description:       "reviewed by a human".into(),
      validation_type:   ValidationType::Manual,
      validation_script: None,
    }
  }

  fn automated(id: &str, script: &str) -> AcceptanceCriterion {
    AcceptanceCriterion {
      id:                id.into(),
      description:       "scripted check".into(),
      validation_type:   ValidationType::Automated,
      validation_script: Some(script.into()),
    }
  }

  #[test]
  fn manual_always_fails_with_fixed_message() {
    for content in ["", "anything at all"] {
      let results = evaluate_criteria(content, &[manual("m-1")]).unwrap();
      assert_eq!(results.len(), 1);
      assert!(!results[0].passed);
      assert_eq!(
        results[0].message.as_deref(),
        Some("Manual validation required")
      );
    }
  }

  #[test]
  fn automated_passes_and_fails_on_content() {
    let criteria = [automated(
      "a-1",
      "function ok(content){ return content.length > 0; }",
    )];

    let results = evaluate_criteria("non-empty", &criteria).unwrap();
    assert!(results[0].passed);
    assert_eq!(results[0].message.as_deref(), Some("Validation passed"));

    let results = evaluate_criteria("", &criteria).unwrap();
    assert!(!results[0].passed);
    assert_eq!(results[0].message.as_deref(), Some("Validation failed"));
  }

  #[test]
  fn missing_script_is_fatal() {
    let mut criterion = automated("a-1", "");
    criterion.validation_script = None;
    let err = evaluate_criteria("content", &[criterion]).unwrap_err();
    assert!(matches!(err, Error::MissingScript(id) if id == "a-1"));
  }

  #[test]
  fn broken_script_is_captured_not_fatal() {
    let criteria = [
      automated("a-1", "this is not a function"),
      automated("a-2", "function ok(c){ return c.length > 0; }"),
    ];
    let results = evaluate_criteria("content", &criteria).unwrap();
    assert_eq!(results.len(), 2);
    assert!(!results[0].passed);
    assert!(
      results[0]
        .message
        .as_deref()
        .unwrap()
        .starts_with("Validation error:")
    );
    // The batch continued past the broken criterion.
    assert!(results[1].passed);
  }

  #[test]
  fn results_preserve_input_order() {
    let criteria = [
      automated("first", "function a(c){ return true; }"),
      manual("second"),
      automated("third", "function b(c){ return false; }"),
    ];
    let results = evaluate_criteria("x", &criteria).unwrap();
    let ids: Vec<_> =
      results.iter().map(|r| r.criterion_id.as_str()).collect();
    assert_eq!(ids, ["first", "second", "third"]);
  }

  #[test]
  fn url_check_goes_through_the_script_path() {
    let criteria = [AcceptanceCriterion {
      id:                "u-1".into(),
      description:       "links to the handbook".into(),
      validation_type:   ValidationType::UrlCheck,
      validation_script: Some(
        "function hasLink(c){ return c.includes('https://'); }".into(),
      ),
    }];
    let results =
      evaluate_criteria("see https://handbook.example", &criteria).unwrap();
    assert!(results[0].passed);
  }
}
