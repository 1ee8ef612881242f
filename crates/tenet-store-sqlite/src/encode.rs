//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enum discriminants are
//! stored as lowercase snake_case strings. Embeddings are stored as
//! compact JSON arrays.

use chrono::{DateTime, Utc};
use tenet_core::fact::{
  AcceptanceCriterion, Condition, ConditionKind, Fact, Strictness,
  ValidationType,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Strictness ──────────────────────────────────────────────────────────────

pub fn encode_strictness(s: Strictness) -> &'static str {
  match s {
    Strictness::Required => "required",
    Strictness::Recommended => "recommended",
    Strictness::Optional => "optional",
  }
}

pub fn decode_strictness(s: &str) -> Result<Strictness> {
  match s {
    "required" => Ok(Strictness::Required),
    "recommended" => Ok(Strictness::Recommended),
    "optional" => Ok(Strictness::Optional),
    other => Err(Error::Decode(format!("unknown strictness: {other:?}"))),
  }
}

// ─── ConditionKind ───────────────────────────────────────────────────────────

pub fn encode_condition_kind(k: ConditionKind) -> &'static str {
  match k {
    ConditionKind::Requires => "requires",
    ConditionKind::ConflictsWith => "conflicts_with",
  }
}

pub fn decode_condition_kind(s: &str) -> Result<ConditionKind> {
  match s {
    "requires" => Ok(ConditionKind::Requires),
    "conflicts_with" => Ok(ConditionKind::ConflictsWith),
    other => Err(Error::Decode(format!("unknown condition kind: {other:?}"))),
  }
}

// ─── ValidationType ──────────────────────────────────────────────────────────

pub fn encode_validation_type(t: ValidationType) -> &'static str {
  match t {
    ValidationType::Manual => "manual",
    ValidationType::Automated => "automated",
    ValidationType::UrlCheck => "url_check",
  }
}

pub fn decode_validation_type(s: &str) -> Result<ValidationType> {
  match s {
    "manual" => Ok(ValidationType::Manual),
    "automated" => Ok(ValidationType::Automated),
    "url_check" => Ok(ValidationType::UrlCheck),
    other => {
      Err(Error::Decode(format!("unknown validation type: {other:?}")))
    }
  }
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

pub fn encode_embedding(e: &[f32]) -> Result<String> {
  Ok(serde_json::to_string(e)?)
}

pub fn decode_embedding(s: &str) -> Result<Vec<f32>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `facts` row.
pub struct RawFact {
  pub fact_id:           String,
  pub content:           String,
  pub fact_type:         String,
  pub category:          Option<String>,
  pub strictness:        String,
  pub min_version:       String,
  pub max_version:       String,
  pub applicable:        bool,
  pub content_embedding: Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

/// Raw strings read from a `conditions` row, already ordered by position.
pub struct RawCondition {
  pub relation:       String,
  pub target_fact_id: String,
}

/// Raw strings read from an `acceptance_criteria` row, already ordered by
/// position.
pub struct RawCriterion {
  pub criterion_id:      String,
  pub description:       String,
  pub validation_type:   String,
  pub validation_script: Option<String>,
}

impl RawFact {
  pub fn into_fact(
    self,
    conditions: Vec<RawCondition>,
    criteria: Vec<RawCriterion>,
  ) -> Result<Fact> {
    let conditions = conditions
      .into_iter()
      .map(|raw| {
        Ok(Condition {
          target_fact_id: raw.target_fact_id,
          relation:       decode_condition_kind(&raw.relation)?,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let acceptance_criteria = criteria
      .into_iter()
      .map(|raw| {
        Ok(AcceptanceCriterion {
          id:                raw.criterion_id,
          description:       raw.description,
          validation_type:   decode_validation_type(&raw.validation_type)?,
          validation_script: raw.validation_script,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let content_embedding = self
      .content_embedding
      .as_deref()
      .map(decode_embedding)
      .transpose()?;

    Ok(Fact {
      id: self.fact_id,
      content: self.content,
      fact_type: self.fact_type,
      category: self.category,
      strictness: decode_strictness(&self.strictness)?,
      min_version: self.min_version,
      max_version: self.max_version,
      conditions,
      acceptance_criteria,
      applicable: self.applicable,
      content_embedding,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
