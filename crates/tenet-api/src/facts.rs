//! Handlers for `/facts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/facts` | Optional `fact_type`, `category`, `strictness`, `version` |
//! | `GET`    | `/facts/:id` | Single fact |
//! | `PUT`    | `/facts/:id` | Body: [`SetFactBody`]; creates or fully replaces |
//! | `DELETE` | `/facts/:id` | 204 on delete, 404 if absent |
//! | `POST`   | `/facts/:id/applicable` | Body: `{"applicable": bool}` |
//! | `POST`   | `/facts/:id/validate` | Body: `{"content": "..."}`; criterion results |
//! | `POST`   | `/facts/:id/check` | Body: `{"version": "..."}` (optional); full verdict |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tenet_core::{
  criteria::ValidationResult,
  fact::{AcceptanceCriterion, Condition, Fact, NewFact, Strictness},
  store::{FactFilter, FactStore},
  validate::{ValidationResponse, validate_against, validate_fact},
};

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// Structural and version filters accepted by `GET /facts`. Similarity
/// search needs an embedding vector in the body, so it lives on
/// `POST /search` instead.
#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub fact_type:  Option<String>,
  pub category:   Option<String>,
  pub strictness: Option<Strictness>,
  /// Only facts whose version window contains this version.
  pub version:    Option<String>,
}

/// `GET /facts[?fact_type=...][&category=...][&strictness=...][&version=...]`
pub async fn list<S: FactStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Fact>>, ApiError> {
  let filter = FactFilter {
    fact_type: params.fact_type,
    category: params.category,
    strictness: params.strictness,
    version: params.version,
    ..Default::default()
  };
  let facts = state
    .store
    .search(&filter)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(facts))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /facts/:id`
pub async fn get_one<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Fact>, ApiError> {
  let fact = state
    .store
    .get(&id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("fact '{id}' not found")))?;
  Ok(Json(fact))
}

// ─── Put ──────────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /facts/:id`. The fact id comes from the
/// path; everything else from the body.
#[derive(Debug, Deserialize)]
pub struct SetFactBody {
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

impl SetFactBody {
  pub fn into_new_fact(self, id: String) -> NewFact {
    NewFact {
      id,
      content: self.content,
      fact_type: self.fact_type,
      category: self.category,
      strictness: self.strictness,
      min_version: self.min_version,
      max_version: self.max_version,
      conditions: self.conditions,
      acceptance_criteria: self.acceptance_criteria,
      content_embedding: self.content_embedding,
    }
  }
}

/// `PUT /facts/:id` — creates or fully replaces; returns the stored fact.
pub async fn put_one<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
  Json(body): Json<SetFactBody>,
) -> Result<Json<Fact>, ApiError> {
  let fact = state
    .store
    .put(body.into_new_fact(id))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(fact))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /facts/:id`
pub async fn delete_one<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  let deleted = state
    .store
    .delete(&id)
    .await
    .map_err(ApiError::from_store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("fact '{id}' not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Applicable ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplicableBody {
  pub applicable: bool,
}

/// `POST /facts/:id/applicable` — body: `{"applicable": false}`.
pub async fn set_applicable<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
  Json(body): Json<ApplicableBody>,
) -> Result<impl IntoResponse, ApiError> {
  let updated = state
    .store
    .set_applicable(&id, body.applicable)
    .await
    .map_err(ApiError::from_store)?;
  if !updated {
    return Err(ApiError::NotFound(format!("fact '{id}' not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Validate content ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub content: String,
}

/// `POST /facts/:id/validate` — evaluate the fact's acceptance criteria
/// against the supplied content. Returns one result per criterion.
pub async fn validate_one<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
  Json(body): Json<ValidateBody>,
) -> Result<Json<Vec<ValidationResult>>, ApiError> {
  let results = validate_against(&*state.store, &id, &body.content).await?;
  Ok(Json(results))
}

// ─── Check ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct CheckBody {
  /// Target version; omit to skip the version compatibility check.
  pub version: Option<String>,
}

/// `POST /facts/:id/check` — full validation pass over the stored fact:
/// presence, version compatibility, conditions, acceptance criteria.
pub async fn check_one<S: FactStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<String>,
  Json(body): Json<CheckBody>,
) -> Result<Json<ValidationResponse>, ApiError> {
  let fact = state
    .store
    .get(&id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("fact '{id}' not found")))?;

  let response = validate_fact(
    &*state.store,
    &state.categories,
    &fact,
    body.version.as_deref(),
  )
  .await?;
  Ok(Json(response))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use tenet_core::{fact::CategorySet, memory::MemoryStore};

  use super::*;

  fn state() -> ApiState<MemoryStore> {
    let categories = CategorySet::default();
    ApiState {
      store: Arc::new(MemoryStore::new(categories.clone())),
      categories,
    }
  }

  fn body() -> SetFactBody {
    SetFactBody {
      content:             "Use PostgreSQL for relational data".into(),
      fact_type:           "database".into(),
      category:            Some("DATABASE".into()),
      strictness:          Strictness::Required,
      min_version:         "1.0.0".into(),
      max_version:         "2.0.0".into(),
      conditions:          Vec::new(),
      acceptance_criteria: Vec::new(),
      content_embedding:   None,
    }
  }

  #[tokio::test]
  async fn put_assigns_the_path_id() {
    let state = state();
    let Json(fact) =
      put_one(State(state.clone()), Path("use-postgres".into()), Json(body()))
        .await
        .unwrap();
    assert_eq!(fact.id, "use-postgres");

    let Json(fetched) =
      get_one(State(state), Path("use-postgres".into())).await.unwrap();
    assert_eq!(fetched, fact);
  }

  #[tokio::test]
  async fn get_missing_is_not_found() {
    let err = get_one(State(state()), Path("ghost".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
  }

  #[tokio::test]
  async fn delete_missing_is_not_found() {
    let err = delete_one(State(state()), Path("ghost".into()))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
  }

  #[tokio::test]
  async fn check_without_version_skips_the_version_gate() {
    let state = state();
    put_one(State(state.clone()), Path("f".into()), Json(body()))
      .await
      .unwrap();

    let Json(verdict) = check_one(
      State(state),
      Path("f".into()),
      Json(CheckBody::default()),
    )
    .await
    .unwrap();
    assert!(verdict.is_valid);
  }
}
