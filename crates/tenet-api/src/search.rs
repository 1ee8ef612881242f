//! Handler for `POST /search`.
//!
//! Takes a full [`FactFilter`] as the JSON body — unlike `GET /facts`,
//! this surface accepts an embedding vector for similarity ranking.

use axum::{Json, extract::State};
use tenet_core::{
  fact::Fact,
  store::{FactFilter, FactStore},
};

use crate::{ApiState, error::ApiError};

/// `POST /search` — body: [`FactFilter`]. Structural and version filters
/// apply first; if an embedding is present the survivors are ranked by
/// descending cosine similarity above the threshold.
pub async fn handler<S: FactStore>(
  State(state): State<ApiState<S>>,
  Json(filter): Json<FactFilter>,
) -> Result<Json<Vec<Fact>>, ApiError> {
  let facts = state
    .store
    .search(&filter)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(facts))
}
