//! The `FactStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (the in-memory map in
//! [`crate::memory`] and the SQLite backend in `tenet-store-sqlite`).
//! Higher layers depend on this abstraction, not on any concrete backend,
//! so swapping persistence never touches validation logic.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  fact::{Fact, NewFact, Strictness},
  version::{Version, VersionRange},
};

/// Similarity cutoff applied when a filter carries an embedding but no
/// explicit threshold.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`FactStore::search`]. All provided fields are ANDed;
/// unfilled fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactFilter {
  /// Exact match on the free-text type tag.
  pub fact_type:            Option<String>,
  /// Exact match on the category name.
  pub category:             Option<String>,
  pub strictness:           Option<Strictness>,
  /// Only facts whose applicability window contains this version.
  pub version:              Option<String>,
  /// Extended mode: rank by cosine similarity against stored embeddings,
  /// descending, dropping records at or below the threshold. Structural
  /// filters still apply first.
  pub embedding:            Option<Vec<f32>>,
  pub similarity_threshold: Option<f32>,
}

impl FactFilter {
  /// The equality filters: type, category, strictness.
  pub fn matches_structural(&self, fact: &Fact) -> bool {
    if let Some(t) = &self.fact_type
      && fact.fact_type != *t
    {
      return false;
    }
    if let Some(c) = &self.category
      && fact.category.as_deref() != Some(c.as_str())
    {
      return false;
    }
    if let Some(s) = self.strictness
      && fact.strictness != s
    {
      return false;
    }
    true
  }

  /// The version filter, through the range matcher — the same policy the
  /// validation orchestrator applies. Errs on a malformed filter version
  /// or a malformed stored bound.
  pub fn matches_version(&self, fact: &Fact) -> Result<bool> {
    match &self.version {
      None => Ok(true),
      Some(v) => {
        let version = Version::parse(v)?;
        let range =
          VersionRange::parse(&fact.min_version, &fact.max_version)?;
        Ok(range.contains(version))
      }
    }
  }

  /// Similarity of a stored fact against the filter embedding, if both
  /// sides carry one.
  pub fn similarity(&self, fact: &Fact) -> Option<f32> {
    let query = self.embedding.as_deref()?;
    let stored = fact.content_embedding.as_deref()?;
    cosine_similarity(query, stored)
  }
}

/// Apply the extended similarity mode of a filter: drop facts without an
/// embedding or scoring at or below the threshold, order the rest by
/// descending similarity. A no-op when the filter carries no embedding.
///
/// Shared by every backend so ranking semantics cannot drift.
pub fn rank_by_similarity(filter: &FactFilter, facts: Vec<Fact>) -> Vec<Fact> {
  if filter.embedding.is_none() {
    return facts;
  }
  let threshold = filter
    .similarity_threshold
    .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

  let mut ranked: Vec<(f32, Fact)> = facts
    .into_iter()
    .filter_map(|fact| {
      let score = filter.similarity(&fact)?;
      (score > threshold).then_some((score, fact))
    })
    .collect();
  ranked.sort_by(|(a, _), (b, _)| b.total_cmp(a));
  ranked.into_iter().map(|(_, fact)| fact).collect()
}

/// Cosine similarity of two equal-length vectors; `None` on length
/// mismatch or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
  if a.len() != b.len() || a.is_empty() {
    return None;
  }
  let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
  let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if mag_a == 0.0 || mag_b == 0.0 {
    return None;
  }
  Some(dot / (mag_a * mag_b))
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a tenet storage backend.
///
/// A fact is created or fully replaced by [`put`](Self::put); children
/// (conditions, acceptance criteria) are replaced wholesale, never
/// patched. Backends must keep a single fact's replacement atomic: a
/// concurrent reader sees the old record or the new record in full, never
/// old conditions with new criteria.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait FactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create the fact if `input.id` is new, otherwise replace every field.
  /// `created_at` and `applicable` are preserved from the original record
  /// on replace; `updated_at` is regenerated. Rejects invalid input
  /// without applying anything.
  fn put(
    &self,
    input: NewFact,
  ) -> impl Future<Output = Result<Fact, Self::Error>> + Send + '_;

  /// Retrieve a fact by id. A miss is `None`, not an error.
  fn get<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Fact>, Self::Error>> + Send + 'a;

  /// Return all facts matching `filter`; see [`FactFilter`].
  fn search<'a>(
    &'a self,
    filter: &'a FactFilter,
  ) -> impl Future<Output = Result<Vec<Fact>, Self::Error>> + Send + 'a;

  /// Delete a fact and its own children. Returns `false` if absent.
  /// Other facts' conditions targeting this id are left dangling.
  fn delete<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Toggle a fact's in-force flag. Returns `false` if absent.
  fn set_applicable<'a>(
    &'a self,
    id: &'a str,
    applicable: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cosine_of_identical_vectors_is_one() {
    let v = [0.5_f32, 0.25, 0.1];
    let sim = cosine_similarity(&v, &v).unwrap();
    assert!((sim - 1.0).abs() < 1e-6);
  }

  #[test]
  fn cosine_of_orthogonal_vectors_is_zero() {
    let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
    assert!(sim.abs() < 1e-6);
  }

  #[test]
  fn cosine_rejects_mismatched_or_zero_vectors() {
    assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_none());
    assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    assert!(cosine_similarity(&[], &[]).is_none());
  }
}
