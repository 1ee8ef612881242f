//! In-memory `FactStore` backend.
//!
//! The non-persistent deployment option, and the backend the validation
//! tests run against. A plain map behind an `RwLock`; the lock is never
//! held across an await, so single-record atomicity holds trivially.

use std::{
  collections::HashMap,
  sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::Utc;

use crate::{
  Error, Result,
  fact::{CategorySet, Fact, NewFact},
  store::{FactFilter, FactStore, rank_by_similarity},
};

/// A tenet fact store backed by an in-process map.
///
/// Cloning is cheap — the map is reference-counted and shared.
#[derive(Clone, Default)]
pub struct MemoryStore {
  facts:      Arc<RwLock<HashMap<String, Fact>>>,
  categories: CategorySet,
}

impl MemoryStore {
  /// An empty store accepting the given category set.
  pub fn new(categories: CategorySet) -> Self {
    Self {
      facts: Arc::default(),
      categories,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Fact>> {
    // Recover from a poisoned lock; the map itself is always consistent
    // because writers replace whole records.
    self.facts.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Fact>> {
    self.facts.write().unwrap_or_else(|e| e.into_inner())
  }
}

impl FactStore for MemoryStore {
  type Error = Error;

  async fn put(&self, input: NewFact) -> Result<Fact> {
    input.validate(&self.categories)?;

    let now = Utc::now();
    let mut facts = self.write();

    let (created_at, applicable) = match facts.get(&input.id) {
      Some(existing) => (existing.created_at, existing.applicable),
      None => (now, true),
    };

    let fact = input.into_fact(created_at, now, applicable);
    facts.insert(fact.id.clone(), fact.clone());
    Ok(fact)
  }

  async fn get(&self, id: &str) -> Result<Option<Fact>> {
    Ok(self.read().get(id).cloned())
  }

  async fn search(&self, filter: &FactFilter) -> Result<Vec<Fact>> {
    let facts = self.read();

    let mut matched = Vec::new();
    for fact in facts.values() {
      if !filter.matches_structural(fact) {
        continue;
      }
      if !filter.matches_version(fact)? {
        continue;
      }
      matched.push(fact.clone());
    }
    drop(facts);

    if filter.embedding.is_some() {
      return Ok(rank_by_similarity(filter, matched));
    }

    // The map has no insertion order; sort by id for a stable result.
    matched.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(matched)
  }

  async fn delete(&self, id: &str) -> Result<bool> {
    Ok(self.write().remove(id).is_some())
  }

  async fn set_applicable(&self, id: &str, applicable: bool) -> Result<bool> {
    let mut facts = self.write();
    match facts.get_mut(id) {
      Some(fact) => {
        fact.applicable = applicable;
        fact.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fact::Strictness;

  fn store() -> MemoryStore { MemoryStore::default() }

  fn fact(id: &str, fact_type: &str) -> NewFact {
    NewFact::new(
      id,
      format!("convention {id}"),
      fact_type,
      Strictness::Recommended,
      "1.0.0",
      "2.0.0",
    )
  }

  #[tokio::test]
  async fn put_then_get_round_trips() {
    let s = store();
    let stored = s.put(fact("use-postgres", "database")).await.unwrap();

    let fetched = s.get("use-postgres").await.unwrap().unwrap();
    assert_eq!(fetched, stored);
    assert!(fetched.applicable);
  }

  #[tokio::test]
  async fn get_missing_returns_none() {
    let s = store();
    assert!(s.get("nope").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn replace_preserves_created_at_and_advances_updated_at() {
    let s = store();
    let first = s.put(fact("f", "database")).await.unwrap();

    let mut replacement = fact("f", "storage");
    replacement.content = "revised statement".into();
    let second = s.put(replacement).await.unwrap();

    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.fact_type, "storage");
    assert_eq!(second.content, "revised statement");
  }

  #[tokio::test]
  async fn replace_preserves_applicable_flag() {
    let s = store();
    s.put(fact("f", "database")).await.unwrap();
    assert!(s.set_applicable("f", false).await.unwrap());

    s.put(fact("f", "database")).await.unwrap();
    let fetched = s.get("f").await.unwrap().unwrap();
    assert!(!fetched.applicable);
  }

  #[tokio::test]
  async fn replace_swaps_children_wholesale() {
    use crate::fact::{Condition, ConditionKind};

    let s = store();
    let mut input = fact("f", "database");
    input.conditions = vec![Condition {
      target_fact_id: "a".into(),
      relation:       ConditionKind::Requires,
    }];
    s.put(input).await.unwrap();

    let mut replacement = fact("f", "database");
    replacement.conditions = vec![Condition {
      target_fact_id: "b".into(),
      relation:       ConditionKind::ConflictsWith,
    }];
    s.put(replacement).await.unwrap();

    let fetched = s.get("f").await.unwrap().unwrap();
    assert_eq!(fetched.conditions.len(), 1);
    assert_eq!(fetched.conditions[0].target_fact_id, "b");
  }

  #[tokio::test]
  async fn invalid_input_is_rejected_without_side_effects() {
    let s = store();
    let mut input = fact("f", "database");
    input.content = String::new();
    assert!(s.put(input).await.is_err());
    assert!(s.get("f").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn search_by_type_returns_exact_subset() {
    let s = store();
    s.put(fact("a", "database")).await.unwrap();
    s.put(fact("b", "frontend")).await.unwrap();
    s.put(fact("c", "database")).await.unwrap();

    let filter = FactFilter {
      fact_type: Some("database".into()),
      ..Default::default()
    };
    let results = s.search(&filter).await.unwrap();
    let ids: Vec<_> = results.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
  }

  #[tokio::test]
  async fn empty_filter_returns_all_facts() {
    let s = store();
    s.put(fact("a", "database")).await.unwrap();
    s.put(fact("b", "frontend")).await.unwrap();

    let results = s.search(&FactFilter::default()).await.unwrap();
    assert_eq!(results.len(), 2);
  }

  #[tokio::test]
  async fn search_version_uses_the_range_matcher() {
    let s = store();
    // Window [1.0.0, 2.0.0); "1.10.0" is inside numerically but would be
    // rejected by a lexicographic comparison against "2.0.0"... and
    // accepted against "1.2.0", so assert both directions.
    let mut narrow = fact("narrow", "database");
    narrow.max_version = "1.2.0".into();
    s.put(narrow).await.unwrap();
    s.put(fact("wide", "database")).await.unwrap();

    let filter = FactFilter {
      version: Some("1.10.0".into()),
      ..Default::default()
    };
    let ids: Vec<_> = s
      .search(&filter)
      .await
      .unwrap()
      .into_iter()
      .map(|f| f.id)
      .collect();
    assert_eq!(ids, ["wide"]);
  }

  #[tokio::test]
  async fn search_with_malformed_version_errs() {
    let s = store();
    s.put(fact("a", "database")).await.unwrap();
    let filter = FactFilter {
      version: Some("latest".into()),
      ..Default::default()
    };
    assert!(matches!(
      s.search(&filter).await,
      Err(Error::MalformedVersion(_))
    ));
  }

  #[tokio::test]
  async fn similarity_search_ranks_and_cuts_off() {
    let s = store();
    for (id, embedding) in [
      ("close", vec![1.0_f32, 0.05]),
      ("closer", vec![1.0, 0.0]),
      ("far", vec![0.0, 1.0]),
      ("unembedded", vec![]),
    ] {
      let mut input = fact(id, "database");
      input.content_embedding =
        (!embedding.is_empty()).then_some(embedding);
      s.put(input).await.unwrap();
    }

    let filter = FactFilter {
      embedding: Some(vec![1.0, 0.0]),
      similarity_threshold: Some(0.9),
      ..Default::default()
    };
    let ids: Vec<_> = s
      .search(&filter)
      .await
      .unwrap()
      .into_iter()
      .map(|f| f.id)
      .collect();
    assert_eq!(ids, ["closer", "close"]);
  }

  #[tokio::test]
  async fn similarity_search_still_applies_structural_filters() {
    let s = store();
    for (id, fact_type) in [("a", "database"), ("b", "frontend")] {
      let mut input = fact(id, fact_type);
      input.content_embedding = Some(vec![1.0, 0.0]);
      s.put(input).await.unwrap();
    }

    let filter = FactFilter {
      fact_type: Some("frontend".into()),
      embedding: Some(vec![1.0, 0.0]),
      ..Default::default()
    };
    let results = s.search(&filter).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "b");
  }

  #[tokio::test]
  async fn delete_removes_fact_and_reports_absence() {
    let s = store();
    s.put(fact("f", "database")).await.unwrap();

    assert!(s.delete("f").await.unwrap());
    assert!(s.get("f").await.unwrap().is_none());
    assert!(s.search(&FactFilter::default()).await.unwrap().is_empty());
    assert!(!s.delete("f").await.unwrap());
  }

  #[tokio::test]
  async fn set_applicable_on_missing_fact_is_false() {
    let s = store();
    assert!(!s.set_applicable("nope", false).await.unwrap());
  }
}
