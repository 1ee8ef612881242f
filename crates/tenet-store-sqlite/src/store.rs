//! [`SqliteStore`] — the SQLite implementation of [`FactStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tenet_core::{
  fact::{CategorySet, Fact, NewFact},
  store::{FactFilter, FactStore, rank_by_similarity},
};

use crate::{
  Error, Result,
  encode::{
    RawCondition, RawCriterion, RawFact, decode_dt, encode_condition_kind,
    encode_dt, encode_embedding, encode_strictness, encode_validation_type,
  },
  schema::SCHEMA,
};

const FACT_COLUMNS: &str = "fact_id, content, fact_type, category, \
   strictness, min_version, max_version, applicable, content_embedding, \
   created_at, updated_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A tenet fact store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  categories: CategorySet,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(
    path: impl AsRef<Path>,
    categories: CategorySet,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, categories };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory database — useful for testing.
  pub async fn open_in_memory(categories: CategorySet) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, categories };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run inside connection closures) ────────────────────────────

fn raw_fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawFact> {
  Ok(RawFact {
    fact_id:           row.get(0)?,
    content:           row.get(1)?,
    fact_type:         row.get(2)?,
    category:          row.get(3)?,
    strictness:        row.get(4)?,
    min_version:       row.get(5)?,
    max_version:       row.get(6)?,
    applicable:        row.get(7)?,
    content_embedding: row.get(8)?,
    created_at:        row.get(9)?,
    updated_at:        row.get(10)?,
  })
}

/// Load a fact's owned children in declaration order.
fn load_children(
  conn: &rusqlite::Connection,
  fact_id: &str,
) -> rusqlite::Result<(Vec<RawCondition>, Vec<RawCriterion>)> {
  let mut stmt = conn.prepare(
    "SELECT relation, target_fact_id FROM conditions
     WHERE fact_id = ?1 ORDER BY position",
  )?;
  let conditions = stmt
    .query_map(rusqlite::params![fact_id], |row| {
      Ok(RawCondition {
        relation:       row.get(0)?,
        target_fact_id: row.get(1)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare(
    "SELECT criterion_id, description, validation_type, validation_script
     FROM acceptance_criteria WHERE fact_id = ?1 ORDER BY position",
  )?;
  let criteria = stmt
    .query_map(rusqlite::params![fact_id], |row| {
      Ok(RawCriterion {
        criterion_id:      row.get(0)?,
        description:       row.get(1)?,
        validation_type:   row.get(2)?,
        validation_script: row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok((conditions, criteria))
}

// ─── FactStore impl ──────────────────────────────────────────────────────────

impl FactStore for SqliteStore {
  type Error = Error;

  async fn put(&self, input: NewFact) -> Result<Fact> {
    input.validate(&self.categories)?;

    let now = Utc::now();
    let now_str = encode_dt(now);

    // Pre-encode every column value so the closure owns plain strings.
    let fact_id       = input.id.clone();
    let content       = input.content.clone();
    let fact_type     = input.fact_type.clone();
    let category      = input.category.clone();
    let strictness    = encode_strictness(input.strictness).to_owned();
    let min_version   = input.min_version.clone();
    let max_version   = input.max_version.clone();
    let embedding_str = input
      .content_embedding
      .as_deref()
      .map(encode_embedding)
      .transpose()?;
    let conditions: Vec<(String, String)> = input
      .conditions
      .iter()
      .map(|c| {
        (
          encode_condition_kind(c.relation).to_owned(),
          c.target_fact_id.clone(),
        )
      })
      .collect();
    let criteria: Vec<(String, String, String, Option<String>)> = input
      .acceptance_criteria
      .iter()
      .map(|c| {
        (
          c.id.clone(),
          c.description.clone(),
          encode_validation_type(c.validation_type).to_owned(),
          c.validation_script.clone(),
        )
      })
      .collect();

    let updated_at = now_str.clone();
    let (created_at_str, applicable) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing: Option<(String, bool)> = tx
          .query_row(
            "SELECT created_at, applicable FROM facts WHERE fact_id = ?1",
            rusqlite::params![fact_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;
        let (created_at, applicable) = match existing {
          Some(pair) => pair,
          None => (updated_at.clone(), true),
        };

        // Delete-then-insert replaces the record and, via ON DELETE
        // CASCADE, its children — no reader inside another transaction
        // can observe old conditions with new criteria.
        tx.execute(
          "DELETE FROM facts WHERE fact_id = ?1",
          rusqlite::params![fact_id],
        )?;
        tx.execute(
          "INSERT INTO facts (
             fact_id, content, fact_type, category, strictness,
             min_version, max_version, applicable, content_embedding,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            fact_id,
            content,
            fact_type,
            category,
            strictness,
            min_version,
            max_version,
            applicable,
            embedding_str,
            created_at,
            updated_at,
          ],
        )?;

        for (position, (relation, target)) in conditions.iter().enumerate() {
          tx.execute(
            "INSERT INTO conditions (fact_id, position, relation, target_fact_id)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![fact_id, position as i64, relation, target],
          )?;
        }
        for (position, (id, description, validation_type, script)) in
          criteria.iter().enumerate()
        {
          tx.execute(
            "INSERT INTO acceptance_criteria (
               fact_id, position, criterion_id, description,
               validation_type, validation_script
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              fact_id,
              position as i64,
              id,
              description,
              validation_type,
              script,
            ],
          )?;
        }

        tx.commit()?;
        Ok((created_at, applicable))
      })
      .await?;

    let created_at = decode_dt(&created_at_str)?;
    Ok(input.into_fact(created_at, now, applicable))
  }

  async fn get(&self, id: &str) -> Result<Option<Fact>> {
    let id_owned = id.to_owned();

    let raw = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT {FACT_COLUMNS} FROM facts WHERE fact_id = ?1");
        let fact: Option<RawFact> = conn
          .query_row(&sql, rusqlite::params![id_owned], raw_fact_from_row)
          .optional()?;

        match fact {
          None => Ok(None),
          Some(raw) => {
            let (conditions, criteria) = load_children(conn, &raw.fact_id)?;
            Ok(Some((raw, conditions, criteria)))
          }
        }
      })
      .await?;

    raw
      .map(|(fact, conditions, criteria)| fact.into_fact(conditions, criteria))
      .transpose()
  }

  async fn search(&self, filter: &FactFilter) -> Result<Vec<Fact>> {
    // Equality filters run in SQL; the version window and similarity
    // ranking go through the shared core helpers so the policy matches
    // the in-memory backend and the validation orchestrator exactly.
    let mut clauses: Vec<&'static str> = Vec::new();
    let mut values: Vec<String> = Vec::new();
    if let Some(t) = &filter.fact_type {
      clauses.push("fact_type = ?");
      values.push(t.clone());
    }
    if let Some(c) = &filter.category {
      clauses.push("category = ?");
      values.push(c.clone());
    }
    if let Some(s) = filter.strictness {
      clauses.push("strictness = ?");
      values.push(encode_strictness(s).to_owned());
    }
    let where_clause = if clauses.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", clauses.join(" AND "))
    };

    let raws = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {FACT_COLUMNS} FROM facts{where_clause} ORDER BY fact_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let facts = stmt
          .query_map(rusqlite::params_from_iter(values.iter()), raw_fact_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(facts.len());
        for raw in facts {
          let (conditions, criteria) = load_children(conn, &raw.fact_id)?;
          rows.push((raw, conditions, criteria));
        }
        Ok(rows)
      })
      .await?;

    let mut matched = Vec::new();
    for (raw, conditions, criteria) in raws {
      let fact = raw.into_fact(conditions, criteria)?;
      if !filter.matches_version(&fact)? {
        continue;
      }
      matched.push(fact);
    }

    Ok(rank_by_similarity(filter, matched))
  }

  async fn delete(&self, id: &str) -> Result<bool> {
    let id_owned = id.to_owned();
    let deleted = self
      .conn
      .call(move |conn| {
        // Children go with it via ON DELETE CASCADE; other facts'
        // conditions targeting this id are deliberately left dangling.
        let rows = conn.execute(
          "DELETE FROM facts WHERE fact_id = ?1",
          rusqlite::params![id_owned],
        )?;
        Ok(rows > 0)
      })
      .await?;
    Ok(deleted)
  }

  async fn set_applicable(&self, id: &str, applicable: bool) -> Result<bool> {
    let id_owned = id.to_owned();
    let now_str = encode_dt(Utc::now());
    let updated = self
      .conn
      .call(move |conn| {
        let rows = conn.execute(
          "UPDATE facts SET applicable = ?2, updated_at = ?3 WHERE fact_id = ?1",
          rusqlite::params![id_owned, applicable, now_str],
        )?;
        Ok(rows > 0)
      })
      .await?;
    Ok(updated)
  }
}
