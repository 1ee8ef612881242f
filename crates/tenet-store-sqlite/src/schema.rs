//! SQL schema for the tenet SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS facts (
    fact_id           TEXT PRIMARY KEY,   -- caller-assigned, stable
    content           TEXT NOT NULL,
    fact_type         TEXT NOT NULL,
    category          TEXT,               -- NULL when the deployment skips categories
    strictness        TEXT NOT NULL,      -- 'required' | 'recommended' | 'optional'
    min_version       TEXT NOT NULL,
    max_version       TEXT NOT NULL,      -- '*' = unbounded above
    applicable        INTEGER NOT NULL DEFAULT 1,
    content_embedding TEXT,               -- JSON array of floats, or NULL
    created_at        TEXT NOT NULL,      -- ISO 8601 UTC; preserved on replace
    updated_at        TEXT NOT NULL
);

-- Owned children. Replaced wholesale on every put of the parent fact;
-- never patched row by row.
CREATE TABLE IF NOT EXISTS conditions (
    fact_id        TEXT    NOT NULL REFERENCES facts(fact_id) ON DELETE CASCADE,
    position       INTEGER NOT NULL,
    relation       TEXT    NOT NULL,   -- 'requires' | 'conflicts_with'
    target_fact_id TEXT    NOT NULL,   -- may dangle; surfaced at resolve time
    PRIMARY KEY (fact_id, position)
);

CREATE TABLE IF NOT EXISTS acceptance_criteria (
    fact_id           TEXT    NOT NULL REFERENCES facts(fact_id) ON DELETE CASCADE,
    position          INTEGER NOT NULL,
    criterion_id      TEXT    NOT NULL,
    description       TEXT    NOT NULL,
    validation_type   TEXT    NOT NULL,   -- 'manual' | 'automated' | 'url_check'
    validation_script TEXT,
    PRIMARY KEY (fact_id, position),
    UNIQUE (fact_id, criterion_id)
);

CREATE INDEX IF NOT EXISTS facts_type_idx       ON facts(fact_type);
CREATE INDEX IF NOT EXISTS facts_category_idx   ON facts(category);
CREATE INDEX IF NOT EXISTS facts_strictness_idx ON facts(strictness);

PRAGMA user_version = 1;
";
