//! Error types for `tenet-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("fact not found: {0:?}")]
  FactNotFound(String),

  #[error("Missing required field: {0}")]
  MissingField(&'static str),

  #[error("malformed version: {0:?}")]
  MalformedVersion(String),

  #[error("unknown category: {0:?}")]
  UnknownCategory(String),

  /// A non-manual criterion was supplied without a validation script.
  #[error("Automated criterion {0} has no validation script")]
  MissingScript(String),

  #[error("duplicate acceptance criterion id: {0:?}")]
  DuplicateCriterion(String),

  /// A backend error surfaced through a validation helper.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error for propagation out of store-generic helpers.
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
