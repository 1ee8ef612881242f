//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error. Domain errors surfaced by the store (for
  /// example an invalid `NewFact` rejected at put) are client mistakes,
  /// not server failures, so they map to 400 rather than 500. The core
  /// error may sit anywhere in the backend's source chain.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    use tenet_core::Error as Core;

    enum Kind {
      NotFound(String),
      BadRequest(String),
      Opaque,
    }

    let mut kind = Kind::Opaque;
    let mut current: Option<&dyn std::error::Error> = Some(&e);
    while let Some(err) = current {
      if let Some(core) = err.downcast_ref::<Core>() {
        kind = match core {
          Core::FactNotFound(_) => Kind::NotFound(core.to_string()),
          Core::MissingField(_)
          | Core::MalformedVersion(_)
          | Core::UnknownCategory(_)
          | Core::MissingScript(_)
          | Core::DuplicateCriterion(_) => Kind::BadRequest(core.to_string()),
          Core::Store(_) => Kind::Opaque,
        };
        break;
      }
      current = err.source();
    }

    match kind {
      Kind::NotFound(m) => ApiError::NotFound(m),
      Kind::BadRequest(m) => ApiError::BadRequest(m),
      Kind::Opaque => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<tenet_core::Error> for ApiError {
  fn from(e: tenet_core::Error) -> Self { ApiError::from_store(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_input_errors_map_to_bad_request() {
    let e = tenet_core::Error::MalformedVersion("latest".into());
    assert!(matches!(ApiError::from_store(e), ApiError::BadRequest(_)));

    let e = tenet_core::Error::MissingField("content");
    assert!(matches!(ApiError::from_store(e), ApiError::BadRequest(_)));
  }

  #[test]
  fn core_not_found_maps_to_not_found() {
    let e = tenet_core::Error::FactNotFound("ghost".into());
    assert!(matches!(ApiError::from_store(e), ApiError::NotFound(_)));
  }

  #[test]
  fn wrapped_core_errors_are_found_through_the_source_chain() {
    #[derive(Debug, thiserror::Error)]
    #[error("backend: {0}")]
    struct Wrapper(#[source] tenet_core::Error);

    let e = Wrapper(tenet_core::Error::UnknownCategory("NOPE".into()));
    assert!(matches!(ApiError::from_store(e), ApiError::BadRequest(_)));
  }

  #[test]
  fn opaque_errors_map_to_store() {
    let e = std::io::Error::other("disk on fire");
    assert!(matches!(ApiError::from_store(e), ApiError::Store(_)));
  }
}
