//! JSON REST API for tenet.
//!
//! Exposes an axum [`Router`] backed by any [`tenet_core::store::FactStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tenet_api::api_router(store.clone(), categories))
//! ```

pub mod error;
pub mod facts;
pub mod search;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tenet_core::{fact::CategorySet, store::FactStore};

pub use error::ApiError;

/// Shared handler state: the backend plus the deployment's category set,
/// which the full-validation endpoint needs alongside the store.
pub struct ApiState<S> {
  pub store:      Arc<S>,
  pub categories: CategorySet,
}

// Derived Clone would demand S: Clone; the Arc makes that unnecessary.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      categories: self.categories.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, categories: CategorySet) -> Router<()>
where
  S: FactStore + 'static,
{
  Router::new()
    // Facts
    .route("/facts", get(facts::list::<S>))
    .route(
      "/facts/{id}",
      get(facts::get_one::<S>)
        .put(facts::put_one::<S>)
        .delete(facts::delete_one::<S>),
    )
    .route("/facts/{id}/applicable", post(facts::set_applicable::<S>))
    // Validation
    .route("/facts/{id}/validate", post(facts::validate_one::<S>))
    .route("/facts/{id}/check", post(facts::check_one::<S>))
    // Search
    .route("/search", post(search::handler::<S>))
    .with_state(ApiState { store, categories })
}
