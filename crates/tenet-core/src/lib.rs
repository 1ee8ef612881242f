//! Core types and trait definitions for the tenet fact store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod criteria;
pub mod error;
pub mod fact;
pub mod memory;
pub mod script;
pub mod store;
pub mod validate;
pub mod version;

pub use error::{Error, Result};
