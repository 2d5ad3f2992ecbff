//! JSON REST API for Popcorn.
//!
//! Exposes an axum [`Router`] backed by any [`popcorn_core::store::MovieStore`].
//! Authentication, TLS and transport concerns are the caller's responsibility;
//! the acting user is named by the [`actor::ACTOR_HEADER`] header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", popcorn_api::api_router(store.clone()))
//! ```

pub mod actor;
pub mod body;
pub mod contributions;
pub mod error;
pub mod etag;
pub mod movies;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use popcorn_core::store::MovieStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: MovieStore + 'static,
{
  Router::new()
    // Movies
    .route("/movies", post(movies::create::<S>))
    .route("/movies/{id}", get(movies::get_one::<S>))
    .route("/movies/{id}/status", post(movies::set_status::<S>))
    .route("/movies/{id}/fields/{kind}", get(movies::fields::<S>))
    .route("/movies/{id}/contributions", post(movies::contribute::<S>))
    .route("/movies/{id}/rating", post(movies::rate::<S>))
    .route(
      "/movies/{id}/favorite",
      put(movies::add_favorite::<S>).delete(movies::remove_favorite::<S>),
    )
    // Contributions
    .route("/contributions", get(contributions::list::<S>))
    .route("/contributions/{id}", put(contributions::revise::<S>))
    .route("/contributions/{id}/status", post(contributions::verify::<S>))
    .route("/contributions/{id}/{kind}", get(contributions::get_one::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
