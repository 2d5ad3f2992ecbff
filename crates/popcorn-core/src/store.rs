//! The `MovieStore` trait.
//!
//! Implemented by storage backends (e.g. `popcorn-store-sqlite`). The API
//! layer depends on this abstraction, not on any concrete backend.
//!
//! Every mutating method is one unit of work: it loads what it needs, runs
//! the engine or the state machine, and persists the outcome atomically.

use std::future::Future;

use uuid::Uuid;

use crate::{
  ResourceError,
  contribution::{Contribution, ContributionQuery, ContributionView, Decision, Proposal, Revision},
  field::{FieldInstance, FieldKind},
  movie::{Movie, NewMovie},
  user::{CurrentActor, NewUser, User},
};

/// Abstraction over a Popcorn store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MovieStore: Send + Sync {
  type Error: std::error::Error + ResourceError + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(&self, input: NewUser) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Resolve an enabled user; unknown and disabled users are both not found.
  fn find_enabled_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  // ── Movies ────────────────────────────────────────────────────────────

  /// Submit a new movie. It starts out `WAITING`, together with its original
  /// title.
  fn create_movie(
    &self,
    actor: CurrentActor,
    input: NewMovie,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  /// Retrieve a movie by id. Returns `None` if not found.
  fn get_movie(
    &self,
    movie_id: Uuid,
  ) -> impl Future<Output = Result<Option<Movie>, Self::Error>> + Send + '_;

  fn update_movie_status(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
    decision: Decision,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  /// Field instances of one kind: only live ones, or the full history when
  /// `include_inactive` is set.
  fn list_fields(
    &self,
    movie_id: Uuid,
    kind: FieldKind,
    include_inactive: bool,
  ) -> impl Future<Output = Result<Vec<FieldInstance>, Self::Error>> + Send + '_;

  // ── Contributions ─────────────────────────────────────────────────────

  fn create_contribution(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
    proposal: Proposal,
  ) -> impl Future<Output = Result<Contribution, Self::Error>> + Send + '_;

  fn revise_contribution(
    &self,
    actor: CurrentActor,
    contribution_id: Uuid,
    revision: Revision,
  ) -> impl Future<Output = Result<Contribution, Self::Error>> + Send + '_;

  fn verify_contribution(
    &self,
    actor: CurrentActor,
    contribution_id: Uuid,
    decision: Decision,
    comment: Option<String>,
  ) -> impl Future<Output = Result<Contribution, Self::Error>> + Send + '_;

  /// A contribution of `kind` with its referenced values resolved. Pure
  /// read.
  fn get_contribution(
    &self,
    contribution_id: Uuid,
    kind: FieldKind,
  ) -> impl Future<Output = Result<ContributionView, Self::Error>> + Send + '_;

  /// Contributions matching `query`, newest first.
  fn find_contributions<'a>(
    &'a self,
    query: &'a ContributionQuery,
  ) -> impl Future<Output = Result<Vec<Contribution>, Self::Error>> + Send + 'a;

  // ── Ratings & favorites ───────────────────────────────────────────────

  /// Set (or replace) the actor's rating of a movie and return the movie
  /// with its recomputed mean.
  fn rate_movie(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
    rate: u8,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  fn add_favorite(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  fn remove_favorite(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;
}
