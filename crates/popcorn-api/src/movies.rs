//! Handlers for `/movies` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/movies` | Body: [`NewMovie`]; returns 201 + the waiting movie |
//! | `GET`  | `/movies/:id` | 404 if not found |
//! | `POST` | `/movies/:id/status` | Body: `{"decision":"accept"}` |
//! | `GET`  | `/movies/:id/fields/:kind` | Optional `?include_inactive=true`; ETag |
//! | `POST` | `/movies/:id/contributions` | Body: [`ProposalBody`]; returns 201 |
//! | `POST` | `/movies/:id/rating` | Body: `{"rate":8}` |
//! | `PUT`  | `/movies/:id/favorite` | Idempotent |
//! | `DELETE` | `/movies/:id/favorite` | Idempotent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use popcorn_core::{
  contribution::{Contribution, Proposal},
  field::FieldKind,
  movie::{Movie, NewMovie},
  store::MovieStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  actor::Actor,
  body::{ProposalBody, RatingBody, StatusBody},
  error::ApiError,
  etag::{etag_header, instances_etag, is_fresh},
};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /movies`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Json(body): Json<NewMovie>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MovieStore,
{
  let movie = store.create_movie(actor, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(movie)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /movies/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Movie>, ApiError>
where
  S: MovieStore,
{
  let movie = store
    .get_movie(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::store(popcorn_core::Error::MovieNotFound(id)))?;
  Ok(Json(movie))
}

// ─── Moderation ───────────────────────────────────────────────────────────────

/// `POST /movies/:id/status` — a comment in the body is ignored.
pub async fn set_status<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Movie>, ApiError>
where
  S: MovieStore,
{
  let movie = store
    .update_movie_status(actor, id, body.decision)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(movie))
}

// ─── Fields ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FieldsParams {
  /// If `true`, also return pending, rejected and superseded instances.
  #[serde(default)]
  pub include_inactive: bool,
}

/// `GET /movies/:id/fields/:kind[?include_inactive=true]`
pub async fn fields<S>(
  State(store): State<Arc<S>>,
  Path((id, kind)): Path<(Uuid, FieldKind)>,
  Query(params): Query<FieldsParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: MovieStore,
{
  let instances = store
    .list_fields(id, kind, params.include_inactive)
    .await
    .map_err(ApiError::store)?;

  let etag = instances_etag(&instances)?;
  if is_fresh(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, etag_header(&etag)?).into_response());
  }
  Ok((etag_header(&etag)?, Json(instances)).into_response())
}

// ─── Contributions ────────────────────────────────────────────────────────────

/// `POST /movies/:id/contributions`
pub async fn contribute<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<ProposalBody>,
) -> Result<(StatusCode, Json<Contribution>), ApiError>
where
  S: MovieStore,
{
  let proposal = Proposal::try_from(body)?;
  let contribution = store
    .create_contribution(actor, id, proposal)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(contribution)))
}

// ─── Ratings & favorites ──────────────────────────────────────────────────────

/// `POST /movies/:id/rating`
pub async fn rate<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RatingBody>,
) -> Result<Json<Movie>, ApiError>
where
  S: MovieStore,
{
  let movie = store.rate_movie(actor, id, body.rate).await.map_err(ApiError::store)?;
  Ok(Json(movie))
}

/// `PUT /movies/:id/favorite`
pub async fn add_favorite<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Movie>, ApiError>
where
  S: MovieStore,
{
  let movie = store.add_favorite(actor, id).await.map_err(ApiError::store)?;
  Ok(Json(movie))
}

/// `DELETE /movies/:id/favorite`
pub async fn remove_favorite<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
) -> Result<Json<Movie>, ApiError>
where
  S: MovieStore,
{
  let movie = store.remove_favorite(actor, id).await.map_err(ApiError::store)?;
  Ok(Json(movie))
}
