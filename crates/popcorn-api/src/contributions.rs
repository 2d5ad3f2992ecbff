//! Handlers for `/contributions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contributions` | Optional `movie_id`, `kind`, `status`, `created_after`, `created_before` |
//! | `GET`  | `/contributions/:id/:kind` | Resolved values; ETag |
//! | `PUT`  | `/contributions/:id` | Body: [`RevisionBody`]; author only, while waiting |
//! | `POST` | `/contributions/:id/status` | Body: `{"decision":"reject","comment":"..."}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use popcorn_core::{
  contribution::{Contribution, ContributionQuery, Revision},
  field::FieldKind,
  store::MovieStore,
};
use uuid::Uuid;

use crate::{
  actor::Actor,
  body::{RevisionBody, StatusBody},
  error::ApiError,
  etag::{contribution_etag, etag_header, is_fresh},
};

/// `GET /contributions[?movie_id=...][&kind=...][&status=...][&created_after=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(query): Query<ContributionQuery>,
) -> Result<Json<Vec<Contribution>>, ApiError>
where
  S: MovieStore,
{
  let contributions = store.find_contributions(&query).await.map_err(ApiError::store)?;
  Ok(Json(contributions))
}

/// `GET /contributions/:id/:kind`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((id, kind)): Path<(Uuid, FieldKind)>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: MovieStore,
{
  let view = store.get_contribution(id, kind).await.map_err(ApiError::store)?;

  let etag = contribution_etag(&view)?;
  if is_fresh(&headers, &etag) {
    return Ok((StatusCode::NOT_MODIFIED, etag_header(&etag)?).into_response());
  }
  Ok((etag_header(&etag)?, Json(view)).into_response())
}

/// `PUT /contributions/:id`
pub async fn revise<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<RevisionBody>,
) -> Result<Json<Contribution>, ApiError>
where
  S: MovieStore,
{
  let revision = Revision::try_from(body)?;
  let contribution = store
    .revise_contribution(actor, id, revision)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contribution))
}

/// `POST /contributions/:id/status`
pub async fn verify<S>(
  State(store): State<Arc<S>>,
  Actor(actor): Actor,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Contribution>, ApiError>
where
  S: MovieStore,
{
  let contribution = store
    .verify_contribution(actor, id, body.decision, body.comment)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contribution))
}
