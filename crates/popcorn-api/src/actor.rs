//! Extractor for the acting user.

use axum::{extract::FromRequestParts, http::request::Parts};
use popcorn_core::user::CurrentActor;
use uuid::Uuid;

use crate::error::ApiError;

/// Header naming the user on whose behalf a request runs. Authentication is
/// the caller's responsibility; the store still checks that the user exists
/// and is enabled.
pub const ACTOR_HEADER: &str = "x-popcorn-user";

/// The acting user, taken from [`ACTOR_HEADER`].
pub struct Actor(pub CurrentActor);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let value = parts
      .headers
      .get(ACTOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| ApiError::BadRequest(format!("missing {ACTOR_HEADER} header")))?;

    let user_id = Uuid::parse_str(value.trim())
      .map_err(|e| ApiError::BadRequest(format!("invalid {ACTOR_HEADER} header: {e}")))?;
    Ok(Actor(CurrentActor(user_id)))
  }
}
