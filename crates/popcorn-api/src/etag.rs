//! ETag computation for field listings and contribution views.
//!
//! ETags are SHA-256 hashes over the sorted instance states. Ordering is
//! deterministic regardless of how the store returned them.

use axum::http::{HeaderMap, HeaderValue, header};
use popcorn_core::{contribution::ContributionView, field::FieldInstance};
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Compute an ETag for a set of field instances.
///
/// Any change of value, status or report flag changes the tag.
pub fn instances_etag<'a>(
  instances: impl IntoIterator<Item = &'a FieldInstance>,
) -> Result<String, ApiError> {
  let mut instances: Vec<&FieldInstance> = instances.into_iter().collect();
  instances.sort_by_key(|i| i.instance_id);

  let mut hasher = Sha256::new();
  for i in instances {
    hasher.update(i.instance_id.as_bytes());
    hasher.update(i.status.to_string().as_bytes());
    hasher.update([u8::from(i.reported_for_update), u8::from(i.reported_for_delete)]);
    let value = i.value.to_json().map_err(ApiError::store)?;
    hasher.update(value.to_string().as_bytes());
  }
  Ok(format!("\"{}\"", hex::encode(hasher.finalize())))
}

/// Compute an ETag for a contribution and the elements it references.
pub fn contribution_etag(view: &ContributionView) -> Result<String, ApiError> {
  let c = &view.contribution;
  let body = serde_json::to_vec(view).map_err(|e| ApiError::store(popcorn_core::Error::from(e)))?;

  let mut hasher = Sha256::new();
  hasher.update(c.contribution_id.as_bytes());
  hasher.update(&body);
  Ok(format!("\"{}\"", hex::encode(hasher.finalize())))
}

/// Whether the request's `If-None-Match` already names `etag`.
pub fn is_fresh(headers: &HeaderMap, etag: &str) -> bool {
  headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| v == "*" || v.split(',').any(|t| t.trim() == etag))
}

pub fn etag_header(etag: &str) -> Result<[(header::HeaderName, HeaderValue); 1], ApiError> {
  let value = HeaderValue::from_str(etag).map_err(|e| ApiError::BadRequest(e.to_string()))?;
  Ok([(header::ETAG, value)])
}
