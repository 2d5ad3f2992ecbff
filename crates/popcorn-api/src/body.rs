//! Request bodies for proposals and revisions.
//!
//! An element is either a plain value, given as the kind's JSON payload, or
//! an upload with base64-encoded bytes:
//!
//! ```json
//! { "value": "horror" }
//! { "upload": { "media_type": "image/png", "data": "iVBORw0KGgo=" } }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use popcorn_core::{
  content::ImageUpload,
  contribution::{Decision, Proposal, Revision},
  field::{FieldInput, FieldKind, FieldValue},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementBody {
  Value(serde_json::Value),
  Upload(UploadBody),
}

#[derive(Debug, Deserialize)]
pub struct UploadBody {
  pub media_type: String,
  /// Standard base64 with padding.
  pub data:       String,
}

impl ElementBody {
  fn into_input(self, kind: FieldKind) -> Result<FieldInput, ApiError> {
    match self {
      ElementBody::Value(payload) => FieldValue::from_parts(kind, payload)
        .map(FieldInput::Value)
        .map_err(|e| ApiError::BadRequest(format!("invalid {kind} value: {e}"))),
      ElementBody::Upload(upload) => {
        let bytes = B64
          .decode(upload.data.as_bytes())
          .map_err(|e| ApiError::BadRequest(format!("invalid upload data: {e}")))?;
        Ok(FieldInput::Upload(ImageUpload { media_type: upload.media_type, bytes }))
      }
    }
  }
}

fn inputs(kind: FieldKind, elements: Vec<ElementBody>) -> Result<Vec<FieldInput>, ApiError> {
  elements.into_iter().map(|e| e.into_input(kind)).collect()
}

fn keyed_inputs(
  kind: FieldKind,
  elements: BTreeMap<Uuid, ElementBody>,
) -> Result<BTreeMap<Uuid, FieldInput>, ApiError> {
  elements.into_iter().map(|(id, e)| Ok((id, e.into_input(kind)?))).collect()
}

// ─── Proposal ────────────────────────────────────────────────────────────────

/// `POST /movies/{id}/contributions`
#[derive(Debug, Deserialize)]
pub struct ProposalBody {
  pub kind:    FieldKind,
  pub sources: BTreeSet<String>,
  #[serde(default)]
  pub comment: Option<String>,
  #[serde(default)]
  pub add:     Vec<ElementBody>,
  /// Live instance id → its replacement.
  #[serde(default)]
  pub update:  BTreeMap<Uuid, ElementBody>,
  #[serde(default)]
  pub delete:  BTreeSet<Uuid>,
}

impl TryFrom<ProposalBody> for Proposal {
  type Error = ApiError;

  fn try_from(body: ProposalBody) -> Result<Self, Self::Error> {
    let kind = body.kind;
    Ok(Proposal {
      kind,
      elements_to_add: inputs(kind, body.add)?,
      elements_to_update: keyed_inputs(kind, body.update)?,
      ids_to_delete: body.delete,
      sources: body.sources,
      comment: body.comment,
    })
  }
}

// ─── Revision ────────────────────────────────────────────────────────────────

/// `PUT /contributions/{id}`
///
/// Entries of the contribution that are not listed again are withdrawn.
#[derive(Debug, Deserialize)]
pub struct RevisionBody {
  pub kind:        FieldKind,
  pub sources:     BTreeSet<String>,
  #[serde(default)]
  pub comment:     Option<String>,
  /// Proposed addition id → its revised value.
  #[serde(default)]
  pub keep_add:    BTreeMap<Uuid, ElementBody>,
  #[serde(default)]
  pub add:         Vec<ElementBody>,
  /// Proposed replacement id → its revised value.
  #[serde(default)]
  pub keep_update: BTreeMap<Uuid, ElementBody>,
  #[serde(default)]
  pub keep_delete: BTreeSet<Uuid>,
}

impl TryFrom<RevisionBody> for Revision {
  type Error = ApiError;

  fn try_from(body: RevisionBody) -> Result<Self, Self::Error> {
    let kind = body.kind;
    Ok(Revision {
      kind,
      elements_to_add: keyed_inputs(kind, body.keep_add)?,
      new_elements_to_add: inputs(kind, body.add)?,
      elements_to_update: keyed_inputs(kind, body.keep_update)?,
      ids_to_delete: body.keep_delete,
      sources: body.sources,
      comment: body.comment,
    })
  }
}

// ─── Verdicts ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub decision: Decision,
  #[serde(default)]
  pub comment:  Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
  pub rate: u8,
}
