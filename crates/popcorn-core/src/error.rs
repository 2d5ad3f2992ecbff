//! Error types for `popcorn-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::field::FieldKind;

/// Coarse classification of an [`Error`], used by outer layers to pick a
/// response without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced user, movie, contribution or element does not exist or is
  /// not in the expected state.
  NotFound,
  /// A business invariant would be violated.
  Conflict,
  /// The acting user lacks the required capability.
  Forbidden,
  /// The input was rejected before anything was attempted.
  Precondition,
  /// A backend (storage, serialization) failed.
  Server,
}

/// Implemented by every error type that can cross the [`MovieStore`] seam.
///
/// [`MovieStore`]: crate::store::MovieStore
pub trait ResourceError {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("no user found with id {0}")]
  UserNotFound(Uuid),

  #[error("no movie found with id {0}")]
  MovieNotFound(Uuid),

  #[error("no contribution found with id {0}")]
  ContributionNotFound(Uuid),

  #[error("no element found with id {0}")]
  ElementNotFound(Uuid),

  #[error("no elements available for editing or deletion")]
  NoElementsAvailable,

  #[error("conflicting operations on element {0}")]
  ConflictingOperation(Uuid),

  #[error("a {kind} element with {key} already exists")]
  DuplicateValue { kind: FieldKind, key: String },

  #[error("the original title already exists")]
  OriginalTitleExists,

  #[error("movie {0} has not premiered yet")]
  NotPremiered(Uuid),

  #[error("user {user} has no permission for {scope}")]
  Forbidden { user: Uuid, scope: String },

  #[error("a {found} element cannot be part of a {expected} contribution")]
  KindMismatch { expected: FieldKind, found: FieldKind },

  #[error("{0} elements must be uploaded as files")]
  UploadRequired(FieldKind),

  #[error("{0} elements cannot be uploaded as files")]
  UploadNotAccepted(FieldKind),

  #[error("at least one source is required")]
  MissingSources,

  #[error("rating must be between 1 and 10, got {0}")]
  InvalidRate(u8),

  #[error("unsupported media type: {0:?}")]
  UnsupportedMediaType(String),

  #[error("uploaded file is empty")]
  EmptyUpload,

  #[error("content store failure: {0}")]
  Storage(String),

  #[error("unknown {what}: {value:?}")]
  UnknownDiscriminant { what: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl ResourceError for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::UserNotFound(_)
      | Self::MovieNotFound(_)
      | Self::ContributionNotFound(_)
      | Self::ElementNotFound(_)
      | Self::NoElementsAvailable => ErrorKind::NotFound,

      Self::ConflictingOperation(_)
      | Self::DuplicateValue { .. }
      | Self::OriginalTitleExists
      | Self::NotPremiered(_) => ErrorKind::Conflict,

      Self::Forbidden { .. } => ErrorKind::Forbidden,

      Self::KindMismatch { .. }
      | Self::UploadRequired(_)
      | Self::UploadNotAccepted(_)
      | Self::MissingSources
      | Self::InvalidRate(_)
      | Self::UnsupportedMediaType(_)
      | Self::EmptyUpload => ErrorKind::Precondition,

      Self::Storage(_)
      | Self::UnknownDiscriminant { .. }
      | Self::Serialization(_) => ErrorKind::Server,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
