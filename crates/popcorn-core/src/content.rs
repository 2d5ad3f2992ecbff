//! The content store seam used by kinds that reference files (photos and
//! posters).
//!
//! Calls are synchronous and bounded; they run inside the operation that
//! needs them and their failures propagate as [`Error::Storage`] or as a
//! precondition error for bad input.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Media types accepted for movie images.
pub const IMAGE_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Top-level directory a blob is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageDirectory {
  Image,
}

impl StorageDirectory {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Image => "images",
    }
  }
}

/// A file submitted as part of a proposal.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpload {
  pub media_type: String,
  pub bytes:      Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageUpload")
      .field("media_type", &self.media_type)
      .field("len", &self.bytes.len())
      .finish()
  }
}

impl ImageUpload {
  /// Reject uploads no content store should accept.
  pub fn check(&self) -> Result<()> {
    if self.bytes.is_empty() {
      return Err(Error::EmptyUpload);
    }
    if !IMAGE_MEDIA_TYPES.contains(&self.media_type.as_str()) {
      return Err(Error::UnsupportedMediaType(self.media_type.clone()));
    }
    Ok(())
  }
}

/// Blob storage for uploaded files.
pub trait ContentStore: Send + Sync {
  /// Persist `upload` and return the id under which it can be found again.
  fn save(&self, upload: &ImageUpload, directory: StorageDirectory) -> Result<String>;

  /// Remove a blob. Removing an unknown id is not an error.
  fn delete(&self, storage_id: &str) -> Result<()>;
}

/// A process-local [`ContentStore`], for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
  blobs: Mutex<HashMap<String, ImageUpload>>,
}

impl MemoryContentStore {
  pub fn new() -> Self { Self::default() }

  pub fn contains(&self, storage_id: &str) -> bool {
    self.blobs.lock().unwrap_or_else(PoisonError::into_inner).contains_key(storage_id)
  }

  pub fn len(&self) -> usize {
    self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl ContentStore for MemoryContentStore {
  fn save(&self, upload: &ImageUpload, directory: StorageDirectory) -> Result<String> {
    upload.check()?;
    let storage_id = format!("{}/{}", directory.as_str(), Uuid::new_v4());
    self
      .blobs
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(storage_id.clone(), upload.clone());
    Ok(storage_id)
  }

  fn delete(&self, storage_id: &str) -> Result<()> {
    self.blobs.lock().unwrap_or_else(PoisonError::into_inner).remove(storage_id);
    Ok(())
  }
}
