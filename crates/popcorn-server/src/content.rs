//! Filesystem-backed blob storage.

use std::{
  io,
  path::{Component, Path, PathBuf},
};

use popcorn_core::{
  Error, Result,
  content::{ContentStore, ImageUpload, StorageDirectory},
};
use tracing::debug;
use uuid::Uuid;

/// Stores each upload as its own file, `<root>/<directory>/<uuid>.<ext>`.
///
/// Names are never reused, so deleting one blob cannot affect another
/// instance's file even when the uploaded bytes are identical.
#[derive(Debug, Clone)]
pub struct FsContentStore {
  root: PathBuf,
}

impl FsContentStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve a storage id below the root, refusing anything that could
  /// escape it.
  fn path_of(&self, storage_id: &str) -> Result<PathBuf> {
    let relative = Path::new(storage_id);
    let plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
    if storage_id.is_empty() || !plain {
      return Err(Error::Storage(format!("invalid storage id {storage_id:?}")));
    }
    Ok(self.root.join(relative))
  }
}

fn extension(media_type: &str) -> &'static str {
  match media_type {
    "image/jpeg" => "jpg",
    "image/png" => "png",
    "image/gif" => "gif",
    "image/webp" => "webp",
    _ => "bin",
  }
}

fn storage_error(action: &str, path: &Path, e: io::Error) -> Error {
  Error::Storage(format!("failed to {action} {}: {e}", path.display()))
}

impl ContentStore for FsContentStore {
  fn save(&self, upload: &ImageUpload, directory: StorageDirectory) -> Result<String> {
    upload.check()?;

    let storage_id =
      format!("{}/{}.{}", directory.as_str(), Uuid::new_v4(), extension(&upload.media_type));
    let path = self.path_of(&storage_id)?;
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| storage_error("create", parent, e))?;
    }
    std::fs::write(&path, &upload.bytes).map_err(|e| storage_error("write", &path, e))?;

    debug!(%storage_id, len = upload.bytes.len(), "stored blob");
    Ok(storage_id)
  }

  fn delete(&self, storage_id: &str) -> Result<()> {
    let path = self.path_of(storage_id)?;
    match std::fs::remove_file(&path) {
      Ok(()) => {
        debug!(%storage_id, "deleted blob");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(storage_error("delete", &path, e)),
    }
  }
}
