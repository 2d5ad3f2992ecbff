//! Fixtures shared by the unit tests of this crate.

use std::{
  collections::BTreeSet,
  sync::atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  content::{ContentStore, ImageUpload, MemoryContentStore, StorageDirectory},
  field::{FieldInstance, FieldValue, Genre},
  ledger::{DataStatus, MovieRecord},
  movie::{MovieType, NewMovie},
  user::{Permission, User},
};

pub fn user(permissions: &[Permission]) -> User {
  User {
    user_id:     Uuid::new_v4(),
    username:    format!("user-{}", Uuid::new_v4().simple()),
    enabled:     true,
    permissions: permissions.iter().copied().collect::<BTreeSet<_>>(),
    created_at:  Utc::now(),
  }
}

/// An accepted movie with an accepted original title.
pub fn accepted_record() -> MovieRecord {
  let mut record = MovieRecord::submit(
    Uuid::new_v4(),
    NewMovie { title: "Blade Runner".into(), movie_type: MovieType::Movie },
    Utc::now(),
  );
  record.movie.status = DataStatus::Accepted;
  for instance in record.instances.values_mut() {
    instance.status = DataStatus::Accepted;
  }
  record
}

/// Attach an already accepted instance to `record`.
pub fn accepted(record: &mut MovieRecord, value: FieldValue) -> Uuid {
  let mut instance = FieldInstance::waiting(record.movie.movie_id, value, Utc::now());
  instance.status = DataStatus::Accepted;
  record.insert(instance)
}

pub fn genre(g: Genre) -> FieldValue { FieldValue::Genre(g) }

pub fn synopsis(text: &str) -> FieldValue { FieldValue::Synopsis(text.into()) }

pub fn png(bytes: &[u8]) -> ImageUpload {
  ImageUpload { media_type: "image/png".into(), bytes: bytes.to_vec() }
}

/// A content store that starts failing after a fixed number of saves.
pub struct FlakyContentStore {
  pub inner:      MemoryContentStore,
  pub saves_left: AtomicUsize,
}

impl FlakyContentStore {
  pub fn failing_after(saves: usize) -> Self {
    Self { inner: MemoryContentStore::new(), saves_left: AtomicUsize::new(saves) }
  }
}

impl ContentStore for FlakyContentStore {
  fn save(&self, upload: &ImageUpload, directory: StorageDirectory) -> Result<String> {
    let left = self.saves_left.load(Ordering::SeqCst);
    if left == 0 {
      return Err(Error::Storage("disk full".into()));
    }
    self.saves_left.store(left - 1, Ordering::SeqCst);
    self.inner.save(upload, directory)
  }

  fn delete(&self, storage_id: &str) -> Result<()> { self.inner.delete(storage_id) }
}
