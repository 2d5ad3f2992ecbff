//! The contribution engine.
//!
//! Both operations run against an explicitly loaded [`MovieRecord`] and work
//! on a copy of it; the caller's record (and contribution) is only replaced
//! once every check has passed, so a failed call leaves them untouched.
//!
//! Kinds that store files also touch the [`ContentStore`]. Those effects are
//! sequenced as follows:
//!
//! | Situation                     | Content store calls                  |
//! |-------------------------------|--------------------------------------|
//! | new element                   | save, then reference                 |
//! | revised element               | save new one, delete old blob later  |
//! | element withdrawn on revision | delete (after all checks passed)     |
//!
//! Deletions always run last, so a failed operation only has to remove what
//! it saved itself.
//! | operation fails               | delete blobs saved by this operation |

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  content::{ContentStore, StorageDirectory},
  contribution::{Contribution, Proposal, Revision, check_revisable},
  field::{FieldInput, FieldInstance, FieldKind, FieldValue},
  ledger::{DataStatus, MovieRecord},
  user::User,
};

// ─── Public operations ───────────────────────────────────────────────────────

/// Stage `proposal` against `record` and return the new `WAITING`
/// contribution.
pub fn create_contribution(
  record: &mut MovieRecord,
  author: &User,
  proposal: Proposal,
  content: &dyn ContentStore,
  now: DateTime<Utc>,
) -> Result<Contribution> {
  let mut work = record.clone();
  let mut blobs = Blobs::new(content);

  let result =
    stage_proposal(&mut work, author, proposal, &mut blobs, now).and_then(|c| {
      blobs.flush()?;
      Ok(c)
    });

  match result {
    Ok(contribution) => {
      *record = work;
      Ok(contribution)
    }
    Err(e) => {
      blobs.rollback();
      Err(e)
    }
  }
}

/// Apply `revision` to a pending contribution of `author`.
pub fn revise_contribution(
  record: &mut MovieRecord,
  contribution: &mut Contribution,
  author: &User,
  revision: Revision,
  content: &dyn ContentStore,
  now: DateTime<Utc>,
) -> Result<()> {
  let mut work = record.clone();
  let mut revised = contribution.clone();
  let mut blobs = Blobs::new(content);

  let result = stage_revision(&mut work, &mut revised, author, revision, &mut blobs, now)
    .and_then(|()| blobs.flush());

  match result {
    Ok(()) => {
      *record = work;
      *contribution = revised;
      Ok(())
    }
    Err(e) => {
      blobs.rollback();
      Err(e)
    }
  }
}

// ─── Staging ─────────────────────────────────────────────────────────────────

fn stage_proposal(
  record: &mut MovieRecord,
  author: &User,
  proposal: Proposal,
  blobs: &mut Blobs<'_>,
  now: DateTime<Utc>,
) -> Result<Contribution> {
  let movie_id = record.movie.movie_id;
  if record.movie.status != DataStatus::Accepted {
    return Err(Error::MovieNotFound(movie_id));
  }
  check_sources(&proposal.sources)?;

  let kind = proposal.kind;
  for input in proposal.elements_to_add.iter().chain(proposal.elements_to_update.values()) {
    check_input(kind, input)?;
  }

  let live: BTreeSet<Uuid> = record.live(kind).iter().map(|i| i.instance_id).collect();
  check_live(&live, proposal.elements_to_update.keys())?;
  check_live(&live, proposal.ids_to_delete.iter())?;
  if let Some(id) = proposal.elements_to_update.keys().find(|id| proposal.ids_to_delete.contains(*id)) {
    return Err(Error::ConflictingOperation(*id));
  }

  let mut keys = KeyClaims::new(record, kind, proposal.elements_to_update.keys().copied());

  let mut ids_to_add = BTreeSet::new();
  for input in proposal.elements_to_add {
    let value = blobs.resolve(kind, input)?;
    check_original_title(record, None, &value)?;
    keys.claim(&value)?;
    ids_to_add.insert(record.insert(FieldInstance::waiting(movie_id, value, now)));
  }

  let mut ids_to_update = BTreeMap::new();
  for (old_id, input) in proposal.elements_to_update {
    let value = blobs.resolve(kind, input)?;
    check_original_title(record, Some(old_id), &value)?;
    keys.claim(&value)?;
    let new_id = record.insert(FieldInstance::waiting(movie_id, value, now));
    record.mark_reported_for_update(old_id);
    ids_to_update.insert(new_id, old_id);
  }

  for id in &proposal.ids_to_delete {
    record.mark_reported_for_delete(*id);
  }

  debug!(
    %movie_id,
    %kind,
    adds = ids_to_add.len(),
    updates = ids_to_update.len(),
    deletes = proposal.ids_to_delete.len(),
    "staged contribution"
  );

  Ok(Contribution {
    contribution_id: Uuid::new_v4(),
    movie_id,
    user_id: author.user_id,
    kind,
    status: DataStatus::Waiting,
    ids_to_add,
    ids_to_update,
    ids_to_delete: proposal.ids_to_delete,
    sources: proposal.sources,
    user_comment: proposal.comment,
    created_at: now,
    verified_at: None,
    verified_by: None,
    verification_comment: None,
  })
}

fn stage_revision(
  record: &mut MovieRecord,
  contribution: &mut Contribution,
  author: &User,
  revision: Revision,
  blobs: &mut Blobs<'_>,
  now: DateTime<Utc>,
) -> Result<()> {
  check_revisable(contribution, author.user_id, revision.kind)?;
  check_sources(&revision.sources)?;

  let kind = revision.kind;
  for input in revision
    .elements_to_add
    .values()
    .chain(revision.new_elements_to_add.iter())
    .chain(revision.elements_to_update.values())
  {
    check_input(kind, input)?;
  }

  let update_ids: BTreeSet<Uuid> = contribution.ids_to_update.keys().copied().collect();
  check_member(&contribution.ids_to_add, revision.elements_to_add.keys())?;
  check_member(&update_ids, revision.elements_to_update.keys())?;
  check_member(&contribution.ids_to_delete, revision.ids_to_delete.iter())?;

  clean_up(record, contribution, &revision, blobs);

  let mut keys = KeyClaims::new(record, kind, contribution.ids_to_update.values().copied());

  for (id, input) in revision.elements_to_add {
    let value = blobs.replace(kind, &record.instance(id)?.value, input)?;
    check_original_title(record, None, &value)?;
    keys.claim(&value)?;
    record.instance_mut(id)?.value = value;
  }

  for (new_id, input) in revision.elements_to_update {
    let old_id =
      contribution.ids_to_update.get(&new_id).copied().ok_or(Error::ElementNotFound(new_id))?;
    let value = blobs.replace(kind, &record.instance(new_id)?.value, input)?;
    check_original_title(record, Some(old_id), &value)?;
    keys.claim(&value)?;
    record.instance_mut(new_id)?.value = value;
  }

  let movie_id = record.movie.movie_id;
  for input in revision.new_elements_to_add {
    let value = blobs.resolve(kind, input)?;
    check_original_title(record, None, &value)?;
    keys.claim(&value)?;
    contribution.ids_to_add.insert(record.insert(FieldInstance::waiting(movie_id, value, now)));
  }

  contribution.sources = revision.sources;
  if let Some(comment) = revision.comment {
    contribution.user_comment = Some(comment);
  }

  debug!(contribution_id = %contribution.contribution_id, %kind, "revised contribution");
  Ok(())
}

/// Withdraw every entry of `contribution` that `revision` no longer mentions.
fn clean_up(
  record: &mut MovieRecord,
  contribution: &mut Contribution,
  revision: &Revision,
  blobs: &mut Blobs<'_>,
) {
  let dropped_adds: Vec<Uuid> = contribution
    .ids_to_add
    .iter()
    .filter(|id| !revision.elements_to_add.contains_key(*id))
    .copied()
    .collect();
  for id in dropped_adds {
    contribution.ids_to_add.remove(&id);
    if let Some(instance) = record.remove(id) {
      blobs.abandon(&instance.value);
    }
    debug!(%id, "withdrew proposed addition");
  }

  let dropped_updates: Vec<(Uuid, Uuid)> = contribution
    .ids_to_update
    .iter()
    .filter(|(new_id, _)| !revision.elements_to_update.contains_key(*new_id))
    .map(|(new_id, old_id)| (*new_id, *old_id))
    .collect();
  for (new_id, old_id) in dropped_updates {
    contribution.ids_to_update.remove(&new_id);
    if let Some(instance) = record.remove(new_id) {
      blobs.abandon(&instance.value);
    }
    record.clear_reported_for_update(old_id);
    debug!(%new_id, %old_id, "withdrew proposed update");
  }

  contribution.ids_to_delete.retain(|id| {
    let keep = revision.ids_to_delete.contains(id);
    if !keep {
      record.clear_reported_for_delete(*id);
      debug!(%id, "withdrew proposed deletion");
    }
    keep
  });
}

// ─── Checks ──────────────────────────────────────────────────────────────────

fn check_sources(sources: &BTreeSet<String>) -> Result<()> {
  if sources.iter().all(|s| s.trim().is_empty()) {
    return Err(Error::MissingSources);
  }
  Ok(())
}

fn check_input(kind: FieldKind, input: &FieldInput) -> Result<()> {
  match input {
    FieldInput::Value(_) if kind.stores_file() => Err(Error::UploadRequired(kind)),
    FieldInput::Value(value) if value.kind() != kind => {
      Err(Error::KindMismatch { expected: kind, found: value.kind() })
    }
    FieldInput::Value(_) => Ok(()),
    FieldInput::Upload(_) if !kind.stores_file() => Err(Error::UploadNotAccepted(kind)),
    FieldInput::Upload(upload) => upload.check(),
  }
}

/// Every id must name a live instance.
fn check_live<'a>(live: &BTreeSet<Uuid>, ids: impl IntoIterator<Item = &'a Uuid>) -> Result<()> {
  for id in ids {
    if live.is_empty() {
      return Err(Error::NoElementsAvailable);
    }
    if !live.contains(id) {
      return Err(Error::ElementNotFound(*id));
    }
  }
  Ok(())
}

/// Every id must already be part of the contribution.
fn check_member<'a>(own: &BTreeSet<Uuid>, ids: impl IntoIterator<Item = &'a Uuid>) -> Result<()> {
  match ids.into_iter().find(|id| !own.contains(*id)) {
    Some(id) => Err(Error::ElementNotFound(*id)),
    None => Ok(()),
  }
}

/// Only the instance already carrying the original title may carry it.
fn check_original_title(
  record: &MovieRecord,
  replaces: Option<Uuid>,
  value: &FieldValue,
) -> Result<()> {
  if !value.is_original_title() {
    return Ok(());
  }
  match (replaces, record.original_title_id()) {
    (Some(old), Some(original)) if old == original => Ok(()),
    _ => Err(Error::OriginalTitleExists),
  }
}

/// Natural keys claimed so far for one kind.
///
/// Seeded with every accepted instance, including those shadowed by other
/// pending proposals (they become live again if those are rejected), minus
/// the instances this proposal replaces.
struct KeyClaims {
  kind:  FieldKind,
  taken: BTreeSet<String>,
}

impl KeyClaims {
  fn new(record: &MovieRecord, kind: FieldKind, replaced: impl IntoIterator<Item = Uuid>) -> Self {
    let replaced: BTreeSet<Uuid> = replaced.into_iter().collect();
    let taken = record
      .instances_of(kind)
      .filter(|i| i.status == DataStatus::Accepted && !replaced.contains(&i.instance_id))
      .map(|i| i.value.natural_key())
      .collect();
    Self { kind, taken }
  }

  fn claim(&mut self, value: &FieldValue) -> Result<()> {
    let key = value.natural_key();
    if self.taken.contains(&key) {
      return Err(Error::DuplicateValue { kind: self.kind, key });
    }
    self.taken.insert(key);
    Ok(())
  }
}

// ─── Blobs ───────────────────────────────────────────────────────────────────

/// Content store effects of one engine operation.
struct Blobs<'a> {
  content:   &'a dyn ContentStore,
  saved:     Vec<String>,
  abandoned: Vec<String>,
}

impl<'a> Blobs<'a> {
  fn new(content: &'a dyn ContentStore) -> Self {
    Self { content, saved: Vec::new(), abandoned: Vec::new() }
  }

  /// Turn an input into a value, saving uploads.
  fn resolve(&mut self, kind: FieldKind, input: FieldInput) -> Result<FieldValue> {
    match input {
      FieldInput::Value(value) => Ok(value),
      FieldInput::Upload(upload) => {
        let storage_id = self.content.save(&upload, StorageDirectory::Image)?;
        self.saved.push(storage_id.clone());
        FieldValue::image(kind, storage_id, upload.media_type).ok_or(Error::UploadNotAccepted(kind))
      }
    }
  }

  /// Like [`Self::resolve`], but also schedules the blob `old` refers to
  /// for deletion when it is being swapped for a new upload.
  fn replace(&mut self, kind: FieldKind, old: &FieldValue, input: FieldInput) -> Result<FieldValue> {
    let swapped = matches!(input, FieldInput::Upload(_));
    let value = self.resolve(kind, input)?;
    if swapped {
      self.abandon(old);
    }
    Ok(value)
  }

  /// Schedule the blob of a withdrawn value for deletion.
  fn abandon(&mut self, value: &FieldValue) {
    if let Some(storage_id) = value.storage_id() {
      self.abandoned.push(storage_id.to_owned());
    }
  }

  fn flush(&mut self) -> Result<()> {
    for storage_id in self.abandoned.drain(..) {
      self.content.delete(&storage_id)?;
      debug!(%storage_id, "deleted abandoned blob");
    }
    Ok(())
  }

  /// Best-effort removal of everything saved by a failed operation.
  fn rollback(self) {
    for storage_id in self.saved {
      if let Err(e) = self.content.delete(&storage_id) {
        warn!(%storage_id, error = %e, "failed to remove blob of failed operation");
      }
    }
  }
}
