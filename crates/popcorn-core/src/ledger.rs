//! The field version ledger.
//!
//! Every field instance carries a [`DataStatus`] plus two "reported" flags
//! that mark it as the subject of a pending proposal. An instance is *live*
//! (visible to readers and counted by conflict checks) only while it is
//! accepted and not shadowed by such a proposal.
//!
//! Mutations happen on a [`MovieRecord`]: the movie plus an arena of its
//! field instances keyed by id, loaded in full before an operation starts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::{FieldInstance, FieldKind},
  movie::Movie,
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Moderation status of a movie, a contribution, or a field instance.
///
/// Movies and contributions only ever use `Waiting`, `Accepted` and
/// `Rejected`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataStatus {
  Waiting,
  Accepted,
  /// Superseded by an accepted replace-kind update.
  Edited,
  Rejected,
  Deleted,
  /// Carrier of an accepted patch; its value now lives on the patched
  /// instance.
  AmendmentAccepted,
}

/// `status == ACCEPTED && !reported_for_update && !reported_for_delete`.
pub fn is_live(instance: &FieldInstance) -> bool {
  instance.status == DataStatus::Accepted
    && !instance.reported_for_update
    && !instance.reported_for_delete
}

/// Live instances of `kind` among `instances`.
pub fn live_instances<'a>(
  instances: impl IntoIterator<Item = &'a FieldInstance>,
  kind: FieldKind,
) -> Vec<&'a FieldInstance> {
  instances.into_iter().filter(|i| i.kind() == kind && is_live(i)).collect()
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A movie loaded together with its field instances.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieRecord {
  pub movie:     Movie,
  pub instances: BTreeMap<Uuid, FieldInstance>,
}

impl MovieRecord {
  pub fn new(movie: Movie, instances: impl IntoIterator<Item = FieldInstance>) -> Self {
    let instances = instances.into_iter().map(|i| (i.instance_id, i)).collect();
    Self { movie, instances }
  }

  pub fn instances_of(&self, kind: FieldKind) -> impl Iterator<Item = &FieldInstance> {
    self.instances.values().filter(move |i| i.kind() == kind)
  }

  pub fn live(&self, kind: FieldKind) -> Vec<&FieldInstance> {
    live_instances(self.instances.values(), kind)
  }

  pub fn instance(&self, id: Uuid) -> Result<&FieldInstance> {
    self.instances.get(&id).ok_or(Error::ElementNotFound(id))
  }

  pub fn instance_mut(&mut self, id: Uuid) -> Result<&mut FieldInstance> {
    self.instances.get_mut(&id).ok_or(Error::ElementNotFound(id))
  }

  pub fn insert(&mut self, instance: FieldInstance) -> Uuid {
    let id = instance.instance_id;
    self.instances.insert(id, instance);
    id
  }

  /// Hard-delete an instance from the record.
  pub fn remove(&mut self, id: Uuid) -> Option<FieldInstance> { self.instances.remove(&id) }

  // ── Reported flags ──────────────────────────────────────────────────────
  //
  // Absent ids are ignored; callers validate ids before touching flags.

  pub fn mark_reported_for_update(&mut self, id: Uuid) {
    if let Some(instance) = self.instances.get_mut(&id) {
      instance.reported_for_update = true;
    }
  }

  pub fn mark_reported_for_delete(&mut self, id: Uuid) {
    if let Some(instance) = self.instances.get_mut(&id) {
      instance.reported_for_delete = true;
    }
  }

  pub fn clear_reported_for_update(&mut self, id: Uuid) {
    if let Some(instance) = self.instances.get_mut(&id) {
      instance.reported_for_update = false;
    }
  }

  pub fn clear_reported_for_delete(&mut self, id: Uuid) {
    if let Some(instance) = self.instances.get_mut(&id) {
      instance.reported_for_delete = false;
    }
  }

  /// The minimal set of row operations that turns `before` into `self`.
  pub fn changes_since(&self, before: &MovieRecord) -> RecordChanges {
    let mut changes = RecordChanges::default();

    for (id, instance) in &self.instances {
      match before.instances.get(id) {
        None => changes.inserted.push(instance.clone()),
        Some(old) if old != instance => changes.updated.push(instance.clone()),
        Some(_) => {}
      }
    }

    changes.removed = before
      .instances
      .keys()
      .filter(|id| !self.instances.contains_key(id))
      .copied()
      .collect();

    changes
  }
}

/// Row-level difference between two states of a [`MovieRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordChanges {
  pub inserted: Vec<FieldInstance>,
  pub updated:  Vec<FieldInstance>,
  pub removed:  Vec<Uuid>,
}

impl RecordChanges {
  pub fn is_empty(&self) -> bool {
    self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    field::{FieldValue, Genre},
    movie::{Movie, MovieType},
  };

  fn record_with(statuses: &[DataStatus]) -> (MovieRecord, Vec<Uuid>) {
    let movie = Movie::waiting(Uuid::new_v4(), "Alien".into(), MovieType::Movie, Utc::now());
    let instances: Vec<FieldInstance> = statuses
      .iter()
      .map(|status| {
        let mut i = FieldInstance::waiting(
          movie.movie_id,
          FieldValue::Genre(Genre::Horror),
          Utc::now(),
        );
        i.status = *status;
        i
      })
      .collect();
    let ids = instances.iter().map(|i| i.instance_id).collect();
    (MovieRecord::new(movie, instances), ids)
  }

  #[test]
  fn only_unreported_accepted_instances_are_live() {
    let (mut record, ids) = record_with(&[
      DataStatus::Accepted,
      DataStatus::Waiting,
      DataStatus::Edited,
      DataStatus::Accepted,
      DataStatus::Accepted,
    ]);
    record.mark_reported_for_update(ids[3]);
    record.mark_reported_for_delete(ids[4]);

    let live: Vec<Uuid> = record.live(FieldKind::Genre).iter().map(|i| i.instance_id).collect();
    assert_eq!(live, vec![ids[0]]);
  }

  #[test]
  fn marking_is_idempotent_and_clearing_restores_liveness() {
    let (mut record, ids) = record_with(&[DataStatus::Accepted]);
    record.mark_reported_for_delete(ids[0]);
    record.mark_reported_for_delete(ids[0]);
    assert!(!is_live(record.instance(ids[0]).unwrap()));

    record.clear_reported_for_delete(ids[0]);
    assert!(is_live(record.instance(ids[0]).unwrap()));
  }

  #[test]
  fn marking_an_absent_id_is_a_no_op() {
    let (mut record, _) = record_with(&[DataStatus::Accepted]);
    let before = record.clone();
    record.mark_reported_for_update(Uuid::new_v4());
    assert!(record.changes_since(&before).is_empty());
  }

  #[test]
  fn changes_since_reports_inserts_updates_and_removals() {
    let (before, ids) = record_with(&[DataStatus::Accepted, DataStatus::Waiting]);
    let mut after = before.clone();

    after.mark_reported_for_update(ids[0]);
    after.remove(ids[1]);
    let added = after.insert(FieldInstance::waiting(
      after.movie.movie_id,
      FieldValue::Genre(Genre::Drama),
      Utc::now(),
    ));

    let changes = after.changes_since(&before);
    assert_eq!(changes.inserted.len(), 1);
    assert_eq!(changes.inserted[0].instance_id, added);
    assert_eq!(changes.updated.len(), 1);
    assert_eq!(changes.updated[0].instance_id, ids[0]);
    assert_eq!(changes.removed, vec![ids[1]]);
  }
}
