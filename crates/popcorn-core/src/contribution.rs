//! Contributions — batched proposals against one field kind of one movie.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::{FieldInput, FieldKind, FieldValue},
  ledger::{DataStatus, MovieRecord},
};

/// One batch of proposed add/update/delete operations, reviewed as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
  pub contribution_id:      Uuid,
  pub movie_id:             Uuid,
  pub user_id:              Uuid,
  pub kind:                 FieldKind,
  pub status:               DataStatus,
  /// Newly created `WAITING` instances.
  pub ids_to_add:           BTreeSet<Uuid>,
  /// New instance id → the live instance it would replace.
  pub ids_to_update:        BTreeMap<Uuid, Uuid>,
  /// Live instances proposed for removal.
  pub ids_to_delete:        BTreeSet<Uuid>,
  pub sources:              BTreeSet<String>,
  pub user_comment:         Option<String>,
  pub created_at:           DateTime<Utc>,
  pub verified_at:          Option<DateTime<Utc>>,
  pub verified_by:          Option<Uuid>,
  pub verification_comment: Option<String>,
}

impl Contribution {
  pub fn is_waiting(&self) -> bool { self.status == DataStatus::Waiting }

  /// Every instance id this contribution references, new and old.
  pub fn referenced_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
    self
      .ids_to_add
      .iter()
      .copied()
      .chain(self.ids_to_update.iter().flat_map(|(new, old)| [*new, *old]))
      .chain(self.ids_to_delete.iter().copied())
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A new contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
  pub kind:               FieldKind,
  #[serde(default)]
  pub elements_to_add:    Vec<FieldInput>,
  /// Live instance id → its proposed replacement.
  #[serde(default)]
  pub elements_to_update: BTreeMap<Uuid, FieldInput>,
  #[serde(default)]
  pub ids_to_delete:      BTreeSet<Uuid>,
  pub sources:            BTreeSet<String>,
  #[serde(default)]
  pub comment:            Option<String>,
}

impl Proposal {
  pub fn new(kind: FieldKind, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      kind,
      elements_to_add: Vec::new(),
      elements_to_update: BTreeMap::new(),
      ids_to_delete: BTreeSet::new(),
      sources: sources.into_iter().map(Into::into).collect(),
      comment: None,
    }
  }

  pub fn add(mut self, input: impl Into<FieldInput>) -> Self {
    self.elements_to_add.push(input.into());
    self
  }

  pub fn update(mut self, old_id: Uuid, input: impl Into<FieldInput>) -> Self {
    self.elements_to_update.insert(old_id, input.into());
    self
  }

  pub fn delete(mut self, id: Uuid) -> Self {
    self.ids_to_delete.insert(id);
    self
  }
}

/// A revision of a pending contribution by its author.
///
/// Entries of the contribution that are not mentioned again are withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
  pub kind:                FieldKind,
  /// Already proposed addition id → its revised value.
  #[serde(default)]
  pub elements_to_add:     BTreeMap<Uuid, FieldInput>,
  #[serde(default)]
  pub new_elements_to_add: Vec<FieldInput>,
  /// Already proposed replacement (new instance) id → its revised value.
  #[serde(default)]
  pub elements_to_update:  BTreeMap<Uuid, FieldInput>,
  #[serde(default)]
  pub ids_to_delete:       BTreeSet<Uuid>,
  pub sources:             BTreeSet<String>,
  #[serde(default)]
  pub comment:             Option<String>,
}

impl Revision {
  pub fn new(kind: FieldKind, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      kind,
      elements_to_add: BTreeMap::new(),
      new_elements_to_add: Vec::new(),
      elements_to_update: BTreeMap::new(),
      ids_to_delete: BTreeSet::new(),
      sources: sources.into_iter().map(Into::into).collect(),
      comment: None,
    }
  }

  pub fn keep_add(mut self, id: Uuid, input: impl Into<FieldInput>) -> Self {
    self.elements_to_add.insert(id, input.into());
    self
  }

  pub fn add(mut self, input: impl Into<FieldInput>) -> Self {
    self.new_elements_to_add.push(input.into());
    self
  }

  pub fn keep_update(mut self, new_id: Uuid, input: impl Into<FieldInput>) -> Self {
    self.elements_to_update.insert(new_id, input.into());
    self
  }

  pub fn keep_delete(mut self, id: Uuid) -> Self {
    self.ids_to_delete.insert(id);
    self
  }
}

/// A moderator's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
  Accept,
  Reject,
}

impl Decision {
  pub fn status(self) -> DataStatus {
    match self {
      Self::Accept => DataStatus::Accepted,
      Self::Reject => DataStatus::Rejected,
    }
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedPair {
  pub old_id: Uuid,
  pub old:    FieldValue,
  pub new:    FieldValue,
}

/// A contribution with the values it references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionView {
  pub contribution: Contribution,
  pub added:        BTreeMap<Uuid, FieldValue>,
  /// Keyed by the new instance id.
  pub updated:      BTreeMap<Uuid, UpdatedPair>,
  pub deleted:      BTreeMap<Uuid, FieldValue>,
}

impl ContributionView {
  pub fn assemble(contribution: Contribution, record: &MovieRecord) -> Result<Self> {
    let value = |id: Uuid| record.instance(id).map(|i| i.value.clone());

    let added = contribution
      .ids_to_add
      .iter()
      .map(|id| Ok((*id, value(*id)?)))
      .collect::<Result<_>>()?;
    let updated = contribution
      .ids_to_update
      .iter()
      .map(|(new_id, old_id)| {
        Ok((*new_id, UpdatedPair { old_id: *old_id, old: value(*old_id)?, new: value(*new_id)? }))
      })
      .collect::<Result<_>>()?;
    let deleted = contribution
      .ids_to_delete
      .iter()
      .map(|id| Ok((*id, value(*id)?)))
      .collect::<Result<_>>()?;

    Ok(Self { contribution, added, updated, deleted })
  }
}

/// Filter for [`crate::store::MovieStore::find_contributions`]. Empty fields
/// match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionQuery {
  pub movie_id:       Option<Uuid>,
  pub kind:           Option<FieldKind>,
  pub status:         Option<DataStatus>,
  pub created_after:  Option<DateTime<Utc>>,
  pub created_before: Option<DateTime<Utc>>,
}

impl ContributionQuery {
  pub fn matches(&self, c: &Contribution) -> bool {
    self.movie_id.is_none_or(|id| c.movie_id == id)
      && self.kind.is_none_or(|k| c.kind == k)
      && self.status.is_none_or(|s| c.status == s)
      && self.created_after.is_none_or(|t| c.created_at >= t)
      && self.created_before.is_none_or(|t| c.created_at <= t)
  }
}

/// Resolve a contribution for its author: it must be theirs, of `kind`, and
/// still pending.
pub fn check_revisable(contribution: &Contribution, user_id: Uuid, kind: FieldKind) -> Result<()> {
  if contribution.user_id != user_id || contribution.kind != kind || !contribution.is_waiting() {
    return Err(Error::ContributionNotFound(contribution.contribution_id));
  }
  Ok(())
}
