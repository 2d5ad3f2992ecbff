//! The verification state machine: `WAITING → ACCEPTED | REJECTED`, for
//! movies as a whole and for individual contributions.
//!
//! Accepting a contribution fans its decision out to every instance it
//! references:
//!
//! | Entry                 | Accept                                           | Reject                      |
//! |-----------------------|--------------------------------------------------|-----------------------------|
//! | addition              | `ACCEPTED`                                       | `REJECTED`                  |
//! | deletion              | `DELETED`                                        | reported-for-delete cleared |
//! | update, replace kind  | new `ACCEPTED`, old `EDITED`                     | new `REJECTED`, old cleared |
//! | update, patch kind    | value copied onto old, new `AMENDMENT_ACCEPTED`  | new `REJECTED`, old cleared |

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  contribution::{Contribution, Decision},
  field::{FieldKind, FieldValue},
  ledger::{DataStatus, MovieRecord},
  permission,
  user::User,
};

/// Record `moderator`'s decision on a pending contribution and apply it to
/// `record`. Nothing changes on error.
pub fn verify_contribution(
  record: &mut MovieRecord,
  contribution: &mut Contribution,
  moderator: &User,
  decision: Decision,
  comment: Option<String>,
  now: DateTime<Utc>,
) -> Result<()> {
  if !contribution.is_waiting() {
    return Err(Error::ContributionNotFound(contribution.contribution_id));
  }
  permission::require(moderator, contribution.kind)?;

  let mut work = record.clone();
  match decision {
    Decision::Accept => accept(&mut work, contribution)?,
    Decision::Reject => reject(&mut work, contribution)?,
  }
  *record = work;

  contribution.status = decision.status();
  contribution.verified_at = Some(now);
  contribution.verified_by = Some(moderator.user_id);
  contribution.verification_comment = comment;

  debug!(
    contribution_id = %contribution.contribution_id,
    status = %contribution.status,
    "verified contribution"
  );
  Ok(())
}

/// Accept or reject a newly submitted movie. Its original-title instance
/// follows the movie's status.
pub fn verify_movie(record: &mut MovieRecord, moderator: &User, decision: Decision) -> Result<()> {
  if record.movie.status != DataStatus::Waiting {
    return Err(Error::MovieNotFound(record.movie.movie_id));
  }
  permission::require_movie_moderation(moderator)?;

  let status = decision.status();
  if let Some(id) = record.original_title_id() {
    record.instance_mut(id)?.status = status;
  }
  record.movie.status = status;

  debug!(movie_id = %record.movie.movie_id, %status, "verified movie");
  Ok(())
}

fn accept(record: &mut MovieRecord, contribution: &Contribution) -> Result<()> {
  let kind = contribution.kind;
  let mut promoted: Vec<Uuid> = Vec::new();

  for id in &contribution.ids_to_add {
    record.instance_mut(*id)?.status = DataStatus::Accepted;
    promoted.push(*id);
  }

  for id in &contribution.ids_to_delete {
    record.instance_mut(*id)?.status = DataStatus::Deleted;
  }

  for (new_id, old_id) in &contribution.ids_to_update {
    if kind.is_patch() {
      let value = record.instance(*new_id)?.value.clone();
      let old = record.instance_mut(*old_id)?;
      old.value = value;
      old.reported_for_update = false;
      record.instance_mut(*new_id)?.status = DataStatus::AmendmentAccepted;
      promoted.push(*old_id);
      debug!(%new_id, %old_id, "patched instance in place");
    } else {
      record.instance_mut(*new_id)?.status = DataStatus::Accepted;
      record.instance_mut(*old_id)?.status = DataStatus::Edited;
      promoted.push(*new_id);
    }
  }

  check_promoted_unique(record, kind, &promoted)?;

  if kind == FieldKind::OtherTitle {
    sync_movie_title(record);
  }
  Ok(())
}

fn reject(record: &mut MovieRecord, contribution: &Contribution) -> Result<()> {
  for id in &contribution.ids_to_add {
    record.instance_mut(*id)?.status = DataStatus::Rejected;
  }

  for id in &contribution.ids_to_delete {
    record.clear_reported_for_delete(*id);
  }

  for (new_id, old_id) in &contribution.ids_to_update {
    record.instance_mut(*new_id)?.status = DataStatus::Rejected;
    record.clear_reported_for_update(*old_id);
  }
  Ok(())
}

/// Two pending proposals may stage the same value; only the first one to be
/// accepted wins.
fn check_promoted_unique(record: &MovieRecord, kind: FieldKind, promoted: &[Uuid]) -> Result<()> {
  for id in promoted {
    let key = record.instance(*id)?.value.natural_key();
    let clash = record.instances_of(kind).any(|other| {
      other.instance_id != *id
        && other.status == DataStatus::Accepted
        && other.value.natural_key() == key
    });
    if clash {
      return Err(Error::DuplicateValue { kind, key });
    }
  }
  Ok(())
}

/// Keep `Movie::title` in step with its accepted original title.
fn sync_movie_title(record: &mut MovieRecord) {
  let title = record
    .original_title_id()
    .and_then(|id| record.instances.get(&id))
    .filter(|i| i.status == DataStatus::Accepted)
    .and_then(|i| match &i.value {
      FieldValue::OtherTitle(v) => Some(v.title.clone()),
      _ => None,
    });
  if let Some(title) = title {
    record.movie.title = title;
  }
}
