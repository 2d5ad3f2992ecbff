//! Users and their capabilities.
//!
//! User accounts are owned by the hosting application; the core only needs
//! to resolve an enabled user and read its permission set.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// A capability held by a user.
///
/// `All` grants every moderation capability; `NewMovie` covers the
/// acceptance of newly submitted movies; the rest map one-to-one onto
/// [`FieldKind`](crate::field::FieldKind)s.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
  All,
  NewMovie,
  OtherTitle,
  ReleaseDate,
  Outline,
  Summary,
  Synopsis,
  Storyline,
  BoxOffice,
  Site,
  Country,
  Language,
  Genre,
  Review,
  Photo,
  Poster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:     Uuid,
  pub username:    String,
  pub enabled:     bool,
  pub permissions: BTreeSet<Permission>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::MovieStore::add_user`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
  pub username:    String,
  #[serde(default)]
  pub permissions: BTreeSet<Permission>,
}

/// The user on whose behalf an operation runs.
///
/// Resolved by the caller (a session, a request header) and handed to every
/// mutating operation explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrentActor(pub Uuid);

impl CurrentActor {
  pub fn user_id(self) -> Uuid { self.0 }
}

impl User {
  /// Turn a directory lookup into an enabled user, or [`Error::UserNotFound`].
  pub fn require_enabled(found: Option<User>, user_id: Uuid) -> Result<User> {
    found.filter(|u| u.enabled).ok_or(Error::UserNotFound(user_id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn someone(enabled: bool) -> User {
    User {
      user_id:     Uuid::new_v4(),
      username:    "someone".into(),
      enabled,
      permissions: BTreeSet::new(),
      created_at:  Utc::now(),
    }
  }

  #[test]
  fn only_enabled_users_are_found() {
    let active = someone(true);
    let id = active.user_id;
    assert_eq!(User::require_enabled(Some(active.clone()), id).unwrap(), active);

    let disabled = someone(false);
    let id = disabled.user_id;
    assert!(matches!(
      User::require_enabled(Some(disabled), id),
      Err(Error::UserNotFound(missing)) if missing == id
    ));

    let id = Uuid::new_v4();
    assert!(matches!(
      User::require_enabled(None, id),
      Err(Error::UserNotFound(missing)) if missing == id
    ));
  }
}
