//! The permission gate in front of every moderation transition.

use crate::{
  Error, Result,
  field::FieldKind,
  user::{Permission, User},
};

/// Capabilities of which a movie moderator must hold at least one.
pub const MOVIE_MODERATION: [Permission; 2] = [Permission::All, Permission::NewMovie];

pub fn has_any(user: &User, required: &[Permission]) -> bool {
  required.iter().any(|p| user.permissions.contains(p))
}

pub fn has_permission(user: &User, kind: FieldKind) -> bool {
  has_any(user, &kind.necessary_permissions())
}

/// Fail with [`Error::Forbidden`] unless `user` may moderate `kind`.
pub fn require(user: &User, kind: FieldKind) -> Result<()> {
  if has_permission(user, kind) {
    Ok(())
  } else {
    Err(Error::Forbidden { user: user.user_id, scope: kind.to_string() })
  }
}

/// Fail with [`Error::Forbidden`] unless `user` may accept or reject movies.
pub fn require_movie_moderation(user: &User) -> Result<()> {
  if has_any(user, &MOVIE_MODERATION) {
    Ok(())
  } else {
    Err(Error::Forbidden { user: user.user_id, scope: "movies".into() })
  }
}
