//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that they sort lexically. Enum discriminants use their `snake_case`
//! names. Id sets, source sets and permission sets are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use std::{
  collections::{BTreeMap, BTreeSet},
  str::FromStr,
};

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use popcorn_core::{
  contribution::Contribution,
  field::{FieldInstance, FieldKind, FieldValue},
  ledger::DataStatus,
  movie::{Movie, MovieType},
  user::{Permission, User},
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Discriminants ───────────────────────────────────────────────────────────

/// Parse a `snake_case` discriminant written by its `Display` impl.
pub fn decode_tag<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    Error::Core(popcorn_core::Error::UnknownDiscriminant { what, value: s.to_owned() })
  })
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:     String,
  pub username:    String,
  pub enabled:     bool,
  pub permissions: String,
  pub created_at:  String,
}

impl RawUser {
  pub const COLUMNS: &'static str = "user_id, username, enabled, permissions, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:     row.get(0)?,
      username:    row.get(1)?,
      enabled:     row.get(2)?,
      permissions: row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:     decode_uuid(&self.user_id)?,
      username:    self.username,
      enabled:     self.enabled,
      permissions: decode_json::<BTreeSet<Permission>>(&self.permissions)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `movies` row.
pub struct RawMovie {
  pub movie_id:       String,
  pub title:          String,
  pub movie_type:     String,
  pub status:         String,
  pub rating:         Option<f64>,
  pub favorite_count: i64,
  pub created_by:     String,
  pub created_at:     String,
}

impl RawMovie {
  pub const COLUMNS: &'static str =
    "movie_id, title, movie_type, status, rating, favorite_count, created_by, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      movie_id:       row.get(0)?,
      title:          row.get(1)?,
      movie_type:     row.get(2)?,
      status:         row.get(3)?,
      rating:         row.get(4)?,
      favorite_count: row.get(5)?,
      created_by:     row.get(6)?,
      created_at:     row.get(7)?,
    })
  }

  pub fn into_movie(self) -> Result<Movie> {
    Ok(Movie {
      movie_id:       decode_uuid(&self.movie_id)?,
      title:          self.title,
      movie_type:     decode_tag::<MovieType>("movie type", &self.movie_type)?,
      status:         decode_tag::<DataStatus>("status", &self.status)?,
      rating:         self.rating.map(|r| r as f32),
      favorite_count: u32::try_from(self.favorite_count).unwrap_or(u32::MAX),
      created_by:     decode_uuid(&self.created_by)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `field_instances` row.
pub struct RawInstance {
  pub instance_id:         String,
  pub movie_id:            String,
  pub kind:                String,
  pub value_json:          String,
  pub status:              String,
  pub reported_for_update: bool,
  pub reported_for_delete: bool,
  pub created_at:          String,
}

impl RawInstance {
  pub const COLUMNS: &'static str = "instance_id, movie_id, kind, value_json, status, \
                                     reported_for_update, reported_for_delete, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      instance_id:         row.get(0)?,
      movie_id:            row.get(1)?,
      kind:                row.get(2)?,
      value_json:          row.get(3)?,
      status:              row.get(4)?,
      reported_for_update: row.get(5)?,
      reported_for_delete: row.get(6)?,
      created_at:          row.get(7)?,
    })
  }

  pub fn into_instance(self) -> Result<FieldInstance> {
    let kind = decode_tag::<FieldKind>("field kind", &self.kind)?;
    let value_json: serde_json::Value = serde_json::from_str(&self.value_json)?;

    Ok(FieldInstance {
      instance_id:         decode_uuid(&self.instance_id)?,
      movie_id:            decode_uuid(&self.movie_id)?,
      value:               FieldValue::from_parts(kind, value_json)?,
      status:              decode_tag::<DataStatus>("status", &self.status)?,
      reported_for_update: self.reported_for_update,
      reported_for_delete: self.reported_for_delete,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `contributions` row.
pub struct RawContribution {
  pub contribution_id:      String,
  pub movie_id:             String,
  pub user_id:              String,
  pub kind:                 String,
  pub status:               String,
  pub ids_to_add:           String,
  pub ids_to_update:        String,
  pub ids_to_delete:        String,
  pub sources:              String,
  pub user_comment:         Option<String>,
  pub created_at:           String,
  pub verified_at:          Option<String>,
  pub verified_by:          Option<String>,
  pub verification_comment: Option<String>,
}

impl RawContribution {
  pub const COLUMNS: &'static str = "contribution_id, movie_id, user_id, kind, status, \
                                     ids_to_add, ids_to_update, ids_to_delete, sources, \
                                     user_comment, created_at, verified_at, verified_by, \
                                     verification_comment";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contribution_id:      row.get(0)?,
      movie_id:             row.get(1)?,
      user_id:              row.get(2)?,
      kind:                 row.get(3)?,
      status:               row.get(4)?,
      ids_to_add:           row.get(5)?,
      ids_to_update:        row.get(6)?,
      ids_to_delete:        row.get(7)?,
      sources:              row.get(8)?,
      user_comment:         row.get(9)?,
      created_at:           row.get(10)?,
      verified_at:          row.get(11)?,
      verified_by:          row.get(12)?,
      verification_comment: row.get(13)?,
    })
  }

  pub fn into_contribution(self) -> Result<Contribution> {
    Ok(Contribution {
      contribution_id:      decode_uuid(&self.contribution_id)?,
      movie_id:             decode_uuid(&self.movie_id)?,
      user_id:              decode_uuid(&self.user_id)?,
      kind:                 decode_tag::<FieldKind>("field kind", &self.kind)?,
      status:               decode_tag::<DataStatus>("status", &self.status)?,
      ids_to_add:           decode_json::<BTreeSet<Uuid>>(&self.ids_to_add)?,
      ids_to_update:        decode_json::<BTreeMap<Uuid, Uuid>>(&self.ids_to_update)?,
      ids_to_delete:        decode_json::<BTreeSet<Uuid>>(&self.ids_to_delete)?,
      sources:              decode_json::<BTreeSet<String>>(&self.sources)?,
      user_comment:         self.user_comment,
      created_at:           decode_dt(&self.created_at)?,
      verified_at:          self.verified_at.as_deref().map(decode_dt).transpose()?,
      verified_by:          self.verified_by.as_deref().map(decode_uuid).transpose()?,
      verification_comment: self.verification_comment,
    })
  }
}
