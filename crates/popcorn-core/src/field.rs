//! Field kinds and field values — the versioned facts attached to a movie.
//!
//! Every kind of movie attribute (titles, release dates, genres, …) shares
//! one envelope, [`FieldInstance`]; the kind-specific payload lives in the
//! [`FieldValue`] tagged union.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Result, content::ImageUpload, ledger::DataStatus, user::Permission};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// One category of movie attribute, each with its own contribution stream.
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
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
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

/// How an accepted update is applied to the instance it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateModel {
  /// The old instance is retired (`EDITED`) and the new one goes live.
  Replace,
  /// The new value is copied onto the old instance, which stays live; the
  /// carrier instance ends up `AMENDMENT_ACCEPTED`.
  Patch,
}

/// Per-kind behaviour. See [`FieldKind::config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindConfig {
  pub permission:   Permission,
  pub update_model: UpdateModel,
  /// Values of this kind reference a blob in the content store.
  pub stores_file:  bool,
}

impl KindConfig {
  const fn replace(permission: Permission) -> Self {
    Self { permission, update_model: UpdateModel::Replace, stores_file: false }
  }

  const fn patch(permission: Permission) -> Self {
    Self { permission, update_model: UpdateModel::Patch, stores_file: false }
  }

  const fn file(permission: Permission) -> Self {
    Self { permission, update_model: UpdateModel::Replace, stores_file: true }
  }
}

impl FieldKind {
  /// The configuration table for every field kind.
  ///
  /// Free-text kinds with one canonical value per movie are patched in
  /// place; multi-valued kinds keep every historical value addressable.
  pub const fn config(self) -> KindConfig {
    match self {
      Self::OtherTitle => KindConfig::replace(Permission::OtherTitle),
      Self::ReleaseDate => KindConfig::replace(Permission::ReleaseDate),
      Self::Outline => KindConfig::patch(Permission::Outline),
      Self::Summary => KindConfig::patch(Permission::Summary),
      Self::Synopsis => KindConfig::patch(Permission::Synopsis),
      Self::Storyline => KindConfig::patch(Permission::Storyline),
      Self::BoxOffice => KindConfig::replace(Permission::BoxOffice),
      Self::Site => KindConfig::replace(Permission::Site),
      Self::Country => KindConfig::replace(Permission::Country),
      Self::Language => KindConfig::replace(Permission::Language),
      Self::Genre => KindConfig::replace(Permission::Genre),
      Self::Review => KindConfig::patch(Permission::Review),
      Self::Photo => KindConfig::file(Permission::Photo),
      Self::Poster => KindConfig::file(Permission::Poster),
    }
  }

  /// Capabilities of which a moderator must hold at least one.
  pub const fn necessary_permissions(self) -> [Permission; 2] {
    [Permission::All, self.config().permission]
  }

  pub const fn is_patch(self) -> bool {
    matches!(self.config().update_model, UpdateModel::Patch)
  }

  pub const fn stores_file(self) -> bool { self.config().stores_file }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// The role an alternative title plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleAttribute {
  OriginalTitle,
  WorkingTitle,
  AlternativeTitle,
  TranslatedTitle,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Genre {
  Action,
  Adventure,
  Animation,
  Biography,
  Comedy,
  Crime,
  Documentary,
  Drama,
  Family,
  Fantasy,
  History,
  Horror,
  Music,
  Musical,
  Mystery,
  Romance,
  SciFi,
  Sport,
  Thriller,
  War,
  Western,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherTitleValue {
  pub title:     String,
  /// ISO 3166 country code, if the title is country-specific.
  pub country:   Option<String>,
  pub attribute: Option<TitleAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDateValue {
  pub date:    NaiveDate,
  pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxOfficeValue {
  /// Takings in whole currency units.
  pub amount:  u64,
  pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteValue {
  pub url:      String,
  pub official: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewValue {
  pub title:   String,
  pub text:    String,
  #[serde(default)]
  pub spoiler: bool,
}

/// A blob held by the content store; no binary data lives in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValue {
  pub storage_id: String,
  pub media_type: String,
}

// ─── FieldValue ──────────────────────────────────────────────────────────────

/// The typed payload of a field instance. The variant name is the kind tag
/// stored alongside the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
  OtherTitle(OtherTitleValue),
  ReleaseDate(ReleaseDateValue),
  Outline(String),
  Summary(String),
  Synopsis(String),
  Storyline(String),
  BoxOffice(BoxOfficeValue),
  Site(SiteValue),
  Country(String),
  Language(String),
  Genre(Genre),
  Review(ReviewValue),
  Photo(ImageValue),
  Poster(ImageValue),
}

impl FieldValue {
  pub fn kind(&self) -> FieldKind {
    match self {
      Self::OtherTitle(_) => FieldKind::OtherTitle,
      Self::ReleaseDate(_) => FieldKind::ReleaseDate,
      Self::Outline(_) => FieldKind::Outline,
      Self::Summary(_) => FieldKind::Summary,
      Self::Synopsis(_) => FieldKind::Synopsis,
      Self::Storyline(_) => FieldKind::Storyline,
      Self::BoxOffice(_) => FieldKind::BoxOffice,
      Self::Site(_) => FieldKind::Site,
      Self::Country(_) => FieldKind::Country,
      Self::Language(_) => FieldKind::Language,
      Self::Genre(_) => FieldKind::Genre,
      Self::Review(_) => FieldKind::Review,
      Self::Photo(_) => FieldKind::Photo,
      Self::Poster(_) => FieldKind::Poster,
    }
  }

  /// The uniqueness key: two live instances of one movie and kind must never
  /// share it. Also used verbatim in conflict messages.
  pub fn natural_key(&self) -> String {
    fn country(c: &Option<String>) -> String {
      c.as_deref().map(str::to_uppercase).unwrap_or_else(|| "-".into())
    }

    match self {
      Self::OtherTitle(v) => format!(
        "title {:?} and country {}",
        v.title.trim().to_lowercase(),
        country(&v.country)
      ),
      Self::ReleaseDate(v) => {
        format!("date {} and country {}", v.date, country(&v.country))
      }
      Self::Outline(t) | Self::Summary(t) | Self::Synopsis(t) | Self::Storyline(t) => {
        format!("text {t:?}")
      }
      Self::BoxOffice(v) => {
        format!("box office {} and country {}", v.amount, country(&v.country))
      }
      Self::Site(v) => format!("site {:?} (official: {})", v.url, v.official),
      Self::Country(c) => format!("country {}", c.to_uppercase()),
      Self::Language(l) => format!("language {}", l.to_lowercase()),
      Self::Genre(g) => format!("genre {g}"),
      Self::Review(v) => format!("review {:?} / {:?}", v.title, v.text),
      Self::Photo(v) | Self::Poster(v) => format!("file {}", v.storage_id),
    }
  }

  /// The blob this value references, for kinds that store files.
  pub fn storage_id(&self) -> Option<&str> {
    match self {
      Self::Photo(v) | Self::Poster(v) => Some(&v.storage_id),
      _ => None,
    }
  }

  pub fn is_original_title(&self) -> bool {
    matches!(
      self,
      Self::OtherTitle(OtherTitleValue { attribute: Some(TitleAttribute::OriginalTitle), .. })
    )
  }

  /// Build an image value of `kind` for a freshly stored blob.
  pub fn image(kind: FieldKind, storage_id: String, media_type: String) -> Option<Self> {
    let image = ImageValue { storage_id, media_type };
    match kind {
      FieldKind::Photo => Some(Self::Photo(image)),
      FieldKind::Poster => Some(Self::Poster(image)),
      _ => None,
    }
  }

  /// Serialise the inner payload (without the kind tag) for storage.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("value").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Rebuild a value from its stored kind tag and JSON payload.
  pub fn from_parts(kind: FieldKind, value: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "kind": kind, "value": value });
    Ok(serde_json::from_value(wrapped)?)
  }
}

// ─── Proposal inputs ─────────────────────────────────────────────────────────

/// One element of a proposal: either a ready value or, for kinds that store
/// files, an upload that becomes a value once the content store accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldInput {
  Value(FieldValue),
  Upload(ImageUpload),
}

impl From<FieldValue> for FieldInput {
  fn from(value: FieldValue) -> Self { Self::Value(value) }
}

impl From<ImageUpload> for FieldInput {
  fn from(upload: ImageUpload) -> Self { Self::Upload(upload) }
}

// ─── FieldInstance ───────────────────────────────────────────────────────────

/// One versioned value attached to a movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInstance {
  pub instance_id:         Uuid,
  pub movie_id:            Uuid,
  pub value:               FieldValue,
  pub status:              DataStatus,
  pub reported_for_update: bool,
  pub reported_for_delete: bool,
  pub created_at:          DateTime<Utc>,
}

impl FieldInstance {
  /// A new candidate instance awaiting moderation.
  pub fn waiting(movie_id: Uuid, value: FieldValue, now: DateTime<Utc>) -> Self {
    Self {
      instance_id: Uuid::new_v4(),
      movie_id,
      value,
      status: DataStatus::Waiting,
      reported_for_update: false,
      reported_for_delete: false,
      created_at: now,
    }
  }

  pub fn kind(&self) -> FieldKind { self.value.kind() }
}
