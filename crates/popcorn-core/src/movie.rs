//! Movie — the aggregate root owning field instances and contributions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  field::{FieldInstance, FieldValue, OtherTitleValue, TitleAttribute},
  ledger::{DataStatus, MovieRecord},
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovieType {
  Movie,
  Series,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
  pub movie_id:       Uuid,
  pub title:          String,
  pub movie_type:     MovieType,
  pub status:         DataStatus,
  /// Mean of all user ratings; `None` until the first rating.
  pub rating:         Option<f32>,
  pub favorite_count: u32,
  pub created_by:     Uuid,
  pub created_at:     DateTime<Utc>,
}

impl Movie {
  pub fn waiting(
    created_by: Uuid,
    title: String,
    movie_type: MovieType,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      movie_id: Uuid::new_v4(),
      title,
      movie_type,
      status: DataStatus::Waiting,
      rating: None,
      favorite_count: 0,
      created_by,
      created_at: now,
    }
  }
}

/// Input to [`crate::store::MovieStore::create_movie`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
  pub title:      String,
  pub movie_type: MovieType,
}

impl MovieRecord {
  /// A freshly submitted movie: `WAITING`, with its title recorded as the
  /// original-title instance (also `WAITING`).
  pub fn submit(created_by: Uuid, input: NewMovie, now: DateTime<Utc>) -> Self {
    let movie = Movie::waiting(created_by, input.title.clone(), input.movie_type, now);
    let original = FieldInstance::waiting(
      movie.movie_id,
      FieldValue::OtherTitle(OtherTitleValue {
        title:     input.title,
        country:   None,
        attribute: Some(TitleAttribute::OriginalTitle),
      }),
      now,
    );
    MovieRecord::new(movie, [original])
  }

  /// The instance that carries the movie's original title: the accepted one
  /// once the movie is accepted, the submitted one before that.
  pub fn original_title_id(&self) -> Option<Uuid> {
    let titles = || self.instances.values().filter(|i| i.value.is_original_title());
    titles()
      .find(|i| i.status == DataStatus::Accepted)
      .or_else(|| titles().find(|i| i.status == DataStatus::Waiting))
      .map(|i| i.instance_id)
  }
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

pub const MIN_RATE: u8 = 1;
pub const MAX_RATE: u8 = 10;

pub fn check_rate(rate: u8) -> Result<()> {
  if (MIN_RATE..=MAX_RATE).contains(&rate) {
    Ok(())
  } else {
    Err(Error::InvalidRate(rate))
  }
}

/// A movie can only be rated once its earliest accepted release date has
/// passed. Movies without any release date can always be rated.
pub fn check_premiere(movie_id: Uuid, release_dates: &[NaiveDate], today: NaiveDate) -> Result<()> {
  match release_dates.iter().min() {
    Some(premiere) if today < *premiere => Err(Error::NotPremiered(movie_id)),
    _ => Ok(()),
  }
}

pub fn mean_rating(rates: &[u8]) -> Option<f32> {
  if rates.is_empty() {
    return None;
  }
  let sum: u32 = rates.iter().map(|r| u32::from(*r)).sum();
  Some(sum as f32 / rates.len() as f32)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn submitted_movie_carries_waiting_original_title() {
    let record = MovieRecord::submit(
      Uuid::new_v4(),
      NewMovie { title: "Heat".into(), movie_type: MovieType::Movie },
      Utc::now(),
    );
    assert_eq!(record.movie.status, DataStatus::Waiting);
    let id = record.original_title_id().unwrap();
    assert_eq!(record.instance(id).unwrap().status, DataStatus::Waiting);
  }

  #[test]
  fn rates_outside_range_are_rejected() {
    assert!(check_rate(0).is_err());
    assert!(check_rate(1).is_ok());
    assert!(check_rate(10).is_ok());
    assert!(matches!(check_rate(11), Err(Error::InvalidRate(11))));
  }

  #[test]
  fn premiere_uses_earliest_release_date() {
    let id = Uuid::new_v4();
    let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let today = d(2020, 6, 1);

    assert!(check_premiere(id, &[], today).is_ok());
    assert!(check_premiere(id, &[d(2021, 1, 1), d(2020, 1, 1)], today).is_ok());
    assert!(matches!(
      check_premiere(id, &[d(2021, 1, 1)], today),
      Err(Error::NotPremiered(_))
    ));
  }

  #[test]
  fn mean_of_rates() {
    assert_eq!(mean_rating(&[]), None);
    assert_eq!(mean_rating(&[4, 8]), Some(6.0));
  }
}
