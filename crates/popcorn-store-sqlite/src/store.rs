//! [`SqliteStore`] — the SQLite implementation of [`MovieStore`].
//!
//! Each mutating operation runs as one `BEGIN IMMEDIATE` transaction on the
//! connection thread: it loads the actor, the movie with the field instances
//! of the kind in question and, where relevant, the contribution; hands them
//! to the pure engine; then writes back the row-level difference. The
//! reserved lock taken up-front serializes concurrent writers on their
//! liveness checks, and any error drops the transaction.

use std::{path::Path, sync::Arc};

use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use popcorn_core::{
  content::ContentStore,
  contribution::{
    Contribution, ContributionQuery, ContributionView, Decision, Proposal, Revision,
  },
  engine,
  field::{FieldInstance, FieldKind, FieldValue},
  ledger::{DataStatus, MovieRecord, live_instances},
  movie::{Movie, NewMovie, check_premiere, check_rate, mean_rating},
  store::MovieStore,
  user::{CurrentActor, NewUser, User},
  verification,
};

use crate::{
  Error, Result,
  encode::{
    RawContribution, RawInstance, RawMovie, RawUser, encode_dt, encode_json, encode_uuid, now,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Popcorn movie store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection and content store are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  content: Arc<dyn ContentStore>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, content: Arc<dyn ContentStore>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, content };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(content: Arc<dyn ContentStore>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, content };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside one immediate transaction, committing only if it
  /// succeeds.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = match f(&tx) {
          Ok(out) => out,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(out))
      })
      .await?
  }

  /// Run `f` against the connection without an explicit transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── Row access ──────────────────────────────────────────────────────────────
//
// Synchronous helpers that run on the connection thread, inside whatever
// transaction the caller holds.

fn load_user(conn: &Connection, user_id: Uuid) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM users WHERE user_id = ?1", RawUser::COLUMNS),
      rusqlite::params![encode_uuid(user_id)],
      RawUser::from_row,
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

fn load_enabled_user(conn: &Connection, user_id: Uuid) -> Result<User> {
  Ok(User::require_enabled(load_user(conn, user_id)?, user_id)?)
}

fn load_movie(conn: &Connection, movie_id: Uuid) -> Result<Option<Movie>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM movies WHERE movie_id = ?1", RawMovie::COLUMNS),
      rusqlite::params![encode_uuid(movie_id)],
      RawMovie::from_row,
    )
    .optional()?;
  raw.map(RawMovie::into_movie).transpose()
}

fn require_movie(conn: &Connection, movie_id: Uuid) -> Result<Movie> {
  load_movie(conn, movie_id)?.ok_or(Error::Core(popcorn_core::Error::MovieNotFound(movie_id)))
}

fn require_accepted_movie(conn: &Connection, movie_id: Uuid) -> Result<Movie> {
  load_movie(conn, movie_id)?
    .filter(|m| m.status == DataStatus::Accepted)
    .ok_or(Error::Core(popcorn_core::Error::MovieNotFound(movie_id)))
}

fn load_instances(conn: &Connection, movie_id: Uuid, kind: FieldKind) -> Result<Vec<FieldInstance>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM field_instances WHERE movie_id = ?1 AND kind = ?2 ORDER BY created_at",
    RawInstance::COLUMNS
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(movie_id), kind.to_string()], RawInstance::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawInstance::into_instance).collect()
}

/// The movie together with its instances of `kind`.
fn load_record(conn: &Connection, movie_id: Uuid, kind: FieldKind) -> Result<MovieRecord> {
  let movie = require_movie(conn, movie_id)?;
  let instances = load_instances(conn, movie_id, kind)?;
  Ok(MovieRecord::new(movie, instances))
}

fn load_contribution(conn: &Connection, contribution_id: Uuid) -> Result<Contribution> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM contributions WHERE contribution_id = ?1", RawContribution::COLUMNS),
      rusqlite::params![encode_uuid(contribution_id)],
      RawContribution::from_row,
    )
    .optional()?
    .ok_or(Error::Core(popcorn_core::Error::ContributionNotFound(contribution_id)))?;
  raw.into_contribution()
}

fn write_user(conn: &Connection, user: &User) -> Result<()> {
  conn.execute(
    "INSERT INTO users (user_id, username, enabled, permissions, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(user.user_id),
      user.username,
      user.enabled,
      encode_json(&user.permissions)?,
      encode_dt(user.created_at),
    ],
  )?;
  Ok(())
}

fn write_movie(conn: &Connection, movie: &Movie) -> Result<()> {
  conn.execute(
    "INSERT INTO movies (
       movie_id, title, movie_type, status, rating, favorite_count, created_by, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (movie_id) DO UPDATE SET
       title          = excluded.title,
       status         = excluded.status,
       rating         = excluded.rating,
       favorite_count = excluded.favorite_count",
    rusqlite::params![
      encode_uuid(movie.movie_id),
      movie.title,
      movie.movie_type.to_string(),
      movie.status.to_string(),
      movie.rating.map(f64::from),
      i64::from(movie.favorite_count),
      encode_uuid(movie.created_by),
      encode_dt(movie.created_at),
    ],
  )?;
  Ok(())
}

fn write_instance(conn: &Connection, instance: &FieldInstance) -> Result<()> {
  conn.execute(
    "INSERT INTO field_instances (
       instance_id, movie_id, kind, value_json, status,
       reported_for_update, reported_for_delete, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
     ON CONFLICT (instance_id) DO UPDATE SET
       value_json          = excluded.value_json,
       status              = excluded.status,
       reported_for_update = excluded.reported_for_update,
       reported_for_delete = excluded.reported_for_delete",
    rusqlite::params![
      encode_uuid(instance.instance_id),
      encode_uuid(instance.movie_id),
      instance.kind().to_string(),
      instance.value.to_json()?.to_string(),
      instance.status.to_string(),
      instance.reported_for_update,
      instance.reported_for_delete,
      encode_dt(instance.created_at),
    ],
  )?;
  Ok(())
}

fn write_contribution(conn: &Connection, c: &Contribution) -> Result<()> {
  conn.execute(
    "INSERT INTO contributions (
       contribution_id, movie_id, user_id, kind, status,
       ids_to_add, ids_to_update, ids_to_delete, sources, user_comment,
       created_at, verified_at, verified_by, verification_comment
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
     ON CONFLICT (contribution_id) DO UPDATE SET
       status               = excluded.status,
       ids_to_add           = excluded.ids_to_add,
       ids_to_update        = excluded.ids_to_update,
       ids_to_delete        = excluded.ids_to_delete,
       sources              = excluded.sources,
       user_comment         = excluded.user_comment,
       verified_at          = excluded.verified_at,
       verified_by          = excluded.verified_by,
       verification_comment = excluded.verification_comment",
    rusqlite::params![
      encode_uuid(c.contribution_id),
      encode_uuid(c.movie_id),
      encode_uuid(c.user_id),
      c.kind.to_string(),
      c.status.to_string(),
      encode_json(&c.ids_to_add)?,
      encode_json(&c.ids_to_update)?,
      encode_json(&c.ids_to_delete)?,
      encode_json(&c.sources)?,
      c.user_comment,
      encode_dt(c.created_at),
      c.verified_at.map(encode_dt),
      c.verified_by.map(encode_uuid),
      c.verification_comment,
    ],
  )?;
  Ok(())
}

/// Write everything that differs between `before` and `after`.
fn persist(conn: &Connection, before: &MovieRecord, after: &MovieRecord) -> Result<()> {
  if before.movie != after.movie {
    write_movie(conn, &after.movie)?;
  }

  let changes = after.changes_since(before);
  for instance in changes.inserted.iter().chain(&changes.updated) {
    write_instance(conn, instance)?;
  }
  for id in &changes.removed {
    conn.execute(
      "DELETE FROM field_instances WHERE instance_id = ?1",
      rusqlite::params![encode_uuid(*id)],
    )?;
  }
  Ok(())
}

fn favorite_count(conn: &Connection, movie_id: Uuid) -> Result<u32> {
  let count: i64 = conn.query_row(
    "SELECT COUNT(*) FROM favorites WHERE movie_id = ?1",
    rusqlite::params![encode_uuid(movie_id)],
    |r| r.get(0),
  )?;
  Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

// ─── MovieStore impl ─────────────────────────────────────────────────────────

impl MovieStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    info!(username = %input.username, "add user");

    self
      .write(move |tx| {
        let taken: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            rusqlite::params![input.username],
            |r| r.get(0),
          )
          .optional()?;
        if taken.is_some() {
          return Err(Error::UsernameTaken(input.username));
        }

        let user = User {
          user_id:     Uuid::new_v4(),
          username:    input.username,
          enabled:     true,
          permissions: input.permissions,
          created_at:  now(),
        };
        write_user(tx, &user)?;
        Ok(user)
      })
      .await
  }

  async fn find_enabled_user(&self, user_id: Uuid) -> Result<User> {
    self.read(move |conn| load_enabled_user(conn, user_id)).await
  }

  // ── Movies ────────────────────────────────────────────────────────────────

  async fn create_movie(&self, actor: CurrentActor, input: NewMovie) -> Result<Movie> {
    info!(user_id = %actor.user_id(), title = %input.title, "create movie");

    self
      .write(move |tx| {
        let author = load_enabled_user(tx, actor.user_id())?;
        let record = MovieRecord::submit(author.user_id, input, now());
        write_movie(tx, &record.movie)?;
        for instance in record.instances.values() {
          write_instance(tx, instance)?;
        }
        Ok(record.movie)
      })
      .await
  }

  async fn get_movie(&self, movie_id: Uuid) -> Result<Option<Movie>> {
    self.read(move |conn| load_movie(conn, movie_id)).await
  }

  async fn update_movie_status(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
    decision: Decision,
  ) -> Result<Movie> {
    info!(user_id = %actor.user_id(), %movie_id, ?decision, "update movie status");

    self
      .write(move |tx| {
        let moderator = load_enabled_user(tx, actor.user_id())?;
        let before = load_record(tx, movie_id, FieldKind::OtherTitle)?;
        let mut record = before.clone();
        verification::verify_movie(&mut record, &moderator, decision)?;
        persist(tx, &before, &record)?;
        Ok(record.movie)
      })
      .await
  }

  async fn list_fields(
    &self,
    movie_id: Uuid,
    kind: FieldKind,
    include_inactive: bool,
  ) -> Result<Vec<FieldInstance>> {
    self
      .read(move |conn| {
        let record = load_record(conn, movie_id, kind)?;
        if include_inactive {
          return Ok(record.instances_of(kind).cloned().collect());
        }
        Ok(live_instances(record.instances.values(), kind).into_iter().cloned().collect())
      })
      .await
  }

  // ── Contributions ─────────────────────────────────────────────────────────

  async fn create_contribution(
    &self,
    actor: CurrentActor,
    movie_id: Uuid,
    proposal: Proposal,
  ) -> Result<Contribution> {
    info!(user_id = %actor.user_id(), %movie_id, kind = %proposal.kind, "create contribution");
    let content = Arc::clone(&self.content);

    self
      .write(move |tx| {
        let author = load_enabled_user(tx, actor.user_id())?;
        let before = load_record(tx, movie_id, proposal.kind)?;
        let mut record = before.clone();
        let contribution =
          engine::create_contribution(&mut record, &author, proposal, content.as_ref(), now())?;
        persist(tx, &before, &record)?;
        write_contribution(tx, &contribution)?;
        Ok(contribution)
      })
      .await
  }

  async fn revise_contribution(
    &self,
    actor: CurrentActor,
    contribution_id: Uuid,
    revision: Revision,
  ) -> Result<Contribution> {
    info!(user_id = %actor.user_id(), %contribution_id, kind = %revision.kind, "revise contribution");
    let content = Arc::clone(&self.content);

    self
      .write(move |tx| {
        let author = load_enabled_user(tx, actor.user_id())?;
        let mut contribution = load_contribution(tx, contribution_id)?;
        let before = load_record(tx, contribution.movie_id, contribution.kind)?;
        let mut record = before.clone();
        engine::revise_contribution(
          &mut record,
          &mut contribution,
          &author,
          revision,
          content.as_ref(),
          now(),
        )?;
        persist(tx, &before, &record)?;
        write_contribution(tx, &contribution)?;
        Ok(contribution)
      })
      .await
  }

  async fn verify_contribution(
    &self,
    actor: CurrentActor,
    contribution_id: Uuid,
    decision: Decision,
    comment: Option<String>,
  ) -> Result<Contribution> {
    info!(user_id = %actor.user_id(), %contribution_id, ?decision, "verify contribution");

    self
      .write(move |tx| {
        let moderator = load_enabled_user(tx, actor.user_id())?;
        let mut contribution = load_contribution(tx, contribution_id)?;
        let before = load_record(tx, contribution.movie_id, contribution.kind)?;
        let mut record = before.clone();
        verification::verify_contribution(
          &mut record,
          &mut contribution,
          &moderator,
          decision,
          comment,
          now(),
        )?;
        persist(tx, &before, &record)?;
        write_contribution(tx, &contribution)?;
        Ok(contribution)
      })
      .await
  }

  async fn get_contribution(&self, contribution_id: Uuid, kind: FieldKind) -> Result<ContributionView> {
    self
      .read(move |conn| {
        let contribution = load_contribution(conn, contribution_id)?;
        if contribution.kind != kind {
          return Err(popcorn_core::Error::ContributionNotFound(contribution_id).into());
        }
        let record = load_record(conn, contribution.movie_id, kind)?;
        Ok(ContributionView::assemble(contribution, &record)?)
      })
      .await
  }

  async fn find_contributions(&self, query: &ContributionQuery) -> Result<Vec<Contribution>> {
    let movie_id = query.movie_id.map(encode_uuid);
    let kind = query.kind.map(|k| k.to_string());
    let status = query.status.map(|s| s.to_string());
    let after = query.created_after.map(encode_dt);
    let before = query.created_before.map(encode_dt);

    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM contributions
           WHERE (?1 IS NULL OR movie_id = ?1)
             AND (?2 IS NULL OR kind = ?2)
             AND (?3 IS NULL OR status = ?3)
             AND (?4 IS NULL OR created_at >= ?4)
             AND (?5 IS NULL OR created_at <= ?5)
           ORDER BY created_at DESC",
          RawContribution::COLUMNS
        ))?;
        let raws = stmt
          .query_map(
            rusqlite::params![movie_id, kind, status, after, before],
            RawContribution::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawContribution::into_contribution).collect()
      })
      .await
  }

  // ── Ratings & favorites ───────────────────────────────────────────────────

  async fn rate_movie(&self, actor: CurrentActor, movie_id: Uuid, rate: u8) -> Result<Movie> {
    info!(user_id = %actor.user_id(), %movie_id, rate, "rate movie");
    check_rate(rate)?;

    self
      .write(move |tx| {
        let user = load_enabled_user(tx, actor.user_id())?;
        let mut movie = require_accepted_movie(tx, movie_id)?;

        let today = now().date_naive();
        let release_dates: Vec<_> = load_instances(tx, movie_id, FieldKind::ReleaseDate)?
          .into_iter()
          .filter(|i| i.status == DataStatus::Accepted)
          .filter_map(|i| match i.value {
            FieldValue::ReleaseDate(v) => Some(v.date),
            _ => None,
          })
          .collect();
        check_premiere(movie_id, &release_dates, today)?;

        tx.execute(
          "INSERT INTO ratings (movie_id, user_id, rate, rated_at) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (movie_id, user_id) DO UPDATE SET
             rate     = excluded.rate,
             rated_at = excluded.rated_at",
          rusqlite::params![encode_uuid(movie_id), encode_uuid(user.user_id), rate, encode_dt(now())],
        )?;

        let mut stmt = tx.prepare("SELECT rate FROM ratings WHERE movie_id = ?1")?;
        let rates = stmt
          .query_map(rusqlite::params![encode_uuid(movie_id)], |r| r.get::<_, u8>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        movie.rating = mean_rating(&rates);
        write_movie(tx, &movie)?;
        Ok(movie)
      })
      .await
  }

  async fn add_favorite(&self, actor: CurrentActor, movie_id: Uuid) -> Result<Movie> {
    info!(user_id = %actor.user_id(), %movie_id, "add favorite");

    self
      .write(move |tx| {
        let user = load_enabled_user(tx, actor.user_id())?;
        let mut movie = require_accepted_movie(tx, movie_id)?;
        tx.execute(
          "INSERT OR IGNORE INTO favorites (movie_id, user_id, added_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![encode_uuid(movie_id), encode_uuid(user.user_id), encode_dt(now())],
        )?;
        movie.favorite_count = favorite_count(tx, movie_id)?;
        write_movie(tx, &movie)?;
        Ok(movie)
      })
      .await
  }

  async fn remove_favorite(&self, actor: CurrentActor, movie_id: Uuid) -> Result<Movie> {
    info!(user_id = %actor.user_id(), %movie_id, "remove favorite");

    self
      .write(move |tx| {
        let user = load_enabled_user(tx, actor.user_id())?;
        let mut movie = require_accepted_movie(tx, movie_id)?;
        tx.execute(
          "DELETE FROM favorites WHERE movie_id = ?1 AND user_id = ?2",
          rusqlite::params![encode_uuid(movie_id), encode_uuid(user.user_id)],
        )?;
        movie.favorite_count = favorite_count(tx, movie_id)?;
        write_movie(tx, &movie)?;
        Ok(movie)
      })
      .await
  }
}
