//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, Utc};
use popcorn_core::{
  ErrorKind, ResourceError as _,
  content::{ImageUpload, MemoryContentStore},
  contribution::{Contribution, ContributionQuery, Decision, Proposal, Revision},
  field::{FieldKind, FieldValue, Genre, ReleaseDateValue},
  ledger::{DataStatus, is_live},
  movie::{Movie, MovieType, NewMovie},
  store::MovieStore,
  user::{CurrentActor, NewUser, Permission, User},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

struct Fixture {
  store:       SqliteStore,
  content:     Arc<MemoryContentStore>,
  admin:       User,
  contributor: User,
  movie:       Movie,
}

impl Fixture {
  fn admin(&self) -> CurrentActor { CurrentActor(self.admin.user_id) }

  fn contributor(&self) -> CurrentActor { CurrentActor(self.contributor.user_id) }

  async fn user(&self, name: &str, permissions: &[Permission]) -> User {
    self
      .store
      .add_user(NewUser { username: name.into(), permissions: permissions.iter().copied().collect() })
      .await
      .unwrap()
  }

  async fn propose(&self, proposal: Proposal) -> Result<Contribution, Error> {
    self.store.create_contribution(self.contributor(), self.movie.movie_id, proposal).await
  }

  async fn verify(&self, c: &Contribution, decision: Decision) -> Result<Contribution, Error> {
    self.store.verify_contribution(self.admin(), c.contribution_id, decision, None).await
  }

  async fn live(&self, kind: FieldKind) -> Vec<FieldValue> {
    let fields = self.store.list_fields(self.movie.movie_id, kind, false).await.unwrap();
    fields.into_iter().map(|i| i.value).collect()
  }

  async fn all(&self, kind: FieldKind) -> Vec<popcorn_core::field::FieldInstance> {
    self.store.list_fields(self.movie.movie_id, kind, true).await.unwrap()
  }
}

/// A store with an admin, a contributor without capabilities, and one
/// accepted movie.
async fn fixture() -> Fixture {
  let content = Arc::new(MemoryContentStore::new());
  let store = SqliteStore::open_in_memory(content.clone()).await.expect("in-memory store");

  let admin = store
    .add_user(NewUser { username: "admin".into(), permissions: [Permission::All].into() })
    .await
    .unwrap();
  let contributor =
    store.add_user(NewUser { username: "fan".into(), ..Default::default() }).await.unwrap();

  let movie = store
    .create_movie(
      CurrentActor(contributor.user_id),
      NewMovie { title: "Alien".into(), movie_type: MovieType::Movie },
    )
    .await
    .unwrap();
  let movie = store
    .update_movie_status(CurrentActor(admin.user_id), movie.movie_id, Decision::Accept)
    .await
    .unwrap();

  Fixture { store, content, admin, contributor, movie }
}

fn genres(gs: &[Genre]) -> Proposal {
  gs.iter().fold(Proposal::new(FieldKind::Genre, ["imdb"]), |p, g| p.add(FieldValue::Genre(*g)))
}

// ─── Users & movies ──────────────────────────────────────────────────────────

#[tokio::test]
async fn usernames_are_unique() {
  let f = fixture().await;
  let err = f
    .store
    .add_user(NewUser { username: "admin".into(), ..Default::default() })
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn unknown_users_are_not_found() {
  let f = fixture().await;
  let err = f.store.find_enabled_user(Uuid::new_v4()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = f
    .store
    .create_contribution(CurrentActor(Uuid::new_v4()), f.movie.movie_id, genres(&[Genre::Horror]))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn submitted_movie_waits_with_its_original_title() {
  let f = fixture().await;
  let movie = f
    .store
    .create_movie(f.contributor(), NewMovie { title: "Aliens".into(), movie_type: MovieType::Movie })
    .await
    .unwrap();
  assert_eq!(movie.status, DataStatus::Waiting);
  assert_eq!(f.store.get_movie(movie.movie_id).await.unwrap(), Some(movie.clone()));

  let titles = f.store.list_fields(movie.movie_id, FieldKind::OtherTitle, true).await.unwrap();
  assert_eq!(titles.len(), 1);
  assert!(titles[0].value.is_original_title());
  assert!(f.store.list_fields(movie.movie_id, FieldKind::OtherTitle, false).await.unwrap().is_empty());

  // Contributions need an accepted movie.
  let err = f
    .store
    .create_contribution(f.contributor(), movie.movie_id, genres(&[Genre::Action]))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  // Only movie moderators may accept it.
  let err =
    f.store.update_movie_status(f.contributor(), movie.movie_id, Decision::Accept).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);

  let accepted = f.store.update_movie_status(f.admin(), movie.movie_id, Decision::Accept).await.unwrap();
  assert_eq!(accepted.status, DataStatus::Accepted);
  let live = f.store.list_fields(movie.movie_id, FieldKind::OtherTitle, false).await.unwrap();
  assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn missing_movie_returns_none() {
  let f = fixture().await;
  assert!(f.store.get_movie(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Contribution round trips ────────────────────────────────────────────────

#[tokio::test]
async fn accepted_genre_goes_live() {
  let f = fixture().await;
  let c = f.propose(genres(&[Genre::Horror])).await.unwrap();
  assert_eq!(c.status, DataStatus::Waiting);
  assert!(f.live(FieldKind::Genre).await.is_empty());

  let verified = f.verify(&c, Decision::Accept).await.unwrap();
  assert_eq!(verified.status, DataStatus::Accepted);
  assert_eq!(verified.verified_by, Some(f.admin.user_id));
  assert_eq!(f.live(FieldKind::Genre).await, vec![FieldValue::Genre(Genre::Horror)]);
}

#[tokio::test]
async fn rejected_genre_never_goes_live() {
  let f = fixture().await;
  let c = f.propose(genres(&[Genre::Horror])).await.unwrap();
  f.verify(&c, Decision::Reject).await.unwrap();

  assert!(f.live(FieldKind::Genre).await.is_empty());
  let all = f.all(FieldKind::Genre).await;
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].status, DataStatus::Rejected);
}

#[tokio::test]
async fn failed_proposals_leave_no_trace() {
  let f = fixture().await;
  let c = f.propose(genres(&[Genre::Horror])).await.unwrap();
  f.verify(&c, Decision::Accept).await.unwrap();
  let horror = *c.ids_to_add.iter().next().unwrap();

  let before_fields = f.all(FieldKind::Genre).await;
  let before_contributions = f.store.find_contributions(&ContributionQuery::default()).await.unwrap();

  let err = f
    .propose(
      Proposal::new(FieldKind::Genre, ["imdb"])
        .add(FieldValue::Genre(Genre::SciFi))
        .update(horror, FieldValue::Genre(Genre::Thriller))
        .delete(horror),
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let err = f.propose(genres(&[Genre::Drama, Genre::Horror])).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);

  let err = f
    .propose(Proposal::new(FieldKind::Genre, ["imdb"]).delete(Uuid::new_v4()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  assert_eq!(f.all(FieldKind::Genre).await, before_fields);
  assert_eq!(
    f.store.find_contributions(&ContributionQuery::default()).await.unwrap(),
    before_contributions
  );
}

#[tokio::test]
async fn accepted_synopsis_update_patches_in_place() {
  let f = fixture().await;
  let first = f
    .propose(Proposal::new(FieldKind::Synopsis, ["imdb"]).add(FieldValue::Synopsis("In space.".into())))
    .await
    .unwrap();
  f.verify(&first, Decision::Accept).await.unwrap();
  let s1 = *first.ids_to_add.iter().next().unwrap();

  let edit = f
    .propose(
      Proposal::new(FieldKind::Synopsis, ["imdb"])
        .update(s1, FieldValue::Synopsis("In space, no one can hear you scream.".into())),
    )
    .await
    .unwrap();
  let s2 = *edit.ids_to_update.keys().next().unwrap();
  assert!(f.live(FieldKind::Synopsis).await.is_empty());

  f.verify(&edit, Decision::Accept).await.unwrap();

  let all = f.all(FieldKind::Synopsis).await;
  let patched = all.iter().find(|i| i.instance_id == s1).unwrap();
  let carrier = all.iter().find(|i| i.instance_id == s2).unwrap();
  assert_eq!(patched.value, FieldValue::Synopsis("In space, no one can hear you scream.".into()));
  assert!(!patched.reported_for_update);
  assert_eq!(carrier.status, DataStatus::AmendmentAccepted);
  assert_eq!(all.iter().filter(|i| is_live(i)).count(), 1);
}

#[tokio::test]
async fn moderators_without_the_capability_are_forbidden() {
  let f = fixture().await;
  let country_mod = f.user("country-mod", &[Permission::Country]).await;
  let c = f.propose(genres(&[Genre::Horror])).await.unwrap();

  let err = f
    .store
    .verify_contribution(CurrentActor(country_mod.user_id), c.contribution_id, Decision::Accept, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);

  let view = f.store.get_contribution(c.contribution_id, FieldKind::Genre).await.unwrap();
  assert_eq!(view.contribution.status, DataStatus::Waiting);
  assert!(f.live(FieldKind::Genre).await.is_empty());

  let genre_mod = f.user("genre-mod", &[Permission::Genre]).await;
  f.store
    .verify_contribution(CurrentActor(genre_mod.user_id), c.contribution_id, Decision::Accept, None)
    .await
    .unwrap();
}

#[tokio::test]
async fn revising_without_an_addition_removes_it() {
  let f = fixture().await;
  let c = f.propose(genres(&[Genre::Horror, Genre::SciFi])).await.unwrap();
  let mut ids = c.ids_to_add.iter().copied();
  let (a, b) = (ids.next().unwrap(), ids.next().unwrap());
  let b_value = f.all(FieldKind::Genre).await.into_iter().find(|i| i.instance_id == b).unwrap().value;

  let revised = f
    .store
    .revise_contribution(
      f.contributor(),
      c.contribution_id,
      Revision::new(FieldKind::Genre, ["imdb", "wikipedia"]).keep_add(b, b_value),
    )
    .await
    .unwrap();

  assert_eq!(revised.ids_to_add, BTreeSet::from([b]));
  assert_eq!(revised.sources.len(), 2);
  let all = f.all(FieldKind::Genre).await;
  assert!(all.iter().all(|i| i.instance_id != a));
  assert_eq!(all.len(), 1);

  // Someone else cannot revise it.
  let err = f
    .store
    .revise_contribution(f.admin(), c.contribution_id, Revision::new(FieldKind::Genre, ["imdb"]))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn rereading_a_verified_contribution_is_stable() {
  let f = fixture().await;
  let seed = f.propose(genres(&[Genre::Horror, Genre::Drama])).await.unwrap();
  f.verify(&seed, Decision::Accept).await.unwrap();
  let mut ids = seed.ids_to_add.iter().copied();
  let (x, y) = (ids.next().unwrap(), ids.next().unwrap());

  let c = f
    .propose(
      Proposal::new(FieldKind::Genre, ["imdb"])
        .add(FieldValue::Genre(Genre::SciFi))
        .update(x, FieldValue::Genre(Genre::Thriller))
        .delete(y),
    )
    .await
    .unwrap();
  f.verify(&c, Decision::Accept).await.unwrap();

  let first = f.store.get_contribution(c.contribution_id, FieldKind::Genre).await.unwrap();
  let second = f.store.get_contribution(c.contribution_id, FieldKind::Genre).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(first.added.len(), 1);
  assert_eq!(first.updated.len(), 1);
  assert_eq!(first.deleted.len(), 1);
  let pair = first.updated.values().next().unwrap();
  assert_eq!(pair.old_id, x);
  assert_eq!(pair.new, FieldValue::Genre(Genre::Thriller));

  let err = f.store.get_contribution(c.contribution_id, FieldKind::Country).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn competing_proposals_keep_one_live_value_per_key() {
  let f = fixture().await;
  let first = f.propose(genres(&[Genre::Horror])).await.unwrap();
  let second = f.propose(genres(&[Genre::Horror])).await.unwrap();

  f.verify(&first, Decision::Accept).await.unwrap();
  let err = f.verify(&second, Decision::Accept).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  f.verify(&second, Decision::Reject).await.unwrap();

  let live = f.live(FieldKind::Genre).await;
  let keys: BTreeSet<String> = live.iter().map(FieldValue::natural_key).collect();
  assert_eq!(keys.len(), live.len());
  assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn concurrent_deletes_of_one_element_serialize() {
  let f = fixture().await;
  let c = f.propose(genres(&[Genre::Horror])).await.unwrap();
  f.verify(&c, Decision::Accept).await.unwrap();
  let id = *c.ids_to_add.iter().next().unwrap();

  let (one, two) = (f.store.clone(), f.store.clone());
  let delete = || Proposal::new(FieldKind::Genre, ["imdb"]).delete(id);
  let (a, b) = tokio::join!(
    one.create_contribution(f.contributor(), f.movie.movie_id, delete()),
    two.create_contribution(f.contributor(), f.movie.movie_id, delete()),
  );

  let (won, lost) = match (a, b) {
    (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
    (a, b) => panic!("expected exactly one success, got {a:?} and {b:?}"),
  };
  assert!(won.ids_to_delete.contains(&id));
  assert_eq!(lost.kind(), ErrorKind::NotFound);

  let waiting = f
    .store
    .find_contributions(&ContributionQuery {
      movie_id: Some(f.movie.movie_id),
      kind: Some(FieldKind::Genre),
      status: Some(DataStatus::Waiting),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(waiting.len(), 1);
  assert!(waiting[0].ids_to_delete.contains(&id));
}

#[tokio::test]
async fn contributions_are_filtered_and_newest_first() {
  let f = fixture().await;
  let a = f.propose(genres(&[Genre::Horror])).await.unwrap();
  let b = f
    .propose(Proposal::new(FieldKind::Country, ["imdb"]).add(FieldValue::Country("US".into())))
    .await
    .unwrap();
  f.verify(&a, Decision::Accept).await.unwrap();

  let all = f.store.find_contributions(&ContributionQuery::default()).await.unwrap();
  assert_eq!(
    all.iter().map(|c| c.contribution_id).collect::<Vec<_>>(),
    vec![b.contribution_id, a.contribution_id]
  );

  let waiting = f
    .store
    .find_contributions(&ContributionQuery { status: Some(DataStatus::Waiting), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(waiting.len(), 1);
  assert_eq!(waiting[0].contribution_id, b.contribution_id);

  let genre = f
    .store
    .find_contributions(&ContributionQuery {
      movie_id: Some(f.movie.movie_id),
      kind: Some(FieldKind::Genre),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(genre.len(), 1);

  let future = f
    .store
    .find_contributions(&ContributionQuery {
      created_after: Some(Utc::now() + Duration::hours(1)),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(future.is_empty());
}

#[tokio::test]
async fn uploads_land_in_the_content_store() {
  let f = fixture().await;
  let c = f
    .propose(Proposal::new(FieldKind::Poster, ["studio"]).add(ImageUpload {
      media_type: "image/jpeg".into(),
      bytes:      vec![0xff, 0xd8, 0xff],
    }))
    .await
    .unwrap();
  assert_eq!(f.content.len(), 1);

  let view = f.store.get_contribution(c.contribution_id, FieldKind::Poster).await.unwrap();
  let storage_id = view.added.values().next().unwrap().storage_id().unwrap().to_owned();
  assert!(f.content.contains(&storage_id));

  let err = f
    .propose(Proposal::new(FieldKind::Poster, ["studio"]).add(ImageUpload {
      media_type: "text/plain".into(),
      bytes:      b"nope".to_vec(),
    }))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);
  assert_eq!(f.content.len(), 1);
}

// ─── Ratings & favorites ─────────────────────────────────────────────────────

#[tokio::test]
async fn ratings_average_across_users() {
  let f = fixture().await;
  f.store.rate_movie(f.admin(), f.movie.movie_id, 9).await.unwrap();
  f.store.rate_movie(f.contributor(), f.movie.movie_id, 4).await.unwrap();
  let movie = f.store.rate_movie(f.contributor(), f.movie.movie_id, 5).await.unwrap();
  assert_eq!(movie.rating, Some(7.0));

  let err = f.store.rate_movie(f.admin(), f.movie.movie_id, 11).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn unreleased_movies_cannot_be_rated() {
  let f = fixture().await;
  let c = f
    .propose(Proposal::new(FieldKind::ReleaseDate, ["imdb"]).add(FieldValue::ReleaseDate(
      ReleaseDateValue { date: (Utc::now() + Duration::days(30)).date_naive(), country: None },
    )))
    .await
    .unwrap();

  // Pending dates do not count.
  f.store.rate_movie(f.admin(), f.movie.movie_id, 8).await.unwrap();

  f.verify(&c, Decision::Accept).await.unwrap();
  let err = f.store.rate_movie(f.admin(), f.movie.movie_id, 8).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn favorites_are_idempotent() {
  let f = fixture().await;
  f.store.add_favorite(f.contributor(), f.movie.movie_id).await.unwrap();
  let movie = f.store.add_favorite(f.contributor(), f.movie.movie_id).await.unwrap();
  assert_eq!(movie.favorite_count, 1);

  let movie = f.store.add_favorite(f.admin(), f.movie.movie_id).await.unwrap();
  assert_eq!(movie.favorite_count, 2);

  f.store.remove_favorite(f.admin(), f.movie.movie_id).await.unwrap();
  let movie = f.store.remove_favorite(f.admin(), f.movie.movie_id).await.unwrap();
  assert_eq!(movie.favorite_count, 1);
  assert_eq!(f.store.get_movie(f.movie.movie_id).await.unwrap().unwrap().favorite_count, 1);
}
