use anyhow::Context;
use movie_ratings::{
    Identity, Ledger, LedgerError, LedgerEvent, MovieId, RecordingSink, ReviewId, SledStore,
};
use std::sync::Arc;

use tempfile::tempdir; // Use for test db cleanup.

fn users() -> (Identity, Identity, Identity) {
    (
        Identity::new("deployer"),
        Identity::new("user1"),
        Identity::new("user2"),
    )
}

#[test]
fn add_and_rate_movies() -> anyhow::Result<()> {
    // Sled holds a file lock per database, so every test opens its own
    // database inside a temp dir that is removed on drop.
    let temp_dir = tempdir()?;
    let store = SledStore::open(temp_dir.path().join("add_and_rate.db"))?;

    let (deployer, user1, user2) = users();
    let sink = Arc::new(RecordingSink::new());
    let ledger = Ledger::initialize(store, deployer.clone())?.with_sink(sink.clone());

    let father = ledger.add_movie(&deployer, "The Father")?;
    let tom_and_jerry = ledger.add_movie(&deployer, "Tom & Jerry")?;
    assert_eq!(father, MovieId(1));
    assert_eq!(tom_and_jerry, MovieId(2));

    let r1 = ledger
        .rate_movie(&deployer, father, 4, "happy and blessed")
        .context("first rating failed")?;
    let r2 = ledger.rate_movie(&user1, tom_and_jerry, 5, "funny")?;
    let r3 = ledger.rate_movie(&user2, tom_and_jerry, 3, "cute")?;
    assert_eq!((r1, r2, r3), (ReviewId(1), ReviewId(2), ReviewId(3)));

    assert_eq!(ledger.total_ratings(father)?, 1);
    assert_eq!(ledger.total_scores(father)?, 4);
    assert_eq!(ledger.average_score(father)?, 4);
    assert_eq!(ledger.total_ratings(tom_and_jerry)?, 2);
    assert_eq!(ledger.total_scores(tom_and_jerry)?, 8);
    assert_eq!(ledger.average_score(tom_and_jerry)?, 4);
    assert_eq!(ledger.review_count(), 3);

    let review = ledger.review_of(tom_and_jerry, &user2)?;
    assert_eq!(review.id, ReviewId(3));
    assert_eq!(review.score.get(), 3);
    assert_eq!(review.text, "cute");

    let events = sink.events();
    assert_eq!(events.len(), 5);
    assert_eq!(
        events[1],
        LedgerEvent::MovieAdded {
            movie_id: MovieId(2),
            name: "Tom & Jerry".into(),
        }
    );
    match &events[4] {
        LedgerEvent::MovieRated {
            review_id,
            movie_id,
            user,
            score,
            text,
            total_ratings,
            total_scores,
        } => {
            assert_eq!(*review_id, ReviewId(3));
            assert_eq!(*movie_id, MovieId(2));
            assert_eq!(*user, user2);
            assert_eq!(score.get(), 3);
            assert_eq!(text, "cute");
            assert_eq!((*total_ratings, *total_scores), (2, 8));
        }
        other => panic!("expected MovieRated, got {other:?}"),
    }

    Ok(())
}

#[test]
fn out_of_range_movie_lookups() -> anyhow::Result<()> {
    let (deployer, user1, _) = users();
    let ledger = Ledger::in_memory(deployer.clone())?;
    ledger.add_movie(&deployer, "The Father")?;
    ledger.add_movie(&deployer, "Tom & Jerry")?;

    for id in [0, 3] {
        assert!(matches!(
            ledger.get_movie(MovieId(id)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.total_ratings(MovieId(id)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.total_scores(MovieId(id)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.average_score(MovieId(id)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            ledger.rate_movie(&user1, MovieId(id), 5, "funny"),
            Err(LedgerError::NotFound(_))
        ));
    }
    assert_eq!(ledger.review_count(), 0);

    Ok(())
}

#[test]
fn unrated_movie_has_no_average() -> anyhow::Result<()> {
    let (deployer, user1, _) = users();
    let ledger = Ledger::in_memory(deployer.clone())?;
    ledger.add_movie(&deployer, "The Father")?;
    ledger.add_movie(&deployer, "Tom & Jerry")?;
    let our_friend = ledger.add_movie(&deployer, "Our Friend")?;
    ledger.rate_movie(&user1, MovieId(1), 4, "")?;

    assert!(matches!(
        ledger.average_score(our_friend),
        Err(LedgerError::NoRatings(id)) if id == our_friend
    ));
    assert!(matches!(
        ledger.average_score(MovieId(4)),
        Err(LedgerError::NotFound(_))
    ));

    Ok(())
}

#[test]
fn ledger_survives_restart() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("restart.db");
    let (deployer, user1, user2) = users();

    {
        let store = SledStore::open(&db_path)?.flush_on_commit(true);
        let ledger = Ledger::initialize(store, deployer.clone())?;
        let heat = ledger.add_movie(&deployer, "Heat")?;
        ledger.rate_movie(&user1, heat, 5, "")?;
        ledger.rate_movie(&user2, heat, 2, "too long")?;
    }

    let ledger = Ledger::open(SledStore::open(&db_path)?)?;
    assert_eq!(ledger.owner(), deployer);
    assert_eq!(ledger.movies_count(), 1);
    assert_eq!(ledger.review_count(), 2);
    assert_eq!(ledger.total_scores(MovieId(1))?, 7);
    assert_eq!(ledger.average_score(MovieId(1))?, 3);
    assert_eq!(ledger.journal()?.len(), 3);
    assert!(ledger.verify_journal()?.is_some());

    // indexes are rebuilt, so the constraints still hold
    assert!(matches!(
        ledger.rate_movie(&user1, MovieId(1), 1, ""),
        Err(LedgerError::DuplicateRating { .. })
    ));
    assert!(matches!(
        ledger.add_movie(&deployer, "Heat"),
        Err(LedgerError::DuplicateMovie(_))
    ));
    assert!(matches!(
        ledger.add_movie(&user1, "Ronin"),
        Err(LedgerError::Unauthorized { .. })
    ));

    // counters continue where they left off
    assert_eq!(ledger.add_movie(&deployer, "Ronin")?, MovieId(2));
    assert_eq!(ledger.rate_movie(&user1, MovieId(2), 4, "")?, ReviewId(3));
    assert_eq!(ledger.journal()?.len(), 5);
    assert!(ledger.verify_journal()?.is_some());

    Ok(())
}

#[test]
fn reopening_with_another_owner_fails() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("owner.db");
    let (deployer, user1, _) = users();

    {
        let store = SledStore::open(&db_path)?.flush_on_commit(true);
        Ledger::initialize(store, deployer.clone())?;
    }

    let result = Ledger::open_or_initialize(SledStore::open(&db_path)?, user1);
    assert!(matches!(
        result,
        Err(LedgerError::AlreadyInitialized(owner)) if owner == deployer
    ));

    Ok(())
}
