//! Property-based tests for the ledger state machine
//!
//! Random call sequences are replayed against the ledger and against a plain
//! model of what should have been accepted. After every sequence the
//! aggregates, counters and notifications must agree with the model.

use movie_ratings::{
    Identity, Ledger, LedgerError, LedgerEvent, MovieId, RecordingSink, ReviewId,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Rating {
    user: u8,
    movie: u64,
    score: u64,
}

/// Strategy for rating attempts, including unknown movies and bad scores
fn rating_strategy(movies: u64) -> impl Strategy<Value = Rating> {
    (0u8..6, 0u64..=movies + 1, 0u64..=6).prop_map(|(user, movie, score)| Rating {
        user,
        movie,
        score,
    })
}

/// Strategy for a list of distinct, non-empty movie names
fn names_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Za-z &]{1,12}", 1..=8)
        .prop_map(|names| names.into_iter().collect())
}

fn owner() -> Identity {
    Identity::new("deployer")
}

fn user(n: u8) -> Identity {
    Identity::new(format!("user{n}"))
}

proptest! {
    /// Property: movie ids are exactly 1..=n in call order
    #[test]
    fn prop_movie_ids_are_dense(names in names_strategy()) {
        let ledger = Ledger::in_memory(owner()).unwrap();

        for (index, name) in names.iter().enumerate() {
            let id = ledger.add_movie(&owner(), name).unwrap();
            prop_assert_eq!(id, MovieId(index as u64 + 1));
        }
        prop_assert_eq!(ledger.movies_count(), names.len() as u64);
    }

    /// Property: re-adding any existing name fails, whoever the caller is
    #[test]
    fn prop_duplicate_names_always_fail(
        names in names_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let ledger = Ledger::in_memory(owner()).unwrap();
        for name in &names {
            ledger.add_movie(&owner(), name).unwrap();
        }
        let name = &names[pick.index(names.len())];

        prop_assert!(
            matches!(
                ledger.add_movie(&owner(), name),
                Err(LedgerError::DuplicateMovie(_))
            ),
            "duplicate movie should be rejected"
        );
        prop_assert!(
            ledger.add_movie(&user(1), name).is_err(),
            "non-owner should be rejected"
        );
        prop_assert_eq!(ledger.movies_count(), names.len() as u64);
    }

    /// Property: aggregates always equal the count and sum of accepted reviews
    #[test]
    fn prop_aggregates_match_accepted_reviews(
        ratings in prop::collection::vec(rating_strategy(3), 0..40)
    ) {
        let sink = Arc::new(RecordingSink::new());
        let ledger = Ledger::in_memory(owner()).unwrap().with_sink(sink.clone());
        for name in ["The Father", "Tom & Jerry", "Our Friend"] {
            ledger.add_movie(&owner(), name).unwrap();
        }

        let mut rated: HashSet<(u8, u64)> = HashSet::new();
        let mut model: HashMap<u64, (u64, u64)> = HashMap::new();
        let mut next_review = 1u64;

        for rating in &ratings {
            let result = ledger.rate_movie(
                &user(rating.user),
                MovieId(rating.movie),
                rating.score,
                "",
            );

            if rating.movie == 0 || rating.movie > 3 {
                prop_assert!(matches!(result, Err(LedgerError::NotFound(_))));
            } else if !(1..=5).contains(&rating.score) {
                prop_assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
            } else if !rated.insert((rating.user, rating.movie)) {
                prop_assert!(matches!(result, Err(LedgerError::DuplicateRating { .. })), "expected DuplicateRating");
            } else {
                prop_assert_eq!(result.unwrap(), ReviewId(next_review));
                next_review += 1;
                let entry = model.entry(rating.movie).or_default();
                entry.0 += 1;
                entry.1 += rating.score;
            }
        }

        for movie in 1..=3u64 {
            let (count, sum) = model.get(&movie).copied().unwrap_or_default();
            prop_assert_eq!(ledger.total_ratings(MovieId(movie)).unwrap(), count);
            prop_assert_eq!(ledger.total_scores(MovieId(movie)).unwrap(), sum);
            match ledger.average_score(MovieId(movie)) {
                Ok(average) => prop_assert_eq!(average, sum / count),
                Err(err) => {
                    prop_assert_eq!(count, 0);
                    prop_assert!(matches!(err, LedgerError::NoRatings(_)));
                }
            }
        }
        prop_assert_eq!(ledger.review_count(), next_review - 1);

        // one MovieRated per accepted review, carrying running aggregates
        let mut running: HashMap<MovieId, (u64, u64)> = HashMap::new();
        let rated_events: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, LedgerEvent::MovieRated { .. }))
            .collect();
        prop_assert_eq!(rated_events.len() as u64, next_review - 1);
        for event in rated_events {
            if let LedgerEvent::MovieRated { movie_id, score, total_ratings, total_scores, .. } = event {
                let entry = running.entry(movie_id).or_default();
                entry.0 += 1;
                entry.1 += score.get();
                prop_assert_eq!((total_ratings, total_scores), *entry);
            }
        }
    }
}
