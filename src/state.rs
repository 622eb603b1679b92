//! The ledger state machine
//!
//! [`LedgerState`] owns the movie and review sequences together with the
//! indexes that enforce uniqueness. Mutations happen in two steps: a `plan_*`
//! method validates a request against the current state and returns the
//! [`Commit`] it would produce without touching anything, then [`apply`]
//! folds an already persisted commit into memory. A rejected plan therefore
//! leaves no trace.
//!
//! [`apply`]: LedgerState::apply
use super::error::{LedgerError, Result};
use super::event::{JournalEntry, LedgerEvent, verify_journal};
use super::store::{Commit, Snapshot};
use super::types::{Identity, Movie, MovieId, Review, ReviewId, Score};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct LedgerState {
    owner: Identity,
    movies: Vec<Movie>,   // movies[i].id == i + 1
    reviews: Vec<Review>, // reviews[i].id == i + 1
    names: HashMap<String, MovieId>,
    ratings: HashMap<(MovieId, Identity), ReviewId>,
    journal_tail: Option<(JournalEntry, String)>,
}

impl LedgerState {
    pub fn new(owner: Identity) -> Self {
        Self {
            owner,
            movies: vec![],
            reviews: vec![],
            names: HashMap::new(),
            ratings: HashMap::new(),
            journal_tail: None,
        }
    }

    /// Rebuilds state from a stored snapshot, checking every ledger invariant
    /// along the way.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let owner = snapshot.owner.ok_or(LedgerError::NotInitialized)?;
        let mut state = Self::new(owner);

        for (index, movie) in snapshot.movies.into_iter().enumerate() {
            if movie.id.get() != index as u64 + 1 {
                return Err(LedgerError::Corrupted(format!(
                    "movie {} stored at position {}",
                    movie.id,
                    index + 1
                )));
            }
            if movie.name.is_empty() {
                return Err(LedgerError::Corrupted(format!(
                    "movie {} has an empty name",
                    movie.id
                )));
            }
            if state.names.insert(movie.name.clone(), movie.id).is_some() {
                return Err(LedgerError::Corrupted(format!(
                    "movie name {:?} is stored twice",
                    movie.name
                )));
            }
            // aggregates are checked against the reviews below
            state.movies.push(movie);
        }

        let mut recomputed = vec![(0u64, 0u64); state.movies.len()];
        for (index, review) in snapshot.reviews.into_iter().enumerate() {
            if review.id.get() != index as u64 + 1 {
                return Err(LedgerError::Corrupted(format!(
                    "review {} stored at position {}",
                    review.id,
                    index + 1
                )));
            }
            Score::new(review.score.get())
                .map_err(|_| LedgerError::Corrupted(format!("review {} score", review.id)))?;
            let slot = state
                .movie_index(review.movie_id)
                .map_err(|_| {
                    LedgerError::Corrupted(format!(
                        "review {} references unknown movie {}",
                        review.id, review.movie_id
                    ))
                })?;
            let key = (review.movie_id, review.user.clone());
            if state.ratings.insert(key, review.id).is_some() {
                return Err(LedgerError::Corrupted(format!(
                    "user {} rated movie {} twice",
                    review.user, review.movie_id
                )));
            }
            recomputed[slot].0 += 1;
            recomputed[slot].1 += review.score.get();
            state.reviews.push(review);
        }

        for (movie, (ratings, scores)) in state.movies.iter().zip(recomputed) {
            if movie.total_ratings != ratings || movie.total_scores != scores {
                return Err(LedgerError::Corrupted(format!(
                    "movie {} aggregates {}/{} disagree with its reviews {}/{}",
                    movie.id, movie.total_ratings, movie.total_scores, ratings, scores
                )));
            }
        }

        let head = verify_journal(&snapshot.journal)?;
        state.journal_tail = snapshot.journal.into_iter().last().zip(head);

        Ok(state)
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn movies_count(&self) -> u64 {
        self.movies.len() as u64
    }

    pub fn review_count(&self) -> u64 {
        self.reviews.len() as u64
    }

    fn movie_index(&self, movie_id: MovieId) -> Result<usize> {
        match movie_id.get() {
            0 => Err(LedgerError::movie_not_found(movie_id)),
            id if id > self.movies_count() => Err(LedgerError::movie_not_found(movie_id)),
            id => Ok(id as usize - 1),
        }
    }

    pub fn movie(&self, movie_id: MovieId) -> Result<&Movie> {
        let index = self.movie_index(movie_id)?;
        Ok(&self.movies[index])
    }

    /// Zero-based positional lookup into the movie sequence.
    pub fn movie_at(&self, index: u64) -> Result<&Movie> {
        self.movies
            .get(index as usize)
            .ok_or_else(|| LedgerError::NotFound(format!("movie at index {index}")))
    }

    pub fn average_score(&self, movie_id: MovieId) -> Result<u64> {
        let movie = self.movie(movie_id)?;
        movie
            .average_score()
            .ok_or(LedgerError::NoRatings(movie_id))
    }

    pub fn review(&self, review_id: ReviewId) -> Result<&Review> {
        match review_id.get() {
            0 => Err(LedgerError::review_not_found(review_id)),
            id => self
                .reviews
                .get(id as usize - 1)
                .ok_or_else(|| LedgerError::review_not_found(review_id)),
        }
    }

    pub fn review_of(&self, movie_id: MovieId, user: &Identity) -> Result<&Review> {
        self.movie_index(movie_id)?;
        let review_id = self
            .ratings
            .get(&(movie_id, user.clone()))
            .ok_or_else(|| {
                LedgerError::NotFound(format!("review of movie {movie_id} by {user}"))
            })?;
        self.review(*review_id)
    }

    pub fn has_rated(&self, movie_id: MovieId, user: &Identity) -> bool {
        self.ratings.contains_key(&(movie_id, user.clone()))
    }

    fn next_journal_entry(&self, event: LedgerEvent) -> JournalEntry {
        let prev = self
            .journal_tail
            .as_ref()
            .map(|(entry, hash)| (entry, hash.as_str()));
        JournalEntry::next_after(prev, event)
    }

    /// Validates an `addMovie` request: owner only, non-empty, unique name.
    pub fn plan_add_movie(&self, caller: &Identity, name: &str) -> Result<Commit> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized {
                caller: caller.clone(),
            });
        }
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("movie name is empty".into()));
        }
        if self.names.contains_key(name) {
            return Err(LedgerError::DuplicateMovie(name.to_string()));
        }

        let movie = Movie::new(MovieId(self.movies_count()).next(), name.to_string());
        let journal = self.next_journal_entry(LedgerEvent::MovieAdded {
            movie_id: movie.id,
            name: movie.name.clone(),
        });

        Ok(Commit {
            movie,
            review: None,
            journal,
        })
    }

    /// Validates a `rateMovie` request. Checks run in order: movie exists,
    /// score in range, caller has not rated the movie yet.
    pub fn plan_rate_movie(
        &self,
        caller: &Identity,
        movie_id: MovieId,
        score: u64,
        text: &str,
    ) -> Result<Commit> {
        let current = self.movie(movie_id)?;
        let score = Score::new(score)?;
        if self.has_rated(movie_id, caller) {
            return Err(LedgerError::DuplicateRating {
                movie_id,
                user: caller.clone(),
            });
        }

        let review = Review {
            id: ReviewId(self.review_count()).next(),
            movie_id,
            user: caller.clone(),
            score,
            text: text.to_string(),
        };
        let movie = current.with_rating(score);
        let journal = self.next_journal_entry(LedgerEvent::MovieRated {
            review_id: review.id,
            movie_id,
            user: review.user.clone(),
            score,
            text: review.text.clone(),
            total_ratings: movie.total_ratings,
            total_scores: movie.total_scores,
        });

        Ok(Commit {
            movie,
            review: Some(review),
            journal,
        })
    }

    /// Folds a persisted commit into memory. The commit must come from a
    /// `plan_*` call against this exact state.
    pub fn apply(&mut self, commit: Commit) -> Result<()> {
        let Commit {
            movie,
            review,
            journal,
        } = commit;
        let (hash, _) = journal.build()?;

        if movie.id.get() == self.movies_count() + 1 {
            self.names.insert(movie.name.clone(), movie.id);
            self.movies.push(movie);
        } else {
            let index = self.movie_index(movie.id)?;
            self.movies[index] = movie;
        }
        if let Some(review) = review {
            self.ratings
                .insert((review.movie_id, review.user.clone()), review.id);
            self.reviews.push(review);
        }
        self.journal_tail = Some((journal, hash));

        Ok(())
    }
}
