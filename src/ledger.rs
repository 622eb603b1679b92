//! The ledger: serialized mutations over [`LedgerState`], backed by a store
use super::error::{LedgerError, Result};
use super::event::{EventSink, JournalEntry, TracingSink, verify_journal};
use super::state::LedgerState;
use super::store::{Commit, LedgerStore, MemoryStore};
use super::types::{Identity, Movie, MovieId, Review, ReviewId};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct Ledger {
    state: RwLock<LedgerState>,
    store: Box<dyn LedgerStore>,
    sink: Arc<dyn EventSink>,
}

impl Ledger {
    /// Creates a ledger owned by `owner` on an empty store.
    pub fn initialize(store: impl LedgerStore + 'static, owner: Identity) -> Result<Self> {
        let snapshot = store.load()?;
        if let Some(existing) = snapshot.owner {
            return Err(LedgerError::AlreadyInitialized(existing));
        }
        if !snapshot.movies.is_empty() || !snapshot.reviews.is_empty() {
            return Err(LedgerError::Corrupted(
                "store holds records but no owner".into(),
            ));
        }

        store.set_owner(&owner)?;
        tracing::info!(owner = %owner, "ledger initialized");

        Ok(Self::from_parts(LedgerState::new(owner), store))
    }

    /// Reopens a ledger from a store that was initialized earlier.
    pub fn open(store: impl LedgerStore + 'static) -> Result<Self> {
        let state = LedgerState::from_snapshot(store.load()?)?;
        tracing::info!(
            owner = %state.owner(),
            movies = state.movies_count(),
            reviews = state.review_count(),
            "ledger reopened"
        );

        Ok(Self::from_parts(state, store))
    }

    /// Opens the ledger if the store has one, otherwise initializes it for
    /// `owner`. An existing ledger must have the same owner.
    pub fn open_or_initialize(store: impl LedgerStore + 'static, owner: Identity) -> Result<Self> {
        match store.load()?.owner {
            Some(existing) if existing != owner => Err(LedgerError::AlreadyInitialized(existing)),
            Some(_) => Self::open(store),
            None => Self::initialize(store, owner),
        }
    }

    pub fn in_memory(owner: Identity) -> Result<Self> {
        Self::initialize(MemoryStore::new(), owner)
    }

    fn from_parts(state: LedgerState, store: impl LedgerStore + 'static) -> Self {
        Self {
            state: RwLock::new(state),
            store: Box::new(store),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    // Holds the writer lock across plan, persist, apply and emit so that no
    // reader sees a commit half applied and events leave in commit order.
    fn mutate<F>(&self, operation: &'static str, plan: F) -> Result<Commit>
    where
        F: FnOnce(&LedgerState) -> Result<Commit>,
    {
        let mut state = self.state.write();

        let commit = match plan(&state) {
            Ok(commit) => commit,
            Err(err) => {
                tracing::debug!(operation, error = %err, "call rejected");
                return Err(err);
            }
        };
        self.store.commit(&commit)?;
        state.apply(commit.clone())?;
        self.sink.emit(&commit.journal.event);

        Ok(commit)
    }

    pub fn add_movie(&self, caller: &Identity, name: &str) -> Result<MovieId> {
        let commit = self.mutate("addMovie", |state| state.plan_add_movie(caller, name))?;

        tracing::info!(movie_id = commit.movie.id.get(), name, "movie added");
        Ok(commit.movie.id)
    }

    pub fn rate_movie(
        &self,
        caller: &Identity,
        movie_id: MovieId,
        score: u64,
        text: &str,
    ) -> Result<ReviewId> {
        let commit = self.mutate("rateMovie", |state| {
            state.plan_rate_movie(caller, movie_id, score, text)
        })?;
        let review_id = commit
            .review
            .as_ref()
            .map(|review| review.id)
            .ok_or_else(|| LedgerError::Corrupted("rating commit without a review".into()))?;

        tracing::info!(
            review_id = review_id.get(),
            movie_id = movie_id.get(),
            user = %caller,
            score,
            "movie rated"
        );
        Ok(review_id)
    }

    pub fn owner(&self) -> Identity {
        self.state.read().owner().clone()
    }

    pub fn movies_count(&self) -> u64 {
        self.state.read().movies_count()
    }

    pub fn review_count(&self) -> u64 {
        self.state.read().review_count()
    }

    pub fn get_movie(&self, movie_id: MovieId) -> Result<Movie> {
        self.state.read().movie(movie_id).cloned()
    }

    /// Zero-based positional lookup, `movie_at(0)` is movie 1.
    pub fn movie_at(&self, index: u64) -> Result<Movie> {
        self.state.read().movie_at(index).cloned()
    }

    pub fn total_ratings(&self, movie_id: MovieId) -> Result<u64> {
        Ok(self.state.read().movie(movie_id)?.total_ratings)
    }

    pub fn total_scores(&self, movie_id: MovieId) -> Result<u64> {
        Ok(self.state.read().movie(movie_id)?.total_scores)
    }

    /// Average score with truncating integer division: 11 over 3 ratings is 3.
    pub fn average_score(&self, movie_id: MovieId) -> Result<u64> {
        self.state.read().average_score(movie_id)
    }

    pub fn review(&self, review_id: ReviewId) -> Result<Review> {
        self.state.read().review(review_id).cloned()
    }

    /// Returns review `review_id` only if it was written by `user`.
    pub fn reviews(&self, review_id: ReviewId, user: &Identity) -> Result<Review> {
        let state = self.state.read();
        let review = state.review(review_id)?;
        if review.user != *user {
            return Err(LedgerError::NotFound(format!(
                "review {review_id} by {user}"
            )));
        }
        Ok(review.clone())
    }

    /// The review `user` wrote for `movie_id`.
    pub fn review_of(&self, movie_id: MovieId, user: &Identity) -> Result<Review> {
        self.state.read().review_of(movie_id, user).cloned()
    }

    /// Reads the full journal back from the store.
    pub fn journal(&self) -> Result<Vec<JournalEntry>> {
        let _state = self.state.read();
        Ok(self.store.load()?.journal)
    }

    /// Re-reads the journal and checks its hash chain, returning the head digest.
    pub fn verify_journal(&self) -> Result<Option<String>> {
        verify_journal(&self.journal()?)
    }
}
