//! Storage backends beneath the ledger
//!
//! Every accepted mutation reaches the store as a single [`Commit`]: the
//! movie record (new, or with updated aggregates), the review it carries if
//! any, and the journal entry describing it. Backends must apply a commit
//! all-or-nothing.
use super::error::{LedgerError, Result};
use super::event::JournalEntry;
use super::types::{Identity, Movie, Review};
use parking_lot::Mutex;
use sled::{Batch, Db};
use std::sync::Arc;

const OWNER_KEY: &[u8] = b"owner";
const MOVIE_PREFIX: &[u8] = b"movie/";
const REVIEW_PREFIX: &[u8] = b"review/";
const JOURNAL_PREFIX: &[u8] = b"journal/";

/// Everything a store holds, in id order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    pub owner: Option<Identity>,
    pub movies: Vec<Movie>,
    pub reviews: Vec<Review>,
    pub journal: Vec<JournalEntry>,
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub movie: Movie,
    pub review: Option<Review>,
    pub journal: JournalEntry,
}

pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<Snapshot>;
    fn set_owner(&self, owner: &Identity) -> Result<()>;
    fn commit(&self, commit: &Commit) -> Result<()>;
}

/// Non-durable store. Contents are lost with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

pub struct SledStore {
    instance: Arc<sled::Db>,
    flush_on_commit: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.inner.lock().clone())
    }

    fn set_owner(&self, owner: &Identity) -> Result<()> {
        self.inner.lock().owner = Some(owner.clone());
        Ok(())
    }

    fn commit(&self, commit: &Commit) -> Result<()> {
        let mut inner = self.inner.lock();

        let index = (commit.movie.id.get() as usize)
            .checked_sub(1)
            .ok_or_else(|| LedgerError::Corrupted("movie id 0 committed".into()))?;
        match index.cmp(&inner.movies.len()) {
            std::cmp::Ordering::Less => inner.movies[index] = commit.movie.clone(),
            std::cmp::Ordering::Equal => inner.movies.push(commit.movie.clone()),
            std::cmp::Ordering::Greater => {
                return Err(LedgerError::Corrupted(format!(
                    "movie {} committed out of order",
                    commit.movie.id
                )));
            }
        }
        if let Some(review) = &commit.review {
            inner.reviews.push(review.clone());
        }
        inner.journal.push(commit.journal.clone());

        Ok(())
    }
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            instance,
            flush_on_commit: false,
        }
    }

    /// Opens (or creates) a sled database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self::new(Arc::new(db)))
    }

    /// Flush to disk after every commit instead of relying on sled's
    /// background flusher.
    pub fn flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    pub fn db(&self) -> &Db {
        &self.instance
    }

    fn scan<T>(&self, prefix: &[u8]) -> Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut records = vec![];
        for item in self.instance.scan_prefix(prefix) {
            let (_, value) = item?;
            records.push(minicbor::decode(&value)?);
        }
        Ok(records)
    }
}

fn record_key(prefix: &[u8], id: u64) -> Vec<u8> {
    // big endian so lexicographic scan order is id order
    let mut key = prefix.to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

impl LedgerStore for SledStore {
    fn load(&self) -> Result<Snapshot> {
        let owner = match self.instance.get(OWNER_KEY)? {
            Some(bytes) => Some(minicbor::decode(&bytes)?),
            None => None,
        };

        Ok(Snapshot {
            owner,
            movies: self.scan(MOVIE_PREFIX)?,
            reviews: self.scan(REVIEW_PREFIX)?,
            journal: self.scan(JOURNAL_PREFIX)?,
        })
    }

    fn set_owner(&self, owner: &Identity) -> Result<()> {
        self.instance.insert(OWNER_KEY, minicbor::to_vec(owner)?)?;
        self.instance.flush()?;
        Ok(())
    }

    fn commit(&self, commit: &Commit) -> Result<()> {
        let mut batch = Batch::default();
        batch.insert(
            record_key(MOVIE_PREFIX, commit.movie.id.get()),
            minicbor::to_vec(&commit.movie)?,
        );
        if let Some(review) = &commit.review {
            batch.insert(
                record_key(REVIEW_PREFIX, review.id.get()),
                minicbor::to_vec(review)?,
            );
        }
        batch.insert(
            record_key(JOURNAL_PREFIX, commit.journal.sequence),
            minicbor::to_vec(&commit.journal)?,
        );
        self.instance.apply_batch(batch)?;

        if self.flush_on_commit {
            self.instance.flush()?;
        }
        Ok(())
    }
}
