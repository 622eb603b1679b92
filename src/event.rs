//! Ledger notifications and the hash-chained journal that records them
use super::error::{LedgerError, Result};
use super::types::{Identity, MovieId, ReviewId, Score, TimeStamp};
use chrono::Utc;
use parking_lot::Mutex;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    #[n(0)]
    MovieAdded {
        #[n(0)]
        movie_id: MovieId,
        #[n(1)]
        name: String,
    },
    #[n(1)]
    MovieRated {
        #[n(0)]
        review_id: ReviewId,
        #[n(1)]
        movie_id: MovieId,
        #[n(2)]
        user: Identity,
        #[n(3)]
        score: Score,
        #[n(4)]
        text: String,
        // aggregates after this rating was applied
        #[n(5)]
        total_ratings: u64,
        #[n(6)]
        total_scores: u64,
    },
}

/// Receives every notification, in the order mutations were applied.
///
/// `emit` runs while the ledger's writer lock is held, so implementations
/// must not call back into the ledger.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LedgerEvent);
}

/// Logs each notification through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

/// Captures notifications in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

/// One link of the journal. The digest of an entry's CBOR encoding is the
/// `prev_hash` of the entry that follows it.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    #[n(0)]
    pub sequence: u64, // starts at 1
    #[n(1)]
    pub prev_hash: Option<String>,
    #[n(2)]
    pub recorded_at: TimeStamp<Utc>,
    #[n(3)]
    pub event: LedgerEvent,
}

impl LedgerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::MovieAdded { .. } => "MovieAdded",
            LedgerEvent::MovieRated { .. } => "MovieRated",
        }
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::MovieAdded { movie_id, name } => {
                tracing::info!(event = "MovieAdded", movie_id = movie_id.get(), name = %name);
            }
            LedgerEvent::MovieRated {
                review_id,
                movie_id,
                user,
                score,
                total_ratings,
                total_scores,
                ..
            } => {
                tracing::info!(
                    event = "MovieRated",
                    review_id = review_id.get(),
                    movie_id = movie_id.get(),
                    user = %user,
                    score = score.get(),
                    total_ratings,
                    total_scores,
                );
            }
        }
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &LedgerEvent) {
        self.events.lock().push(event.clone());
    }
}

impl JournalEntry {
    /// Builds the entry that follows `prev`, or the first entry when `prev` is `None`.
    pub fn next_after(prev: Option<(&JournalEntry, &str)>, event: LedgerEvent) -> Self {
        let (sequence, prev_hash) = match prev {
            Some((entry, hash)) => (entry.sequence + 1, Some(hash.to_string())),
            None => (1, None),
        };
        Self {
            sequence,
            prev_hash,
            recorded_at: TimeStamp::new(),
            event,
        }
    }
    /// Returns the digest of the entry and its CBOR encoding.
    pub fn build(&self) -> Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(&cbor);

        Ok((hash, cbor))
    }
}

/// Walks the chain and fails on the first entry whose sequence or
/// `prev_hash` does not follow from its predecessor. Returns the head digest.
pub fn verify_journal(entries: &[JournalEntry]) -> Result<Option<String>> {
    let mut head: Option<String> = None;

    for (index, entry) in entries.iter().enumerate() {
        let expected_sequence = index as u64 + 1;
        if entry.sequence != expected_sequence {
            return Err(LedgerError::Corrupted(format!(
                "journal entry {} found where {} was expected",
                entry.sequence, expected_sequence
            )));
        }
        if entry.prev_hash != head {
            return Err(LedgerError::Corrupted(format!(
                "journal entry {} does not link to its predecessor",
                entry.sequence
            )));
        }
        let (hash, _) = entry.build()?;
        head = Some(hash);
    }

    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(id: u64, name: &str) -> LedgerEvent {
        LedgerEvent::MovieAdded {
            movie_id: MovieId(id),
            name: name.to_string(),
        }
    }

    fn chain(events: Vec<LedgerEvent>) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = vec![];
        let mut head: Option<String> = None;
        for event in events {
            let entry = JournalEntry::next_after(
                entries.last().zip(head.as_deref()),
                event,
            );
            head = Some(entry.build().unwrap().0);
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn journal_chain_verifies() {
        let entries = chain(vec![added(1, "The Father"), added(2, "Tom & Jerry")]);

        assert_eq!(entries[0].sequence, 1);
        assert_eq!(entries[0].prev_hash, None);
        assert_eq!(entries[1].sequence, 2);

        let head = verify_journal(&entries).unwrap();
        assert_eq!(head, Some(entries[1].build().unwrap().0));
    }

    #[test]
    fn tampered_journal_is_rejected() {
        let mut entries = chain(vec![added(1, "The Father"), added(2, "Tom & Jerry")]);
        entries[0].event = added(1, "The Mother");

        assert!(matches!(
            verify_journal(&entries),
            Err(LedgerError::Corrupted(_))
        ));
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(&added(1, "a"));
        sink.emit(&added(2, "b"));

        assert_eq!(sink.events(), vec![added(1, "a"), added(2, "b")]);
    }

    #[test]
    fn empty_journal_has_no_head() {
        assert_eq!(verify_journal(&[]).unwrap(), None);
    }
}
