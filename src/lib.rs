pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod logging;
pub mod service;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{LedgerError, Result};
pub use event::{EventSink, JournalEntry, LedgerEvent, RecordingSink, TracingSink};
pub use ledger::Ledger;
pub use service::{Call, LedgerService, Method, Response};
pub use store::{LedgerStore, MemoryStore, SledStore};
pub use types::{Identity, Movie, MovieId, Review, ReviewId, Score};
