use crate::types::{Identity, MovieId, ReviewId};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("caller {caller} is not the ledger owner")]
    Unauthorized { caller: Identity },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("a movie named {0:?} already exists")]
    DuplicateMovie(String),
    #[error("user {user} has already rated movie {movie_id}")]
    DuplicateRating { movie_id: MovieId, user: Identity },
    #[error("{0} not found")]
    NotFound(String),
    #[error("movie {0} has no ratings yet")]
    NoRatings(MovieId),
    #[error("ledger store already has owner {0}")]
    AlreadyInitialized(Identity),
    #[error("ledger store has not been initialized")]
    NotInitialized,
    #[error("no such method: {0}")]
    UnknownMethod(String),
    #[error("calls carrying a value are not accepted (value = {0})")]
    ValueNotAccepted(u64),
    #[error("ledger state is corrupted: {0}")]
    Corrupted(String),
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

impl LedgerError {
    pub fn movie_not_found(movie_id: MovieId) -> Self {
        LedgerError::NotFound(format!("movie {movie_id}"))
    }

    pub fn review_not_found(review_id: ReviewId) -> Self {
        LedgerError::NotFound(format!("review {review_id}"))
    }
}
