//! Core ledger records and the identifiers that address them
use super::error::{LedgerError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Sequential movie id, starting at 1.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(array)]
pub struct MovieId(#[n(0)] pub u64);

/// Sequential review id, starting at 1 and shared across all movies.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cbor(array)]
pub struct ReviewId(#[n(0)] pub u64);

// opaque, already authenticated caller handle
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cbor(array)]
pub struct Identity(#[n(0)] String);

/// A rating score, always within `Score::MIN..=Score::MAX`.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cbor(array)]
pub struct Score(#[n(0)] u8);

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Movie {
    #[n(0)]
    pub id: MovieId,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub total_ratings: u64,
    #[n(3)]
    pub total_scores: u64,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    #[n(0)]
    pub id: ReviewId,
    #[n(1)]
    pub movie_id: MovieId,
    #[n(2)]
    pub user: Identity,
    #[n(3)]
    pub score: Score,
    #[n(4)]
    pub text: String, // may be empty
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl MovieId {
    pub fn get(self) -> u64 {
        self.0
    }
    pub fn next(self) -> Self {
        MovieId(self.0 + 1)
    }
}

impl ReviewId {
    pub fn get(self) -> u64 {
        self.0
    }
    pub fn next(self) -> Self {
        ReviewId(self.0 + 1)
    }
}

impl Identity {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u64) -> Result<Self> {
        if !(Self::MIN as u64..=Self::MAX as u64).contains(&value) {
            return Err(LedgerError::InvalidInput(format!(
                "score {value} is outside {}..={}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Score(value as u8))
    }
    pub fn get(self) -> u64 {
        self.0 as u64
    }
}

impl Movie {
    pub fn new(id: MovieId, name: String) -> Self {
        Self {
            id,
            name,
            total_ratings: 0,
            total_scores: 0,
        }
    }
    /// Truncating integer average, `None` while the movie is unrated.
    pub fn average_score(&self) -> Option<u64> {
        self.total_scores.checked_div(self.total_ratings)
    }
    /// Returns a copy with one more rating of `score` folded into the aggregates.
    pub fn with_rating(&self, score: Score) -> Self {
        Self {
            total_ratings: self.total_ratings + 1,
            total_scores: self.total_scores + score.get(),
            ..self.clone()
        }
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> std::result::Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(
        d: &mut minicbor::Decoder<'b>,
        _: &mut C,
    ) -> std::result::Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity(value)
    }
}
