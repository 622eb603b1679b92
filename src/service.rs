//! Call boundary in front of the ledger
//!
//! A transport hands over the authenticated caller together with a CBOR
//! encoded [`Call`]. The method name selects the operation, `args` holds the
//! CBOR encoded argument record for that method, and `value` must be zero:
//! the ledger never accepts value transfers. Unknown methods are rejected
//! rather than ignored.
use super::error::{LedgerError, Result};
use super::ledger::Ledger;
use super::types::{Identity, Movie, MovieId, Review, ReviewId};
use minicbor::bytes::ByteVec;
use std::str::FromStr;
use std::sync::Arc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Call {
    #[n(0)]
    pub method: String,
    #[n(1)]
    pub args: ByteVec,
    #[n(2)]
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    AddMovie,
    GetMoviesCount,
    GetMovie,
    Movies,
    RateMovie,
    TotalRatings,
    TotalScores,
    AverageScore,
    Reviews,
    ReviewOf,
    ReviewCount,
    Owner,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AddMovieArgs {
    #[n(0)]
    pub name: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct MovieArgs {
    #[n(0)]
    pub movie_id: MovieId,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct IndexArgs {
    #[n(0)]
    pub index: u64,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RateMovieArgs {
    #[n(0)]
    pub movie_id: MovieId,
    #[n(1)]
    pub score: u64,
    #[n(2)]
    pub text: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ReviewsArgs {
    #[n(0)]
    pub review_id: ReviewId,
    #[n(1)]
    pub user: Identity,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ReviewOfArgs {
    #[n(0)]
    pub movie_id: MovieId,
    #[n(1)]
    pub user: Identity,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    #[n(0)]
    MovieId(#[n(0)] MovieId),
    #[n(1)]
    ReviewId(#[n(0)] ReviewId),
    #[n(2)]
    Count(#[n(0)] u64),
    #[n(3)]
    Movie(#[n(0)] Movie),
    #[n(4)]
    Review(#[n(0)] Review),
    #[n(5)]
    Owner(#[n(0)] Identity),
}

#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<Ledger>,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::AddMovie => "addMovie",
            Method::GetMoviesCount => "getMoviesCount",
            Method::GetMovie => "getMovie",
            Method::Movies => "movies",
            Method::RateMovie => "rateMovie",
            Method::TotalRatings => "totalRatings",
            Method::TotalScores => "totalScores",
            Method::AverageScore => "averageScore",
            Method::Reviews => "reviews",
            Method::ReviewOf => "reviewOf",
            Method::ReviewCount => "reviewCount",
            Method::Owner => "owner",
        }
    }
}

impl FromStr for Method {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s {
            "addMovie" => Method::AddMovie,
            "getMoviesCount" => Method::GetMoviesCount,
            "getMovie" => Method::GetMovie,
            "movies" => Method::Movies,
            "rateMovie" => Method::RateMovie,
            "totalRatings" => Method::TotalRatings,
            "totalScores" => Method::TotalScores,
            "averageScore" => Method::AverageScore,
            "reviews" => Method::Reviews,
            "reviewOf" => Method::ReviewOf,
            "reviewCount" => Method::ReviewCount,
            "owner" => Method::Owner,
            other => return Err(LedgerError::UnknownMethod(other.to_string())),
        };
        Ok(method)
    }
}

impl Call {
    /// Builds a call with CBOR encoded `args` and no value attached.
    pub fn new<A: minicbor::Encode<()>>(method: Method, args: &A) -> Result<Self> {
        Ok(Self {
            method: method.as_str().to_string(),
            args: ByteVec::from(minicbor::to_vec(args)?),
            value: 0,
        })
    }
    /// A call without arguments.
    pub fn bare(method: Method) -> Self {
        Self {
            method: method.as_str().to_string(),
            args: ByteVec::from(Vec::new()),
            value: 0,
        }
    }
    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
    fn decode_args<T>(&self) -> Result<T>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        Ok(minicbor::decode(&self.args)?)
    }
}

impl LedgerService {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Dispatches one call on behalf of `caller`.
    pub fn handle(&self, caller: &Identity, call: &Call) -> Result<Response> {
        if call.value != 0 {
            tracing::debug!(method = %call.method, value = call.value, "call carrying value rejected");
            return Err(LedgerError::ValueNotAccepted(call.value));
        }
        let method = call.method.parse::<Method>().inspect_err(|_| {
            tracing::debug!(method = %call.method, caller = %caller, "unknown method rejected");
        })?;
        let ledger = &self.ledger;

        let response = match method {
            Method::AddMovie => {
                let args: AddMovieArgs = call.decode_args()?;
                Response::MovieId(ledger.add_movie(caller, &args.name)?)
            }
            Method::GetMoviesCount => Response::Count(ledger.movies_count()),
            Method::GetMovie => {
                let args: MovieArgs = call.decode_args()?;
                Response::Movie(ledger.get_movie(args.movie_id)?)
            }
            Method::Movies => {
                let args: IndexArgs = call.decode_args()?;
                Response::Movie(ledger.movie_at(args.index)?)
            }
            Method::RateMovie => {
                let args: RateMovieArgs = call.decode_args()?;
                Response::ReviewId(ledger.rate_movie(
                    caller,
                    args.movie_id,
                    args.score,
                    &args.text,
                )?)
            }
            Method::TotalRatings => {
                let args: MovieArgs = call.decode_args()?;
                Response::Count(ledger.total_ratings(args.movie_id)?)
            }
            Method::TotalScores => {
                let args: MovieArgs = call.decode_args()?;
                Response::Count(ledger.total_scores(args.movie_id)?)
            }
            Method::AverageScore => {
                let args: MovieArgs = call.decode_args()?;
                Response::Count(ledger.average_score(args.movie_id)?)
            }
            Method::Reviews => {
                let args: ReviewsArgs = call.decode_args()?;
                Response::Review(ledger.reviews(args.review_id, &args.user)?)
            }
            Method::ReviewOf => {
                let args: ReviewOfArgs = call.decode_args()?;
                Response::Review(ledger.review_of(args.movie_id, &args.user)?)
            }
            Method::ReviewCount => Response::Count(ledger.review_count()),
            Method::Owner => Response::Owner(ledger.owner()),
        };

        Ok(response)
    }

    /// Decodes a CBOR [`Call`], dispatches it and returns the CBOR encoded [`Response`].
    pub fn handle_bytes(&self, caller: &Identity, bytes: &[u8]) -> Result<Vec<u8>> {
        let call: Call = minicbor::decode(bytes)?;
        let response = self.handle(caller, &call)?;
        Ok(minicbor::to_vec(&response)?)
    }
}
