use anyhow::Context;
use clap::{Parser, Subcommand};
use movie_ratings::{
    Identity, MovieId,
    config::{DEFAULT_LOG_FILTER, LedgerConfig},
    logging, utils,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "movie-ratings", about = "Movie ratings ledger")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity the call is made as (defaults to the configured owner)
    #[arg(long)]
    caller: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a movie (owner only)
    Add { name: String },
    /// Rate a movie from 1 to 5
    Rate {
        movie_id: u64,
        score: u64,
        #[arg(default_value = "")]
        text: String,
    },
    /// Show a movie and its aggregates
    Show { movie_id: u64 },
    /// Show the truncated average score of a movie
    Average { movie_id: u64 },
    /// List every movie
    List,
    /// Print the event journal and verify its hash chain
    Journal,
    /// Generate a fresh caller identity
    NewIdentity {
        #[arg(default_value = "user_")]
        prefix: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    logging::init_logger(if config.log_filter.is_empty() {
        DEFAULT_LOG_FILTER
    } else {
        config.log_filter.as_str()
    });

    if let Command::NewIdentity { prefix } = &cli.command {
        println!("{}", utils::new_identity(prefix)?);
        return Ok(());
    }

    let ledger = config.open_ledger()?;
    let caller = cli
        .caller
        .map(Identity::from)
        .unwrap_or_else(|| ledger.owner());

    match cli.command {
        Command::Add { name } => {
            let movie_id = ledger
                .add_movie(&caller, &name)
                .with_context(|| format!("failed to add {name:?}"))?;
            println!("added movie {movie_id}: {name}");
        }
        Command::Rate {
            movie_id,
            score,
            text,
        } => {
            let review_id = ledger
                .rate_movie(&caller, MovieId(movie_id), score, &text)
                .with_context(|| format!("failed to rate movie {movie_id}"))?;
            println!("recorded review {review_id}");
        }
        Command::Show { movie_id } => {
            let movie = ledger.get_movie(MovieId(movie_id))?;
            println!(
                "{}: {} ({} ratings, {} total)",
                movie.id, movie.name, movie.total_ratings, movie.total_scores
            );
        }
        Command::Average { movie_id } => {
            println!("{}", ledger.average_score(MovieId(movie_id))?);
        }
        Command::List => {
            for index in 0..ledger.movies_count() {
                let movie = ledger.movie_at(index)?;
                let average = movie
                    .average_score()
                    .map_or_else(|| "-".to_string(), |avg| avg.to_string());
                println!("{}\t{}\t{}\t{}", movie.id, movie.name, movie.total_ratings, average);
            }
        }
        Command::Journal => {
            for entry in ledger.journal()? {
                println!(
                    "#{} {} {} {:?}",
                    entry.sequence,
                    entry.recorded_at.to_datetime_utc().to_rfc3339(),
                    entry.event.name(),
                    entry.event
                );
            }
            match ledger.verify_journal()? {
                Some(head) => println!("journal head {head}"),
                None => println!("journal is empty"),
            }
        }
        Command::NewIdentity { .. } => {}
    }

    Ok(())
}
