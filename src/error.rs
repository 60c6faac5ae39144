/*!
Errors produced by `stockcast`
*/
use std::path::PathBuf;
use thiserror::Error;

/// A `stockcast` result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong between fetching prices and reporting a prediction
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or empty user input, or an operation requested in the wrong session phase
    #[error("{0}")]
    Validation(String),
    /// The upstream data source has nothing for this symbol and period
    #[error("no data found for {symbol} ({period})")]
    NotFound {
        /// The symbol requested
        symbol: String,
        /// The period requested
        period: String,
    },
    /// Not enough history for a window, or a series which cannot be normalized
    #[error("{0}")]
    Domain(String),
    /// A model or scaler artifact is missing, unreadable or does not belong to its partner
    #[error("model artifact {}: {reason}", .path.display())]
    Artifact {
        /// The offending artifact
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
    /// The data source could not be reached, or answered with something unreadable
    #[error("failed to fetch {symbol}: {reason}")]
    Fetch {
        /// The symbol being fetched
        symbol: String,
        /// What went wrong
        reason: String,
    },
    /// An IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A CSV error
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// An error raised by libtorch
    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl Error {
    /// Build a domain error from anything printable
    pub fn domain(msg: impl Into<String>) -> Error {
        Error::Domain(msg.into())
    }

    /// Build an artifact error for a path
    pub fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Error {
        Error::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is fatal to a prediction attempt, rather than to a single symbol
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Artifact { .. } | Error::Validation(_))
    }
}
