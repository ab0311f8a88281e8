//! Vote search - parameter-driven queries over post and comment votes.
//!
//! This library provides the vote record model, the score range grammar,
//! the search parameter -> query descriptor builder, and a SQLite backend
//! that executes the descriptors.

pub mod config;
pub mod db;
pub mod search;
pub mod target;
pub mod vote;

pub use config::SearchConfig;
pub use search::{SearchContext, SearchParams, VoteQuery, VoteSearch};
pub use target::TargetConfig;
pub use vote::{NewVote, Vote, VoteContext, VoteScore};

use thiserror::Error;

/// Vote search error types covering all failure modes.
#[derive(Error, Debug)]
pub enum VoteSearchError {
    /// Score range string matched none of the recognized forms
    #[error("Invalid format for {column}: {input}")]
    Format {
        /// The offending input string
        input: String,
        /// Target column the filter was aimed at
        column: String,
    },

    /// Vote score outside of -1, 0, 1
    #[error("Invalid vote score {0}: must be 1, 0 or -1")]
    InvalidScore(i64),

    /// Database errors (SQLite operations)
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using VoteSearchError
pub type Result<T> = std::result::Result<T, VoteSearchError>;
