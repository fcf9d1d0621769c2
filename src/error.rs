//! Error types.
//!
//! There are two kinds of failure which must reach the caller: a model that breaks
//! one of its invariants ([`InvalidModelError`]) and a logarithm of a zero probability
//! inside the inference engine ([`NumericalDomainError`]). Degenerate moves are not errors;
//! see [`crate::moves::Proposal`].
use thiserror::Error;

/// A broken invariant of a [`crate::model::Model`]. Never corrected automatically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidModelError {
    #[error("transition matrix is {rows}x{columns}, but {states} labels require {expected_rows}x{states}")]
    TransitionShape {
        rows: usize,
        columns: usize,
        states: usize,
        expected_rows: usize,
    },
    #[error("emission matrix is {rows}x{columns}, but {states} labels require {expected_rows}x{states}")]
    EmissionShape {
        rows: usize,
        columns: usize,
        states: usize,
        expected_rows: usize,
    },
    #[error("row {row} of the {rows}x{columns} transition matrix sums to {sum}, not 1")]
    TransitionRowSum {
        row: usize,
        sum: f64,
        rows: usize,
        columns: usize,
    },
    #[error("column {column} of the {rows}x{columns} emission matrix sums to {sum}, not 1")]
    EmissionColumnSum {
        column: usize,
        sum: f64,
        rows: usize,
        columns: usize,
    },
    #[error("the {states}x{states} transition graph between real states is not strongly connected")]
    NotStronglyConnected { states: usize },
    #[error("a model needs at least one state")]
    NoStates,
}

/// Logarithm of a probability which is zero at a point where it must not be.
/// It means some invariant upstream is already broken, so it is fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalDomainError {
    #[error("log(0): transition {from}->{to} has zero probability")]
    Transition { from: usize, to: usize },
    #[error("log(0): state {state} never emits symbol {symbol}")]
    Emission { symbol: usize, state: usize },
    #[error("log(0): the sequence has zero probability at position {position}")]
    Scale { position: usize },
}

/// Every error the crate can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid model: {0}")]
    InvalidModel(#[from] InvalidModelError),
    #[error("numerical domain error: {0}")]
    NumericalDomain(#[from] NumericalDomainError),
    #[error("unknown residue '{residue}' at position {position}")]
    UnknownResidue { residue: char, position: usize },
    #[error("unknown secondary structure code '{code}' at position {position}")]
    UnknownStructure { code: char, position: usize },
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("no sampled models to take a consensus from")]
    EmptySampleSet,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
