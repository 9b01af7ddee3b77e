//! Crate-level error type.
//!
//! Module errors convert into [`Error`] with `?`. Only load-time
//! failures reach this type; per-row and per-scope problems travel as
//! diagnostics on the run result.

use crate::config::ConfigError;
use crate::core::calendar::{CalendarError, InvalidDateError};
use crate::core::ledger_row::MalformedRowError;
use crate::rules::rule_set::RuleParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rules(#[from] RuleParseError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    InvalidDate(#[from] InvalidDateError),
    #[error(transparent)]
    MalformedRow(#[from] MalformedRowError),
    #[error("cannot read ledger export: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot serialize run result: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Rules(_) | Error::Calendar(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
