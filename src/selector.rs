//! Picks the single operation of a run and rejects conflicting flags.

use std::path::PathBuf;

use crate::{
    config::{Config, Request},
    error::UsageError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Print the detected chip
    Identify,
    Erase,
    /// Dump the range into `path`
    Read { path: PathBuf },
    /// Program the range from `path`, optionally reading it back for comparison
    Write { path: PathBuf, verify: bool },
}

/// Selection state while scanning the requested operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Empty,
    One(Operation),
    /// A second primary operation was requested
    Conflict,
}

impl Selection {
    pub fn record(self, op: Operation) -> Self {
        match self {
            Selection::Empty => Selection::One(op),
            Selection::One(_) | Selection::Conflict => Selection::Conflict,
        }
    }
}

pub fn select(config: &Config) -> Result<Operation, UsageError> {
    let selection = config
        .requests
        .iter()
        .map(|request| match request {
            Request::Identify => Operation::Identify,
            Request::Erase => Operation::Erase,
            Request::Read(path) => Operation::Read { path: path.clone() },
            Request::Write(path) => Operation::Write {
                path: path.clone(),
                verify: config.verify,
            },
        })
        .fold(Selection::Empty, Selection::record);

    let op = match selection {
        Selection::Empty => return Err(UsageError::NoOperation),
        Selection::Conflict => return Err(UsageError::Conflict),
        Selection::One(op) => op,
    };

    if config.ecc.ignore_errors && config.ecc.disabled {
        return Err(UsageError::EccIgnoreWithEccDisabled);
    }
    if config.ecc.ignore_errors && matches!(op, Operation::Write { .. }) {
        return Err(UsageError::EccIgnoreWithWrite);
    }
    if config.verify && !matches!(op, Operation::Write { .. }) {
        log::warn!("-v only applies to writes, ignored");
    }
    Ok(op)
}
