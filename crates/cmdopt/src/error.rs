//! Runtime errors.
//!
//! Only conditions a user can trigger from the command line surface here.
//! Mistakes in how the dispatcher is wired up (duplicate names, empty usage,
//! calling [`exec`](crate::Dispatcher::exec) twice) panic instead.

use std::io;
use thiserror::Error;

/// Error produced by a [`FlagSet`](crate::FlagSet) while parsing.
#[derive(Debug, Error)]
pub enum FlagError {
    /// `-h` or `-help` was given and the set defines neither.
    #[error("flag: help requested")]
    Help,

    /// The arguments could not be parsed.
    #[error("{flag_set}: {message}")]
    Invalid {
        /// Name of the flag set that rejected the arguments.
        flag_set: String,
        /// Human-readable reason.
        message: String,
    },
}

impl FlagError {
    /// Returns true if this error only signals a help request.
    pub fn is_help(&self) -> bool {
        matches!(self, FlagError::Help)
    }
}

/// Error returned by [`Dispatcher::exec`](crate::Dispatcher::exec).
#[derive(Debug, Error)]
pub enum Error {
    /// Flag parsing failed. The message and usage have already been written
    /// to the output.
    #[error(transparent)]
    Flags(#[from] FlagError),

    /// Writing to the output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),

    /// The handler failed; the error is passed through untouched.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl Error {
    /// Returns the handler's error, if this is one.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Handler(e) => Some(e),
            _ => None,
        }
    }
}
