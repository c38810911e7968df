//! Errors that abort a run.
//!
//! Everything else (a failed server, an unreadable bundle, a file a stage
//! could not process) is logged by the phase that hit it and the run goes on.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("configuration could not be loaded")]
    Config,
    #[display("output directory is unusable")]
    Output,
    #[display("HTTP client could not be built")]
    Client,
}
