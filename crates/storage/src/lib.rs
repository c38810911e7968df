//! Access to the output tree.
//!
//! Every pipeline stage reads and writes the output tree through a
//! [`StorageBackend`] so that the stages can be exercised against an
//! in-memory backend in tests.

pub mod backend;
pub mod error;
mod models;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::models::{FileInfo, extension_of};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
