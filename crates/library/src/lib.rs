//! Orchestration of a full sanity run.
//!
//! A run has three phases over one output tree, each exposed as a stream or
//! future the binary drives:
//!
//! 1. [`sync::sync`] brings every enabled server's assets up to date.
//! 2. [`extract::extract`] unpacks downloaded bundles into files.
//! 3. [`process::process`] runs the post-processing stages.
//!
//! Phases report per-item failures as events and keep going; only failures
//! that leave nothing useful to do end a phase early.

pub mod error;
pub mod extract;
pub mod process;
pub mod sync;

pub use crate::extract::{BundleReport, ExtractContext, ExtractEvent};
pub use crate::process::{Processors, Stage};
pub use crate::sync::{SyncContext, SyncEvent, SyncSummary};
