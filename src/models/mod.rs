//! Data models for the event log application.
//!
//! Field names match what the web client sends and expects.

mod backup;
mod document;
mod update;

pub use backup::*;
pub use document::*;
pub use update::*;
