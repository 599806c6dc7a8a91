//! Common record types and errors shared across the scaffold crates.

pub mod error;
pub mod record;

pub use error::LoggingError;
pub use record::{Fields, Level, LogRecord, UnknownLevel};
