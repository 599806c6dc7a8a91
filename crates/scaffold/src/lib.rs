//! Project scaffold utilities.
//!
//! Logging for everything in here is set up by the `scaffold` binary through
//! [`logkit::setup_application_logging`].

pub mod files;
