//! Core domain for Mediarr: models, errors, typed events, the event bus
//! and the orchestration engine that drives the grab, download, import,
//! verify and cleanup pipeline.

pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;

/// In-memory store and client fakes shared by the test suites
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{MediarrError, Result};

// The parser's quality enums travel with the domain types
pub use mediarr_parser::Resolution;
