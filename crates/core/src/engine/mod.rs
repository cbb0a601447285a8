//! The event-driven orchestration engine
//!
//! Handlers react to bus events, adapters poll external systems and
//! translate observations into events, and the runner owns the lifecycle
//! of all of them under one cancellation scope. Components communicate
//! only through the bus and the stores; no handler calls another.

pub mod cleanup_handler;
pub mod client_adapter;
pub mod download_handler;
pub mod import_handler;
pub mod media_adapter;
pub mod runner;

pub use cleanup_handler::{CleanupConfig, CleanupHandler};
pub use client_adapter::{ClientAdapter, ClientAdapterConfig};
pub use download_handler::{DownloadHandler, DownloadHandlerConfig};
pub use import_handler::ImportHandler;
pub use media_adapter::MediaServerAdapter;
pub use runner::Runner;
