//! Media-server integrations for Mediarr

pub mod plex;

pub use plex::{PlexClient, PlexConfig};
