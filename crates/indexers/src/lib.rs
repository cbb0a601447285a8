//! Indexer and metadata clients for Mediarr
//!
//! The newznab client speaks the Usenet indexer search protocol; the TMDB
//! and TVDB clients resolve movie and series metadata when content is added
//! to the library.

pub mod models;
pub mod newznab;
pub mod tmdb;
pub mod tvdb;

pub use models::{IndexerRelease, SearchRequest};
pub use newznab::{NewznabClient, NewznabConfig};
pub use tmdb::{MovieMetadata, MovieMetadataClient, TmdbClient, TmdbConfig};
pub use tvdb::{EpisodeMetadata, SeriesMetadata, TvMetadataClient, TvdbClient, TvdbConfig};
