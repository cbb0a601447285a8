//! Release-name parser
//!
//! Turns scene release names into structured metadata: title, year,
//! resolution, source, codec, HDR, audio, episode numbering, streaming
//! service and release group. The parser is pure and deterministic; all
//! regular expressions are compiled once.
//!
//! ```
//! use mediarr_parser::{parse, Resolution};
//!
//! let release = parse("The.Matrix.1999.1080p.BluRay.x264-GRP");
//! assert_eq!(release.title, "The Matrix");
//! assert_eq!(release.year, Some(1999));
//! assert_eq!(release.resolution, Resolution::Hd1080p);
//! ```

mod episodes;
mod patterns;
mod quality;
mod title;
mod types;

pub use episodes::EpisodeInfo;
pub use types::{AudioCodec, Codec, HdrFormat, Resolution, SourceType};

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Structured metadata extracted from a release name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRelease {
    /// The original input string
    pub release_name: String,
    pub title: String,
    /// Lowercased, punctuation-collapsed title for matching
    pub clean_title: String,
    /// Release year, validated to [1900, current year + 1]
    pub year: Option<i32>,
    pub resolution: Resolution,
    pub source: SourceType,
    pub codec: Codec,
    pub hdr: HdrFormat,
    pub audio: AudioCodec,
    pub remux: bool,
    pub edition: Option<String>,
    pub service: Option<String>,
    pub proper: bool,
    pub repack: bool,
    pub season: Option<u32>,
    /// Ordered episode numbers; more than one for ranges and sequences
    pub episodes: Vec<u32>,
    /// Air date for daily shows; when present, year extraction is disabled
    pub daily_date: Option<NaiveDate>,
    pub complete_season: bool,
    pub season_part: Option<u32>,
    pub release_group: Option<String>,
}

impl ParsedRelease {
    /// Whether the numbering marks this as an episode or season release
    pub fn is_tv(&self) -> bool {
        self.season.is_some() || !self.episodes.is_empty() || self.daily_date.is_some()
    }

    /// Label stored on file records and compared for upgrades
    pub fn quality_label(&self) -> String {
        self.resolution.to_string()
    }
}

/// Parse a release name into structured metadata.
///
/// Dots and underscores are treated as word separators. The original text
/// is kept around for the few patterns that depend on it (dotted episode
/// numbering, streaming-service codes, the release-group tail).
pub fn parse(release_name: &str) -> ParsedRelease {
    let original = release_name.trim();
    // Replacement is byte-for-byte, so offsets found in either string are
    // valid in both.
    let normalized = original.replace(['.', '_'], " ");

    let daily = episodes::detect_daily(&normalized);
    let numbering = episodes::detect_episodes(original, &normalized);
    let attrs = quality::extract(&normalized);

    // Daily dates win over plain years: the date's year component must not
    // be mistaken for a release year.
    let (year, year_start) = match daily {
        Some(_) => (None, None),
        None => last_valid_year(&normalized),
    };

    let cut_at = title_cut_offset(
        daily.map(|(_, start)| start),
        &numbering,
        &attrs,
        year_start,
    );
    let extracted = title::cut_title(&normalized, cut_at);

    ParsedRelease {
        release_name: original.to_string(),
        clean_title: title::clean_title(&extracted),
        title: extracted,
        year,
        resolution: attrs.resolution,
        source: attrs.source,
        codec: attrs.codec,
        hdr: attrs.hdr,
        audio: attrs.audio,
        remux: attrs.remux,
        edition: attrs.edition,
        service: title::extract_service(original),
        proper: attrs.proper,
        repack: attrs.repack,
        season: numbering.season,
        episodes: numbering.episodes,
        daily_date: daily.map(|(date, _)| date),
        complete_season: numbering.complete_season,
        season_part: numbering.season_part,
        release_group: title::extract_release_group(original),
    }
}

/// Titles may contain year-like substrings ("2012", "1984"), so the LAST
/// valid four-digit year in the string is taken as the release year.
fn last_valid_year(normalized: &str) -> (Option<i32>, Option<usize>) {
    let max_year = Utc::now().year() + 1;
    let mut result = (None, None);
    for m in patterns::YEAR.find_iter(normalized) {
        if let Ok(year) = m.as_str().parse::<i32>() {
            if (1900..=max_year).contains(&year) {
                result = (Some(year), Some(m.start()));
            }
        }
    }
    result
}

/// Where the title ends. Daily shows cut at any marker, TV at the first
/// non-year marker (numbering tag or resolution), movies at the release
/// year.
fn title_cut_offset(
    daily_start: Option<usize>,
    numbering: &EpisodeInfo,
    attrs: &quality::QualityAttributes,
    year_start: Option<usize>,
) -> Option<usize> {
    if daily_start.is_some() {
        return [
            daily_start,
            numbering.marker_start,
            attrs.resolution_start,
            attrs.source_start,
        ]
        .into_iter()
        .flatten()
        .min();
    }
    if numbering.is_tv() {
        return [numbering.marker_start, attrs.resolution_start]
            .into_iter()
            .flatten()
            .min();
    }
    year_start.or_else(|| {
        [attrs.resolution_start, attrs.source_start]
            .into_iter()
            .flatten()
            .min()
    })
}
