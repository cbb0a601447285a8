//! Pre-compiled regular expressions shared by the parser modules
//!
//! All patterns are compiled once via `Lazy` so repeated parsing never pays
//! compilation cost.

use once_cell::sync::Lazy;
use regex::Regex;

/// Four-digit year candidates; validity is checked separately
pub static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

/// Daily-show air dates: 2024-01-15, 2024.01.15, 2024 01 15
pub static DAILY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})[ ._-](\d{2})[ ._-](\d{2})\b").unwrap());

/// S01E05-07 or S01E05-E07 episode ranges
pub static EPISODE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})E(\d{1,3})[-_]E?(\d{1,3})\b").unwrap());

/// S01E05E06E07 episode sequences
pub static EPISODE_SEQUENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})((?:E\d{1,3}){2,})\b").unwrap());

/// Individual Exx tokens inside a sequence match
pub static EPISODE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)E(\d{1,3})").unwrap());

/// Standard S01E05
pub static EPISODE_STANDARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})[ ._]?E(\d{1,3})\b").unwrap());

/// Alternate 1x05 numbering
pub static EPISODE_ALTERNATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,3})\b").unwrap());

/// Dotted s01.05 numbering; matched against the original (pre-normalization)
/// text because normalization erases the dot
pub static EPISODE_DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})\.(\d{2,3})\b").unwrap());

/// Bare season tag: S05, Season 5
pub static SEASON_PACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:S(\d{1,2})|Season[ ._]?(\d{1,2}))\b").unwrap());

/// Split season parts: Part 1, Part.2
pub static SEASON_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bPart[ ._]?(\d{1,2})\b").unwrap());

/// Complete-season markers
pub static COMPLETE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bComplete\b").unwrap());

pub static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4k|uhd)\b").unwrap());

pub static SOURCE_BLURAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(blu-?ray|bd-?rip|br-?rip)\b").unwrap());
pub static SOURCE_WEBDL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bweb[ ._-]?dl\b").unwrap());
pub static SOURCE_WEBRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bweb[ ._-]?rip\b").unwrap());
pub static SOURCE_HDTV: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(hdtv|pdtv)\b").unwrap());
pub static SOURCE_TELESYNC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?i:telesync|hd-?ts)\b|\bTS\b").unwrap());
pub static SOURCE_CAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(cam-?rip|hdcam|cam)\b").unwrap());

pub static CODEC_X264: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x[ .]?264|h[ .]?264|avc)\b").unwrap());
pub static CODEC_X265: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x[ .]?265|h[ .]?265|hevc)\b").unwrap());

/// HDR formats, most specific first
pub static HDR_DV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(dolby[ ._]?vision|dovi|dv)\b").unwrap());
pub static HDR_10_PLUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhdr10(\+|plus)").unwrap());
pub static HDR_10: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhdr10\b").unwrap());
pub static HDR_PLAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhdr\b").unwrap());
pub static HDR_HLG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bhlg\b").unwrap());

pub static AUDIO_ATMOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\batmos\b").unwrap());
pub static AUDIO_TRUEHD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btrue-?hd\b").unwrap());
pub static AUDIO_DTSHD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdts[ ._-]?hd(?:[ ._-]?ma)?\b").unwrap());
pub static AUDIO_DTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdts\b").unwrap());
pub static AUDIO_EAC3: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(eac3|e-ac-?3|ddp[ .]?\d?(?:[ .]\d)?|dd\+)").unwrap());
pub static AUDIO_AC3: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(ac-?3|dd[ .]?\d[ .]\d)\b").unwrap());
pub static AUDIO_AAC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\baac(?:\d(?:[ .]\d)?)?\b").unwrap());
pub static AUDIO_FLAC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bflac\b").unwrap());
pub static AUDIO_OPUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bopus\b").unwrap());

pub static REMUX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bremux\b").unwrap());
pub static PROPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bproper\b").unwrap());
pub static REPACK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\brepack\b").unwrap());

pub static EDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(extended(?:[ ._]cut)?|director'?s[ ._]cut|unrated|theatrical|imax|remastered|criterion|special[ ._]edition|ultimate[ ._]edition)\b",
    )
    .unwrap()
});

/// Release group at the tail: -GROUP, optionally followed by bracketed tags
pub static RELEASE_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)(?:\[[^\]]*\])?$").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_range_matches_both_forms() {
        assert!(EPISODE_RANGE.is_match("Show S01E02-04"));
        assert!(EPISODE_RANGE.is_match("Show S01E02-E04"));
        assert!(!EPISODE_RANGE.is_match("Show S01E02"));
    }

    #[test]
    fn telesync_bare_ts_is_case_sensitive() {
        assert!(SOURCE_TELESYNC.is_match("Movie 2020 TS x264"));
        assert!(!SOURCE_TELESYNC.is_match("movie 2020 ts extension"));
    }

    #[test]
    fn hdr_specificity() {
        assert!(HDR_10_PLUS.is_match("Movie HDR10+ 2160p"));
        assert!(HDR_10_PLUS.is_match("Movie HDR10Plus 2160p"));
        assert!(!HDR_10_PLUS.is_match("Movie HDR10 2160p"));
    }
}
