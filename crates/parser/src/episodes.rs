//! Season, episode and daily-date detection
//!
//! Detection order matters: explicit ranges first, then sequences, the
//! standard SxxEyy form, the alternate NxM form, the dotted sxx.yy form and
//! finally bare season-pack tags.

use chrono::NaiveDate;

use crate::patterns;

/// Season/episode numbering extracted from a release name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub season: Option<u32>,
    /// Ordered episode numbers; more than one for ranges and sequences
    pub episodes: Vec<u32>,
    pub complete_season: bool,
    pub season_part: Option<u32>,
    /// Byte offset of the numbering marker, used for title extraction
    pub marker_start: Option<usize>,
}

impl EpisodeInfo {
    pub fn is_tv(&self) -> bool {
        self.season.is_some() || !self.episodes.is_empty()
    }
}

/// Detect a daily-show air date. Returns the date and the byte offset of the
/// match so the title can be cut before it.
pub fn detect_daily(normalized: &str) -> Option<(NaiveDate, usize)> {
    for caps in patterns::DAILY_DATE.captures_iter(normalized) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let start = caps.get(0).map(|m| m.start())?;
            return Some((date, start));
        }
    }
    None
}

/// Detect season and episode numbering.
///
/// `original` is the untouched release name (needed for the dotted form,
/// where normalization erases the separating dot); `normalized` has dots and
/// underscores replaced by spaces. Both strings are byte-for-byte aligned.
pub fn detect_episodes(original: &str, normalized: &str) -> EpisodeInfo {
    // Explicit range: S01E02-04 / S01E02-E04
    if let Some(caps) = patterns::EPISODE_RANGE.captures(normalized) {
        let season = caps[1].parse().ok();
        let from: u32 = caps[2].parse().unwrap_or(0);
        let to: u32 = caps[3].parse().unwrap_or(0);
        if from > 0 && to >= from && to - from < 100 {
            return EpisodeInfo {
                season,
                episodes: (from..=to).collect(),
                complete_season: false,
                season_part: None,
                marker_start: caps.get(0).map(|m| m.start()),
            };
        }
    }

    // Sequence: S01E02E03E04
    if let Some(caps) = patterns::EPISODE_SEQUENCE.captures(normalized) {
        let season = caps[1].parse().ok();
        let episodes: Vec<u32> = patterns::EPISODE_TOKEN
            .captures_iter(&caps[2])
            .filter_map(|c| c[1].parse().ok())
            .collect();
        if !episodes.is_empty() {
            return EpisodeInfo {
                season,
                episodes,
                complete_season: false,
                season_part: None,
                marker_start: caps.get(0).map(|m| m.start()),
            };
        }
    }

    // Standard: S01E02
    if let Some(caps) = patterns::EPISODE_STANDARD.captures(normalized) {
        return EpisodeInfo {
            season: caps[1].parse().ok(),
            episodes: caps[2].parse().ok().into_iter().collect(),
            complete_season: false,
            season_part: None,
            marker_start: caps.get(0).map(|m| m.start()),
        };
    }

    // Alternate: 1x02
    if let Some(caps) = patterns::EPISODE_ALTERNATE.captures(normalized) {
        return EpisodeInfo {
            season: caps[1].parse().ok(),
            episodes: caps[2].parse().ok().into_iter().collect(),
            complete_season: false,
            season_part: None,
            marker_start: caps.get(0).map(|m| m.start()),
        };
    }

    // Dotted: s01.05 (dot only survives in the original text)
    if let Some(caps) = patterns::EPISODE_DOTTED.captures(original) {
        return EpisodeInfo {
            season: caps[1].parse().ok(),
            episodes: caps[2].parse().ok().into_iter().collect(),
            complete_season: false,
            season_part: None,
            marker_start: caps.get(0).map(|m| m.start()),
        };
    }

    // Season pack: bare S05 / Season 5, optionally split into parts
    if let Some(caps) = patterns::SEASON_PACK.captures(normalized) {
        let season = caps
            .get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse().ok());
        let season_part = patterns::SEASON_PART
            .captures(normalized)
            .and_then(|c| c[1].parse().ok());
        // A bare season tag is a full pack unless split into parts; the
        // COMPLETE keyword forces the flag either way.
        let complete_season =
            season_part.is_none() || patterns::COMPLETE.is_match(normalized);
        return EpisodeInfo {
            season,
            episodes: Vec::new(),
            complete_season,
            season_part,
            marker_start: caps.get(0).map(|m| m.start()),
        };
    }

    EpisodeInfo::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(s: &str) -> String {
        s.replace(['.', '_'], " ")
    }

    fn detect(name: &str) -> EpisodeInfo {
        detect_episodes(name, &normalize(name))
    }

    #[test]
    fn standard_numbering() {
        let info = detect("Show.Name.S02E05.720p.HDTV.x264-GRP");
        assert_eq!(info.season, Some(2));
        assert_eq!(info.episodes, vec![5]);
        assert!(!info.complete_season);
    }

    #[test]
    fn range_expands_inclusive() {
        let info = detect("Show.S01E01-03.1080p");
        assert_eq!(info.season, Some(1));
        assert_eq!(info.episodes, vec![1, 2, 3]);

        let info = detect("Show.S01E01-E03.1080p");
        assert_eq!(info.episodes, vec![1, 2, 3]);
    }

    #[test]
    fn sequence_collects_all_tokens() {
        let info = detect("Show.S03E01E02E03.WEB-DL");
        assert_eq!(info.season, Some(3));
        assert_eq!(info.episodes, vec![1, 2, 3]);
    }

    #[test]
    fn alternate_numbering() {
        let info = detect("Show Name 4x13 HDTV");
        assert_eq!(info.season, Some(4));
        assert_eq!(info.episodes, vec![13]);
    }

    #[test]
    fn dotted_numbering_uses_original_text() {
        let info = detect("show.name.s01.05.720p");
        assert_eq!(info.season, Some(1));
        assert_eq!(info.episodes, vec![5]);
    }

    #[test]
    fn dotted_does_not_eat_resolution() {
        let info = detect("show.name.s01.1080p.WEB");
        // Falls through to the season-pack rule rather than parsing 108 as
        // an episode.
        assert_eq!(info.season, Some(1));
        assert!(info.episodes.is_empty());
    }

    #[test]
    fn season_pack_flags() {
        let info = detect("Show.Name.S05.COMPLETE.1080p.BluRay");
        assert_eq!(info.season, Some(5));
        assert!(info.complete_season);
        assert!(info.episodes.is_empty());

        let info = detect("Show.Name.Season.3.Part.2.1080p");
        assert_eq!(info.season, Some(3));
        assert_eq!(info.season_part, Some(2));
        assert!(!info.complete_season);
    }

    #[test]
    fn daily_date_detection() {
        let name = normalize("The.Daily.Show.2024.01.15.Guest.Name.720p");
        let (date, start) = detect_daily(&name).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(start, "The Daily Show ".len());
    }

    #[test]
    fn invalid_date_is_not_daily() {
        let name = normalize("Movie.2024.13.45.1080p");
        assert!(detect_daily(&name).is_none());
    }

    #[test]
    fn movie_name_has_no_numbering() {
        let info = detect("The.Matrix.1999.1080p.BluRay.x264-GRP");
        assert!(!info.is_tv());
    }
}
