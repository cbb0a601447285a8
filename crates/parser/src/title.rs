//! Title, streaming-service and release-group extraction

use once_cell::sync::Lazy;
use regex::Regex;

use crate::patterns;

/// Streaming service codes as they appear in scene names. Matched against
/// the original (non-normalized) text with delimiter boundaries so short
/// codes like NF cannot fire inside ordinary words.
static SERVICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[ ._-])(AMZN|NF|DSNP|HULU|HMAX|MAX|ATVP|PCOK|PMTP|STAN|CRAV|iP|iT)(?:[ ._-]|$)",
    )
    .unwrap()
});

pub fn extract_service(original: &str) -> Option<String> {
    let code = SERVICE.captures(original)?.get(1)?.as_str();
    let name = match code {
        "AMZN" => "Amazon",
        "NF" => "Netflix",
        "DSNP" => "Disney+",
        "HULU" => "Hulu",
        "HMAX" => "HBO Max",
        "MAX" => "Max",
        "ATVP" => "Apple TV+",
        "PCOK" => "Peacock",
        "PMTP" => "Paramount+",
        "STAN" => "Stan",
        "CRAV" => "Crave",
        "iP" => "BBC iPlayer",
        "iT" => "iTunes",
        _ => return None,
    };
    Some(name.to_string())
}

pub fn extract_release_group(original: &str) -> Option<String> {
    patterns::RELEASE_GROUP
        .captures(original.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        // Numeric tails like "-2" are part numbers, not groups
        .filter(|g| !g.chars().all(|c| c.is_ascii_digit()))
}

/// Cut the title out of the normalized name given the byte offset of the
/// first marker that ends it, then tidy separators.
pub fn cut_title(normalized: &str, cut_at: Option<usize>) -> String {
    let prefix = match cut_at {
        Some(idx) => &normalized[..idx],
        None => normalized,
    };
    tidy(prefix)
}

fn tidy(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '(' | ')' | '[' | ']'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased, punctuation-collapsed form used for matching
pub fn clean_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            for lc in c.to_lowercase() {
                out.push(lc);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}
