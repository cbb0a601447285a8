//! Destination naming from configurable templates
//!
//! Tokens: `{title}`, `{year}`, `{season}`, `{episode}`, `{quality}`,
//! `{ext}`. A `:NN` format specifier zero-pads integers, e.g.
//! `{season:02}`. Token values are sanitized before substitution so a
//! hostile title cannot steer the destination outside the library root.

use std::path::{Component, Path, PathBuf};

use mediarr_core::{MediarrError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TEMPLATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(title|year|season|episode|quality|ext)(?::0?(\d+))?\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    pub movie_template: String,
    pub episode_template: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            movie_template: "{title} ({year})/{title} ({year}) - {quality}.{ext}".to_string(),
            episode_template:
                "{title}/Season {season:02}/{title} - S{season:02}E{episode:02} - {quality}.{ext}"
                    .to_string(),
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateValues {
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub quality: String,
    pub ext: String,
}

/// Render a template into a library-relative path. Every substituted value
/// is sanitized; the rendered path is then checked to contain no parent
/// components.
pub fn render(template: &str, values: &TemplateValues) -> Result<PathBuf> {
    let mut missing: Option<&'static str> = None;

    let rendered = TEMPLATE_TOKEN.replace_all(template, |caps: &regex::Captures<'_>| {
        let pad = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(0);
        match caps.get(1).map(|m| m.as_str()) {
            Some("title") => sanitize_component(&values.title),
            Some("year") => match values.year {
                Some(year) => year.to_string(),
                None => {
                    missing = Some("year");
                    String::new()
                }
            },
            Some("season") => match values.season {
                Some(season) => format!("{:0width$}", season, width = pad.max(1)),
                None => {
                    missing = Some("season");
                    String::new()
                }
            },
            Some("episode") => match values.episode {
                Some(episode) => format!("{:0width$}", episode, width = pad.max(1)),
                None => {
                    missing = Some("episode");
                    String::new()
                }
            },
            Some("quality") => sanitize_component(&values.quality),
            Some("ext") => values.ext.trim_start_matches('.').to_string(),
            _ => String::new(),
        }
    });

    if let Some(field) = missing {
        return Err(MediarrError::ValidationError {
            field: field.to_string(),
            message: format!("template requires {} but none is available", field),
        });
    }

    let path = PathBuf::from(rendered.as_ref());
    ensure_relative(&path)?;
    Ok(path)
}

/// Join a rendered relative path onto the library root, rejecting anything
/// that would escape it.
pub fn join_checked(root: &Path, relative: &Path) -> Result<PathBuf> {
    ensure_relative(relative)?;
    let joined = root.join(relative);
    if !joined.starts_with(root) {
        return Err(MediarrError::PathTraversal {
            path: joined.display().to_string(),
        });
    }
    Ok(joined)
}

fn ensure_relative(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(MediarrError::PathTraversal {
                    path: path.display().to_string(),
                })
            }
            _ => {}
        }
    }
    Ok(())
}

/// Make a value safe as part of a single path component: path separators
/// and shell-hostile characters are dropped or replaced, and dot-only
/// fragments (".", "..") are removed entirely.
fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' => ' ',
            ':' | '|' => '-',
            '<' | '>' | '"' | '?' | '*' | '\0' => ' ',
            other => other,
        })
        .collect();

    replaced
        .split_whitespace()
        .filter(|fragment| !fragment.chars().all(|c| c == '.' || c == '-'))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_string()
}
