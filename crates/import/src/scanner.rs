//! Video file discovery under a download source path

use std::path::{Path, PathBuf};

use mediarr_core::{MediarrError, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions accepted as video content
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "flv", "webm", "ts", "m2ts",
];

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn is_sample(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase().contains("sample"))
        .unwrap_or(false)
}

/// Walk the source recursively and pick the largest non-sample video file.
/// A plain file source is accepted directly when it qualifies.
pub async fn find_largest_video(source: &Path) -> Result<(PathBuf, i64)> {
    let source = source.to_path_buf();
    tokio::task::spawn_blocking(move || find_largest_video_blocking(&source))
        .await
        .map_err(|e| MediarrError::FileSystemError {
            path: String::new(),
            error: e.to_string(),
        })?
}

fn find_largest_video_blocking(source: &Path) -> Result<(PathBuf, i64)> {
    let mut best: Option<(PathBuf, i64)> = None;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_video(path) || is_sample(path) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len() as i64).unwrap_or(0);
        if best.as_ref().map(|(_, s)| size > *s).unwrap_or(true) {
            best = Some((path.to_path_buf(), size));
        }
    }

    best.ok_or_else(|| MediarrError::NoVideoFile {
        path: source.display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn picks_largest_non_sample_video() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("movie.mkv"), vec![0u8; 1000]).unwrap();
        fs::write(tmp.path().join("movie-sample.mkv"), vec![0u8; 5000]).unwrap();
        fs::write(tmp.path().join("extras.mp4"), vec![0u8; 500]).unwrap();
        fs::write(tmp.path().join("cover.jpg"), vec![0u8; 9000]).unwrap();

        let (path, size) = find_largest_video(tmp.path()).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "movie.mkv");
        assert_eq!(size, 1000);
    }

    #[tokio::test]
    async fn walks_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("Season 1").join("disc");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("episode.mkv"), vec![0u8; 42]).unwrap();

        let (path, _) = find_largest_video(tmp.path()).await.unwrap();
        assert!(path.ends_with("disc/episode.mkv"));
    }

    #[tokio::test]
    async fn accepts_a_bare_file_source() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("movie.mp4");
        fs::write(&file, vec![0u8; 10]).unwrap();

        let (path, size) = find_largest_video(&file).await.unwrap();
        assert_eq!(path, file);
        assert_eq!(size, 10);
    }

    #[tokio::test]
    async fn no_video_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("readme.nfo"), b"x").unwrap();

        let err = find_largest_video(tmp.path()).await.unwrap_err();
        assert!(matches!(err, MediarrError::NoVideoFile { .. }));
    }

    #[test]
    fn sample_detection_is_case_insensitive() {
        assert!(is_sample(Path::new("/x/Movie.SAMPLE.mkv")));
        assert!(!is_sample(Path::new("/x/Movie.mkv")));
    }
}
