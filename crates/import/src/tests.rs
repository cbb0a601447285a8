//! Importer tests over tempdirs and in-memory stores

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use mediarr_core::domain::{Importer, LibraryStore};
use mediarr_core::models::{
    Content, ContentStatus, ContentType, Download, DownloadClientKind, DownloadStatus, Episode,
    MediaFile,
};
use mediarr_core::testing::{FakeMediaServer, MemoryHistory, MemoryLibrary};
use mediarr_core::MediarrError;

use crate::{FileImporter, ImporterConfig, NamingConfig};

struct Fixture {
    library: Arc<MemoryLibrary>,
    history: Arc<MemoryHistory>,
    importer: FileImporter,
    movie_root: PathBuf,
    series_root: PathBuf,
    _tmp: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let movie_root = tmp.path().join("movies");
        let series_root = tmp.path().join("series");
        fs::create_dir_all(&movie_root).unwrap();
        fs::create_dir_all(&series_root).unwrap();

        let library = Arc::new(MemoryLibrary::default());
        let history = Arc::new(MemoryHistory::default());
        let importer = FileImporter::new(
            library.clone(),
            history.clone(),
            Some(Arc::new(FakeMediaServer::default())),
            ImporterConfig {
                movie_root: movie_root.clone(),
                series_root: series_root.clone(),
                naming: NamingConfig::default(),
            },
        );

        Self {
            library,
            history,
            importer,
            movie_root,
            series_root,
            _tmp: tmp,
        }
    }

    fn source_dir(&self, release_name: &str, file: &str, size: usize) -> PathBuf {
        let dir = self._tmp.path().join("downloads").join(release_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), vec![0u8; size]).unwrap();
        dir
    }

    async fn movie(&self, title: &str, year: i32) -> Content {
        let content = Content::new(ContentType::Movie, title, self.movie_root.to_string_lossy())
            .with_year(year);
        self.library.add_content(&content).await.unwrap();
        content
    }

    fn importing_download(&self, content: &Content, release_name: &str) -> Download {
        let mut download = Download::new(
            content.id,
            DownloadClientKind::Sabnzbd,
            "nzo_1",
            release_name,
            "idx",
        );
        download.transition(DownloadStatus::Downloading).unwrap();
        download.transition(DownloadStatus::Completed).unwrap();
        download.transition(DownloadStatus::Importing).unwrap();
        download
    }
}

#[tokio::test]
async fn happy_path_movie_import() {
    let fx = Fixture::new();
    let content = fx.movie("The Matrix", 1999).await;
    let release = "The.Matrix.1999.1080p.BluRay.x264-GRP";
    let source = fx.source_dir(release, "movie.mkv", 1000);
    let download = fx.importing_download(&content, release);

    let outcome = fx.importer.import(&download, &source).await.unwrap();

    let expected = fx
        .movie_root
        .join("The Matrix (1999)")
        .join("The Matrix (1999) - 1080p.mkv");
    assert_eq!(outcome.file.path, expected.display().to_string());
    assert_eq!(outcome.file_size, 1000);
    assert!(!outcome.upgraded);
    assert_eq!(fs::metadata(&expected).unwrap().len(), 1000);

    // Library state: file row present, content available
    let files = fx.library.files_for_content(content.id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].quality, "1080p");
    let stored = fx.library.get_content(content.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ContentStatus::Available);

    // History recorded the import
    let history = fx.history.entries();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event.to_string(), "imported");
}

#[tokio::test]
async fn rerun_returns_destination_exists_without_side_effects() {
    let fx = Fixture::new();
    let content = fx.movie("The Matrix", 1999).await;
    let release = "The.Matrix.1999.1080p.BluRay.x264-GRP";
    let source = fx.source_dir(release, "movie.mkv", 1000);
    let download = fx.importing_download(&content, release);

    fx.importer.import(&download, &source).await.unwrap();
    let err = fx.importer.import(&download, &source).await.unwrap_err();

    assert!(matches!(err, MediarrError::DestinationExists { .. }));
    assert_eq!(fx.library.file_count(), 1);
    assert_eq!(fx.history.entries().len(), 1);
}

#[tokio::test]
async fn episode_import_uses_episode_template_and_marks_episode_available() {
    let fx = Fixture::new();
    let content = Content::new(
        ContentType::Series,
        "Breaking Bad",
        fx.series_root.to_string_lossy(),
    );
    fx.library.add_content(&content).await.unwrap();
    let episode = Episode::new(content.id, 5, 14);
    fx.library.add_episode(&episode).await.unwrap();

    let release = "Breaking.Bad.S05E14.720p.HDTV.x264-ASAP";
    let source = fx.source_dir(release, "episode.mkv", 512);
    let mut download = fx.importing_download(&content, release);
    download.episode_id = Some(episode.id);

    let outcome = fx.importer.import(&download, &source).await.unwrap();

    let expected = fx
        .series_root
        .join("Breaking Bad")
        .join("Season 05")
        .join("Breaking Bad - S05E14 - 720p.mkv");
    assert_eq!(outcome.file.path, expected.display().to_string());
    assert_eq!(outcome.episode_ids, vec![episode.id]);

    let stored = fx.library.get_episode(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ContentStatus::Available);
}

#[tokio::test]
async fn series_download_without_episode_fails() {
    let fx = Fixture::new();
    let content = Content::new(
        ContentType::Series,
        "Breaking Bad",
        fx.series_root.to_string_lossy(),
    );
    fx.library.add_content(&content).await.unwrap();

    let release = "Breaking.Bad.S05E14.720p.HDTV.x264";
    let source = fx.source_dir(release, "episode.mkv", 512);
    let download = fx.importing_download(&content, release);

    let err = fx.importer.import(&download, &source).await.unwrap_err();
    assert!(matches!(err, MediarrError::EpisodeNotSpecified { .. }));
}

#[tokio::test]
async fn hostile_title_stays_inside_library_root() {
    let fx = Fixture::new();
    let content = fx.movie("../../../etc/passwd", 2024).await;
    let release = "Evil.2024.1080p.WEB-DL.x264";
    let source = fx.source_dir(release, "movie.mkv", 10);
    let download = fx.importing_download(&content, release);

    let outcome = fx.importer.import(&download, &source).await.unwrap();

    let path = PathBuf::from(&outcome.file.path);
    assert!(path.starts_with(&fx.movie_root), "{} escaped", path.display());
    assert!(outcome.file.path.contains("etc passwd (2024)"));
    // Nothing landed outside the root
    assert!(!fx._tmp.path().join("etc").exists());
}

#[tokio::test]
async fn upgrade_sets_flag_and_keeps_existing_file_row() {
    let fx = Fixture::new();
    let content = fx.movie("The Matrix", 1999).await;
    fx.library.insert_file(
        MediaFile::new(content.id, "/old/The Matrix - 720p.mkv", 400).with_quality("720p"),
    );

    let release = "The.Matrix.1999.1080p.BluRay.x264-GRP";
    let source = fx.source_dir(release, "movie.mkv", 1000);
    let download = fx.importing_download(&content, release);

    let outcome = fx.importer.import(&download, &source).await.unwrap();
    assert!(outcome.upgraded);
    // Existing row retained alongside the new one
    assert_eq!(fx.library.file_count(), 2);
    assert_eq!(fx.history.entries()[0].event.to_string(), "upgraded");
}

#[tokio::test]
async fn missing_video_file_fails_with_no_video_file() {
    let fx = Fixture::new();
    let content = fx.movie("The Matrix", 1999).await;
    let release = "The.Matrix.1999.1080p.BluRay.x264-GRP";
    let dir = fx._tmp.path().join("downloads").join(release);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("info.nfo"), b"nfo").unwrap();
    let download = fx.importing_download(&content, release);

    let err = fx.importer.import(&download, &dir).await.unwrap_err();
    assert!(matches!(err, MediarrError::NoVideoFile { .. }));
}

#[tokio::test]
async fn wrong_download_state_is_rejected() {
    let fx = Fixture::new();
    let content = fx.movie("The Matrix", 1999).await;
    let release = "The.Matrix.1999.1080p.BluRay.x264-GRP";
    let source = fx.source_dir(release, "movie.mkv", 10);
    // Still queued: prepare must refuse
    let download = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_1",
        release,
        "idx",
    );

    let err = fx.importer.import(&download, &source).await.unwrap_err();
    assert!(matches!(err, MediarrError::InvalidState { .. }));
}
