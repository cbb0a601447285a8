//! The importer: prepare, execute, notify
//!
//! Prepare resolves the source file and destination and performs every
//! check that can fail without side effects. Execute copies with fsync and
//! commits the file row plus the availability flip in one library
//! transaction. Notify pokes the media server and never fails the import.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mediarr_core::domain::{
    HistoryStore, ImportCommit, ImportOutcome, Importer, LibraryStore, MediaServer,
};
use mediarr_core::models::{
    Content, ContentType, Download, DownloadStatus, Episode, HistoryEntry, HistoryEventType,
    MediaFile,
};
use mediarr_core::{MediarrError, Resolution, Result};

use crate::naming::{self, NamingConfig, TemplateValues};
use crate::scanner;

#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub movie_root: PathBuf,
    pub series_root: PathBuf,
    pub naming: NamingConfig,
}

/// Everything prepare resolved; execute works only from this
#[derive(Debug)]
struct ImportPlan {
    content: Content,
    episode: Option<Episode>,
    source_file: PathBuf,
    file_size: i64,
    destination: PathBuf,
    quality: String,
    upgraded: bool,
}

pub struct FileImporter {
    library: Arc<dyn LibraryStore>,
    history: Arc<dyn HistoryStore>,
    media_server: Option<Arc<dyn MediaServer>>,
    config: ImporterConfig,
}

impl FileImporter {
    pub fn new(
        library: Arc<dyn LibraryStore>,
        history: Arc<dyn HistoryStore>,
        media_server: Option<Arc<dyn MediaServer>>,
        config: ImporterConfig,
    ) -> Self {
        Self {
            library,
            history,
            media_server,
            config,
        }
    }

    async fn prepare(&self, download: &Download, source_path: &Path) -> Result<ImportPlan> {
        if !matches!(
            download.status,
            DownloadStatus::Completed | DownloadStatus::Importing
        ) {
            return Err(MediarrError::InvalidState {
                entity: format!("download {}", download.id),
                actual: download.status.to_string(),
                expected: "completed".to_string(),
            });
        }

        let content = self
            .library
            .get_content(download.content_id)
            .await?
            .ok_or_else(|| MediarrError::NotFound {
                resource: format!("content {}", download.content_id),
            })?;

        let episode = match content.content_type {
            ContentType::Series => {
                let episode_id =
                    download
                        .episode_id
                        .ok_or_else(|| MediarrError::EpisodeNotSpecified {
                            download_id: download.id.to_string(),
                        })?;
                let episode = self.library.get_episode(episode_id).await?.ok_or_else(|| {
                    MediarrError::NotFound {
                        resource: format!("episode {}", episode_id),
                    }
                })?;
                Some(episode)
            }
            ContentType::Movie => None,
        };

        let (source_file, file_size) = scanner::find_largest_video(source_path).await?;

        let parsed = mediarr_parser::parse(&download.release_name);
        let quality = parsed.quality_label();

        let root = match content.content_type {
            ContentType::Movie => &self.config.movie_root,
            ContentType::Series => &self.config.series_root,
        };
        let template = match content.content_type {
            ContentType::Movie => &self.config.naming.movie_template,
            ContentType::Series => &self.config.naming.episode_template,
        };
        let values = TemplateValues {
            title: content.title.clone(),
            year: content.year.or(parsed.year),
            season: episode.as_ref().map(|e| e.season),
            episode: episode.as_ref().map(|e| e.episode),
            quality: quality.clone(),
            ext: source_file
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("mkv")
                .to_string(),
        };
        let relative = naming::render(template, &values)?;
        let destination = naming::join_checked(root, &relative)?;

        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            return Err(MediarrError::DestinationExists {
                path: destination.display().to_string(),
            });
        }

        let existing = self.library.files_for_content(content.id).await?;
        let upgraded = existing
            .iter()
            .map(|f| Resolution::from_label(&f.quality))
            .max_by_key(|r| r.rank())
            .map(|best| parsed.resolution.rank() > best.rank())
            .unwrap_or(false);

        debug!(
            download_id = %download.id,
            source = %source_file.display(),
            destination = %destination.display(),
            %quality,
            "import planned"
        );

        Ok(ImportPlan {
            content,
            episode,
            source_file,
            file_size,
            destination,
            quality,
            upgraded,
        })
    }

    async fn execute(&self, download: &Download, plan: &ImportPlan) -> Result<MediaFile> {
        if let Some(parent) = plan.destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MediarrError::FileSystemError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }

        copy_with_fsync(&plan.source_file, &plan.destination).await?;

        let file = MediaFile::new(
            plan.content.id,
            plan.destination.display().to_string(),
            plan.file_size,
        )
        .with_quality(&plan.quality)
        .with_source(&download.indexer);
        let file = match plan.episode.as_ref() {
            Some(episode) => file.with_episode(episode.id),
            None => file,
        };

        let file = self
            .library
            .commit_import(ImportCommit {
                file,
                episode_id: plan.episode.as_ref().map(|e| e.id),
            })
            .await?;

        let event = if plan.upgraded {
            HistoryEventType::Upgraded
        } else {
            HistoryEventType::Imported
        };
        let data = serde_json::json!({
            "release_name": download.release_name,
            "indexer": download.indexer,
            "quality": plan.quality,
            "path": file.path,
            "size_bytes": plan.file_size,
        });
        if let Err(e) = self
            .history
            .append(
                &HistoryEntry::new(plan.content.id, event, data)
                    .with_episode(plan.episode.as_ref().map(|e| e.id)),
            )
            .await
        {
            warn!(download_id = %download.id, error = %e, "failed to record import history");
        }

        Ok(file)
    }

    async fn notify(&self, destination: &Path) {
        if let Some(server) = &self.media_server {
            if let Err(e) = server.scan_path(destination).await {
                warn!(path = %destination.display(), error = %e, "media server scan request failed");
            }
        }
    }

    fn episode_ids(&self, plan: &ImportPlan) -> Vec<Uuid> {
        plan.episode.iter().map(|e| e.id).collect()
    }
}

#[async_trait]
impl Importer for FileImporter {
    async fn import(&self, download: &Download, source_path: &Path) -> Result<ImportOutcome> {
        let plan = self.prepare(download, source_path).await?;
        let file = self.execute(download, &plan).await?;
        self.notify(&plan.destination).await;

        info!(
            download_id = %download.id,
            content_id = %plan.content.id,
            file = %file.path,
            size = plan.file_size,
            "imported"
        );

        Ok(ImportOutcome {
            file_size: plan.file_size,
            episode_ids: self.episode_ids(&plan),
            upgraded: plan.upgraded,
            file,
        })
    }
}

/// Byte copy with a final fsync; partial destinations are removed on error
async fn copy_with_fsync(source: &Path, destination: &Path) -> Result<()> {
    let result = async {
        let mut src = tokio::fs::File::open(source).await?;
        let mut dst = tokio::fs::File::create(destination).await?;
        tokio::io::copy(&mut src, &mut dst).await?;
        dst.sync_all().await?;
        Ok::<(), std::io::Error>(())
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(destination).await;
        return Err(MediarrError::CopyFailed {
            from: source.display().to_string(),
            to: destination.display().to_string(),
            error: e.to_string(),
        });
    }
    Ok(())
}
