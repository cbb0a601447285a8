//! In-memory store and client fakes for engine tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ClientDownloadStatus, DownloadClient, DownloadStore, HistoryStore, ImportCommit,
    ImportOutcome, Importer, LibraryStore, MediaServer,
};
use crate::events::{EntityType, EventStore, StoredEvent, SystemEvent};
use crate::models::{
    Content, ContentStatus, Download, DownloadClientKind, DownloadStatus, Episode, HistoryEntry,
    MediaFile,
};
use crate::{MediarrError, Result};

#[derive(Default)]
pub struct MemoryLibrary {
    contents: Mutex<HashMap<Uuid, Content>>,
    episodes: Mutex<HashMap<Uuid, Episode>>,
    files: Mutex<Vec<MediaFile>>,
}

#[async_trait]
impl LibraryStore for MemoryLibrary {
    async fn add_content(&self, content: &Content) -> Result<()> {
        content.validate()?;
        self.contents.lock().unwrap().insert(content.id, content.clone());
        Ok(())
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<Content>> {
        Ok(self.contents.lock().unwrap().get(&id).cloned())
    }

    async fn list_content(&self) -> Result<Vec<Content>> {
        Ok(self.contents.lock().unwrap().values().cloned().collect())
    }

    async fn set_content_status(&self, id: Uuid, status: ContentStatus) -> Result<()> {
        let mut contents = self.contents.lock().unwrap();
        let content = contents.get_mut(&id).ok_or_else(|| MediarrError::NotFound {
            resource: format!("content {}", id),
        })?;
        content.status = status;
        Ok(())
    }

    async fn add_episode(&self, episode: &Episode) -> Result<()> {
        episode.validate()?;
        self.episodes.lock().unwrap().insert(episode.id, episode.clone());
        Ok(())
    }

    async fn get_episode(&self, id: Uuid) -> Result<Option<Episode>> {
        Ok(self.episodes.lock().unwrap().get(&id).cloned())
    }

    async fn episodes_for_content(&self, content_id: Uuid) -> Result<Vec<Episode>> {
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.content_id == content_id)
            .cloned()
            .collect())
    }

    async fn files_for_content(&self, content_id: Uuid) -> Result<Vec<MediaFile>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.content_id == content_id)
            .cloned()
            .collect())
    }

    async fn commit_import(&self, commit: ImportCommit) -> Result<MediaFile> {
        {
            let files = self.files.lock().unwrap();
            if files.iter().any(|f| f.path == commit.file.path) {
                return Err(MediarrError::DestinationExists {
                    path: commit.file.path.clone(),
                });
            }
        }
        match commit.episode_id {
            Some(episode_id) => {
                let mut episodes = self.episodes.lock().unwrap();
                let episode =
                    episodes
                        .get_mut(&episode_id)
                        .ok_or_else(|| MediarrError::NotFound {
                            resource: format!("episode {}", episode_id),
                        })?;
                episode.status = ContentStatus::Available;
            }
            None => {
                self.set_content_status(commit.file.content_id, ContentStatus::Available)
                    .await?;
            }
        }
        self.files.lock().unwrap().push(commit.file.clone());
        Ok(commit.file)
    }
}

impl MemoryLibrary {
    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn insert_file(&self, file: MediaFile) {
        self.files.lock().unwrap().push(file);
    }
}

#[derive(Default)]
pub struct MemoryDownloads {
    rows: Mutex<HashMap<Uuid, Download>>,
    junctions: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl MemoryDownloads {
    pub fn insert(&self, download: Download) {
        self.rows.lock().unwrap().insert(download.id, download);
    }
}

#[async_trait]
impl DownloadStore for MemoryDownloads {
    async fn create(&self, download: &Download, episode_ids: &[Uuid]) -> Result<()> {
        self.rows.lock().unwrap().insert(download.id, download.clone());
        self.junctions
            .lock()
            .unwrap()
            .insert(download.id, episode_ids.to_vec());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Download>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_client_id(
        &self,
        client: DownloadClientKind,
        client_id: &str,
    ) -> Result<Option<Download>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|d| d.client == client && d.client_id == client_id)
            .cloned())
    }

    async fn list_active(&self, client: DownloadClientKind) -> Result<Vec<Download>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.client == client && !d.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Download>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.status == status)
            .cloned()
            .collect())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Download>> {
        let mut all: Vec<Download> = self.rows.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|d| d.added_at);
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn transition(&self, id: Uuid, to: DownloadStatus) -> Result<Download> {
        let mut rows = self.rows.lock().unwrap();
        let download = rows.get_mut(&id).ok_or_else(|| MediarrError::NotFound {
            resource: format!("download {}", id),
        })?;
        download.transition(to)?;
        Ok(download.clone())
    }

    async fn update_progress(
        &self,
        id: Uuid,
        progress: f32,
        speed_bps: i64,
        eta_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let download = rows.get_mut(&id).ok_or_else(|| MediarrError::NotFound {
            resource: format!("download {}", id),
        })?;
        download.progress = progress;
        download.speed_bps = speed_bps;
        download.eta_seconds = eta_seconds;
        if size_bytes.is_some() {
            download.size_bytes = size_bytes;
        }
        Ok(())
    }

    async fn episode_ids(&self, download_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .junctions
            .lock()
            .unwrap()
            .get(&download_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn append(&self, entry: &HistoryEntry) -> Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list(&self, content_id: Option<Uuid>, limit: i64) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| content_id.map(|id| e.content_id == id).unwrap_or(true))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryEvents {
    rows: Mutex<Vec<StoredEvent>>,
    next_id: AtomicI64,
}

#[async_trait]
impl EventStore for MemoryEvents {
    async fn append(&self, event: &SystemEvent, occurred_at: DateTime<Utc>) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (entity_type, entity_id) = event.entity();
        self.rows.lock().unwrap().push(StoredEvent {
            id,
            event_type: event.event_type().to_string(),
            entity_type,
            entity_id,
            payload: event.payload()?,
            occurred_at,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<StoredEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.occurred_at >= since)
            .cloned()
            .collect())
    }

    async fn for_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<StoredEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn recent(&self, n: u32) -> Result<Vec<StoredEvent>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().rev().take(n as usize).cloned().collect())
    }

    async fn prune(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|e| e.occurred_at >= older_than);
        Ok((before - rows.len()) as u64)
    }
}

pub struct FakeClient {
    pub kind: DownloadClientKind,
    pub fail_add: AtomicBool,
    pub added: Mutex<Vec<String>>,
    pub statuses: Mutex<HashMap<String, Option<ClientDownloadStatus>>>,
    counter: AtomicUsize,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self {
            kind: DownloadClientKind::Sabnzbd,
            fail_add: AtomicBool::new(false),
            added: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            counter: AtomicUsize::new(0),
        }
    }
}

impl FakeClient {
    pub fn with_kind(kind: DownloadClientKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn set_status(&self, client_id: &str, status: Option<ClientDownloadStatus>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(client_id.to_string(), status);
    }
}

#[async_trait]
impl DownloadClient for FakeClient {
    fn kind(&self) -> DownloadClientKind {
        self.kind
    }

    async fn add(&self, url: &str, _category: Option<&str>) -> Result<String> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(MediarrError::RemoteUnavailable {
                service: "fake-client".to_string(),
                error: "connection refused".to_string(),
            });
        }
        self.added.lock().unwrap().push(url.to_string());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("nzo_{:03}", n))
    }

    async fn status(&self, client_id: &str) -> Result<Option<ClientDownloadStatus>> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(client_id)
            .cloned()
            .flatten())
    }

    async fn list(&self) -> Result<Vec<ClientDownloadStatus>> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect())
    }

    async fn remove(&self, _client_id: &str, _delete_files: bool) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMediaServer {
    pub known: Mutex<std::collections::HashSet<Uuid>>,
}

impl FakeMediaServer {
    pub fn learn(&self, content_id: Uuid) {
        self.known.lock().unwrap().insert(content_id);
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn has_content(&self, content: &Content) -> Result<(bool, Option<String>)> {
        let known = self.known.lock().unwrap().contains(&content.id);
        Ok((known, known.then(|| format!("key-{}", content.id))))
    }

    async fn scan_path(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn refresh_library(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

pub struct FakeImporter {
    pub calls: Mutex<Vec<Uuid>>,
    pub fail: AtomicBool,
}

impl Default for FakeImporter {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Importer for FakeImporter {
    async fn import(&self, download: &Download, source_path: &Path) -> Result<ImportOutcome> {
        self.calls.lock().unwrap().push(download.id);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MediarrError::NoVideoFile {
                path: source_path.display().to_string(),
            });
        }
        let file = MediaFile::new(
            download.content_id,
            format!("/library/{}.mkv", download.id),
            1000,
        )
        .with_quality("1080p");
        Ok(ImportOutcome {
            file_size: file.size_bytes,
            episode_ids: Vec::new(),
            upgraded: false,
            file,
        })
    }
}
