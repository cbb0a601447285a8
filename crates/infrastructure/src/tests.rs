//! Store tests over a temporary SQLite database

use chrono::{Duration, Utc};
use uuid::Uuid;

use mediarr_core::domain::{DownloadStore, HistoryStore, ImportCommit, LibraryStore};
use mediarr_core::events::{EventStore, SystemEvent};
use mediarr_core::models::{
    Content, ContentStatus, ContentType, Download, DownloadClientKind, DownloadStatus, Episode,
    HistoryEntry, HistoryEventType, MediaFile,
};
use mediarr_core::MediarrError;

use crate::database::create_pool_at;
use crate::stores::{
    SqliteDownloadStore, SqliteEventStore, SqliteHistoryStore, SqliteLibraryStore,
};

struct Db {
    pool: crate::DatabasePool,
    _tmp: tempfile::TempDir,
}

async fn db() -> Db {
    let tmp = tempfile::tempdir().unwrap();
    let pool = create_pool_at(tmp.path(), "test.db").await.unwrap();
    Db { pool, _tmp: tmp }
}

async fn seed_movie(library: &SqliteLibraryStore) -> Content {
    let content = Content::new(ContentType::Movie, "The Matrix", "/movies").with_year(1999);
    library.add_content(&content).await.unwrap();
    content
}

#[tokio::test]
async fn content_round_trip() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());

    let content = seed_movie(&library).await;
    let loaded = library.get_content(content.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "The Matrix");
    assert_eq!(loaded.year, Some(1999));
    assert_eq!(loaded.content_type, ContentType::Movie);
    assert_eq!(loaded.status, ContentStatus::Wanted);

    assert!(library.get_content(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn episode_uniqueness_is_enforced() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let content = Content::new(ContentType::Series, "Show", "/series");
    library.add_content(&content).await.unwrap();

    library
        .add_episode(&Episode::new(content.id, 1, 1))
        .await
        .unwrap();
    let duplicate = library.add_episode(&Episode::new(content.id, 1, 1)).await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn commit_import_inserts_file_and_flips_status_atomically() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let content = seed_movie(&library).await;

    let file = MediaFile::new(content.id, "/movies/The Matrix (1999)/m.mkv", 1000)
        .with_quality("1080p")
        .with_source("idx");
    library
        .commit_import(ImportCommit {
            file: file.clone(),
            episode_id: None,
        })
        .await
        .unwrap();

    let files = library.files_for_content(content.id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].quality, "1080p");
    let content = library.get_content(content.id).await.unwrap().unwrap();
    assert_eq!(content.status, ContentStatus::Available);

    // Same path again: unique constraint surfaces as DestinationExists and
    // nothing else changes.
    let again = library
        .commit_import(ImportCommit {
            file: MediaFile::new(content.id, "/movies/The Matrix (1999)/m.mkv", 1000),
            episode_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(again, MediarrError::DestinationExists { .. }));
    assert_eq!(library.files_for_content(content.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn download_transitions_follow_the_state_machine() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let downloads = SqliteDownloadStore::new(db.pool.clone());
    let content = seed_movie(&library).await;

    let download = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_abc",
        "The.Matrix.1999.1080p.BluRay.x264-GRP",
        "idx",
    );
    downloads.create(&download, &[]).await.unwrap();

    let updated = downloads
        .transition(download.id, DownloadStatus::Downloading)
        .await
        .unwrap();
    assert_eq!(updated.status, DownloadStatus::Downloading);

    // Invalid: downloading -> imported
    let err = downloads
        .transition(download.id, DownloadStatus::Imported)
        .await
        .unwrap_err();
    assert!(matches!(err, MediarrError::InvalidState { .. }));
    let stored = downloads.get(download.id).await.unwrap().unwrap();
    assert_eq!(stored.status, DownloadStatus::Downloading);

    downloads
        .transition(download.id, DownloadStatus::Completed)
        .await
        .unwrap();
    let stored = downloads.get(download.id).await.unwrap().unwrap();
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn junction_rows_and_lookup_by_client_id() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let downloads = SqliteDownloadStore::new(db.pool.clone());

    let content = Content::new(ContentType::Series, "Show", "/series");
    library.add_content(&content).await.unwrap();
    let ep1 = Episode::new(content.id, 1, 1);
    let ep2 = Episode::new(content.id, 1, 2);
    library.add_episode(&ep1).await.unwrap();
    library.add_episode(&ep2).await.unwrap();

    let download = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_xyz",
        "Show.S01E01-02.1080p.WEB-DL",
        "idx",
    );
    downloads.create(&download, &[ep1.id, ep2.id]).await.unwrap();

    let mut ids = downloads.episode_ids(download.id).await.unwrap();
    ids.sort();
    let mut expected = vec![ep1.id, ep2.id];
    expected.sort();
    assert_eq!(ids, expected);

    let found = downloads
        .find_by_client_id(DownloadClientKind::Sabnzbd, "nzo_xyz")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, download.id);
    assert!(downloads
        .find_by_client_id(DownloadClientKind::Torrent, "nzo_xyz")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn list_active_excludes_terminal_downloads() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let downloads = SqliteDownloadStore::new(db.pool.clone());
    let content = seed_movie(&library).await;

    let active = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_1",
        "A.2020.1080p",
        "idx",
    );
    let failed = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_2",
        "B.2020.1080p",
        "idx",
    );
    downloads.create(&active, &[]).await.unwrap();
    downloads.create(&failed, &[]).await.unwrap();
    downloads
        .transition(failed.id, DownloadStatus::Failed)
        .await
        .unwrap();

    let listed = downloads
        .list_active(DownloadClientKind::Sabnzbd)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, active.id);
}

#[tokio::test]
async fn history_append_and_filtered_list() {
    let db = db().await;
    let history = SqliteHistoryStore::new(db.pool.clone());

    let content_id = Uuid::new_v4();
    history
        .append(&HistoryEntry::new(
            content_id,
            HistoryEventType::Grabbed,
            serde_json::json!({"release_name": "X"}),
        ))
        .await
        .unwrap();
    history
        .append(&HistoryEntry::new(
            Uuid::new_v4(),
            HistoryEventType::Imported,
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let all = history.list(None, 10).await.unwrap();
    assert_eq!(all.len(), 2);
    let filtered = history.list(Some(content_id), 10).await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].event, HistoryEventType::Grabbed);
    assert_eq!(filtered[0].data["release_name"], "X");
}

#[tokio::test]
async fn event_log_is_append_ordered_and_rehydrates() {
    let db = db().await;
    let events = SqliteEventStore::new(db.pool.clone());

    let download_id = Uuid::new_v4();
    let first = SystemEvent::DownloadCompleted {
        download_id,
        source_path: "/downloads/x".to_string(),
    };
    let second = SystemEvent::CleanupCompleted { download_id };

    let id1 = events.append(&first, Utc::now()).await.unwrap();
    let id2 = events.append(&second, Utc::now()).await.unwrap();
    assert!(id2 > id1);

    let stored = events
        .for_entity(mediarr_core::events::EntityType::Download, download_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id, id1);
    assert_eq!(stored[0].to_event().unwrap(), first);
    assert_eq!(stored[1].to_event().unwrap(), second);

    let recent = events.recent(1).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, id2);
}

#[tokio::test]
async fn event_log_prune_removes_old_rows() {
    let db = db().await;
    let events = SqliteEventStore::new(db.pool.clone());

    let old_time = Utc::now() - Duration::days(30);
    let event = SystemEvent::CleanupCompleted {
        download_id: Uuid::new_v4(),
    };
    events.append(&event, old_time).await.unwrap();
    events.append(&event, Utc::now()).await.unwrap();

    let pruned = events.prune(Utc::now() - Duration::days(7)).await.unwrap();
    assert_eq!(pruned, 1);
    assert_eq!(events.recent(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn metadata_cache_honors_age_cutoff() {
    use crate::stores::SqliteMetadataCache;

    let db = db().await;
    let cache = SqliteMetadataCache::new(db.pool.clone());

    let payload = serde_json::json!({"results": [{"id": 603, "title": "The Matrix"}]});
    cache.put("tmdb:search:the matrix", &payload).await.unwrap();

    let hit = cache
        .get("tmdb:search:the matrix", Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(hit, Some(payload.clone()));

    // A zero-age cutoff treats everything as stale
    let stale = cache
        .get("tmdb:search:the matrix", Duration::zero())
        .await
        .unwrap();
    assert_eq!(stale, None);

    // Re-put replaces the previous entry
    let newer = serde_json::json!({"results": []});
    cache.put("tmdb:search:the matrix", &newer).await.unwrap();
    let hit = cache
        .get("tmdb:search:the matrix", Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(hit, Some(newer));

    assert!(cache
        .get("missing", Duration::hours(1))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn progress_updates_persist() {
    let db = db().await;
    let library = SqliteLibraryStore::new(db.pool.clone());
    let downloads = SqliteDownloadStore::new(db.pool.clone());
    let content = seed_movie(&library).await;

    let download = Download::new(
        content.id,
        DownloadClientKind::Sabnzbd,
        "nzo_1",
        "A.2020.1080p",
        "idx",
    );
    downloads.create(&download, &[]).await.unwrap();
    downloads
        .update_progress(download.id, 55.5, 1_000_000, Some(90), Some(700_000))
        .await
        .unwrap();

    let stored = downloads.get(download.id).await.unwrap().unwrap();
    assert!((stored.progress - 55.5).abs() < 0.01);
    assert_eq!(stored.speed_bps, 1_000_000);
    assert_eq!(stored.eta_seconds, Some(90));
    assert_eq!(stored.size_bytes, Some(700_000));
}
