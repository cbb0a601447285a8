//! Mediarr - event-driven movie and TV acquisition engine
//!
//! Composition root: loads configuration, opens the database, wires the
//! stores, clients, handlers and adapters under the runner, and serves the
//! HTTP API until SIGINT/SIGTERM.

mod config;
mod search;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mediarr_api::ApiState;
use mediarr_core::domain::{DownloadClient, MediaServer};
use mediarr_core::engine::{
    CleanupConfig, CleanupHandler, ClientAdapter, ClientAdapterConfig, DownloadHandler,
    DownloadHandlerConfig, ImportHandler, MediaServerAdapter, Runner,
};
use mediarr_core::events::EventBus;
use mediarr_core::{MediarrError, Result};
use mediarr_downloaders::{QbittorrentClient, QbittorrentConfig, SabnzbdClient, SabnzbdConfig};
use mediarr_import::{FileImporter, ImporterConfig, NamingConfig};
use mediarr_indexers::{NewznabClient, NewznabConfig, TmdbClient, TmdbConfig, TvdbClient, TvdbConfig};
use mediarr_infrastructure::{
    create_pool, DatabaseConfig, SqliteDownloadStore, SqliteEventStore, SqliteHistoryStore,
    SqliteLibraryStore, SqliteMetadataCache,
};
use mediarr_notifications::{PlexClient, PlexConfig};

use config::AppConfig;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "mediarr", version, about = "Movie and TV acquisition engine")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("mediarr: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(&args.config)?;
    init_logging(&config.server.log_level);
    info!(config = %args.config.display(), "starting mediarr");

    // Database and stores
    let pool = create_pool(&DatabaseConfig {
        path: config.database.path.clone(),
        ..Default::default()
    })
    .await?;
    let library = Arc::new(SqliteLibraryStore::new(pool.clone()));
    let downloads = Arc::new(SqliteDownloadStore::new(pool.clone()));
    let history = Arc::new(SqliteHistoryStore::new(pool.clone()));
    let events = Arc::new(SqliteEventStore::new(pool.clone()));

    // Bus with the durable log behind it
    let bus = Arc::new(EventBus::with_log(events.clone()));

    // External clients
    let plex = match &config.notifications.plex {
        Some(plex) => Some(Arc::new(PlexClient::new(PlexConfig {
            url: plex.url.clone(),
            token: plex.token.clone(),
            local_path: plex.local_path.clone(),
            remote_path: plex.remote_path.clone(),
            timeout: Duration::from_secs(30),
        })?)),
        None => None,
    };

    // Importer
    let naming = NamingConfig {
        movie_template: non_empty(&config.libraries.movies.naming)
            .unwrap_or_else(|| NamingConfig::default().movie_template),
        episode_template: non_empty(&config.libraries.series.naming)
            .unwrap_or_else(|| NamingConfig::default().episode_template),
    };
    let importer = Arc::new(FileImporter::new(
        library.clone(),
        history.clone(),
        plex.clone().map(|p| p as Arc<dyn MediaServer>),
        ImporterConfig {
            movie_root: config.libraries.movies.root.clone(),
            series_root: config.libraries.series.root.clone(),
            naming,
        },
    ));

    // Engine workers under one cancellation scope
    let mut runner = Runner::new(bus.clone());
    let cancel = runner.cancel_token();

    // Download clients: each configured client gets its own polling
    // adapter; a single handler routes grabs between them by URL.
    let mut download_clients: Vec<Arc<dyn DownloadClient>> = Vec::new();
    if let Some(sab) = &config.downloaders.sabnzbd {
        let client = Arc::new(SabnzbdClient::new(SabnzbdConfig {
            url: sab.url.clone(),
            api_key: sab.api_key.clone(),
            category: sab.category.clone(),
            timeout: Duration::from_secs(30),
        })?);
        let adapter = ClientAdapter::new(
            bus.clone(),
            downloads.clone(),
            client.clone(),
            ClientAdapterConfig {
                poll_interval: Duration::from_secs(sab.poll_interval),
                remote_path: sab.remote_path.clone(),
                local_path: sab.local_path.clone(),
            },
        );
        runner.spawn("sabnzbd-adapter", adapter.run(cancel.clone()));
        download_clients.push(client);
    }
    if let Some(qbit) = &config.downloaders.qbittorrent {
        let client = Arc::new(QbittorrentClient::new(QbittorrentConfig {
            url: qbit.url.clone(),
            username: qbit.username.clone(),
            password: qbit.password.clone(),
            category: qbit.category.clone(),
            timeout: Duration::from_secs(30),
        })?);
        let adapter = ClientAdapter::new(
            bus.clone(),
            downloads.clone(),
            client.clone(),
            ClientAdapterConfig {
                poll_interval: Duration::from_secs(qbit.poll_interval),
                remote_path: qbit.remote_path.clone(),
                local_path: qbit.local_path.clone(),
            },
        );
        runner.spawn("qbittorrent-adapter", adapter.run(cancel.clone()));
        download_clients.push(client);
    }

    if download_clients.is_empty() {
        warn!("no download client configured, grabs will not be processed");
    } else {
        let download_handler = DownloadHandler::new(
            bus.clone(),
            downloads.clone(),
            library.clone(),
            history.clone(),
            download_clients,
            DownloadHandlerConfig::default(),
        );
        runner.spawn("download-handler", download_handler.run(cancel.clone()));
    }

    let import_handler = ImportHandler::new(
        bus.clone(),
        downloads.clone(),
        library.clone(),
        importer,
    );
    runner.spawn("import-handler", import_handler.run(cancel.clone()));

    if let Some(plex) = &plex {
        let adapter = MediaServerAdapter::new(
            bus.clone(),
            downloads.clone(),
            library.clone(),
            plex.clone(),
            Duration::from_secs(
                config
                    .notifications
                    .plex
                    .as_ref()
                    .map(|p| p.poll_interval)
                    .unwrap_or(30),
            ),
        );
        runner.spawn("media-adapter", adapter.run(cancel.clone()));
    }

    let cleanup_handler = CleanupHandler::new(
        bus.clone(),
        downloads.clone(),
        CleanupConfig {
            download_root: config
                .downloaders
                .sabnzbd
                .as_ref()
                .and_then(|sab| sab.local_path.clone())
                .or_else(|| {
                    config
                        .downloaders
                        .qbittorrent
                        .as_ref()
                        .and_then(|qbit| qbit.local_path.clone())
                })
                .unwrap_or_else(|| PathBuf::from("/downloads")),
            cleanup_source: config.importer.cleanup_source,
            media_server_configured: plex.is_some(),
        },
    );
    runner.spawn("cleanup-handler", cleanup_handler.run(cancel.clone()));

    // HTTP surface
    let api_state = ApiState {
        library,
        downloads,
        history,
        events,
        bus: bus.clone(),
        api_key: config.compat.api_key.clone(),
        compat_radarr: config.compat.radarr,
        compat_sonarr: config.compat.sonarr,
        movie_root: config.libraries.movies.root.display().to_string(),
        series_root: config.libraries.series.root.display().to_string(),
    };
    let search_state = search::SearchState {
        indexers: build_indexers(&config)?,
        tmdb: build_tmdb(&config)?,
        tvdb: build_tvdb(&config)?,
        cache: Arc::new(SqliteMetadataCache::new(pool.clone())),
        api_key: config.compat.api_key.clone(),
    };
    let app = mediarr_api::create_router(api_state).merge(search::router(search_state));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| MediarrError::ConfigurationError {
            field: "server".to_string(),
            message: format!("invalid listen address: {}", e),
        })?;
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| MediarrError::ConfigurationError {
                field: "server".to_string(),
                message: format!("failed to bind {}: {}", addr, e),
            })?;
    info!(%addr, "http server listening");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()));
    if let Err(e) = server.await {
        warn!(error = %e, "http server error");
    }

    // Signal received: stop workers, close the bus, flush the log
    runner.shutdown(SHUTDOWN_GRACE).await;
    info!("mediarr stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mediarr={0},mediarr_core={0},tower_http=warn", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn non_empty(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

fn build_indexers(config: &AppConfig) -> Result<Vec<Arc<NewznabClient>>> {
    let mut clients = Vec::new();
    for (name, indexer) in &config.indexers {
        clients.push(Arc::new(NewznabClient::new(NewznabConfig {
            name: name.clone(),
            url: indexer.url.clone(),
            api_key: indexer.api_key.clone(),
            timeout: Duration::from_secs(30),
        })?));
    }
    Ok(clients)
}

fn build_tmdb(config: &AppConfig) -> Result<Option<Arc<TmdbClient>>> {
    if config.tmdb.api_key.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(TmdbClient::new(TmdbConfig {
        api_key: config.tmdb.api_key.clone(),
        ..Default::default()
    })?)))
}

fn build_tvdb(config: &AppConfig) -> Result<Option<Arc<TvdbClient>>> {
    if config.tvdb.api_key.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(TvdbClient::new(TvdbConfig {
        api_key: config.tvdb.api_key.clone(),
        ..Default::default()
    })?)))
}

/// Resolves when SIGINT or SIGTERM arrives, and cancels the worker scope
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
    cancel.cancel();
}
