use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, info, warn};
use url::Url;

use crate::archive::{
    ArchiveEntry, ArchiveError, BundledResources, DownloadProgress, NetworkFetcher, RemoteFetcher,
    SourceLocator, BUNDLED_PREFIX,
};
use crate::config::CuratorConfig;
use crate::error::StorageError;
use crate::executor::StatusSink;
use crate::storage::{copy_file_exclusive, ensure_directory, find_similar_file};
use crate::store::CurationStore;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// Keeps one local copy per distinct remote file version and per distinct
/// content.
pub struct SourceArchiveCache {
    archive_folder: PathBuf,
    bundled: BundledResources,
    fetcher: Arc<dyn RemoteFetcher>,
    poll_interval: Duration,
}

impl SourceArchiveCache {
    pub fn new<P: AsRef<Path>>(
        archive_folder: P,
        bundled: BundledResources,
        fetcher: Arc<dyn RemoteFetcher>,
    ) -> Self {
        Self {
            archive_folder: archive_folder.as_ref().to_path_buf(),
            bundled,
            fetcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Production constructor with the network fetcher.
    pub fn from_config(config: &CuratorConfig) -> Result<Self, ArchiveError> {
        let fetcher = NetworkFetcher::from_config(config)?;
        Ok(Self::new(
            &config.archive_folder,
            BundledResources::from_config(&config.bundled_resources),
            Arc::new(fetcher),
        )
        .with_poll_interval(config.download_poll_interval()))
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn archive_folder(&self) -> &Path {
        &self.archive_folder
    }

    /// Returns a local archive of `locator`, downloading only when no
    /// stored archive is at least as new as the remote file. The entry is
    /// saved to `store` before it is returned.
    pub fn fetch(
        &self,
        locator: &str,
        store: &dyn CurationStore,
        status: &dyn StatusSink,
    ) -> Result<ArchiveEntry, ArchiveError> {
        let locator = self.resolve_alias(locator, store)?;
        let parsed = SourceLocator::parse(&locator)?;

        let mut entry = match &parsed {
            SourceLocator::Bundled(resource) => self.fetch_bundled(&parsed, resource, store, status)?,
            SourceLocator::Network(url) => self.fetch_network(&parsed, url, store, status)?,
        };

        store.save_archive(&mut entry)?;
        Ok(entry)
    }

    /// Friendly source names resolve to the registered source's URL.
    fn resolve_alias(&self, locator: &str, store: &dyn CurationStore) -> Result<String, ArchiveError> {
        let trimmed = locator.trim();
        if trimmed.starts_with(BUNDLED_PREFIX) || trimmed.contains("://") {
            return Ok(trimmed.to_string());
        }
        match store.source_by_name(trimmed)? {
            Some(source) => {
                debug!(alias = trimmed, url = %source.url, "Resolved source alias");
                Ok(source.url)
            }
            None => Ok(trimmed.to_string()),
        }
    }

    fn fetch_bundled(
        &self,
        locator: &SourceLocator,
        resource: &str,
        store: &dyn CurationStore,
        status: &dyn StatusSink,
    ) -> Result<ArchiveEntry, ArchiveError> {
        if !self.bundled.is_allowed(resource) && store.source_by_url(resource)?.is_none() {
            return Err(ArchiveError::NotAllowed(resource.to_string()));
        }

        let source_path = self.bundled.resolve(resource);
        let destination = self.prepare_destination(locator)?;
        copy_file_exclusive(&source_path, &destination).map_err(|e| match e {
            StorageError::FileExists(path) => ArchiveError::DestinationExists(path),
            other => ArchiveError::Storage(other),
        })?;

        let archive_path = self.deduplicate(destination, status)?;
        let now = Utc::now();
        Ok(ArchiveEntry::new(resource, archive_path, now, now))
    }

    fn fetch_network(
        &self,
        locator: &SourceLocator,
        url: &Url,
        store: &dyn CurationStore,
        status: &dyn StatusSink,
    ) -> Result<ArchiveEntry, ArchiveError> {
        let observed = self.fetcher.modification_time(url)?;

        if let Some(observed) = observed {
            match store.find_archive(url.as_str(), observed) {
                Ok(Some(existing)) if existing.is_current_for(observed) => {
                    info!(url = %url, archive = %existing.archive_path.display(), "Reusing cached archive");
                    status.add_message(format!(
                        "Using previously downloaded archive {}",
                        existing.archive_path.display()
                    ));
                    return Ok(existing);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(url = %url, error = %e, "Archive lookup failed");
                    status.add_message("Could not find existing file so downloading.".to_string());
                }
            }
        }

        let destination = self.prepare_destination(locator)?;
        status.add_message(format!("Downloading {}", url));
        self.download_in_background(url, &destination, status)?;

        let archive_path = self.deduplicate(destination, status)?;
        let server_date = observed.unwrap_or_else(DateTime::<Utc>::default);
        Ok(ArchiveEntry::new(url.as_str(), archive_path, server_date, Utc::now()))
    }

    fn prepare_destination(&self, locator: &SourceLocator) -> Result<PathBuf, ArchiveError> {
        ensure_directory(&self.archive_folder)?;
        let destination = self
            .archive_folder
            .join(locator.archive_file_name(Utc::now()));
        if std::fs::symlink_metadata(&destination).is_ok() {
            return Err(ArchiveError::DestinationExists(destination));
        }
        Ok(destination)
    }

    /// Runs the download on a worker thread and forwards its progress to
    /// `status` every poll interval until it finishes.
    fn download_in_background(
        &self,
        url: &Url,
        destination: &Path,
        status: &dyn StatusSink,
    ) -> Result<(), ArchiveError> {
        let progress = Arc::new(DownloadProgress::default());
        let (done_tx, done_rx) = bounded::<Result<(), ArchiveError>>(1);

        let fetcher = Arc::clone(&self.fetcher);
        let worker_progress = Arc::clone(&progress);
        let worker_url = url.clone();
        let worker_destination = destination.to_path_buf();
        thread::Builder::new()
            .name("archive-download".to_string())
            .spawn(move || {
                let result = fetcher.download(&worker_url, &worker_destination, &worker_progress);
                let _ = done_tx.send(result);
            })
            .map_err(|e| ArchiveError::SpawnFailed(e.to_string()))?;

        let result = loop {
            match done_rx.recv_timeout(self.poll_interval) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => {
                    status.set_current_step_progress(progress.percent());
                }
                Err(RecvTimeoutError::Disconnected) => break Err(ArchiveError::DownloadAborted),
            }
        };

        match result {
            Ok(()) => {
                status.set_current_step_progress(100.0);
                info!(url = %url, bytes = progress.transferred(), "Download finished");
                Ok(())
            }
            Err(ArchiveError::DestinationExists(path)) => Err(ArchiveError::DestinationExists(path)),
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(destination) {
                    debug!(error = %remove_err, "No partial download to remove");
                }
                Err(e)
            }
        }
    }

    /// Swaps a fresh archive for an identical one already in the folder.
    fn deduplicate(&self, archive: PathBuf, status: &dyn StatusSink) -> Result<PathBuf, ArchiveError> {
        match find_similar_file(&archive, &self.archive_folder)? {
            Some(existing) => {
                std::fs::remove_file(&archive).map_err(|e| ArchiveError::Io {
                    path: archive.clone(),
                    source: e,
                })?;
                info!(archive = %existing.display(), "Found identical archive");
                status.add_message(format!(
                    "Found an identical archive so using {}",
                    existing.display()
                ));
                Ok(existing)
            }
            None => Ok(archive),
        }
    }
}

impl std::fmt::Debug for SourceArchiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceArchiveCache")
            .field("archive_folder", &self.archive_folder)
            .field("bundled", &self.bundled)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
