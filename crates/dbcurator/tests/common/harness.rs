//! Test harness for isolated curation runs.
//!
//! The `TestHarness` owns every folder a run touches (FASTA output,
//! scratch space, archives, bundled resources) inside one `TempDir`, an
//! in-memory database behind a `SqliteCurationStore`, and an archive cache
//! wired to a `FakeFetcher`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;
use url::Url;

use dbcurator::archive::{
    ArchiveError, BundledResources, DownloadProgress, RemoteFetcher, SourceArchiveCache,
};
use dbcurator::curation::Curation;
use dbcurator::db::Database;
use dbcurator::executor::{CurationExecutor, ExecutorConfig, RunStatus, StatusSink};
use dbcurator::fasta::FastaReader;
use dbcurator::store::SqliteCurationStore;

/// A file served by the fake remote.
#[derive(Clone)]
struct RemoteFile {
    modified: Option<DateTime<Utc>>,
    content: Vec<u8>,
}

/// In-memory remote server. Serves published files in chunks, reporting
/// progress after each one.
#[derive(Default)]
pub struct FakeFetcher {
    files: Mutex<HashMap<String, RemoteFile>>,
    downloads: AtomicUsize,
    chunk_delay: Mutex<Duration>,
    chunks: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        let fetcher = Self::default();
        fetcher.chunks.store(1, Ordering::SeqCst);
        fetcher
    }

    /// Publishes (or replaces) the file at `url`.
    pub fn publish(&self, url: &str, modified: Option<DateTime<Utc>>, content: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(
            normalize(url),
            RemoteFile {
                modified,
                content: content.into(),
            },
        );
    }

    /// Number of completed downloads so far.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Splits every download into `chunks` pieces with `delay` between them.
    pub fn throttle(&self, chunks: usize, delay: Duration) {
        self.chunks.store(chunks.max(1), Ordering::SeqCst);
        *self.chunk_delay.lock().unwrap() = delay;
    }

    fn lookup(&self, url: &Url) -> Result<RemoteFile, ArchiveError> {
        self.files
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| ArchiveError::Io {
                path: PathBuf::from(url.path()),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not published"),
            })
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).expect("valid test URL").to_string()
}

impl RemoteFetcher for FakeFetcher {
    fn modification_time(&self, url: &Url) -> Result<Option<DateTime<Utc>>, ArchiveError> {
        Ok(self.lookup(url)?.modified)
    }

    fn download(
        &self,
        url: &Url,
        destination: &Path,
        progress: &DownloadProgress,
    ) -> Result<(), ArchiveError> {
        let file = self.lookup(url)?;
        let io_err = |e| ArchiveError::Io {
            path: destination.to_path_buf(),
            source: e,
        };
        let mut out = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .map_err(io_err)?;

        progress.set_total(file.content.len() as u64);
        let chunks = self.chunks.load(Ordering::SeqCst);
        let delay = *self.chunk_delay.lock().unwrap();
        let chunk_size = file.content.len().div_ceil(chunks).max(1);
        for chunk in file.content.chunks(chunk_size) {
            out.write_all(chunk).map_err(io_err)?;
            progress.add(chunk.len() as u64);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
        out.flush().map_err(io_err)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Status sink that keeps everything it is told.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
    pub progress: Mutex<Vec<f32>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.progress.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingSink {
    fn add_message(&self, message: String) {
        self.messages.lock().unwrap().push(message);
    }

    fn set_current_step_progress(&self, percent: f32) {
        self.progress.lock().unwrap().push(percent);
    }
}

/// Outcome of a synchronous run.
pub struct RunResult {
    pub curation: Curation,
    pub status: RunStatus,
    /// Every message the run emitted, in order.
    pub messages: Vec<String>,
}

impl RunResult {
    pub fn has_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

/// Test harness providing an isolated environment for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub fasta_dir: PathBuf,
    pub temp_root: PathBuf,
    pub archive_dir: PathBuf,
    pub bundled_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub config: ExecutorConfig,
    pub database: Database,
    pub store: Arc<SqliteCurationStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub cache: Arc<SourceArchiveCache>,
}

impl TestHarness {
    /// Create a new harness with no bundled resources allowed.
    pub fn new() -> Self {
        Self::with_bundled(&[])
    }

    /// Create a new harness whose cache allows the given bundled locators.
    pub fn with_bundled(allowed: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let fasta_dir = base.join("fasta");
        let temp_root = base.join("tmp");
        let archive_dir = base.join("archive");
        let bundled_dir = base.join("bundled");
        let upload_dir = base.join("uploads");
        for dir in [&fasta_dir, &temp_root, &archive_dir, &bundled_dir, &upload_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create harness dir");
        }

        let database = Database::open_in_memory().expect("Failed to open database");
        let store = Arc::new(SqliteCurationStore::new(database.clone()));
        let fetcher = Arc::new(FakeFetcher::new());

        let bundled = allowed
            .iter()
            .fold(BundledResources::new(&bundled_dir), |b, locator| b.allow(*locator));
        let cache = Arc::new(
            SourceArchiveCache::new(&archive_dir, bundled, fetcher.clone())
                .with_poll_interval(Duration::from_millis(10)),
        );

        let config = ExecutorConfig::new(&fasta_dir, &temp_root);

        Self {
            temp_dir,
            fasta_dir,
            temp_root,
            archive_dir,
            bundled_dir,
            upload_dir,
            config,
            database,
            store,
            fetcher,
            cache,
        }
    }

    /// Get the base temp directory path.
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn executor(&self, curation: Curation) -> CurationExecutor {
        self.executor_with(curation, self.config.clone())
    }

    pub fn executor_with(&self, curation: Curation, config: ExecutorConfig) -> CurationExecutor {
        CurationExecutor::new(
            curation,
            Arc::new(config),
            self.store.clone(),
            Arc::clone(&self.cache),
        )
    }

    /// Runs `curation` on the current thread with the harness config.
    pub fn run(&self, curation: Curation) -> RunResult {
        self.run_with(curation, self.config.clone())
    }

    pub fn run_with(&self, curation: Curation, config: ExecutorConfig) -> RunResult {
        let mut executor = self.executor_with(curation, config);
        executor.run();
        let status = executor.status();
        let messages = status.take_messages();
        RunResult {
            curation: executor.into_curation(),
            status,
            messages,
        }
    }

    /// Writes a plain FASTA file with the given records.
    pub fn write_fasta(&self, path: &Path, records: &[(&str, &str)]) -> PathBuf {
        std::fs::write(path, fasta_text(records)).expect("Failed to write FASTA file");
        path.to_path_buf()
    }

    /// Writes an upload into the upload folder.
    pub fn write_upload(&self, name: &str, records: &[(&str, &str)]) -> PathBuf {
        self.write_fasta(&self.upload_dir.join(name), records)
    }

    /// Writes a bundled resource and returns its `classpath:` locator.
    pub fn write_bundled(&self, name: &str, records: &[(&str, &str)]) -> String {
        self.write_fasta(&self.bundled_dir.join(name), records);
        format!("classpath:/{}", name)
    }

    pub fn fasta_files(&self) -> Vec<PathBuf> {
        list_dir(&self.fasta_dir)
    }

    pub fn archive_files(&self) -> Vec<PathBuf> {
        list_dir(&self.archive_dir)
    }

    /// Run workspaces left behind under the scratch folder.
    pub fn workspaces(&self) -> Vec<PathBuf> {
        list_dir(&self.temp_root)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// FASTA text for `records`, one line per sequence.
pub fn fasta_text(records: &[(&str, &str)]) -> String {
    records
        .iter()
        .map(|(header, sequence)| format!("{}\n{}\n", header, sequence))
        .collect()
}

/// Gzip-compressed FASTA text for `records`.
pub fn gzipped_fasta(records: &[(&str, &str)]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(fasta_text(records).as_bytes())
        .expect("Failed to gzip");
    encoder.finish().expect("Failed to finish gzip")
}

/// All (header, sequence) pairs of a FASTA file.
pub fn read_records(path: &Path) -> Vec<(String, String)> {
    let mut reader = FastaReader::open(path).expect("Failed to open FASTA file");
    let mut records = Vec::new();
    while reader.next_sequence().expect("Failed to read FASTA file") {
        records.push((reader.header().to_string(), reader.sequence().to_string()));
    }
    records
}

pub fn read_headers(path: &Path) -> Vec<String> {
    read_records(path).into_iter().map(|(h, _)| h).collect()
}

fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}
