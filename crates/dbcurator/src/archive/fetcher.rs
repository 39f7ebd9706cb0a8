use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;
use url::Url;

use crate::archive::ArchiveError;
use crate::config::{CuratorConfig, FtpConfig};

/// Byte counters shared between a download worker and whoever polls it.
#[derive(Debug, Default)]
pub struct DownloadProgress {
    transferred: AtomicU64,
    total: AtomicU64,
}

impl DownloadProgress {
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// 0 while the total size is unknown.
    pub fn percent(&self) -> f32 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        (self.transferred() as f32 * 100.0 / total as f32).min(100.0)
    }
}

/// Remote side of the archive cache.
pub trait RemoteFetcher: Send + Sync {
    /// Last modification time reported by the server, `None` when unknown.
    fn modification_time(&self, url: &Url) -> Result<Option<DateTime<Utc>>, ArchiveError>;

    /// Downloads `url` into `destination`, which must not exist yet.
    fn download(
        &self,
        url: &Url,
        destination: &Path,
        progress: &DownloadProgress,
    ) -> Result<(), ArchiveError>;
}

fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .map(|date| date.with_timezone(&Utc))
}

/// HTTP(S) and FTP fetcher.
pub struct NetworkFetcher {
    http: reqwest::blocking::Client,
    ftp: FtpConfig,
}

impl NetworkFetcher {
    pub fn new(ftp: FtpConfig) -> Result<Self, ArchiveError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("dbcurator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http, ftp })
    }

    pub fn from_config(config: &CuratorConfig) -> Result<Self, ArchiveError> {
        Self::new(config.ftp.clone())
    }

    /// Reads `Last-Modified` from a HEAD response, falling back to the
    /// headers of a GET for servers that refuse HEAD.
    fn http_modification_time(&self, url: &Url) -> Result<Option<DateTime<Utc>>, ArchiveError> {
        let headers = match self.http.head(url.clone()).send().and_then(|r| r.error_for_status()) {
            Ok(response) => response.headers().clone(),
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD failed, reading headers from GET");
                self.http
                    .get(url.clone())
                    .send()?
                    .error_for_status()?
                    .headers()
                    .clone()
            }
        };
        Ok(last_modified(&headers))
    }

    fn http_download(
        &self,
        url: &Url,
        destination: &Path,
        progress: &DownloadProgress,
    ) -> Result<(), ArchiveError> {
        let mut response = self.http.get(url.clone()).send()?.error_for_status()?;
        if let Some(length) = response.content_length() {
            progress.set_total(length);
        }
        let mut file = create_destination(destination)?;
        copy_with_progress(&mut response, &mut file, destination, progress)
    }

    /// Logs in and changes into the directory holding the file. Returns the
    /// session and the bare file name.
    fn ftp_open(&self, url: &Url) -> Result<(FtpStream, String), ArchiveError> {
        let invalid = |reason: &str| ArchiveError::InvalidLocator {
            locator: url.to_string(),
            reason: reason.to_string(),
        };
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url.port().unwrap_or(21);

        let mut ftp = FtpStream::connect(format!("{}:{}", host, port))?;
        if url.username().is_empty() {
            ftp.login(self.ftp.username.as_str(), self.ftp.password.as_str())?;
        } else {
            ftp.login(url.username(), url.password().unwrap_or_default())?;
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let (file_name, directories) = segments
            .split_last()
            .ok_or_else(|| invalid("missing file name"))?;
        for directory in directories {
            ftp.cwd(*directory)?;
        }

        Ok((ftp, file_name.to_string()))
    }

    fn ftp_modification_time(&self, url: &Url) -> Result<Option<DateTime<Utc>>, ArchiveError> {
        let (mut ftp, file_name) = self.ftp_open(url)?;
        let modified = ftp.mdtm(&file_name)?;
        if let Err(e) = ftp.quit() {
            debug!(error = %e, "FTP quit failed");
        }
        Ok(Some(modified.and_utc()))
    }

    fn ftp_download(
        &self,
        url: &Url,
        destination: &Path,
        progress: &DownloadProgress,
    ) -> Result<(), ArchiveError> {
        let (mut ftp, file_name) = self.ftp_open(url)?;
        ftp.transfer_type(FileType::Binary)?;
        if let Ok(size) = ftp.size(&file_name) {
            progress.set_total(size as u64);
        }

        let mut file = create_destination(destination)?;
        let mut stream = ftp.retr_as_stream(&file_name)?;
        copy_with_progress(&mut stream, &mut file, destination, progress)?;
        ftp.finalize_retr_stream(stream)?;
        if let Err(e) = ftp.quit() {
            debug!(error = %e, "FTP quit failed");
        }
        Ok(())
    }
}

impl RemoteFetcher for NetworkFetcher {
    fn modification_time(&self, url: &Url) -> Result<Option<DateTime<Utc>>, ArchiveError> {
        match url.scheme() {
            "http" | "https" => self.http_modification_time(url),
            "ftp" => self.ftp_modification_time(url),
            other => Err(ArchiveError::UnsupportedScheme(other.to_string())),
        }
    }

    fn download(
        &self,
        url: &Url,
        destination: &Path,
        progress: &DownloadProgress,
    ) -> Result<(), ArchiveError> {
        match url.scheme() {
            "http" | "https" => self.http_download(url, destination, progress),
            "ftp" => self.ftp_download(url, destination, progress),
            other => Err(ArchiveError::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Exclusive create, so a concurrent download never clobbers an archive.
pub(crate) fn create_destination(destination: &Path) -> Result<File, ArchiveError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ArchiveError::DestinationExists(destination.to_path_buf()),
            _ => ArchiveError::Io {
                path: destination.to_path_buf(),
                source: e,
            },
        })
}

fn copy_with_progress<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    destination: &Path,
    progress: &DownloadProgress,
) -> Result<(), ArchiveError> {
    let io_err = |e| ArchiveError::Io {
        path: destination.to_path_buf(),
        source: e,
    };
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(e)),
        };
        writer.write_all(&buf[..n]).map_err(io_err)?;
        progress.add(n as u64);
    }
    writer.flush().map_err(io_err)
}
