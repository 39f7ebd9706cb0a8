use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;

use crate::error::FastaError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Counts raw bytes pulled from the file so progress works for gzip input too.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Record-at-a-time reader over a plain or gzip-compressed FASTA file.
///
/// Wrapped sequence lines are joined, trimmed and upper-cased, and a
/// trailing `*` terminator is dropped. Anything between the end of a
/// sequence block and the next `>` header is skipped.
pub struct FastaReader {
    path: PathBuf,
    lines: Option<Box<dyn BufRead + Send>>,
    bytes_read: Arc<AtomicU64>,
    total_bytes: u64,
    header: String,
    sequence: String,
    next_header: Option<String>,
}

impl FastaReader {
    /// Opens `path` and positions the reader before the first record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FastaError> {
        let mut reader = Self {
            path: path.as_ref().to_path_buf(),
            lines: None,
            bytes_read: Arc::new(AtomicU64::new(0)),
            total_bytes: 0,
            header: String::new(),
            sequence: String::new(),
            next_header: None,
        };
        reader.before_first()?;
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewinds to before the first record by reopening the file.
    pub fn before_first(&mut self) -> Result<(), FastaError> {
        let file = File::open(&self.path).map_err(|e| FastaError::Open {
            path: self.path.clone(),
            source: e,
        })?;
        self.total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.bytes_read = Arc::new(AtomicU64::new(0));

        let mut buffered = BufReader::new(CountingReader {
            inner: file,
            count: Arc::clone(&self.bytes_read),
        });
        let is_gzip = buffered
            .fill_buf()
            .map_err(|e| FastaError::Read {
                path: self.path.clone(),
                source: e,
            })?
            .starts_with(&GZIP_MAGIC);

        self.lines = Some(if is_gzip {
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        });
        self.header.clear();
        self.sequence.clear();

        let mut first = self.read_line()?;
        while first.as_deref().is_some_and(|line| line.trim().is_empty()) {
            first = self.read_line()?;
        }
        self.next_header = first;
        Ok(())
    }

    /// Advances to the next record. Returns `false` once the input is exhausted.
    pub fn next_sequence(&mut self) -> Result<bool, FastaError> {
        let Some(header) = self.next_header.take() else {
            self.header.clear();
            self.sequence.clear();
            return Ok(false);
        };
        self.header = header;
        self.sequence.clear();

        let mut line = self.read_line()?;
        while let Some(current) = line.as_deref() {
            if current.is_empty() || current.starts_with('>') {
                break;
            }
            self.sequence.push_str(&current.trim().to_uppercase());
            line = self.read_line()?;
        }

        while let Some(current) = line.as_deref() {
            if current.starts_with('>') {
                break;
            }
            line = self.read_line()?;
        }
        self.next_header = line;

        if self.sequence.ends_with('*') {
            self.sequence.pop();
        }
        Ok(true)
    }

    /// Header line of the current record, including its `>`.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Share of the underlying file consumed so far, 0 to 100.
    pub fn percent_read(&self) -> f32 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        let read = self.bytes_read.load(Ordering::Relaxed);
        (read as f32 * 100.0 / self.total_bytes as f32).min(100.0)
    }

    /// Releases the file handle. A later `before_first` reopens it.
    pub fn close(&mut self) {
        self.lines = None;
        self.next_header = None;
    }

    fn read_line(&mut self) -> Result<Option<String>, FastaError> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        let mut buf = Vec::new();
        let n = lines
            .read_until(b'\n', &mut buf)
            .map_err(|e| FastaError::Read {
                path: self.path.clone(),
                source: e,
            })?;
        if n == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        // ISO-8859-1: every byte is its own code point.
        Ok(Some(buf.iter().map(|&b| b as char).collect()))
    }
}

/// A file is valid when it holds at least one record and every record
/// header starts with `>`. Unreadable files are invalid.
pub fn is_fasta_file_valid(path: &Path) -> bool {
    let Ok(mut reader) = FastaReader::open(path) else {
        return false;
    };
    let mut records = 0usize;
    loop {
        match reader.next_sequence() {
            Ok(true) => {
                if !reader.header().starts_with('>') {
                    return false;
                }
                records += 1;
            }
            Ok(false) => return records > 0,
            Err(_) => return false,
        }
    }
}
