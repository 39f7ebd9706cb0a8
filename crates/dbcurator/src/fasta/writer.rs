use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::FastaError;
use crate::fasta::FastaReader;

const LINE_WIDTH: usize = 80;

/// Writes FASTA records, wrapping sequences at 80 columns.
pub struct FastaWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    sequence_count: usize,
}

impl FastaWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, FastaError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| FastaError::Open {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self {
            path,
            out: Some(BufWriter::new(file)),
            sequence_count: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn sequence_count(&self) -> usize {
        self.sequence_count
    }

    /// Appends one record. A `>` is prepended to the header when missing.
    pub fn append_sequence(&mut self, header: &str, sequence: &str) -> Result<(), FastaError> {
        let out = self
            .out
            .as_mut()
            .ok_or_else(|| FastaError::Closed(self.path.clone()))?;
        let write_err = |e| FastaError::Write {
            path: self.path.clone(),
            source: e,
        };

        if !header.starts_with('>') {
            out.write_all(b">").map_err(write_err)?;
        }
        out.write_all(header.as_bytes()).map_err(write_err)?;
        out.write_all(b"\n").map_err(write_err)?;
        for line in sequence.as_bytes().chunks(LINE_WIDTH) {
            out.write_all(line).map_err(write_err)?;
            out.write_all(b"\n").map_err(write_err)?;
        }

        self.sequence_count += 1;
        Ok(())
    }

    /// Copies every record `input` has not yet produced.
    pub fn append_remaining(&mut self, input: &mut FastaReader) -> Result<(), FastaError> {
        while input.next_sequence()? {
            self.append_sequence(input.header(), input.sequence())?;
        }
        Ok(())
    }

    /// Flushes and releases the file. Further appends fail with `Closed`.
    pub fn close(&mut self) -> Result<(), FastaError> {
        if let Some(mut out) = self.out.take() {
            out.flush().map_err(|e| FastaError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}
