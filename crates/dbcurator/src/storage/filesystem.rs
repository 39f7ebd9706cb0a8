use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::StorageError;

const WORKSPACE_PREFIX: &str = "curationRun_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Renamed,
    Copied,
}

/// Move a file from `src` to `dst`, never replacing an existing `dst`.
/// Uses `rename` first (fast, atomic on the same filesystem) and falls back
/// to an exclusive copy + delete for cross-device moves.
pub fn move_file(src: &Path, dst: &Path) -> Result<MoveMethod, StorageError> {
    if std::fs::symlink_metadata(dst).is_ok() {
        return Err(StorageError::FileExists(dst.to_path_buf()));
    }

    if std::fs::rename(src, dst).is_ok() {
        return Ok(MoveMethod::Renamed);
    }

    copy_file_exclusive(src, dst).map_err(|e| match e {
        StorageError::CopyFile { from, to, source } => StorageError::MoveFile { from, to, source },
        other => other,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(MoveMethod::Copied)
}

/// Copies `src` to `dst`, failing with `FileExists` if `dst` is already there.
pub fn copy_file_exclusive(src: &Path, dst: &Path) -> Result<(), StorageError> {
    let copy_err = |e| StorageError::CopyFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    };

    let mut input = File::open(src).map_err(copy_err)?;
    // O_CREAT | O_EXCL: atomic check-and-create
    let mut output = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(StorageError::FileExists(dst.to_path_buf()));
        }
        Err(e) => return Err(copy_err(e)),
    };

    if let Err(e) = std::io::copy(&mut input, &mut output) {
        drop(output);
        let _ = std::fs::remove_file(dst);
        return Err(copy_err(e));
    }
    Ok(())
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Hex SHA-256 of a file's contents.
pub fn file_digest(path: &Path) -> Result<String, StorageError> {
    let read_err = |e| StorageError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(read_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Looks in `directory` (not recursively) for a file whose bytes are
/// identical to `file`. The file itself is never reported.
pub fn find_similar_file(file: &Path, directory: &Path) -> Result<Option<PathBuf>, StorageError> {
    if !directory.is_dir() {
        return Ok(None);
    }

    let length = std::fs::metadata(file)
        .map_err(|e| StorageError::ReadFile {
            path: file.to_path_buf(),
            source: e,
        })?
        .len();
    let own_path = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let mut digest: Option<String> = None;

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| StorageError::ScanFailed {
            path: directory.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let candidate = entry.path();
        let same_length = entry.metadata().map(|m| m.len() == length).unwrap_or(false);
        if !same_length {
            continue;
        }
        if std::fs::canonicalize(candidate).is_ok_and(|p| p == own_path) {
            continue;
        }

        if digest.is_none() {
            digest = Some(file_digest(file)?);
        }
        if digest.as_deref() == Some(file_digest(candidate)?.as_str()) {
            return Ok(Some(candidate.to_path_buf()));
        }
    }

    Ok(None)
}

/// Creates a fresh `curationRun_<timestamp>` directory under `temp_root`,
/// retrying with a new timestamp when the name is taken.
pub fn create_run_workspace(temp_root: &Path) -> Result<PathBuf, StorageError> {
    ensure_directory(temp_root)?;

    for _ in 0..1000 {
        let name = format!(
            "{}{}",
            WORKSPACE_PREFIX,
            Utc::now().format("%Y%m%d-%H%M%S-%3f")
        );
        let path = temp_root.join(name);
        match std::fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                std::thread::sleep(std::time::Duration::from_millis(1));
                continue;
            }
            Err(e) => {
                return Err(StorageError::CreateDirectory { path, source: e });
            }
        }
    }

    Err(StorageError::FileExists(temp_root.join(WORKSPACE_PREFIX)))
}

pub fn remove_workspace(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Where a finished artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A byte-identical file already existed and was reused.
    Reused(PathBuf),
    Moved { path: PathBuf, method: MoveMethod },
}

impl Placement {
    pub fn path(&self) -> &Path {
        match self {
            Placement::Reused(path) => path,
            Placement::Moved { path, .. } => path,
        }
    }
}

/// Places finished curation artifacts into the FASTA folder.
pub struct ArtifactStorage {
    fasta_folder: PathBuf,
}

impl ArtifactStorage {
    pub fn new<P: AsRef<Path>>(fasta_folder: P) -> Self {
        Self {
            fasta_folder: fasta_folder.as_ref().to_path_buf(),
        }
    }

    pub fn fasta_folder(&self) -> &Path {
        &self.fasta_folder
    }

    /// `<fasta_folder>/<short_name>.fasta`
    pub fn artifact_path(&self, short_name: &str) -> PathBuf {
        self.fasta_folder.join(format!("{}.fasta", short_name))
    }

    /// Reuses an identical file in the FASTA folder if there is one,
    /// otherwise moves `output` to the curation's artifact path.
    pub fn place(&self, output: &Path, short_name: &str) -> Result<Placement, StorageError> {
        ensure_directory(&self.fasta_folder)?;

        if let Some(existing) = find_similar_file(output, &self.fasta_folder)? {
            return Ok(Placement::Reused(existing));
        }

        let destination = self.artifact_path(short_name);
        let method = move_file(output, &destination)?;
        Ok(Placement::Moved {
            path: destination,
            method,
        })
    }
}
