use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::StorageError;
use crate::profile::normalize_path;

/// Read-only view of the response tree.
///
/// Listings of a directory that does not exist are empty rather than an
/// error; callers treat a missing directory as "no candidates".
#[async_trait::async_trait]
pub trait StorageProvider: Send + Sync {
    /// Names of the regular files directly inside `dir`.
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>, StorageError>;

    /// Names of the immediate subdirectories of `dir`.
    async fn list_directories(&self, dir: &Path) -> Result<Vec<String>, StorageError>;

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;
}

pub type SharedStorage = Arc<dyn StorageProvider>;

/// Filesystem-backed provider. Listings are sorted by name so candidate order
/// does not depend on the platform's directory enumeration order.
#[derive(Clone, Debug, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }

    async fn list_entries(&self, dir: &Path, want_dirs: bool) -> Result<Vec<String>, StorageError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Ok(Vec::new())
            }
            Err(err) => return Err(StorageError::from_io(dir, err)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StorageError::from_io(dir, err))?
        {
            let mut file_type = entry
                .file_type()
                .await
                .map_err(|err| StorageError::from_io(entry.path(), err))?;
            if file_type.is_symlink() {
                // dangling links are skipped
                match tokio::fs::metadata(entry.path()).await {
                    Ok(meta) => file_type = meta.file_type(),
                    Err(_) => continue,
                }
            }
            let keep = if want_dirs {
                file_type.is_dir()
            } else {
                file_type.is_file()
            };
            if keep {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait::async_trait]
impl StorageProvider for FsStorage {
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        self.list_entries(dir, false).await
    }

    async fn list_directories(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        self.list_entries(dir, true).await
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path)
            .await
            .map_err(|err| StorageError::from_io(path, err))
    }
}

#[derive(Clone, Debug)]
enum MemoryFile {
    Contents(Vec<u8>),
    Fails(String),
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: Vec<(PathBuf, MemoryFile)>,
    dirs: Vec<PathBuf>,
    list_failures: Vec<(PathBuf, String)>,
}

impl MemoryTree {
    fn put_file(&mut self, path: PathBuf, file: MemoryFile) {
        match self.files.iter_mut().find(|(existing, _)| *existing == path) {
            Some(slot) => slot.1 = file,
            None => self.files.push((path, file)),
        }
    }

    fn list_failure(&self, dir: &Path) -> Option<StorageError> {
        self.list_failures
            .iter()
            .find(|(failing, _)| failing == dir)
            .map(|(_, message)| StorageError::Backend(message.clone()))
    }
}

/// In-memory provider. Listings keep insertion order, and individual reads or
/// listings can be made to fail with a chosen message.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tree: RwLock<MemoryTree>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert_file(path, contents);
        self
    }

    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.insert_dir(path);
        self
    }

    pub fn insert_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = normalize_path(path.as_ref());
        self.tree
            .write()
            .put_file(path, MemoryFile::Contents(contents.into()));
    }

    pub fn insert_dir(&self, path: impl AsRef<Path>) {
        let path = normalize_path(path.as_ref());
        let mut tree = self.tree.write();
        if !tree.dirs.contains(&path) {
            tree.dirs.push(path);
        }
    }

    /// Register a file that is listed normally but whose read fails.
    pub fn fail_read(&self, path: impl AsRef<Path>, message: impl Into<String>) {
        let path = normalize_path(path.as_ref());
        self.tree
            .write()
            .put_file(path, MemoryFile::Fails(message.into()));
    }

    pub fn fail_listing(&self, dir: impl AsRef<Path>, message: impl Into<String>) {
        let dir = normalize_path(dir.as_ref());
        self.tree.write().list_failures.push((dir, message.into()));
    }

    pub fn clear(&self) {
        *self.tree.write() = MemoryTree::default();
    }
}

#[async_trait::async_trait]
impl StorageProvider for MemoryStorage {
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let dir = normalize_path(dir);
        let tree = self.tree.read();
        if let Some(err) = tree.list_failure(&dir) {
            return Err(err);
        }
        Ok(tree
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir.as_path()))
            .filter_map(|(path, _)| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    async fn list_directories(&self, dir: &Path) -> Result<Vec<String>, StorageError> {
        let dir = normalize_path(dir);
        let tree = self.tree.read();
        if let Some(err) = tree.list_failure(&dir) {
            return Err(err);
        }
        let file_ancestors = tree
            .files
            .iter()
            .filter_map(|(path, _)| path.parent().map(Path::to_path_buf));
        let mut names: Vec<String> = Vec::new();
        for candidate in file_ancestors.chain(tree.dirs.iter().cloned()) {
            let Ok(rest) = candidate.strip_prefix(&dir) else {
                continue;
            };
            let Some(first) = rest.components().next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let path = normalize_path(path);
        let tree = self.tree.read();
        match tree.files.iter().find(|(existing, _)| *existing == path) {
            Some((_, MemoryFile::Contents(bytes))) => Ok(bytes.clone()),
            Some((_, MemoryFile::Fails(message))) => Err(StorageError::Backend(message.clone())),
            None => Err(StorageError::NotFound(path)),
        }
    }
}
