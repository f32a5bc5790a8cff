use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named logical storage target. Paths are always relative to the disk
/// root and use `/` separators.
pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> bool;

    /// Absolute location of a stored path (whether or not it exists yet).
    fn absolute_path(&self, path: &str) -> PathBuf;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn put(&self, path: &str, contents: &[u8]) -> Result<()>;

    fn make_directory(&self, path: &str) -> Result<()>;
}

/// Filesystem-backed disk rooted at a directory.
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for LocalDisk {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn absolute_path(&self, path: &str) -> PathBuf {
        self.resolve(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        std::fs::read(&full).with_context(|| format!("Cannot read file: {}", full.display()))
    }

    fn put(&self, path: &str, contents: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory: {}", parent.display()))?;
        }
        debug!("Writing {} bytes to {}", contents.len(), full.display());
        std::fs::write(&full, contents)
            .with_context(|| format!("Cannot write file: {}", full.display()))
    }

    fn make_directory(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        std::fs::create_dir_all(&full)
            .with_context(|| format!("Cannot create directory: {}", full.display()))
    }
}

/// In-memory disk, mainly useful as a test double.
#[derive(Default)]
pub struct MemoryDisk {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryDisk {
    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn absolute_path(&self, path: &str) -> PathBuf {
        Path::new("/memory").join(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .cloned()
            .with_context(|| format!("Cannot read file: {path}"))
    }

    fn put(&self, path: &str, contents: &[u8]) -> Result<()> {
        self.files
            .write()
            .insert(path.to_string(), contents.to_vec());
        Ok(())
    }

    fn make_directory(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

/// Registry of named disks, looked up by the `storage_disk` config key.
#[derive(Default)]
pub struct DiskManager {
    disks: HashMap<String, Box<dyn Storage>>,
}

impl DiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a single `local` filesystem disk, the configuration
    /// default.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::new().register("local", Box::new(LocalDisk::new(root)))
    }

    pub fn register(mut self, name: impl Into<String>, disk: Box<dyn Storage>) -> Self {
        self.disks.insert(name.into(), disk);
        self
    }

    pub fn disk(&self, name: &str) -> Option<&dyn Storage> {
        self.disks.get(name).map(Box::as_ref)
    }
}
