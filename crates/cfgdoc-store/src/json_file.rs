use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, RwLock};

use cfgdoc_olock::OlockEngine;
use cfgdoc_path::{Path, SearchExpr, SearchResults};
use cfgdoc_types::{ConfigError, Node, Result};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::document;
use crate::traits::Storage;

/// Storage backed by a single JSON file.
///
/// Reads are served from the copy loaded on open or by the last write. Each
/// write re-reads the file under the write lock, so the olock check runs
/// against what is on disk even when another handle changed it, and a failed
/// check leaves the fresh copy in place for the caller's next read. The next
/// version is serialized to a temporary file in the same directory and
/// renamed over the original, so the file on disk is always a complete
/// document. Handles in other processes can still write between the re-read
/// and the rename.
pub struct JsonFileStorage {
    file: PathBuf,
    root: RwLock<Arc<Node>>,
    olock: OlockEngine,
}

impl JsonFileStorage {
    /// Open `file`, starting from an empty document if it does not exist.
    pub fn open(file: impl AsRef<FsPath>) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        let root = read_file(&file)?;
        info!(file = %file.display(), "opened JSON configuration file");
        Ok(Self {
            file,
            root: RwLock::new(Arc::new(root)),
            olock: OlockEngine::new(),
        })
    }

    pub fn file(&self) -> &FsPath {
        &self.file
    }

    pub fn snapshot(&self) -> Arc<Node> {
        Arc::clone(&self.root.read().expect("lock poisoned"))
    }

    /// Replace the in-memory copy with the file's current content.
    pub fn reload(&self) -> Result<()> {
        let mut root = self.root.write().expect("lock poisoned");
        *root = Arc::new(read_file(&self.file)?);
        Ok(())
    }

    fn save(&self, root: &Node) -> Result<()> {
        let dir = match self.file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => FsPath::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, root)
                .map_err(|e| ConfigError::Serialization(e.to_string()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.file).map_err(|e| ConfigError::Io(e.error))?;
        debug!(file = %self.file.display(), "saved JSON configuration file");
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn get_node(&self, path: &Path, _: Option<&str>) -> Result<Node> {
        document::read(&self.snapshot(), path)
    }

    fn persist_node(&self, path: &Path, node: Node, _: Option<&str>) -> Result<()> {
        let mut root = self.root.write().expect("lock poisoned");
        *root = Arc::new(read_file(&self.file)?);
        let next = document::write(&self.olock, &root, path, node)?;
        self.save(&next)?;
        *root = Arc::new(next);
        Ok(())
    }

    fn remove_node(&self, path: &Path) -> Result<()> {
        let mut root = self.root.write().expect("lock poisoned");
        *root = Arc::new(read_file(&self.file)?);
        let next = document::remove(&root, path)?;
        self.save(&next)?;
        *root = Arc::new(next);
        Ok(())
    }

    fn node_exists(&self, path: &Path) -> Result<bool> {
        Ok(document::lookup(&self.snapshot(), path)?.is_some())
    }

    fn search(&self, expr: &SearchExpr) -> Result<SearchResults> {
        Ok(SearchResults::new(self.snapshot(), expr.clone()))
    }

    fn canonical_path(&self, path: &Path) -> Result<Option<Path>> {
        path.canonicalize(&self.snapshot())
    }
}

/// A missing or blank file is an empty document.
fn read_file(file: &FsPath) -> Result<Node> {
    match fs::read(file) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Node::Null),
        Ok(bytes) => serde_json::from_slice::<Node>(&bytes)
            .map_err(|e| ConfigError::Serialization(format!("{}: {e}", file.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Node::Null),
        Err(e) => Err(e.into()),
    }
}

impl fmt::Debug for JsonFileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonFileStorage")
            .field("file", &self.file)
            .finish()
    }
}
