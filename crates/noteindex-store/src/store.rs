//! File-backed note store.
//!
//! Notes are `.md` files under one root directory; folders are directories.
//! Writes go to a hidden temp file in the destination directory and are then
//! renamed into place, so a reader sees either the old or the new content.
//! Note and folder moves are a single `rename`, so a failed move leaves the
//! source untouched.

use chrono::{DateTime, Utc};
use noteindex_core::prelude::*;
use noteindex_core::NOTE_EXTENSION;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::instrument;
use walkdir::WalkDir;

/// Authoritative persistence for notes and folders
#[derive(Debug, Clone)]
pub struct NoteStore {
    root: PathBuf,
    max_note_size: u64,
}

impl NoteStore {
    /// Open (creating if needed) the store rooted at `config.root`.
    #[instrument(skip(config), fields(root = ?config.root), name = "store_open")]
    pub async fn open(config: &EngineConfig) -> Result<Self> {
        fs::create_dir_all(&config.root).await?;
        let root = fs::canonicalize(&config.root).await?;
        log::info!("Opened note store at {}", root.display());
        Ok(Self {
            root,
            max_note_size: config.max_note_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_note_size(&self) -> u64 {
        self.max_note_size
    }

    fn note_location(&self, path: &NotePath) -> Result<PathBuf> {
        PathValidator::resolve_within(&self.root, path.as_str())
    }

    fn folder_location(&self, folder: &FolderPath) -> Result<PathBuf> {
        PathValidator::resolve_within(&self.root, folder.as_str())
    }

    pub async fn exists(&self, path: &NotePath) -> Result<bool> {
        let location = self.note_location(path)?;
        Ok(is_file(&location).await)
    }

    pub async fn folder_exists(&self, folder: &FolderPath) -> Result<bool> {
        let location = self.folder_location(folder)?;
        Ok(is_dir(&location).await)
    }

    #[instrument(skip(self), fields(note = %path), name = "store_get")]
    pub async fn get(&self, path: &NotePath) -> Result<String> {
        let location = self.note_location(path)?;
        if !is_file(&location).await {
            return Err(Error::not_found(path.as_str()));
        }
        fs::read_to_string(&location)
            .await
            .map_err(|e| not_found_or(e, path.as_str()))
    }

    /// Write `content` to `path`, creating parent folders.
    #[instrument(skip(self, content), fields(note = %path, size = content.len()), name = "store_put")]
    pub async fn put(&self, path: &NotePath, content: &str) -> Result<NoteMetadata> {
        if content.len() as u64 > self.max_note_size {
            return Err(Error::validation(format!(
                "note is {} bytes, limit is {}",
                content.len(),
                self.max_note_size
            )));
        }

        let location = self.note_location(path)?;
        if is_dir(&location).await {
            return Err(Error::conflict(format!("{path} (folder)")));
        }
        if let Some(folder) = path.folder() {
            self.ensure_folder_chain(&folder).await?;
        }

        let file_name = location
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("note");
        let temp = location.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &location).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        log::debug!("Wrote {} ({} bytes)", path, content.len());
        self.metadata(path, content).await
    }

    #[instrument(skip(self), fields(note = %path), name = "store_delete")]
    pub async fn delete(&self, path: &NotePath) -> Result<()> {
        let location = self.note_location(path)?;
        if !is_file(&location).await {
            return Err(Error::not_found(path.as_str()));
        }
        fs::remove_file(&location)
            .await
            .map_err(|e| not_found_or(e, path.as_str()))
    }

    /// Rename a note; the destination must not exist.
    #[instrument(skip(self), fields(from = %from, to = %to), name = "store_move")]
    pub async fn move_note(&self, from: &NotePath, to: &NotePath) -> Result<()> {
        let source = self.note_location(from)?;
        let dest = self.note_location(to)?;
        if !is_file(&source).await {
            return Err(Error::not_found(from.as_str()));
        }
        if from == to {
            return Ok(());
        }
        if fs::symlink_metadata(&dest).await.is_ok() {
            return Err(Error::conflict(to.as_str()));
        }
        if let Some(folder) = to.folder() {
            self.ensure_folder_chain(&folder).await?;
        }
        fs::rename(&source, &dest).await?;
        log::debug!("Moved {} -> {}", from, to);
        Ok(())
    }

    /// Create a folder and its parents; existing folders are accepted.
    #[instrument(skip(self), fields(folder = %folder), name = "store_create_folder")]
    pub async fn create_folder(&self, folder: &FolderPath) -> Result<()> {
        self.ensure_folder_chain(folder).await
    }

    /// Move a folder with everything under it.
    ///
    /// Returns the `(old, new)` path of every relocated note, sorted by old
    /// path.
    #[instrument(skip(self), fields(from = %from, to = %to), name = "store_move_folder")]
    pub async fn move_folder(
        &self,
        from: &FolderPath,
        to: &FolderPath,
    ) -> Result<Vec<(NotePath, NotePath)>> {
        if from == to || from.contains_folder(to) {
            return Err(Error::validation(format!(
                "cannot move folder {from} into itself ({to})"
            )));
        }
        let source = self.folder_location(from)?;
        let dest = self.folder_location(to)?;
        if !is_dir(&source).await {
            return Err(Error::not_found(from.as_str()));
        }
        if fs::symlink_metadata(&dest).await.is_ok() {
            return Err(Error::conflict(to.as_str()));
        }

        let moved: Vec<(NotePath, NotePath)> = self
            .notes_in(from)?
            .into_iter()
            .filter_map(|old| old.rebase(from, to).map(|new| (old, new)))
            .collect();

        if let Some(parent) = to.parent() {
            self.ensure_folder_chain(&parent).await?;
        }
        fs::rename(&source, &dest).await?;
        log::info!("Moved folder {} -> {} ({} notes)", from, to, moved.len());
        Ok(moved)
    }

    /// Rename the last segment of a folder path.
    pub async fn rename_folder(
        &self,
        from: &FolderPath,
        new_name: &str,
    ) -> Result<Vec<(NotePath, NotePath)>> {
        let name = PathValidator::segment(new_name)?;
        self.move_folder(from, &from.with_name(&name)).await
    }

    /// Remove a folder recursively; returns the notes it contained.
    #[instrument(skip(self), fields(folder = %folder), name = "store_delete_folder")]
    pub async fn delete_folder(&self, folder: &FolderPath) -> Result<Vec<NotePath>> {
        let location = self.folder_location(folder)?;
        if !is_dir(&location).await {
            return Err(Error::not_found(folder.as_str()));
        }
        let removed = self.notes_in(folder)?;
        fs::remove_dir_all(&location).await?;
        log::info!("Deleted folder {} ({} notes)", folder, removed.len());
        Ok(removed)
    }

    /// Every note path under the root, sorted.
    pub fn note_paths(&self) -> Result<Vec<NotePath>> {
        self.scan_notes(&self.root)
    }

    /// Every note path under `folder` at any depth, sorted.
    pub fn notes_in(&self, folder: &FolderPath) -> Result<Vec<NotePath>> {
        let location = self.folder_location(folder)?;
        if !location.is_dir() {
            return Ok(Vec::new());
        }
        self.scan_notes(&location)
    }

    /// Listing sorted by modification time, newest first, then by path.
    #[instrument(skip(self), name = "store_list_notes")]
    pub async fn list_notes(&self) -> Result<Vec<NoteSummary>> {
        let mut summaries = Vec::new();
        for path in self.note_paths()? {
            let location = self.note_location(&path)?;
            let meta = match fs::metadata(&location).await {
                Ok(meta) => meta,
                // Removed between scan and stat
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            summaries.push(NoteSummary {
                name: path.stem().to_string(),
                folder: path.folder(),
                size: meta.len(),
                modified: to_utc(meta.modified().ok()),
                path,
            });
        }
        summaries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(summaries)
    }

    /// Every folder under the root (explicit or implied by notes), sorted.
    pub fn list_folders(&self) -> Result<Vec<FolderPath>> {
        let mut folders = Vec::new();
        for entry in self.walk(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_dir() || entry.depth() == 0 {
                continue;
            }
            if let Some(folder) = self
                .relative(entry.path())
                .and_then(|rel| PathValidator::folder(&rel).ok())
            {
                folders.push(folder);
            }
        }
        folders.sort();
        Ok(folders)
    }

    /// Filesystem-derived metadata for a note whose content is known.
    pub async fn metadata(&self, path: &NotePath, content: &str) -> Result<NoteMetadata> {
        let location = self.note_location(path)?;
        let meta = fs::metadata(&location)
            .await
            .map_err(|e| not_found_or(e, path.as_str()))?;
        Ok(NoteMetadata {
            size: meta.len(),
            modified: to_utc(meta.modified().ok()),
            created: meta.created().ok().map(DateTime::<Utc>::from),
            lines: content.lines().count(),
            checksum: checksum(content),
        })
    }

    /// Create `folder` and each missing ancestor, rejecting any that is a file.
    async fn ensure_folder_chain(&self, folder: &FolderPath) -> Result<()> {
        for ancestor in folder.ancestors().iter().chain(std::iter::once(folder)) {
            let location = self.folder_location(ancestor)?;
            match fs::symlink_metadata(&location).await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => return Err(Error::conflict(format!("{ancestor} (note)"))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    fs::create_dir(&location).await.or_else(|e| {
                        if e.kind() == io::ErrorKind::AlreadyExists && location.is_dir() {
                            Ok(())
                        } else {
                            Err(e)
                        }
                    })?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn scan_notes(&self, dir: &Path) -> Result<Vec<NotePath>> {
        let mut notes = Vec::new();
        for entry in self.walk(dir) {
            let entry = entry?;
            if !entry.file_type().is_file() || !has_note_extension(entry.path()) {
                continue;
            }
            if entry.metadata().map(|m| m.len()).unwrap_or(0) > self.max_note_size {
                log::warn!("Skipping oversized note {}", entry.path().display());
                continue;
            }
            let Some(rel) = self.relative(entry.path()) else {
                continue;
            };
            match PathValidator::note(&rel) {
                Ok(path) => notes.push(path),
                Err(e) => log::debug!("Skipping {}: {}", rel, e),
            }
        }
        notes.sort();
        Ok(notes)
    }

    /// Walk `dir`, skipping hidden entries (temp files and engine state).
    fn walk(&self, dir: &Path) -> impl Iterator<Item = Result<walkdir::DirEntry>> {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .map(|entry| entry.map_err(|e| Error::StoreIo(io::Error::other(e))))
    }

    fn relative(&self, location: &Path) -> Option<String> {
        let rel = location.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        parts.map(|p| p.join("/"))
    }
}

/// Hex SHA-256 of note content
pub fn checksum(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn has_note_extension(location: &Path) -> bool {
    location
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(&NOTE_EXTENSION[1..]))
}

async fn is_file(location: &Path) -> bool {
    fs::metadata(location).await.is_ok_and(|m| m.is_file())
}

async fn is_dir(location: &Path) -> bool {
    fs::metadata(location).await.is_ok_and(|m| m.is_dir())
}

fn not_found_or(e: io::Error, path: &str) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::not_found(path)
    } else {
        Error::StoreIo(e)
    }
}

fn to_utc(time: Option<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from).unwrap_or_default()
}
