//! Note and folder path normalization.
//!
//! Every path-accepting operation goes through [`PathValidator`] before it
//! touches the store. A normalized path is relative, slash-separated, NFC
//! normalized, and has no empty, `.`, `..` or hidden segments.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Markdown extension appended to note paths that lack one
pub const NOTE_EXTENSION: &str = ".md";

const MAX_SEGMENT_BYTES: usize = 255;
const MAX_PATH_BYTES: usize = 1024;
const FORBIDDEN_CHARS: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Identity of a stored note, e.g. `projects/alpha.md`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotePath(String);

impl NotePath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment including extension
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// File name without the markdown extension
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        strip_note_extension(name).unwrap_or(name)
    }

    /// Containing folder, or `None` for notes at the root
    pub fn folder(&self) -> Option<FolderPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| FolderPath(parent.to_string()))
    }

    /// True when this note lives anywhere beneath `folder`
    pub fn is_within(&self, folder: &FolderPath) -> bool {
        is_descendant(&self.0, &folder.0)
    }

    /// Re-root this path from one folder prefix to another, keeping the suffix.
    pub fn rebase(&self, from: &FolderPath, to: &FolderPath) -> Option<NotePath> {
        let suffix = self.0.strip_prefix(from.as_str())?.strip_prefix('/')?;
        Some(NotePath(format!("{}/{}", to.as_str(), suffix)))
    }

    /// Location on disk under `root`
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for NotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NotePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identity of a folder, e.g. `projects/archive`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderPath(String);

impl FolderPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> Option<FolderPath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| FolderPath(parent.to_string()))
    }

    /// Every proper ancestor, shallowest first
    pub fn ancestors(&self) -> Vec<FolderPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(folder) = current {
            current = folder.parent();
            out.push(folder);
        }
        out.reverse();
        out
    }

    /// True when `other` lies strictly beneath this folder
    pub fn contains_folder(&self, other: &FolderPath) -> bool {
        is_descendant(&other.0, &self.0)
    }

    /// Sibling folder with the last segment replaced
    pub fn with_name(&self, name: &str) -> FolderPath {
        match self.parent() {
            Some(parent) => FolderPath(format!("{}/{}", parent.0, name)),
            None => FolderPath(name.to_string()),
        }
    }

    pub fn rebase(&self, from: &FolderPath, to: &FolderPath) -> Option<FolderPath> {
        if self == from {
            return Some(to.clone());
        }
        let suffix = self.0.strip_prefix(from.as_str())?.strip_prefix('/')?;
        Some(FolderPath(format!("{}/{}", to.as_str(), suffix)))
    }

    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FolderPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_descendant(path: &str, folder: &str) -> bool {
    path.len() > folder.len() + 1
        && path.starts_with(folder)
        && path.as_bytes()[folder.len()] == b'/'
}

fn strip_note_extension(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(NOTE_EXTENSION.len())?;
    let (stem, ext) = name.split_at_checked(split)?;
    ext.eq_ignore_ascii_case(NOTE_EXTENSION).then_some(stem)
}

/// Validation and normalization of user-supplied paths
pub struct PathValidator;

impl PathValidator {
    /// Normalize a raw path into slash-separated segments.
    ///
    /// Rejects empty, absolute and traversal paths, hidden segments, control
    /// characters and characters that are not portable across filesystems.
    pub fn normalize(raw: &str) -> Result<String> {
        let nfc: String = raw.trim().nfc().collect();
        if nfc.is_empty() {
            return Err(Error::validation("path is empty"));
        }
        if nfc.starts_with('/') || has_drive_prefix(&nfc) {
            return Err(Error::validation(format!("absolute path not allowed: {raw}")));
        }

        let mut segments = Vec::new();
        for segment in nfc.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(Error::validation(format!(
                        "parent directory traversal not allowed: {raw}"
                    )));
                }
                s => {
                    Self::check_segment(s)?;
                    segments.push(s);
                }
            }
        }

        if segments.is_empty() {
            return Err(Error::validation("path is empty"));
        }
        let joined = segments.join("/");
        if joined.len() > MAX_PATH_BYTES {
            return Err(Error::validation(format!(
                "path exceeds {MAX_PATH_BYTES} bytes"
            )));
        }
        Ok(joined)
    }

    /// Normalize a note path, appending `.md` when missing.
    pub fn note(raw: &str) -> Result<NotePath> {
        let mut normalized = Self::normalize(raw)?;
        if strip_note_extension(&normalized).is_none() {
            normalized.push_str(NOTE_EXTENSION);
        }
        if strip_note_extension(file_segment(&normalized)).is_some_and(str::is_empty) {
            return Err(Error::validation(format!("note name is empty: {raw}")));
        }
        Ok(NotePath(normalized))
    }

    pub fn folder(raw: &str) -> Result<FolderPath> {
        Self::normalize(raw).map(FolderPath)
    }

    /// Validate a single new name for a rename (no separators allowed).
    pub fn segment(raw: &str) -> Result<String> {
        let nfc: String = raw.trim().nfc().collect();
        if nfc.contains('/') {
            return Err(Error::validation(format!(
                "name must not contain '/': {raw}"
            )));
        }
        if nfc.is_empty() || nfc == "." || nfc == ".." {
            return Err(Error::validation(format!("invalid name: {raw}")));
        }
        Self::check_segment(&nfc)?;
        Ok(nfc)
    }

    /// Join a normalized path onto `root`, ensuring the result stays inside it.
    ///
    /// Existing ancestors are canonicalized so that a symlink pointing out of
    /// the root is rejected as well.
    pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf> {
        let full = root.join(relative);
        let escapes = full
            .components()
            .any(|c| matches!(c, Component::ParentDir));
        if escapes || !full.starts_with(root) {
            return Err(Error::validation(format!("path escapes root: {relative}")));
        }

        let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut probe = full.as_path();
        loop {
            if let Ok(canonical) = probe.canonicalize() {
                if !canonical.starts_with(&canonical_root) {
                    return Err(Error::validation(format!(
                        "path escapes root: {relative}"
                    )));
                }
                break;
            }
            match probe.parent() {
                Some(parent) if parent.starts_with(root) => probe = parent,
                _ => break,
            }
        }
        Ok(full)
    }

    fn check_segment(segment: &str) -> Result<()> {
        if segment.starts_with('.') {
            return Err(Error::validation(format!(
                "hidden path segment not allowed: {segment}"
            )));
        }
        if segment.len() > MAX_SEGMENT_BYTES {
            return Err(Error::validation(format!(
                "path segment exceeds {MAX_SEGMENT_BYTES} bytes"
            )));
        }
        if let Some(bad) = segment
            .chars()
            .find(|c| c.is_control() || FORBIDDEN_CHARS.contains(c))
        {
            return Err(Error::validation(format!(
                "character {bad:?} not allowed in path"
            )));
        }
        Ok(())
    }
}

fn file_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
