//! Path-scoped locking for the coordinator.
//!
//! - Note operations take a shared lock on every ancestor folder, then an
//!   exclusive lock on each note path. They wait for both.
//! - Folder operations take an exclusive lock on the moved folders, shared
//!   locks on their ancestors, and an exclusive lock on every note beneath
//!   them. They never wait: if any lock is taken they release everything and
//!   return `Error::Concurrency` so the caller can back off and retry.
//!
//! Keys are acquired in lexicographic order, folders before notes.

use dashmap::DashMap;
use noteindex_core::{Error, FolderPath, NotePath, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FolderMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Default)]
struct LockTable {
    notes: DashMap<String, Arc<Mutex<()>>>,
    folders: DashMap<String, Arc<RwLock<()>>>,
}

impl LockTable {
    fn note(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.notes.entry(key.to_string()).or_insert_with(Default::default).value())
    }

    fn folder(&self, key: &str) -> Arc<RwLock<()>> {
        Arc::clone(self.folders.entry(key.to_string()).or_insert_with(Default::default).value())
    }

    /// Drop table entries nobody holds any more
    fn prune(&self, note_keys: &[String], folder_keys: &[String]) {
        for key in note_keys {
            self.notes.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
        for key in folder_keys {
            self.folders
                .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// Guards are never read, only dropped when the scope ends
enum Held {
    Note(#[allow(dead_code)] OwnedMutexGuard<()>),
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Every lock held by one operation; released on drop
pub struct LockScope {
    held: Vec<Held>,
    note_keys: Vec<String>,
    folder_keys: Vec<String>,
    table: Arc<LockTable>,
}

impl LockScope {
    fn new(table: &Arc<LockTable>) -> Self {
        Self {
            held: Vec::new(),
            note_keys: Vec::new(),
            folder_keys: Vec::new(),
            table: Arc::clone(table),
        }
    }

    /// Number of individual locks held
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Drop for LockScope {
    fn drop(&mut self) {
        // Release in reverse acquisition order before pruning
        while let Some(guard) = self.held.pop() {
            drop(guard);
        }
        self.table.prune(&self.note_keys, &self.folder_keys);
    }
}

impl std::fmt::Debug for LockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockScope")
            .field("notes", &self.note_keys)
            .field("folders", &self.folder_keys)
            .finish()
    }
}

/// Lock manager shared by all coordinator operations
#[derive(Debug, Default, Clone)]
pub struct LockManager {
    table: Arc<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock one or more note paths, waiting as needed.
    pub async fn lock_notes(&self, paths: &[&NotePath]) -> LockScope {
        let mut folders = BTreeSet::new();
        for path in paths {
            if let Some(folder) = path.folder() {
                folders.extend(folder.ancestors().iter().map(|f| f.as_str().to_string()));
                folders.insert(folder.as_str().to_string());
            }
        }
        let notes: BTreeSet<String> = paths.iter().map(|p| p.as_str().to_string()).collect();

        let mut scope = LockScope::new(&self.table);
        for key in folders {
            let lock = self.table.folder(&key);
            scope.held.push(Held::Shared(lock.read_owned().await));
            scope.folder_keys.push(key);
        }
        for key in notes {
            let lock = self.table.note(&key);
            scope.held.push(Held::Note(lock.lock_owned().await));
            scope.note_keys.push(key);
        }
        scope
    }

    /// Lock whole folder subtrees without waiting.
    ///
    /// `notes` lists every note currently beneath the folders.
    pub fn try_lock_folders(
        &self,
        folders: &[&FolderPath],
        notes: &[NotePath],
    ) -> Result<LockScope> {
        let mut modes: BTreeMap<String, FolderMode> = BTreeMap::new();
        for folder in folders {
            for ancestor in folder.ancestors() {
                modes
                    .entry(ancestor.as_str().to_string())
                    .or_insert(FolderMode::Shared);
            }
            modes.insert(folder.as_str().to_string(), FolderMode::Exclusive);
        }
        let notes: BTreeSet<&str> = notes.iter().map(NotePath::as_str).collect();

        let mut scope = LockScope::new(&self.table);
        for (key, mode) in modes {
            let lock = self.table.folder(&key);
            let guard = match mode {
                FolderMode::Shared => lock.try_read_owned().map(Held::Shared),
                FolderMode::Exclusive => lock.try_write_owned().map(Held::Exclusive),
            };
            scope.folder_keys.push(key.clone());
            match guard {
                Ok(guard) => scope.held.push(guard),
                Err(_) => return Err(Error::concurrency(format!("folder '{key}' is busy"))),
            }
        }
        for key in notes {
            let lock = self.table.note(key);
            scope.note_keys.push(key.to_string());
            match lock.try_lock_owned() {
                Ok(guard) => scope.held.push(Held::Note(guard)),
                Err(_) => return Err(Error::concurrency(format!("note '{key}' is busy"))),
            }
        }
        Ok(scope)
    }

    /// Entries currently tracked, for tests and diagnostics
    pub fn tracked(&self) -> (usize, usize) {
        (self.table.notes.len(), self.table.folders.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noteindex_core::PathValidator;
    use std::time::Duration;

    fn note(p: &str) -> NotePath {
        PathValidator::note(p).unwrap()
    }

    fn folder(p: &str) -> FolderPath {
        PathValidator::folder(p).unwrap()
    }

    #[tokio::test]
    async fn test_same_note_is_serialized() {
        let locks = LockManager::new();
        let a = note("x/a");
        let scope = locks.lock_notes(&[&a]).await;

        let locks2 = locks.clone();
        let a2 = a.clone();
        let waiter = tokio::spawn(async move {
            let _scope = locks2.lock_notes(&[&a2]).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(scope);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disjoint_notes_proceed() {
        let locks = LockManager::new();
        let (a, b) = (note("x/a"), note("x/b"));
        let _first = locks.lock_notes(&[&a]).await;
        let second = tokio::time::timeout(Duration::from_millis(200), locks.lock_notes(&[&b])).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_folder_lock_fails_fast_when_note_inside_is_busy() {
        let locks = LockManager::new();
        let a = note("x/a");
        let held = locks.lock_notes(&[&a]).await;
        let err = locks
            .try_lock_folders(&[&folder("x")], std::slice::from_ref(&a))
            .unwrap_err();
        assert!(err.is_contention());
        drop(held);
        assert!(locks.try_lock_folders(&[&folder("x")], &[a]).is_ok());
    }

    #[tokio::test]
    async fn test_new_note_in_locked_folder_waits() {
        let locks = LockManager::new();
        let scope = locks.try_lock_folders(&[&folder("x")], &[]).unwrap();
        let fresh = note("x/new");
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock_notes(&[&fresh])).await;
        assert!(blocked.is_err());
        drop(scope);
        assert!(
            tokio::time::timeout(Duration::from_secs(1), locks.lock_notes(&[&fresh]))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_nested_folder_operations_conflict() {
        let locks = LockManager::new();
        let _outer = locks.try_lock_folders(&[&folder("a")], &[]).unwrap();
        let err = locks
            .try_lock_folders(&[&folder("a/b"), &folder("z")], &[])
            .unwrap_err();
        assert!(err.is_contention());
    }

    #[tokio::test]
    async fn test_sibling_folders_share_parent() {
        let locks = LockManager::new();
        let _one = locks.try_lock_folders(&[&folder("p/one")], &[]).unwrap();
        assert!(locks.try_lock_folders(&[&folder("p/two")], &[]).is_ok());
    }

    #[tokio::test]
    async fn test_dropping_folder_scope_releases_guards() {
        let locks = LockManager::new();
        let scope = locks.try_lock_folders(&[&folder("r")], &[]).unwrap();
        assert!(!scope.is_empty());
        assert!(locks.try_lock_folders(&[&folder("r")], &[]).is_err());
        drop(scope);
        assert!(locks.try_lock_folders(&[&folder("r")], &[]).is_ok());
    }

    #[tokio::test]
    async fn test_entries_pruned_after_release() {
        let locks = LockManager::new();
        let a = note("deep/dir/a");
        drop(locks.lock_notes(&[&a]).await);
        assert_eq!(locks.tracked(), (0, 0));
        let _ = locks.try_lock_folders(&[&folder("q")], &[]);
        assert_eq!(locks.tracked(), (0, 0));
    }
}
