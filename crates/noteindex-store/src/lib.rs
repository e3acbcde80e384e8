//! # Note Store
//!
//! Authoritative file-backed persistence for notes and folders.
//!
//! - Notes are `.md` files beneath one root; folders are directories
//! - Writes go to a hidden temp file and are renamed into place
//! - Note and folder moves are a single rename: either the old or the new
//!   layout exists afterwards, never a mix
//! - Moves reject an existing destination with `Conflict` and leave the
//!   source untouched
//! - Hidden entries (temp files, the `.noteindex` state directory) are never
//!   listed
//!
//! ## Quick Start
//!
//! ```no_run
//! use noteindex_store::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = EngineConfig::builder("/path/to/notes").build()?;
//! let store = NoteStore::open(&config).await?;
//!
//! let path = PathValidator::note("projects/alpha")?;
//! store.put(&path, "# Alpha\n").await?;
//! assert_eq!(store.get(&path).await?, "# Alpha\n");
//!
//! let moved = store
//!     .move_folder(&PathValidator::folder("projects")?, &PathValidator::folder("archive")?)
//!     .await?;
//! assert_eq!(moved.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! The store knows nothing about links, search or plugins. Callers
//! serialize access per path; the store itself takes no locks.

pub mod store;

pub use store::{NoteStore, checksum};

pub mod prelude {
    pub use crate::store::NoteStore;
    pub use noteindex_core::prelude::*;
}
