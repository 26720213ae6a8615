//! Fuzzy SEARCH/REPLACE editing of stored files with a gap-free backup history.
//!
//! ```no_run
//! use std::sync::Arc;
//! use revpatch::{LocalStorage, PatchEngine, PatchRequest};
//!
//! # async fn demo() {
//! let engine = PatchEngine::with_defaults(Arc::new(LocalStorage::new("./data")));
//! let diff = "<<<<<<< SEARCH\nold line\n=======\nnew line\n>>>>>>> REPLACE";
//! let outcome = engine.apply_diff(&PatchRequest::new("notes.txt", diff)).await;
//! assert!(outcome.success);
//! # }
//! ```

pub mod apply;
pub mod config;
pub mod error;
pub mod matcher;
pub mod patch_format;
pub mod storage;
pub mod util;
pub mod versions;

pub use apply::{PatchEngine, PatchOutcome, PatchRequest};
pub use config::EngineConfig;
pub use error::{EditError, EditResult, ErrorKind, StorageError, StorageResult};
pub use storage::{FileEntry, LocalStorage, MemoryStorage, Storage};
pub use versions::{RestoreOutcome, VersionEntry, VersionRecord, VersionStore};
