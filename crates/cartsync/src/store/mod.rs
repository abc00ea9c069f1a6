//! # Storage Layer
//!
//! Two layers, split the same way as everywhere else in the crate:
//!
//! 1. **Backend** ([`backend::StorageBackend`]): raw text I/O against handles. No knowledge
//!    of records, CSV or caching.
//! 2. **Record store** ([`record_store::RecordStore`]): decoded records, the TTL cache, and
//!    the write-then-mirror sequence.
//!
//! ## Files Are Truth
//!
//! The CSV file is the only authoritative copy of a list. The cache is a convenience that
//! is allowed to be stale for at most the TTL, and only towards writes made by other
//! processes (or the remote). Writes through the store update it synchronously.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsBackend`]: the local filesystem, with atomic replace on rewrite.
//! - [`mem_backend::MemBackend`]: for tests. Simulates provider-issued URIs for external
//!   directories and injects read, write and listing failures.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/
//! ├── settings.json            # Durable key-value settings
//! └── documents/
//!     └── <feature>.csv        # Default location of each list
//! ```

pub mod backend;
pub mod fs_backend;
pub mod mem_backend;
pub mod record_store;
