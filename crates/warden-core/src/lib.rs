//! # warden-core
//!
//! The directory engine: the consistent tree of entities and groups plus
//! the hook pipeline that mediates every mutation.
//!
//! ## Architecture
//!
//! - **Hook pipeline** ([`hooks`]): every mutation flows through a named,
//!   priority-ordered chain of hooks. Validation hooks run before the
//!   terminal persistence hook, and the first error aborts the chain.
//! - **Entity manager** ([`Directory`] methods in `entity`): CRUD,
//!   secrets, keys, capabilities, and metadata on entities.
//! - **Group manager** (`group`): CRUD, membership, expansions, and
//!   capability derivation over the group graph.
//! - **Façade** ([`directory`]): bootstrap, the read-only gate, and chain
//!   assembly against an explicit [`hooks::HookRegistry`].
//!
//! The engine is synchronous and takes no internal locks; correctness
//! under concurrency comes from atomic per-record storage operations and
//! a last-writer-wins discipline.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_core::Directory;
//! use warden_crypto::PlainEngine;
//! use warden_store::MemoryStore;
//!
//! let dir = Directory::new(Arc::new(MemoryStore::new()), Arc::new(PlainEngine)).unwrap();
//! dir.new_entity("foo", -1, "secret").unwrap();
//! assert!(dir.validate_secret("foo", "secret").is_ok());
//! assert_eq!(dir.get_entity("foo").unwrap().secret.as_deref(), Some("<REDACTED>"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod directory;
mod entity;
pub mod error;
mod group;
pub mod hooks;
pub mod util;

pub use directory::Directory;
pub use error::{Result, TreeError};
pub use util::ExpansionOp;
