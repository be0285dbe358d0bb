//! # csidx - trigram code search index toolkit
//!
//! csidx wraps the classic trigram code search toolchain (`cindex` /
//! `csearch`): it dispatches the external indexer and searcher against one
//! or more on-disk index files, and speaks the binary index file format
//! directly so files or whole sub-trees can be pruned from an existing
//! index without re-indexing from scratch.
//!
//! ## Architecture
//!
//! - [`index`] - Binary index codec and in-memory mutation (pruning)
//! - [`dispatch`] - Bounded, cancellable subprocess invocation
//! - [`context`] - Store directory, resolver strategy, top-level operations
//! - [`server`] - JSON HTTP surface over index and search
//! - [`utils`] - Encoding primitives (varints, big-endian words)
//!
//! ## Quick start
//!
//! ```ignore
//! use csidx::context::{Context, SearchOptions};
//!
//! let ctx = Context::open_default()?;
//! ctx.index(std::path::Path::new("/home/me/src"))?;
//!
//! let hits = ctx.search("fn main", &SearchOptions::default())?;
//! for hit in hits {
//!     println!("{}:{}:{}", hit.file.display(), hit.line, hit.text);
//! }
//!
//! // Drop a sub-tree from every index file without re-indexing
//! ctx.prune_paths(&[b"/home/me/src/vendor".to_vec()])?;
//! ```

pub mod context;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod server;
pub mod utils;

pub use context::{Context, IndexResolver, SearchHit, SearchOptions, SingleFileResolver};
pub use error::{Error, Result};
