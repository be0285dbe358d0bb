//! The trigram index file codec and mutation engine.
//!
//! - [`types`] - Data structures (Index, Posting, trailer offsets)
//! - [`reader`] - File decoding with header/trailer verification
//! - [`writer`] - Byte-identical file encoding
//! - [`prune`] - In-memory path/file removal with file-ID remapping
//!
//! ## File layout
//!
//! ```text
//! 0..16                  literal "csearch index 1\n"
//! path_list..name_list   NUL-terminated sorted paths, then one 0x00
//! name_list..plist       NUL-terminated sorted names, then one 0x00
//! plist..name_index      {3B trigram, varint deltas ending in 0}...,
//!                        terminated by the sentinel FF FF FF 00
//! name_index..plist_idx  u32-BE per name, plus one terminator entry
//! plist_idx..len-36      {3B trigram, u32-BE count, u32-BE offset}...
//! len-36..len-16         five u32-BE section offsets
//! len-16..len            literal "\ncsearch trailr\n"
//! ```

pub mod prune;
pub mod reader;
pub mod types;
pub mod writer;

pub use prune::{prune_files, prune_paths};
pub use reader::{parse_index, read_index_file};
pub use types::*;
pub use writer::{encode_index, write_index, write_index_file};
