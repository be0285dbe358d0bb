//! In-memory index pruning.
//!
//! Removes paths or individual files from a decoded index and cascades the
//! removal through the names section, every posting list (file IDs are
//! remapped to the surviving name positions) and both sub-indices, so the
//! result can be written straight back to disk without re-indexing.

use crate::index::types::{Index, Posting};
use std::collections::{HashMap, HashSet};

/// Remove every indexed path matching one of `paths` by byte prefix, along
/// with all file names under them.
///
/// Prefix matching is byte-exact `starts_with`, so `/a` also matches `/ab`.
/// Upstream behavior, preserved verbatim.
pub fn prune_paths(idx: &mut Index, paths: &[Vec<u8>]) {
    if paths.is_empty() {
        return;
    }

    idx.paths
        .retain(|entry| !paths.iter().any(|p| entry.starts_with(p.as_slice())));

    let positions: Vec<u32> = idx
        .names
        .iter()
        .enumerate()
        .filter(|(_, name)| paths.iter().any(|p| name.starts_with(p.as_slice())))
        .map(|(position, _)| position as u32)
        .collect();

    remove_names(idx, &positions);
    idx.rebuild_offsets();
}

/// Remove the given file names from the index
pub fn prune_files(idx: &mut Index, names: &[Vec<u8>]) {
    if names.is_empty() {
        return;
    }

    let doomed: HashSet<&[u8]> = names.iter().map(|n| n.as_slice()).collect();
    let positions: Vec<u32> = idx
        .names
        .iter()
        .enumerate()
        .filter(|(_, name)| doomed.contains(name.as_slice()))
        .map(|(position, _)| position as u32)
        .collect();

    remove_names(idx, &positions);
    idx.rebuild_offsets();
}

/// Drop the names at `removed_positions` and remap every posting's file IDs
/// onto the surviving positions.
fn remove_names(idx: &mut Index, removed_positions: &[u32]) {
    if removed_positions.is_empty() {
        return;
    }

    let removed: HashSet<u32> = removed_positions.iter().copied().collect();
    let old_count = idx.names.len() as u32;

    let mut position = 0u32;
    idx.names.retain(|_| {
        let keep = !removed.contains(&position);
        position += 1;
        keep
    });

    // Survivor at old position k shifts down by the number of removals
    // before it
    let mut old_to_new: HashMap<u32, u32> = HashMap::new();
    let mut offset = 0u32;
    for old in 0..old_count {
        if removed.contains(&old) {
            offset += 1;
        } else {
            old_to_new.insert(old, old - offset);
        }
    }

    for posting in idx.postings.iter_mut() {
        if posting.is_sentinel() {
            continue;
        }
        let kept: Vec<u32> = posting
            .file_ids()
            .into_iter()
            .filter_map(|id| old_to_new.get(&id).copied())
            .collect();
        *posting = Posting::from_file_ids(posting.trigram, &kept);
    }

    // Postings collapsed to the bare terminator are omitted; the sentinel
    // always remains
    idx.postings
        .retain(|posting| posting.is_sentinel() || !posting.is_empty());
}
