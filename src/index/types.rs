use crate::utils::{encode_varint, varint_size};

/// A trigram is a 3-byte sequence stored as u32 (only lower 24 bits used)
pub type Trigram = u32;

/// Zero-based position of a file name in the names section
pub type FileId = u32;

/// Magic bytes opening every index file
pub const HEADER: &[u8; 16] = b"csearch index 1\n";

/// Magic bytes closing every index file
pub const TRAILER: &[u8; 16] = b"\ncsearch trailr\n";

/// Trigram of the sentinel posting that terminates the posting list section
pub const SENTINEL_TRIGRAM: Trigram = 0xFF_FFFF;

/// Byte size of the five-offset trailer block
pub const TRAILER_OFFSETS_LEN: usize = 20;

/// Byte size of one posting list index entry: 3B trigram + u32 count + u32 offset
pub const POSTING_INDEX_ENTRY_LEN: usize = 11;

/// Convert 3 bytes to a trigram
#[inline]
pub fn bytes_to_trigram(b0: u8, b1: u8, b2: u8) -> Trigram {
    ((b0 as u32) << 16) | ((b1 as u32) << 8) | (b2 as u32)
}

/// Convert trigram back to bytes
#[inline]
pub fn trigram_to_bytes(t: Trigram) -> [u8; 3] {
    [
        ((t >> 16) & 0xFF) as u8,
        ((t >> 8) & 0xFF) as u8,
        (t & 0xFF) as u8,
    ]
}

/// One posting: a trigram and the delta-encoded file IDs of the files whose
/// contents contain it.
///
/// Deltas encode differences against a virtual initial value of −1, and the
/// final delta is always 0 and acts as the terminator. A posting whose delta
/// list is just `[0]` carries no file IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub trigram: Trigram,
    pub deltas: Vec<u32>,
}

impl Posting {
    /// The sentinel posting `(0xFFFFFF, [0])`
    pub fn sentinel() -> Self {
        Self {
            trigram: SENTINEL_TRIGRAM,
            deltas: vec![0],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.trigram == SENTINEL_TRIGRAM
    }

    /// True when the delta list has collapsed to the bare terminator
    pub fn is_empty(&self) -> bool {
        self.deltas == [0]
    }

    /// Build a posting from strictly increasing file IDs
    pub fn from_file_ids(trigram: Trigram, ids: &[FileId]) -> Self {
        let mut deltas = Vec::with_capacity(ids.len() + 1);
        let mut prev: i64 = -1;
        for &id in ids {
            deltas.push((id as i64 - prev) as u32);
            prev = id as i64;
        }
        deltas.push(0);
        Self { trigram, deltas }
    }

    /// Expand the delta list back into file IDs
    pub fn file_ids(&self) -> Vec<FileId> {
        let mut ids = Vec::with_capacity(self.deltas.len().saturating_sub(1));
        let mut acc: i64 = -1;
        for &delta in &self.deltas[..self.deltas.len().saturating_sub(1)] {
            acc += delta as i64;
            ids.push(acc as u32);
        }
        ids
    }

    /// Number of file IDs carried by this posting
    pub fn file_count(&self) -> u32 {
        self.deltas.len() as u32 - 1
    }

    /// Encoded byte length: 3 trigram bytes plus one varint per delta
    pub fn encoded_len(&self) -> usize {
        3 + self.deltas.iter().map(|&d| varint_size(d)).sum::<usize>()
    }

    /// Append the on-disk encoding to `buf`
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&trigram_to_bytes(self.trigram));
        for &delta in &self.deltas {
            encode_varint(delta, buf);
        }
    }
}

/// Random-access entry for one emitted posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingIndexEntry {
    pub trigram: Trigram,
    /// `deltas.len() − 1` of the posting
    pub file_count: u32,
    /// Byte offset of the posting within the posting list section
    pub offset: u32,
}

/// The five absolute section offsets stored just before the trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrailerOffsets {
    pub path_list: u32,
    pub name_list: u32,
    pub posting_list: u32,
    pub name_index: u32,
    pub posting_list_index: u32,
}

/// In-memory model of one on-disk trigram index file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Indexed root paths, sorted ascending byte-wise
    pub paths: Vec<Vec<u8>>,
    /// Indexed file names, sorted ascending byte-wise; position = file ID
    pub names: Vec<Vec<u8>>,
    /// Posting lists, sentinel last
    pub postings: Vec<Posting>,
    /// Cumulative name byte offsets plus one terminating total entry
    pub name_index: Vec<u32>,
    /// One entry per non-sentinel posting
    pub posting_index: Vec<PostingIndexEntry>,
    /// Section offsets as stored in (or derived for) the trailer
    pub offsets: TrailerOffsets,
}

impl Index {
    /// An index with no paths, no names and only the sentinel posting
    pub fn empty() -> Self {
        let mut idx = Self {
            paths: Vec::new(),
            names: Vec::new(),
            postings: vec![Posting::sentinel()],
            name_index: Vec::new(),
            posting_index: Vec::new(),
            offsets: TrailerOffsets::default(),
        };
        idx.rebuild_offsets();
        idx
    }

    /// Re-derive the name index, the posting list index and all trailer
    /// offsets from the current sections.
    ///
    /// Offsets stored in a trailer must reflect the byte lengths actually
    /// emitted, so this runs after every mutation and before every write.
    pub fn rebuild_offsets(&mut self) {
        let path_list = HEADER.len() as u32;
        let name_list = path_list + strings_section_len(&self.paths);
        let posting_list = name_list + strings_section_len(&self.names);

        self.name_index.clear();
        let mut total: u32 = 0;
        for name in &self.names {
            self.name_index.push(total);
            total += name.len() as u32 + 1;
        }
        self.name_index.push(total);

        self.posting_index.clear();
        let mut offset: u32 = 0;
        for posting in &self.postings {
            if !posting.is_sentinel() {
                self.posting_index.push(PostingIndexEntry {
                    trigram: posting.trigram,
                    file_count: posting.file_count(),
                    offset,
                });
            }
            offset += posting.encoded_len() as u32;
        }

        let name_index = posting_list + offset;
        let posting_list_index = name_index + 4 * self.name_index.len() as u32;

        self.offsets = TrailerOffsets {
            path_list,
            name_list,
            posting_list,
            name_index,
            posting_list_index,
        };
    }
}

/// On-disk byte length of a strings section: each entry NUL-terminated,
/// plus the final empty terminator entry
pub fn strings_section_len(entries: &[Vec<u8>]) -> u32 {
    entries.iter().map(|e| e.len() as u32 + 1).sum::<u32>() + 1
}
