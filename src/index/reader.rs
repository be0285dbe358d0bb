use crate::error::{Error, Result};
use crate::index::types::*;
use crate::utils::{decode_varint, u32_be_at};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Decode an index file into its in-memory model
pub fn read_index_file(path: &Path) -> Result<Index> {
    let file = File::open(path)?;
    let len = file.metadata()?.len() as usize;
    if len < HEADER.len() + TRAILER_OFFSETS_LEN + TRAILER.len() {
        return Err(Error::InvalidIndex("file too short"));
    }
    let data = unsafe { Mmap::map(&file)? };
    parse_index(&data)
}

/// Decode a complete index image from memory
pub fn parse_index(data: &[u8]) -> Result<Index> {
    if data.len() < HEADER.len() + TRAILER_OFFSETS_LEN + TRAILER.len() {
        return Err(Error::InvalidIndex("file too short"));
    }
    if &data[..HEADER.len()] != HEADER {
        return Err(Error::InvalidIndex("bad header magic"));
    }
    let trailer_start = data.len() - TRAILER.len();
    if &data[trailer_start..] != TRAILER {
        return Err(Error::InvalidIndex("bad trailer magic"));
    }

    let offsets_start = trailer_start - TRAILER_OFFSETS_LEN;
    let offsets = read_trailer_offsets(data, offsets_start)?;

    // Each section is bounded by the next offset; the last by the trailer
    // offsets block. Offsets that run backwards or past the file mean the
    // trailer lies about the sections.
    let bounds = [
        offsets.path_list,
        offsets.name_list,
        offsets.posting_list,
        offsets.name_index,
        offsets.posting_list_index,
        offsets_start as u32,
    ];
    if offsets.path_list < HEADER.len() as u32 || bounds.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::InvalidIndex("section offsets out of order"));
    }

    let section = |from: u32, to: u32| &data[from as usize..to as usize];

    let paths = parse_strings(section(offsets.path_list, offsets.name_list));
    let names = parse_strings(section(offsets.name_list, offsets.posting_list));
    let postings = parse_postings(section(offsets.posting_list, offsets.name_index))?;
    let name_index = parse_name_index(section(offsets.name_index, offsets.posting_list_index))?;
    let posting_index =
        parse_posting_index(section(offsets.posting_list_index, offsets_start as u32))?;

    Ok(Index {
        paths,
        names,
        postings,
        name_index,
        posting_index,
        offsets,
    })
}

fn read_trailer_offsets(data: &[u8], start: usize) -> Result<TrailerOffsets> {
    let at = |i: usize| {
        u32_be_at(data, start + 4 * i).ok_or(Error::InvalidIndex("truncated trailer offsets"))
    };
    Ok(TrailerOffsets {
        path_list: at(0)?,
        name_list: at(1)?,
        posting_list: at(2)?,
        name_index: at(3)?,
        posting_list_index: at(4)?,
    })
}

/// Split a strings section at NULs, dropping empty entries (the section's
/// own terminator decodes as one)
fn parse_strings(section: &[u8]) -> Vec<Vec<u8>> {
    section
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_vec())
        .collect()
}

/// Parse postings until the sentinel or the section bound, whichever comes
/// first. The bound is authoritative: some real files end the posting bytes
/// without an in-section sentinel.
fn parse_postings(section: &[u8]) -> Result<Vec<Posting>> {
    let mut postings = Vec::new();
    let mut pos = 0;

    while pos < section.len() {
        if section.len() - pos < 3 {
            return Err(Error::InvalidIndex("truncated posting trigram"));
        }
        let trigram = bytes_to_trigram(section[pos], section[pos + 1], section[pos + 2]);
        pos += 3;

        let mut deltas = Vec::new();
        loop {
            let (value, consumed) = decode_varint(&section[pos..])
                .ok_or(Error::InvalidIndex("truncated posting delta"))?;
            pos += consumed;
            let delta = u32::try_from(value)
                .map_err(|_| Error::InvalidIndex("posting delta overflows u32"))?;
            deltas.push(delta);
            if delta == 0 {
                break;
            }
        }

        postings.push(Posting { trigram, deltas });
        if trigram == SENTINEL_TRIGRAM {
            break;
        }
    }

    Ok(postings)
}

fn parse_name_index(section: &[u8]) -> Result<Vec<u32>> {
    if section.len() % 4 != 0 {
        return Err(Error::InvalidIndex("truncated name index entry"));
    }
    Ok(section
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn parse_posting_index(section: &[u8]) -> Result<Vec<PostingIndexEntry>> {
    if section.len() % POSTING_INDEX_ENTRY_LEN != 0 {
        return Err(Error::InvalidIndex("truncated posting index entry"));
    }
    section
        .chunks_exact(POSTING_INDEX_ENTRY_LEN)
        .map(|chunk| {
            let trigram = bytes_to_trigram(chunk[0], chunk[1], chunk[2]);
            let file_count =
                u32_be_at(chunk, 3).ok_or(Error::InvalidIndex("truncated posting index entry"))?;
            let offset =
                u32_be_at(chunk, 7).ok_or(Error::InvalidIndex("truncated posting index entry"))?;
            Ok(PostingIndexEntry {
                trigram,
                file_count,
                offset,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::encode_index;

    #[test]
    fn test_parse_empty_index() {
        let bytes = encode_index(&Index::empty());
        assert_eq!(bytes.len(), 62);
        let parsed = parse_index(&bytes).unwrap();
        assert_eq!(parsed, Index::empty());
    }

    #[test]
    fn test_bad_header() {
        let mut bytes = encode_index(&Index::empty());
        bytes[0] = b'x';
        assert!(matches!(
            parse_index(&bytes),
            Err(Error::InvalidIndex("bad header magic"))
        ));
    }

    #[test]
    fn test_bad_trailer() {
        let mut bytes = encode_index(&Index::empty());
        let last = bytes.len() - 1;
        bytes[last] = b'x';
        assert!(matches!(
            parse_index(&bytes),
            Err(Error::InvalidIndex("bad trailer magic"))
        ));
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            parse_index(HEADER),
            Err(Error::InvalidIndex("file too short"))
        ));
    }

    #[test]
    fn test_offsets_out_of_order() {
        let mut idx = Index::empty();
        idx.offsets.name_list = 5000;
        let bytes = encode_index(&idx);
        assert!(matches!(
            parse_index(&bytes),
            Err(Error::InvalidIndex("section offsets out of order"))
        ));
    }

    #[test]
    fn test_parse_strings_drops_empty_entries() {
        assert_eq!(
            parse_strings(b"/a\0/b\0\0"),
            vec![b"/a".to_vec(), b"/b".to_vec()]
        );
        assert_eq!(parse_strings(b"\0"), Vec::<Vec<u8>>::new());
        assert_eq!(parse_strings(b""), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_parse_postings_without_sentinel() {
        // Posting bytes that end at the section bound with no sentinel
        let mut section = Vec::new();
        Posting::from_file_ids(bytes_to_trigram(b'a', b'b', b'c'), &[0, 1]).encode(&mut section);
        let postings = parse_postings(&section).unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].file_ids(), vec![0, 1]);
    }

    #[test]
    fn test_parse_postings_truncated_delta() {
        let section = [b'a', b'b', b'c', 0x80];
        assert!(matches!(
            parse_postings(&section),
            Err(Error::InvalidIndex("truncated posting delta"))
        ));
    }

    #[test]
    fn test_parse_postings_stops_at_sentinel() {
        let mut section = Vec::new();
        Posting::sentinel().encode(&mut section);
        // Garbage after the sentinel is never reached
        section.extend_from_slice(&[1, 2]);
        let postings = parse_postings(&section).unwrap();
        assert_eq!(postings, vec![Posting::sentinel()]);
    }
}
