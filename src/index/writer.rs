use crate::error::Result;
use crate::index::types::*;
use crate::utils::write_u32_be;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Stream the on-disk encoding of an index.
///
/// Byte-for-byte compatible with the reader; the caller is responsible for
/// having re-derived `idx.offsets` (see [`Index::rebuild_offsets`]) so the
/// trailer matches the sections actually emitted.
pub fn write_index<W: Write>(writer: &mut W, idx: &Index) -> io::Result<()> {
    writer.write_all(HEADER)?;

    write_strings(writer, &idx.paths)?;
    write_strings(writer, &idx.names)?;

    let mut buf = Vec::new();
    for posting in &idx.postings {
        buf.clear();
        posting.encode(&mut buf);
        writer.write_all(&buf)?;
    }

    for &entry in &idx.name_index {
        write_u32_be(writer, entry)?;
    }

    for entry in &idx.posting_index {
        writer.write_all(&trigram_to_bytes(entry.trigram))?;
        write_u32_be(writer, entry.file_count)?;
        write_u32_be(writer, entry.offset)?;
    }

    for offset in [
        idx.offsets.path_list,
        idx.offsets.name_list,
        idx.offsets.posting_list,
        idx.offsets.name_index,
        idx.offsets.posting_list_index,
    ] {
        write_u32_be(writer, offset)?;
    }

    writer.write_all(TRAILER)?;
    Ok(())
}

/// Encode an index into a byte buffer
pub fn encode_index(idx: &Index) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        idx.offsets.posting_list_index as usize + TRAILER_OFFSETS_LEN + TRAILER.len(),
    );
    write_index(&mut buf, idx).expect("writing to a Vec cannot fail");
    buf
}

/// Write an index file in a single write open, replacing any previous file
pub fn write_index_file(idx: &Index, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(65536, file);
    write_index(&mut writer, idx)?;
    writer.flush()?;
    Ok(())
}

/// Strings section: each entry's raw bytes then a NUL, closed by one final
/// NUL terminator byte
fn write_strings<W: Write>(writer: &mut W, entries: &[Vec<u8>]) -> io::Result<()> {
    for entry in entries {
        writer.write_all(entry)?;
        writer.write_all(&[0])?;
    }
    writer.write_all(&[0])
}
