use anyhow::{Context, Result};
use img_parts::png::{Png, PngChunk};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use super::chunk::{decode_text_chunk, encode_text_chunk, is_text_chunk, CHUNK_IEND};
use crate::error::MetadataError;
use crate::flatten::FlatMap;

/// Chunk counts from [`set_text_entries`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetSummary {
    pub written: usize,
    pub removed: usize,
}

/// Store every flat entry as one text chunk, placed just before `IEND`.
///
/// All entries are encoded before the image is touched, so an invalid keyword
/// leaves `png` unchanged. Existing text chunks are removed; with
/// `keep_existing`, only those whose keyword is being rewritten go.
pub fn set_text_entries(
    png: &mut Png,
    flat: &FlatMap,
    keep_existing: bool,
) -> Result<SetSummary, MetadataError> {
    let new_chunks = flat
        .iter()
        .map(|(keyword, text)| encode_text_chunk(keyword, text))
        .collect::<Result<Vec<PngChunk>, _>>()?;

    let chunks = png.chunks_mut();
    let before = chunks.len();
    if keep_existing {
        let rewritten: BTreeSet<&str> = flat.keys().map(String::as_str).collect();
        chunks.retain(|chunk| {
            match decode_text_chunk(chunk.kind(), chunk.contents()) {
                Ok(Some(entry)) => !rewritten.contains(entry.keyword.as_str()),
                _ => true,
            }
        });
    } else {
        chunks.retain(|chunk| !is_text_chunk(chunk.kind()));
    }
    let removed = before - chunks.len();

    let end = chunks
        .iter()
        .position(|chunk| chunk.kind() == CHUNK_IEND)
        .unwrap_or(chunks.len());
    let written = new_chunks.len();
    chunks.splice(end..end, new_chunks);

    log::debug!("Text chunks: {written} written, {removed} removed");
    Ok(SetSummary { written, removed })
}

/// Remove every text chunk. Returns how many were removed.
pub fn clear_text(png: &mut Png) -> usize {
    let chunks = png.chunks_mut();
    let before = chunks.len();
    chunks.retain(|chunk| !is_text_chunk(chunk.kind()));
    before - chunks.len()
}

/// Atomically replace `path` with `contents`.
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over the target. If anything fails the target is untouched and the
/// temporary file is deleted when dropped.
pub fn replace_in_place(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)
        .context("Failed to read image file metadata")?
        .permissions();

    let mut tmp = tempfile::Builder::new()
        .prefix(".pngmeta-")
        .suffix(".png")
        .tempfile_in(dir)
        .context("Failed to create temporary file")?;
    tmp.write_all(contents)
        .context("Failed to write temporary file")?;
    tmp.as_file()
        .sync_all()
        .context("Failed to flush temporary file")?;
    tmp.as_file()
        .set_permissions(permissions)
        .context("Failed to copy file permissions")?;

    log::debug!("Replacing {} via {}", path.display(), tmp.path().display());
    tmp.persist(path)
        .map_err(|e| e.error)
        .context("Failed to replace image file")?;
    Ok(())
}
