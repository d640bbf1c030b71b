use anyhow::{Context, Result};
use img_parts::png::Png;
use std::path::Path;

use super::chunk::{decode_text_chunk, TextEntry};
use crate::flatten::FlatMap;

/// Read every text chunk from a PNG file, in file order.
pub fn read_text(path: &Path) -> Result<Vec<TextEntry>> {
    let bytes = std::fs::read(path).context("Failed to read image file")?;
    let png = super::parse_png(bytes)?;
    Ok(text_entries(&png))
}

/// Decode the text chunks of an already-parsed PNG.
///
/// Malformed text chunks (bad header, corrupt zlib stream, invalid UTF-8)
/// are skipped with a warning rather than failing the read.
pub fn text_entries(png: &Png) -> Vec<TextEntry> {
    png.chunks()
        .iter()
        .filter_map(|chunk| match decode_text_chunk(chunk.kind(), chunk.contents()) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping chunk: {e}");
                None
            }
        })
        .collect()
}

/// Collect text entries into a flat map. When a keyword repeats, the later chunk wins.
pub fn string_entries(entries: &[TextEntry]) -> FlatMap {
    let mut flat = FlatMap::new();
    for entry in entries {
        if flat.insert(entry.keyword.clone(), entry.text.clone()).is_some() {
            log::debug!("Duplicate keyword '{}', keeping later chunk", entry.keyword);
        }
    }
    flat
}
