//! PNG text-chunk reading and writing.
//!
//! - [`read_text`] — decode every tEXt/iTXt/zTXt chunk of an image
//! - [`set_text_entries`] — replace the image's text chunks with a flat map
//! - [`clear_text`] — strip all text chunks
//!
//! The chunk stream is edited with `img-parts`; pixel data is never re-encoded.

mod chunk;
mod reader;
mod writer;

pub use chunk::{
    decode_text_chunk, encode_text_chunk, is_text_chunk, validate_keyword, TextEntry, TextKind,
};
pub use reader::{read_text, string_entries, text_entries};
pub use writer::{clear_text, replace_in_place, set_text_entries, SetSummary};

use image::{ImageFormat, ImageReader};
use img_parts::Bytes;
use img_parts::png::Png;
use std::io::Cursor;

use crate::error::MetadataError;

/// Parse raw bytes as a PNG chunk stream.
///
/// The bytes must carry the PNG signature and a header the image decoder
/// accepts; otherwise the result is [`MetadataError::Codec`].
pub fn parse_png(bytes: Vec<u8>) -> Result<Png, MetadataError> {
    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => {}
        Ok(other) => {
            return Err(MetadataError::Codec(format!("expected PNG, found {other:?}")));
        }
        Err(e) => return Err(MetadataError::Codec(e.to_string())),
    }

    let (width, height) = ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Png)
        .into_dimensions()
        .map_err(|e| MetadataError::Codec(e.to_string()))?;
    log::debug!("PNG header: {width}x{height}");

    Png::from_bytes(Bytes::from(bytes))
        .map_err(|e| MetadataError::Codec(format!("Failed to parse PNG: {e}")))
}

/// Decode the whole image, pixel data included. Checked before an image is replaced.
pub fn verify_pixels(bytes: &[u8]) -> Result<(), MetadataError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| MetadataError::Codec(e.to_string()))?;
    log::debug!("Decoded {}x{} image", img.width(), img.height());
    Ok(())
}
