use flate2::read::ZlibDecoder;
use img_parts::Bytes;
use img_parts::png::PngChunk;
use std::io::Read;

use crate::error::MetadataError;

pub const CHUNK_TEXT: [u8; 4] = *b"tEXt";
pub const CHUNK_ITXT: [u8; 4] = *b"iTXt";
pub const CHUNK_ZTXT: [u8; 4] = *b"zTXt";
pub const CHUNK_IEND: [u8; 4] = *b"IEND";

// PNG keywords are 1-79 Latin-1 bytes
const MAX_KEYWORD_LEN: usize = 79;

// zlib/deflate is the only compression method PNG defines
const COMPRESSION_DEFLATE: u8 = 0;

/// Which chunk type a text entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// tEXt
    Latin1,
    /// zTXt
    CompressedLatin1,
    /// iTXt, uncompressed
    International,
    /// iTXt with the compression flag set
    CompressedInternational,
}

impl TextKind {
    /// The PNG chunk type name.
    pub fn chunk_name(&self) -> &'static str {
        match self {
            Self::Latin1 => "tEXt",
            Self::CompressedLatin1 => "zTXt",
            Self::International | Self::CompressedInternational => "iTXt",
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::CompressedLatin1 | Self::CompressedInternational)
    }
}

/// A single decoded PNG text chunk. Compressed text is already inflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    pub keyword: String,
    pub text: String,
    pub kind: TextKind,
}

/// Check if a chunk type holds textual metadata.
pub fn is_text_chunk(kind: [u8; 4]) -> bool {
    kind == CHUNK_TEXT || kind == CHUNK_ITXT || kind == CHUNK_ZTXT
}

/// Decode a text chunk's payload. Returns `Ok(None)` for non-text chunk types.
///
/// A tEXt chunk with no keyword terminator is read as a keyword with empty
/// text, the way Pillow reads it.
pub fn decode_text_chunk(kind: [u8; 4], contents: &[u8]) -> Result<Option<TextEntry>, MetadataError> {
    if !is_text_chunk(kind) {
        return Ok(None);
    }

    let (keyword, rest) = match split_nul(contents) {
        Some(split) => split,
        None if kind == CHUNK_TEXT => (contents, &[][..]),
        None => return Err(malformed(kind, "missing keyword terminator")),
    };
    let keyword = latin1_to_string(keyword);

    let entry = match kind {
        CHUNK_TEXT => TextEntry {
            keyword,
            text: latin1_to_string(rest),
            kind: TextKind::Latin1,
        },
        CHUNK_ZTXT => {
            let [method, compressed @ ..] = rest else {
                return Err(malformed(kind, "missing compression method"));
            };
            let raw = inflate(kind, *method, compressed)?;
            TextEntry {
                keyword,
                text: latin1_to_string(&raw),
                kind: TextKind::CompressedLatin1,
            }
        }
        _ => {
            // iTXt: flag, method, language\0, translated keyword\0, text
            let [flag, method, tail @ ..] = rest else {
                return Err(malformed(kind, "truncated compression header"));
            };
            let (_language, tail) =
                split_nul(tail).ok_or_else(|| malformed(kind, "missing language tag"))?;
            let (_translated, text) =
                split_nul(tail).ok_or_else(|| malformed(kind, "missing translated keyword"))?;

            let (raw, kind_out) = if *flag != 0 {
                (inflate(kind, *method, text)?, TextKind::CompressedInternational)
            } else {
                (text.to_vec(), TextKind::International)
            };
            let text = String::from_utf8(raw)
                .map_err(|_| malformed(kind, "text is not valid UTF-8"))?;
            TextEntry {
                keyword,
                text,
                kind: kind_out,
            }
        }
    };

    Ok(Some(entry))
}

fn inflate(kind: [u8; 4], method: u8, compressed: &[u8]) -> Result<Vec<u8>, MetadataError> {
    if method != COMPRESSION_DEFLATE {
        return Err(malformed(kind, "unknown compression method"));
    }
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| malformed(kind, &format!("corrupt zlib stream ({e})")))?;
    Ok(raw)
}

/// Build a text chunk for `keyword`/`text`.
///
/// Text that fits in Latin-1 goes into tEXt; anything else into an
/// uncompressed iTXt chunk with empty language and translated keyword.
pub fn encode_text_chunk(keyword: &str, text: &str) -> Result<PngChunk, MetadataError> {
    validate_keyword(keyword)?;
    if text.contains('\0') {
        return Err(MetadataError::InvalidKeyword {
            keyword: keyword.to_string(),
            reason: "value contains a NUL character",
        });
    }

    // Keyword validation guarantees Latin-1
    let mut contents = string_to_latin1(keyword).unwrap_or_default();
    contents.push(0);

    let kind = match string_to_latin1(text) {
        Some(latin1) => {
            contents.extend_from_slice(&latin1);
            CHUNK_TEXT
        }
        None => {
            // compression flag, compression method, empty language, empty translated keyword
            contents.extend_from_slice(&[0, 0, 0, 0]);
            contents.extend_from_slice(text.as_bytes());
            CHUNK_ITXT
        }
    };

    Ok(PngChunk::new(kind, Bytes::from(contents)))
}

/// Check a keyword against the PNG rules for text chunk keywords.
pub fn validate_keyword(keyword: &str) -> Result<(), MetadataError> {
    let invalid = |reason| {
        Err(MetadataError::InvalidKeyword {
            keyword: keyword.to_string(),
            reason,
        })
    };

    let Some(bytes) = string_to_latin1(keyword) else {
        return invalid("not representable in Latin-1");
    };
    if bytes.is_empty() {
        return invalid("empty");
    }
    if bytes.len() > MAX_KEYWORD_LEN {
        return invalid("longer than 79 bytes");
    }
    if !bytes.iter().all(|&b| (32..=126).contains(&b) || b >= 161) {
        return invalid("contains a non-printable character");
    }
    if bytes.first() == Some(&b' ') || bytes.last() == Some(&b' ') {
        return invalid("leading or trailing space");
    }
    if bytes.windows(2).any(|w| w == b"  ") {
        return invalid("consecutive spaces");
    }
    Ok(())
}

fn split_nul(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = bytes.iter().position(|&b| b == 0)?;
    Some((&bytes[..pos], &bytes[pos + 1..]))
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn string_to_latin1(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(c).ok()).collect()
}

fn malformed(kind: [u8; 4], reason: &str) -> MetadataError {
    MetadataError::Codec(format!(
        "malformed {} chunk: {reason}",
        String::from_utf8_lossy(&kind)
    ))
}
