use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{Read, Write};
use std::path::Path;

use crate::config::Config;
use crate::error::MetadataError;
use crate::flatten::{flatten, unflatten};
use crate::png::{self, TextEntry};

/// Path meaning stdin (for input JSON) or stdout (for output JSON).
pub const STDIO_PATH: &str = "-";

/// Outcome of [`write_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Text chunks written (one per flat entry).
    pub entries_written: usize,
    /// Text chunks removed from the original image.
    pub chunks_removed: usize,
}

/// Outcome of [`read_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    /// Distinct keywords read (after duplicates collapse).
    pub entries_read: usize,
    /// Entries that came from zTXt or compressed iTXt chunks.
    pub entries_inflated: usize,
}

/// Embed a JSON document's flattened entries into a PNG, in place.
///
/// The document is loaded and validated before the image is read, the image
/// must decode completely, and it is only replaced after the new byte stream
/// is fully built, so any failure leaves `png_path` unmodified.
///
/// # Example
///
/// ```rust,no_run
/// use pngmeta::config::Config;
/// use pngmeta::pipeline::write_metadata;
///
/// let report = write_metadata("image.png".as_ref(), "metadata.json".as_ref(), &Config::default())?;
/// println!("{} entries written", report.entries_written);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn write_metadata(png_path: &Path, json_path: &Path, config: &Config) -> Result<WriteReport> {
    let doc = load_document(json_path)?;
    let flat = flatten(&doc, &config.separator, config.on_collision)?;
    log::debug!("Flattened {} into {} entries", json_path.display(), flat.len());

    let bytes = std::fs::read(png_path).context("Failed to read image file")?;
    png::verify_pixels(&bytes)?;
    let mut image = png::parse_png(bytes)?;
    let summary = png::set_text_entries(&mut image, &flat, config.keep_existing)?;

    let output = image.encoder().bytes();
    png::replace_in_place(png_path, &output)?;

    log::info!(
        "Embedded {} entries into {} ({} old text chunks removed)",
        summary.written,
        png_path.display(),
        summary.removed
    );
    Ok(WriteReport {
        entries_written: summary.written,
        chunks_removed: summary.removed,
    })
}

/// Extract string-valued text chunks from a PNG into a nested JSON file.
pub fn read_metadata(png_path: &Path, json_path: &Path, config: &Config) -> Result<ReadReport> {
    let (nested, report) = extract_document(png_path, config)?;
    let text = to_json_string(&Value::Object(nested), config.indent)?;

    if json_path == Path::new(STDIO_PATH) {
        std::io::stdout()
            .write_all(text.as_bytes())
            .context("Failed to write JSON to stdout")?;
    } else {
        std::fs::write(json_path, text).context("Failed to write JSON file")?;
    }

    log::info!(
        "Extracted {} entries from {} to {}",
        report.entries_read,
        png_path.display(),
        json_path.display()
    );
    Ok(report)
}

/// Read and unflatten a PNG's string-valued text chunks without writing anything.
pub fn extract_document(png_path: &Path, config: &Config) -> Result<(Map<String, Value>, ReadReport)> {
    let entries = png::read_text(png_path)?;
    let flat = png::string_entries(&entries);
    let inflated = entries.iter().filter(|e| e.kind.is_compressed()).count();
    if inflated > 0 {
        log::debug!("Inflated {inflated} compressed text entries");
    }

    let nested = unflatten(&flat, &config.separator, config.on_collision)?;
    Ok((
        nested,
        ReadReport {
            entries_read: flat.len(),
            entries_inflated: inflated,
        },
    ))
}

/// List every text chunk of a PNG in file order.
pub fn show_metadata(png_path: &Path) -> Result<Vec<TextEntry>> {
    png::read_text(png_path)
}

/// Strip every text chunk from a PNG, in place. Returns how many were removed.
pub fn clear_metadata(png_path: &Path) -> Result<usize> {
    let bytes = std::fs::read(png_path).context("Failed to read image file")?;
    png::verify_pixels(&bytes)?;
    let mut image = png::parse_png(bytes)?;
    let removed = png::clear_text(&mut image);

    if removed == 0 {
        log::info!("No text chunks in {}", png_path.display());
        return Ok(0);
    }

    let output = image.encoder().bytes();
    png::replace_in_place(png_path, &output)?;
    log::info!("Removed {removed} text chunks from {}", png_path.display());
    Ok(removed)
}

/// Load a JSON document whose top-level value must be an object.
pub fn load_document(json_path: &Path) -> Result<Map<String, Value>> {
    let contents = if json_path == Path::new(STDIO_PATH) {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON from stdin")?;
        buf
    } else {
        std::fs::read_to_string(json_path).context("Failed to read JSON file")?
    };

    let value: Value = serde_json::from_str(&contents).context("Failed to parse JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MetadataError::NotAnObject {
            found: json_type_name(&other),
        }
        .into()),
    }
}

/// Serialize with `indent` spaces per level and a trailing newline.
pub fn to_json_string(value: &Value, indent: usize) -> Result<String> {
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).context("Failed to serialize JSON")?;
    buf.push(b'\n');
    String::from_utf8(buf).context("Serialized JSON is not UTF-8")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use crate::png::test_support::{corrupt_idat_png, tiny_png};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use img_parts::Bytes;
    use img_parts::png::PngChunk;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        png: PathBuf,
        json: PathBuf,
        out: PathBuf,
    }

    fn fixture(doc: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let png = dir.path().join("image.png");
        let json = dir.path().join("metadata.json");
        let out = dir.path().join("out.json");
        fs::write(&png, tiny_png()).unwrap();
        fs::write(&json, doc).unwrap();
        Fixture { _dir: dir, png, json, out }
    }

    fn read_out(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    // ── write / read ──────────────────────────────────────────────────

    #[test]
    fn camera_round_trip() {
        let f = fixture(r#"{"camera": {"make": "Acme", "iso": 200}}"#);
        let config = Config::default();

        let written = write_metadata(&f.png, &f.json, &config).unwrap();
        assert_eq!(written.entries_written, 2);

        let read = read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(read.entries_read, 2);
        assert_eq!(read_out(&f.out), json!({"camera": {"make": "Acme", "iso": "200"}}));
    }

    #[test]
    fn output_uses_four_space_indent() {
        let f = fixture(r#"{"a": {"b": "c"}}"#);
        let config = Config::default();
        write_metadata(&f.png, &f.json, &config).unwrap();
        read_metadata(&f.png, &f.out, &config).unwrap();

        let text = fs::read_to_string(&f.out).unwrap();
        assert_eq!(text, "{\n    \"a\": {\n        \"b\": \"c\"\n    }\n}\n");
    }

    #[test]
    fn custom_indent() {
        let f = fixture(r#"{"a": "b"}"#);
        let config = Config {
            indent: 2,
            ..Config::default()
        };
        write_metadata(&f.png, &f.json, &config).unwrap();
        read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(fs::read_to_string(&f.out).unwrap(), "{\n  \"a\": \"b\"\n}\n");
    }

    #[test]
    fn rewrite_replaces_previous_metadata() {
        let f = fixture(r#"{"first": {"x": 1}}"#);
        let config = Config::default();
        write_metadata(&f.png, &f.json, &config).unwrap();

        fs::write(&f.json, r#"{"second": {"y": 2}}"#).unwrap();
        let report = write_metadata(&f.png, &f.json, &config).unwrap();
        assert_eq!(report.chunks_removed, 1);

        read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(read_out(&f.out), json!({"second": {"y": "2"}}));
    }

    #[test]
    fn keep_existing_merges_metadata() {
        let f = fixture(r#"{"first": {"x": 1}, "shared": "old"}"#);
        let mut config = Config::default();
        write_metadata(&f.png, &f.json, &config).unwrap();

        config.keep_existing = true;
        fs::write(&f.json, r#"{"second": 2, "shared": "new"}"#).unwrap();
        write_metadata(&f.png, &f.json, &config).unwrap();

        read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(
            read_out(&f.out),
            json!({"first": {"x": "1"}, "second": "2", "shared": "new"})
        );
    }

    #[test]
    fn custom_separator_round_trip() {
        let f = fixture(r#"{"lib": {"v1.2": {"ok": true}}}"#);
        let config = Config {
            separator: "/".into(),
            ..Config::default()
        };
        write_metadata(&f.png, &f.json, &config).unwrap();

        let entries = show_metadata(&f.png).unwrap();
        assert_eq!(entries[0].keyword, "lib/v1.2/ok");

        read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(read_out(&f.out), json!({"lib": {"v1.2": {"ok": "true"}}}));
    }

    #[test]
    fn empty_document_round_trip() {
        let f = fixture("{}");
        let config = Config::default();
        let report = write_metadata(&f.png, &f.json, &config).unwrap();
        assert_eq!(report.entries_written, 0);

        read_metadata(&f.png, &f.out, &config).unwrap();
        assert_eq!(read_out(&f.out), json!({}));
    }

    #[test]
    fn image_pixels_survive_write() {
        let f = fixture(r#"{"a": 1}"#);
        write_metadata(&f.png, &f.json, &Config::default()).unwrap();

        let img = image::open(&f.png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 1).0, [200, 30, 90]);
    }

    // ── errors ────────────────────────────────────────────────────────

    #[test]
    fn array_document_rejected_and_image_untouched() {
        let f = fixture("[1,2,3]");
        let before = fs::read(&f.png).unwrap();

        let err = write_metadata(&f.png, &f.json, &Config::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MetadataError>(),
            Some(&MetadataError::NotAnObject { found: "an array" })
        );
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn scalar_document_rejected() {
        let f = fixture("42");
        let err = write_metadata(&f.png, &f.json, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetadataError>(),
            Some(MetadataError::NotAnObject { found: "a number" })
        ));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let f = fixture("{ nope");
        let before = fs::read(&f.png).unwrap();
        assert!(write_metadata(&f.png, &f.json, &Config::default()).is_err());
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn missing_files_are_errors() {
        let f = fixture("{}");
        let missing = f.png.with_file_name("missing.png");
        assert!(write_metadata(&missing, &f.json, &Config::default()).is_err());
        assert!(read_metadata(&missing, &f.out, &Config::default()).is_err());
        assert!(!f.out.exists());

        let missing_json = f.json.with_file_name("missing.json");
        assert!(write_metadata(&f.png, &missing_json, &Config::default()).is_err());
    }

    #[test]
    fn corrupt_png_is_codec_error() {
        let f = fixture(r#"{"a": 1}"#);
        fs::write(&f.png, b"\x89PNG\r\n\x1a\ngarbage").unwrap();
        let before = fs::read(&f.png).unwrap();

        let err = write_metadata(&f.png, &f.json, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetadataError>(),
            Some(MetadataError::Codec(_))
        ));
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn corrupt_pixel_data_is_codec_error() {
        let f = fixture(r#"{"a": 1}"#);
        fs::write(&f.png, corrupt_idat_png()).unwrap();
        let before = fs::read(&f.png).unwrap();

        let err = write_metadata(&f.png, &f.json, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetadataError>(),
            Some(MetadataError::Codec(_))
        ));
        assert_eq!(fs::read(&f.png).unwrap(), before);
        assert!(clear_metadata(&f.png).is_err());
    }

    #[test]
    fn strict_collision_rejected_before_write() {
        let f = fixture(r#"{"a": {"b": 1}, "a.b": 2}"#);
        let before = fs::read(&f.png).unwrap();
        let config = Config {
            on_collision: CollisionPolicy::Reject,
            ..Config::default()
        };

        let err = write_metadata(&f.png, &f.json, &config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MetadataError>(),
            Some(&MetadataError::KeyCollision { key: "a.b".into() })
        );
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn strict_leaf_prefix_rejected_before_write() {
        let f = fixture(r#"{"a": "x", "a.b": "y"}"#);
        let before = fs::read(&f.png).unwrap();
        let config = Config {
            on_collision: CollisionPolicy::Reject,
            ..Config::default()
        };

        let err = write_metadata(&f.png, &f.json, &config).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MetadataError>(),
            Some(&MetadataError::KeyCollision { key: "a".into() })
        );
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn long_key_rejected_before_write() {
        let doc = format!(r#"{{"{}": "v"}}"#, "k".repeat(80));
        let f = fixture(&doc);
        let before = fs::read(&f.png).unwrap();

        let err = write_metadata(&f.png, &f.json, &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MetadataError>(),
            Some(MetadataError::InvalidKeyword { .. })
        ));
        assert_eq!(fs::read(&f.png).unwrap(), before);
    }

    #[test]
    fn compressed_text_from_other_tools_is_read() {
        let f = fixture("{}");
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Acme").unwrap();
        let mut payload = b"camera.make\0\0".to_vec();
        payload.extend(encoder.finish().unwrap());

        let mut image = png::parse_png(fs::read(&f.png).unwrap()).unwrap();
        let chunks = image.chunks_mut();
        let end = chunks.len() - 1;
        chunks.insert(end, PngChunk::new(*b"zTXt", Bytes::from(payload)));
        fs::write(&f.png, image.encoder().bytes()).unwrap();
        assert!(image::open(&f.png).is_ok());

        let report = read_metadata(&f.png, &f.out, &Config::default()).unwrap();
        assert_eq!(report.entries_inflated, 1);
        assert_eq!(read_out(&f.out), json!({"camera": {"make": "Acme"}}));
    }

    // ── show / clear ──────────────────────────────────────────────────

    #[test]
    fn clear_strips_text() {
        let f = fixture(r#"{"a": {"b": 1, "c": 2}}"#);
        write_metadata(&f.png, &f.json, &Config::default()).unwrap();
        assert_eq!(show_metadata(&f.png).unwrap().len(), 2);

        assert_eq!(clear_metadata(&f.png).unwrap(), 2);
        assert!(show_metadata(&f.png).unwrap().is_empty());
        assert_eq!(clear_metadata(&f.png).unwrap(), 0);
    }

    // ── helpers ───────────────────────────────────────────────────────

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!("s")), "a string");
        assert_eq!(json_type_name(&json!(true)), "a boolean");
    }
}
