//! # pngmeta
//!
//! Embed hierarchical JSON metadata into PNG text chunks, and extract it back.
//!
//! Nested keys are flattened to dot-joined keywords (`camera.make`), one text
//! chunk per leaf. Reading collects the string-valued text chunks and rebuilds
//! the nesting. Every leaf comes back as a string.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pngmeta::config::Config;
//! use pngmeta::pipeline::{read_metadata, write_metadata};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!
//!     // metadata.json: {"camera": {"make": "Acme", "iso": 200}}
//!     write_metadata("image.png".as_ref(), "metadata.json".as_ref(), &config)?;
//!
//!     // out.json: {"camera": {"make": "Acme", "iso": "200"}}
//!     read_metadata("image.png".as_ref(), "out.json".as_ref(), &config)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Chunk Layout
//!
//! | Value | Chunk |
//! |-------|-------|
//! | Latin-1 representable | `tEXt` |
//! | Other Unicode | `iTXt`, uncompressed, no language tag |
//!
//! On read, compressed text (`zTXt`, compressed `iTXt`) written by other tools
//! is inflated and treated like any other entry.
//!
//! ## Modules
//!
//! - [`config`] — Separator, indentation and collision settings
//! - [`error`] — Typed errors for the transform and the chunk codec
//! - [`flatten`] — Nested ↔ flat key conversion
//! - [`png`] — PNG text-chunk reading and writing
//! - [`pipeline`] — File-level write/read/show/clear operations

pub mod config;
pub mod error;
pub mod flatten;
pub mod pipeline;
pub mod png;
