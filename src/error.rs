//! Typed errors for the metadata transform and the PNG text-chunk codec.
//!
//! Orchestration code in [`pipeline`](crate::pipeline) returns `anyhow::Result`;
//! recover one of these with `err.downcast_ref::<MetadataError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The JSON document's top-level value is not an object.
    #[error("JSON must contain a top-level object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("Key separator must not be empty")]
    EmptySeparator,

    /// Two entries resolve to the same path (or one is a prefix of the other).
    #[error("Key collision at '{key}'")]
    KeyCollision { key: String },

    #[error("Invalid PNG keyword '{keyword}': {reason}")]
    InvalidKeyword { keyword: String, reason: &'static str },

    /// The image library rejected the data.
    #[error("PNG codec error: {0}")]
    Codec(String),
}
