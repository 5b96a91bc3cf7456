//! Core shared types and errors (graphics-API-agnostic).

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("Mesh contained no triangles")]
    EmptyMesh,

    #[error("Too many unique vertices ({count}), indices are limited to u32")]
    IndexOverflow { count: usize },

    #[error("{attribute} index stream has {found} entries, expected {expected}")]
    AttributeMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{attribute} index {index} out of range (len={len})")]
    AttributeOutOfRange {
        attribute: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Refusing to upload empty buffer '{label}'")]
    EmptyUpload { label: String },

    #[error("GPU error: {0}")]
    Gpu(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
