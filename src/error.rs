/// Errors from the schema bundle loader and the programmatic builder.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("truncated schema bundle: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("malformed schema bundle: {0}")]
    Invalid(String),

    #[error("non-ascending tag {tag} in type '{type_name}'")]
    NonAscendingTag { type_name: String, tag: u16 },

    #[error("duplicate tag {tag} in type '{type_name}'")]
    DuplicateTag { type_name: String, tag: u16 },

    #[error("type index {index} out of range (have {count} types)")]
    TypeIndexOutOfRange { index: usize, count: usize },

    #[error("redefined protocol tag {tag} at '{name}'")]
    DuplicateProtocolTag { tag: u16, name: String },

    #[error("invalid map or key on field '{field_name}' in type '{type_name}'")]
    InvalidMapField {
        type_name: String,
        field_name: String,
    },
}

/// Errors from the binary encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The output buffer is exhausted; retry with a larger one.
    #[error("encode buffer too small")]
    BufferTooSmall,

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("tag gap before field '{field}' does not fit a header slot")]
    TagGapTooLarge { field: String },

    #[error("encode aborted by callback: {0}")]
    Abort(String),
}

/// Errors from the binary decoder.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid utf-8 string in field '{field}': {source}")]
    InvalidUtf8 {
        field: String,
        source: std::string::FromUtf8Error,
    },

    #[error("decode aborted by callback: {0}")]
    Abort(String),
}

/// Errors from the pack/unpack compression.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid packed data: {0}")]
    InvalidData(String),
}

/// Top-level error type that wraps all sub-errors.
#[derive(Debug, thiserror::Error)]
pub enum SprotoError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Pack(#[from] PackError),
}

/// Result type alias for sproto operations.
pub type Result<T> = std::result::Result<T, SprotoError>;
