/// Error types for SAR processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Block {block:?} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        block: Vec<usize>,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Cast error: {0}")]
    Cast(String),

    #[error("Slice {start}..{stop} out of range for coordinate '{dim}' of length {len}")]
    IndexOutOfRange {
        dim: String,
        start: usize,
        stop: usize,
        len: usize,
    },

    #[error("Missing coordinate: {0}")]
    MissingCoordinate(String),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
