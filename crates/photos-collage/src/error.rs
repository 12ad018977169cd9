//! Error types for collage rendering.

use thiserror::Error;

use photos_blob::BlobError;

#[derive(Debug, Error)]
pub enum CollageError {
    #[error("A collage needs at least one image")]
    Empty,

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Canvas of {cols}x{rows} cells at {cell_width}x{cell_height} pixels is out of range")]
    CanvasSize {
        cols: usize,
        rows: usize,
        cell_width: u32,
        cell_height: u32,
    },

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Blob(#[from] BlobError),
}

pub type Result<T> = std::result::Result<T, CollageError>;
