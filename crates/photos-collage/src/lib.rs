//! photos-collage: lay photos out on a near-square grid.
//!
//! Each image is scaled to fit its cell without changing its aspect ratio
//! and pasted onto an RGB canvas. Inputs and output may be local files or
//! `gs://` storage references.

pub mod error;
pub mod layout;
pub mod render;
pub mod source;

pub use error::{CollageError, Result};
pub use layout::{GridLayout, CELL_HEIGHT, CELL_WIDTH};
pub use render::{compose, decode, encode, output_target, DEFAULT_EXTENSION};
pub use source::ImageLocation;
