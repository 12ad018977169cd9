//! Thumbnailing and pasting images onto the collage canvas.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops;
use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbImage};

use crate::error::{CollageError, Result};
use crate::layout::GridLayout;

pub const DEFAULT_EXTENSION: &str = "jpg";
const JPEG_QUALITY: u8 = 90;

/// Paste each image into its cell, scaled to fit and centered.
///
/// Unused cells stay black.
pub fn compose(images: &[DynamicImage], cell_width: u32, cell_height: u32) -> Result<RgbImage> {
    let layout = GridLayout::for_count(images.len(), cell_width, cell_height)?;
    let (width, height) = layout.canvas_size();
    let mut canvas = RgbImage::new(width, height);

    for (index, image) in images.iter().enumerate() {
        let thumb = image.thumbnail(cell_width, cell_height).to_rgb8();
        let Some((x, y)) = layout.cell_origin(index) else {
            break;
        };
        let x = x + cell_width.saturating_sub(thumb.width()) / 2;
        let y = y + cell_height.saturating_sub(thumb.height()) / 2;
        imageops::overlay(&mut canvas, &thumb, i64::from(x), i64::from(y));
    }

    tracing::debug!(images = images.len(), cols = layout.cols, rows = layout.rows, "Composed collage");
    Ok(canvas)
}

/// Output name with the default extension applied, and its format.
pub fn output_target(name: &str) -> Result<(String, ImageFormat)> {
    let path = Path::new(name);
    let name = match path.extension() {
        Some(_) => name.to_string(),
        None => format!("{name}.{DEFAULT_EXTENSION}"),
    };
    let format = ImageFormat::from_path(PathBuf::from(&name))
        .map_err(|_| CollageError::UnsupportedFormat(name.clone()))?;
    Ok((name, format))
}

pub fn encode(canvas: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let output = match format {
        ImageFormat::Jpeg => ImageOutputFormat::Jpeg(JPEG_QUALITY),
        other => ImageOutputFormat::from(other),
    };
    if let ImageOutputFormat::Unsupported(name) = &output {
        return Err(CollageError::UnsupportedFormat(name.clone()));
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(canvas.clone()).write_to(&mut Cursor::new(&mut bytes), output)?;
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}
