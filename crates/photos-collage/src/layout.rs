//! Grid arithmetic.

use crate::error::{CollageError, Result};

pub const CELL_WIDTH: u32 = 2000;
pub const CELL_HEIGHT: u32 = 1200;

/// A near-square grid: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
///
/// Construction checks that the whole canvas fits in `u32` pixels, so the
/// per-cell arithmetic below cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub count: u32,
    pub cols: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    width: u32,
    height: u32,
}

impl GridLayout {
    pub fn for_count(count: usize, cell_width: u32, cell_height: u32) -> Result<Self> {
        if count == 0 {
            return Err(CollageError::Empty);
        }
        let cols = ceil_sqrt(count);
        let rows = count.div_ceil(cols);
        let out_of_range = || CollageError::CanvasSize {
            cols,
            rows,
            cell_width,
            cell_height,
        };
        if cell_width == 0 || cell_height == 0 {
            return Err(out_of_range());
        }

        let count = u32::try_from(count).map_err(|_| out_of_range())?;
        let cols_px = u32::try_from(cols).map_err(|_| out_of_range())?;
        let rows_px = u32::try_from(rows).map_err(|_| out_of_range())?;
        let width = cols_px.checked_mul(cell_width).ok_or_else(out_of_range)?;
        let height = rows_px.checked_mul(cell_height).ok_or_else(out_of_range)?;

        Ok(Self {
            count,
            cols: cols_px,
            rows: rows_px,
            cell_width,
            cell_height,
            width,
            height,
        })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Top-left corner of cell `index`, filled row by row. `None` past the last image.
    pub fn cell_origin(&self, index: usize) -> Option<(u32, u32)> {
        let index = u32::try_from(index).ok().filter(|i| *i < self.count)?;
        Some((
            (index % self.cols) * self.cell_width,
            (index / self.cols) * self.cell_height,
        ))
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = (n as f64).sqrt() as usize;
    while root * root < n {
        root += 1;
    }
    while root > 1 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shapes() {
        let shape = |n| {
            let layout = GridLayout::for_count(n, CELL_WIDTH, CELL_HEIGHT).unwrap();
            (layout.cols, layout.rows)
        };
        assert_eq!(shape(1), (1, 1));
        assert_eq!(shape(2), (2, 1));
        assert_eq!(shape(3), (2, 2));
        assert_eq!(shape(4), (2, 2));
        assert_eq!(shape(5), (3, 2));
        assert_eq!(shape(9), (3, 3));
        assert_eq!(shape(10), (4, 3));
    }

    #[test]
    fn test_cell_origins() {
        let layout = GridLayout::for_count(5, CELL_WIDTH, CELL_HEIGHT).unwrap();
        assert_eq!(layout.canvas_size(), (6000, 2400));
        assert_eq!(layout.cell_origin(0), Some((0, 0)));
        assert_eq!(layout.cell_origin(2), Some((4000, 0)));
        assert_eq!(layout.cell_origin(3), Some((0, 1200)));
        assert_eq!(layout.cell_origin(4), Some((2000, 1200)));
        assert_eq!(layout.cell_origin(5), None);
    }

    #[test]
    fn test_oversized_canvas_is_rejected() {
        // 2 columns of u32::MAX pixels do not fit.
        assert!(matches!(
            GridLayout::for_count(2, u32::MAX, CELL_HEIGHT),
            Err(CollageError::CanvasSize { cols: 2, rows: 1, .. })
        ));
        assert!(matches!(
            GridLayout::for_count(3, CELL_WIDTH, u32::MAX / 2 + 1),
            Err(CollageError::CanvasSize { .. })
        ));
        assert!(matches!(
            GridLayout::for_count(1, 0, CELL_HEIGHT),
            Err(CollageError::CanvasSize { .. })
        ));
        // A single cell may use the full range.
        let layout = GridLayout::for_count(1, u32::MAX, 1).unwrap();
        assert_eq!(layout.canvas_size(), (u32::MAX, 1));
    }

    #[test]
    fn test_empty_is_rejected() {
        assert!(matches!(
            GridLayout::for_count(0, CELL_WIDTH, CELL_HEIGHT),
            Err(CollageError::Empty)
        ));
    }
}
