//! Decoded sixel rasters pinned to the grid.

use crate::grid::Coord;

/// A decoded sixel image anchored at a cell coordinate.
///
/// `pos.row` is a ring-absolute row index: the image stays with its content
/// as the viewport scrolls, and dies when the ring recycles its anchor row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SixelImage {
    /// Premultiplied ARGB pixels, row-major, `width * height` entries.
    pub data: Vec<u32>,
    /// Pixel dimensions.
    pub width: usize,
    pub height: usize,
    /// Cell dimensions (`ceil(pixels / cell size)`), fixed at attach time.
    pub cols: usize,
    pub rows: usize,
    /// Anchor: ring-absolute row, viewport column.
    pub pos: Coord,
}

impl SixelImage {
    /// Ring-absolute rows `[first, last]` covered by this image.
    #[must_use]
    pub fn row_span(&self, ring_rows: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows).map(move |i| (self.pos.row + i) % ring_rows)
    }

    /// Whether the image covers the given ring-absolute row.
    #[must_use]
    pub fn covers_row(&self, abs_row: usize, ring_rows: usize) -> bool {
        self.row_span(ring_rows).any(|r| r == abs_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(row: usize, rows: usize) -> SixelImage {
        SixelImage {
            data: Vec::new(),
            width: 12,
            height: 12,
            cols: 2,
            rows,
            pos: Coord { row, col: 0 },
        }
    }

    #[test]
    fn row_span_wraps_ring() {
        let img = image(9, 3);
        let rows: Vec<usize> = img.row_span(10).collect();
        assert_eq!(rows, vec![9, 0, 1]);
    }

    #[test]
    fn covers_row_respects_wrap() {
        let img = image(9, 3);
        assert!(img.covers_row(9, 10));
        assert!(img.covers_row(0, 10));
        assert!(!img.covers_row(2, 10));
    }
}
