//! Selection model and copy extraction.
//!
//! Selection coordinates are ring-absolute row indices, so a selection
//! sticks to its content while the grid scrolls underneath it. Ordering
//! and extraction linearize through [`Grid::stream_of_abs`].

use crate::cell::Highlight;
use crate::composed::ComposedTable;
use crate::grid::{Coord, Grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionKind {
    #[default]
    None,
    /// Cell range wrapping across row boundaries.
    Char,
    /// Rectangular region.
    Block,
    /// Char-wise, endpoints snapped to word boundaries.
    Word,
    /// Char-wise, endpoints snapped to whole lines.
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionDirection {
    #[default]
    Undir,
    Forward,
    Backward,
}

/// An in-progress or finished selection over the grid + scrollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub kind: SelectionKind,
    pub direction: SelectionDirection,
    /// Anchor (where the drag started), ring-absolute row.
    pub start: Coord,
    /// Moving end, ring-absolute row.
    pub end: Coord,
    /// The user is still dragging.
    pub ongoing: bool,
}

impl Selection {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.kind, SelectionKind::None)
    }

    /// Begin a drag at `anchor` (ring-absolute).
    pub fn begin(&mut self, kind: SelectionKind, anchor: Coord) {
        self.kind = kind;
        self.direction = SelectionDirection::Undir;
        self.start = anchor;
        self.end = anchor;
        self.ongoing = true;
    }

    /// Move the drag end to `pos` (ring-absolute).
    pub fn update(&mut self, grid: &Grid, pos: Coord) {
        self.end = pos;
        let (Some(s), Some(e)) = (
            grid.stream_of_abs(self.start.row),
            grid.stream_of_abs(pos.row),
        ) else {
            return;
        };
        self.direction = match (s, self.start.col).cmp(&(e, pos.col)) {
            std::cmp::Ordering::Less => SelectionDirection::Forward,
            std::cmp::Ordering::Greater => SelectionDirection::Backward,
            std::cmp::Ordering::Equal => SelectionDirection::Undir,
        };
    }

    pub fn finish(&mut self) {
        self.ongoing = false;
    }

    pub fn cancel(&mut self) {
        *self = Self::none();
    }

    /// `(start, end)` in stream coordinates, ordered. `None` when inactive
    /// or when an endpoint's row has been recycled out of the ring.
    #[must_use]
    pub fn stream_span(&self, grid: &Grid) -> Option<(Coord, Coord)> {
        if !self.is_active() {
            return None;
        }
        let a = Coord::new(grid.stream_of_abs(self.start.row)?, self.start.col);
        let b = Coord::new(grid.stream_of_abs(self.end.row)?, self.end.col);
        let (lo, hi) = match self.kind {
            SelectionKind::Block => (
                Coord::new(a.row.min(b.row), a.col.min(b.col)),
                Coord::new(a.row.max(b.row), a.col.max(b.col)),
            ),
            _ => {
                if (a.row, a.col) <= (b.row, b.col) {
                    (a, b)
                } else {
                    (b, a)
                }
            }
        };
        let (lo, hi) = match self.kind {
            SelectionKind::Word => (
                word_start(grid, lo),
                word_end(grid, hi),
            ),
            SelectionKind::Line => (
                Coord::new(lo.row, 0),
                Coord::new(hi.row, grid.cols().saturating_sub(1)),
            ),
            _ => (lo, hi),
        };
        Some((lo, hi))
    }

    /// Whether the cell at stream coordinates is inside the selection.
    #[must_use]
    pub fn contains(&self, grid: &Grid, pos: Coord) -> bool {
        let Some((lo, hi)) = self.stream_span(grid) else {
            return false;
        };
        match self.kind {
            SelectionKind::Block => {
                pos.row >= lo.row
                    && pos.row <= hi.row
                    && pos.col >= lo.col
                    && pos.col <= hi.col
            }
            _ => (lo.row, lo.col) <= (pos.row, pos.col) && (pos.row, pos.col) <= (hi.row, hi.col),
        }
    }

    /// Whether the selection touches any of the logical screen rows
    /// `[first, last]` (used to cancel on overlapping mutation).
    #[must_use]
    pub fn overlaps_screen_rows(&self, grid: &Grid, first: usize, last: usize) -> bool {
        let Some((lo, hi)) = self.stream_span(grid) else {
            return false;
        };
        let base = grid.scrollback_len();
        let lo_row = base + first;
        let hi_row = base + last;
        lo.row <= hi_row && hi.row >= lo_row
    }

    /// Paint/unpaint the [`Highlight::Selection`] state onto covered cells.
    pub fn apply_highlight(&self, grid: &mut Grid) {
        let Some((lo, hi)) = self.stream_span(grid) else {
            return;
        };
        for stream in lo.row..=hi.row {
            let Some(abs) = grid.abs_of_stream(stream) else {
                continue;
            };
            let cols = grid.cols();
            let (from, to) = match self.kind {
                SelectionKind::Block => (lo.col, (hi.col + 1).min(cols)),
                _ => (
                    if stream == lo.row { lo.col } else { 0 },
                    if stream == hi.row {
                        (hi.col + 1).min(cols)
                    } else {
                        cols
                    },
                ),
            };
            let row = grid.abs_row_mut(abs);
            for cell in row.cells.get_mut(from..to).unwrap_or(&mut []) {
                cell.attrs.set_highlight(Highlight::Selection);
            }
            row.dirty = true;
        }
    }

    /// Clear selection highlight everywhere it could have been painted.
    pub fn clear_highlight(grid: &mut Grid) {
        let content = grid.scrollback_len() + grid.screen_rows();
        for stream in 0..content {
            let Some(abs) = grid.abs_of_stream(stream) else {
                continue;
            };
            let row = grid.abs_row_mut(abs);
            let mut touched = false;
            for cell in &mut row.cells {
                if cell.attrs.highlight() == Highlight::Selection {
                    cell.attrs.set_highlight(Highlight::None);
                    touched = true;
                }
            }
            if touched {
                row.dirty = true;
            }
        }
    }

    /// Extract the selected text. Wide spacers are skipped, composed
    /// sentinels expand through `composed`, trailing blanks per row are
    /// trimmed, and rows without a hard linebreak join without a newline.
    #[must_use]
    pub fn extract_text(&self, grid: &Grid, composed: &ComposedTable) -> String {
        let Some((lo, hi)) = self.stream_span(grid) else {
            return String::new();
        };
        let cols = grid.cols();
        let mut out = String::new();
        for stream in lo.row..=hi.row {
            let Some(abs) = grid.abs_of_stream(stream) else {
                continue;
            };
            let row = grid.abs_row(abs);
            let (from, to) = match self.kind {
                SelectionKind::Block => (lo.col, (hi.col + 1).min(cols)),
                _ => (
                    if stream == lo.row { lo.col } else { 0 },
                    if stream == hi.row {
                        (hi.col + 1).min(cols)
                    } else {
                        cols
                    },
                ),
            };
            let mut line = String::new();
            for cell in row.cells.get(from..to).unwrap_or(&[]) {
                if cell.is_spacer() {
                    continue;
                }
                if let Some(index) = cell.composed_index() {
                    if let Some(chain) = composed.get(index) {
                        line.push(chain.base);
                        line.extend(chain.marks());
                    }
                } else {
                    line.push(cell.ch().unwrap_or(' '));
                }
            }
            while line.ends_with(' ') {
                line.pop();
            }
            out.push_str(&line);
            if stream != hi.row
                && (matches!(self.kind, SelectionKind::Block) || row.linebreak)
            {
                out.push('\n');
            }
        }
        out
    }
}

// ── Word boundaries ─────────────────────────────────────────────────

/// Default word-delimiter set (overridable by the host's configuration).
pub const DEFAULT_WORD_DELIMITERS: &str = ",│`|:\"'()[]{}<>";

fn is_word_cell(grid: &Grid, stream_row: usize, col: usize) -> bool {
    let Some(abs) = grid.abs_of_stream(stream_row) else {
        return false;
    };
    let Some(cell) = grid.abs_row(abs).cells.get(col) else {
        return false;
    };
    // Composed cells are letter-bearing; spacers follow their wide head.
    if cell.is_composed() {
        return true;
    }
    if cell.is_spacer() {
        return col > 0 && is_word_cell(grid, stream_row, col - 1);
    }
    match cell.ch() {
        Some(ch) => !ch.is_whitespace() && !DEFAULT_WORD_DELIMITERS.contains(ch),
        None => false,
    }
}

fn word_start(grid: &Grid, pos: Coord) -> Coord {
    if !is_word_cell(grid, pos.row, pos.col) {
        return pos;
    }
    let mut col = pos.col;
    while col > 0 && is_word_cell(grid, pos.row, col - 1) {
        col -= 1;
    }
    Coord::new(pos.row, col)
}

fn word_end(grid: &Grid, pos: Coord) -> Coord {
    if !is_word_cell(grid, pos.row, pos.col) {
        return pos;
    }
    let cols = grid.cols();
    let mut col = pos.col;
    while col + 1 < cols && is_word_cell(grid, pos.row, col + 1) {
        col += 1;
    }
    Coord::new(pos.row, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Attributes;
    use crate::damage::ScrollRegion;
    use crate::link::LinkRegistry;

    fn grid_with(lines: &[&str]) -> Grid {
        let cols = lines.iter().map(|l| l.len()).max().unwrap_or(1).max(1);
        let mut grid = Grid::new(cols, lines.len().max(1), 8);
        for (r, line) in lines.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                grid.write_cp(r, c, ch as u32, 1, Attributes::new());
            }
            grid.row_mut(r).linebreak = true;
        }
        grid
    }

    fn abs(grid: &Grid, row: usize, col: usize) -> Coord {
        Coord::new(grid.rel_to_abs(row), col)
    }

    #[test]
    fn char_selection_extracts_across_rows() {
        let grid = grid_with(&["hello", "world"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 0, 3));
        sel.update(&grid, abs(&grid, 1, 1));
        assert_eq!(sel.direction, SelectionDirection::Forward);
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "lo\nwo");
    }

    #[test]
    fn backward_drag_normalizes() {
        let grid = grid_with(&["hello", "world"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 1, 1));
        sel.update(&grid, abs(&grid, 0, 3));
        assert_eq!(sel.direction, SelectionDirection::Backward);
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "lo\nwo");
    }

    #[test]
    fn block_selection_is_rectangular() {
        let grid = grid_with(&["abcde", "fghij", "klmno"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Block, abs(&grid, 0, 1));
        sel.update(&grid, abs(&grid, 2, 3));
        assert_eq!(
            sel.extract_text(&grid, &ComposedTable::new()),
            "bcd\nghi\nlmn"
        );
    }

    #[test]
    fn word_selection_expands_to_boundaries() {
        let grid = grid_with(&["see /usr/bin/env here"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Word, abs(&grid, 0, 6));
        sel.update(&grid, abs(&grid, 0, 6));
        assert_eq!(
            sel.extract_text(&grid, &ComposedTable::new()),
            "/usr/bin/env"
        );
    }

    #[test]
    fn word_selection_respects_delimiters() {
        let grid = grid_with(&["foo(bar)baz"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Word, abs(&grid, 0, 5));
        sel.update(&grid, abs(&grid, 0, 5));
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "bar");
    }

    #[test]
    fn line_selection_takes_full_rows() {
        let grid = grid_with(&["first", "second"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Line, abs(&grid, 0, 3));
        sel.update(&grid, abs(&grid, 0, 3));
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "first");
    }

    #[test]
    fn soft_wrapped_rows_join_without_newline() {
        let mut grid = grid_with(&["abc", "def"]);
        grid.row_mut(0).linebreak = false; // row 0 wrapped into row 1
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 0, 0));
        sel.update(&grid, abs(&grid, 1, 2));
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "abcdef");
    }

    #[test]
    fn selection_sticks_to_content_through_scroll() {
        let mut grid = grid_with(&["one", "two", "three"]);
        let mut links = LinkRegistry::new();
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 0, 0));
        sel.update(&grid, abs(&grid, 0, 2));
        grid.scroll_up(
            ScrollRegion::new(0, grid.screen_rows()),
            1,
            Attributes::new(),
            &mut links,
        );
        // "one" is now in scrollback but still selected.
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "one");
    }

    #[test]
    fn stream_span_stays_put_while_scrollback_grows() {
        let mut grid = grid_with(&["one", "two", "three"]);
        let mut links = LinkRegistry::new();
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 1, 0));
        sel.update(&grid, abs(&grid, 1, 2));
        let before = sel.stream_span(&grid).unwrap();
        for _ in 0..3 {
            grid.scroll_up(
                ScrollRegion::new(0, grid.screen_rows()),
                1,
                Attributes::new(),
                &mut links,
            );
        }
        // Scrollback absorbed the rows above; the span's stream position
        // is unchanged and still reads the same text.
        assert_eq!(sel.stream_span(&grid), Some(before));
        assert_eq!(sel.extract_text(&grid, &ComposedTable::new()), "two");
    }

    #[test]
    fn overlap_detection_in_screen_rows() {
        let grid = grid_with(&["aaa", "bbb", "ccc"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 1, 0));
        sel.update(&grid, abs(&grid, 1, 2));
        assert!(sel.overlaps_screen_rows(&grid, 0, 1));
        assert!(sel.overlaps_screen_rows(&grid, 1, 1));
        assert!(!sel.overlaps_screen_rows(&grid, 2, 2));
    }

    #[test]
    fn highlight_apply_and_clear() {
        let mut grid = grid_with(&["abcd"]);
        let mut sel = Selection::none();
        sel.begin(SelectionKind::Char, abs(&grid, 0, 1));
        sel.update(&grid, abs(&grid, 0, 2));
        sel.apply_highlight(&mut grid);
        assert_eq!(
            grid.row(0).cells[1].attrs.highlight(),
            Highlight::Selection
        );
        assert_eq!(grid.row(0).cells[0].attrs.highlight(), Highlight::None);
        Selection::clear_highlight(&mut grid);
        assert_eq!(grid.row(0).cells[1].attrs.highlight(), Highlight::None);
    }
}
