//! The terminal grid: a ring of rows with a sliding viewport.
//!
//! The ring holds `ring_rows` rows, of which `screen_rows` are on screen;
//! the remainder is scrollback. `offset` is the ring index of the logical
//! top screen row, so logical row `r` lives at `(offset + r) % ring_rows`.
//! Full-screen scrolling is a ring-offset bump: the rows that fall off the
//! top become the newest scrollback, and the recycled slots at the bottom
//! are reset in place. Rows are never reallocated by scrolling, so a ring
//! index is a stable address for anchored content (sixels, selection).
//!
//! `view` is the ring index of the *displayed* top row; it equals `offset`
//! unless the user has rewound into scrollback.

use crate::cell::{Attributes, Cell, WIDE_SPACER};
use crate::damage::{Damage, DamageKind, ScrollRegion};
use crate::image::SixelImage;
use crate::link::LinkRegistry;
use crate::row::Row;

/// A cell position. Whether `row` is logical (screen-relative) or
/// ring-absolute depends on context; conversion goes through
/// [`Grid::rel_to_abs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Cursor: logical position plus the deferred-wrap latch.
///
/// `lcf` (last-column flag) is set instead of advancing when a print lands
/// in the last column; the next printable triggers the actual wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub point: Coord,
    pub lcf: bool,
}

#[derive(Debug, Clone)]
pub struct Grid {
    rows: Vec<Row>,
    ring_rows: usize,
    screen_rows: usize,
    cols: usize,
    offset: usize,
    view: usize,
    /// Valid scrollback rows accumulated so far.
    scrollback_len: usize,

    pub cursor: Cursor,
    pub saved_cursor: Cursor,

    scroll_damage: Vec<Damage>,
    sixel_images: Vec<SixelImage>,
}

impl Grid {
    /// A grid with `screen_rows` visible rows and `scrollback_rows` of ring
    /// capacity behind them. All rows are allocated up front and recycled
    /// forever.
    #[must_use]
    pub fn new(cols: usize, screen_rows: usize, scrollback_rows: usize) -> Self {
        let ring_rows = (screen_rows + scrollback_rows).max(1);
        Self {
            rows: (0..ring_rows).map(|_| Row::new(cols)).collect(),
            ring_rows,
            screen_rows,
            cols,
            offset: 0,
            view: 0,
            scrollback_len: 0,
            cursor: Cursor::default(),
            saved_cursor: Cursor::default(),
            scroll_damage: Vec::new(),
            sixel_images: Vec::new(),
        }
    }

    // ── Geometry ────────────────────────────────────────────────────

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn screen_rows(&self) -> usize {
        self.screen_rows
    }

    #[must_use]
    pub fn ring_rows(&self) -> usize {
        self.ring_rows
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn view(&self) -> usize {
        self.view
    }

    #[must_use]
    pub fn scrollback_len(&self) -> usize {
        self.scrollback_len
    }

    /// Ring index of logical (screen-relative) row `r`.
    #[must_use]
    pub fn rel_to_abs(&self, r: usize) -> usize {
        (self.offset + r) % self.ring_rows
    }

    /// Ring index of view-relative row `r`.
    #[must_use]
    pub fn view_to_abs(&self, r: usize) -> usize {
        (self.view + r) % self.ring_rows
    }

    /// How many rows the view has been rewound behind the live offset.
    #[must_use]
    pub fn view_behind(&self) -> usize {
        (self.offset + self.ring_rows - self.view) % self.ring_rows
    }

    /// Linearize a ring-absolute row into the content stream:
    /// `0` is the oldest scrollback row, `scrollback_len + screen_rows - 1`
    /// the bottom screen row. `None` for slots holding no live content.
    #[must_use]
    pub fn stream_of_abs(&self, abs: usize) -> Option<usize> {
        let ahead = (abs + self.ring_rows - self.offset) % self.ring_rows;
        if ahead < self.screen_rows {
            Some(self.scrollback_len + ahead)
        } else if ahead >= self.ring_rows - self.scrollback_len {
            Some(ahead - (self.ring_rows - self.scrollback_len))
        } else {
            None
        }
    }

    /// Inverse of [`Self::stream_of_abs`].
    #[must_use]
    pub fn abs_of_stream(&self, stream: usize) -> Option<usize> {
        if stream >= self.scrollback_len + self.screen_rows {
            return None;
        }
        let abs = (self.offset + self.ring_rows + stream - self.scrollback_len)
            % self.ring_rows;
        Some(abs)
    }

    // ── Row access ──────────────────────────────────────────────────

    #[must_use]
    pub fn row(&self, r: usize) -> &Row {
        &self.rows[self.rel_to_abs(r)]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut Row {
        let idx = self.rel_to_abs(r);
        &mut self.rows[idx]
    }

    #[must_use]
    pub fn abs_row(&self, abs: usize) -> &Row {
        &self.rows[abs % self.ring_rows]
    }

    pub fn abs_row_mut(&mut self, abs: usize) -> &mut Row {
        let idx = abs % self.ring_rows;
        &mut self.rows[idx]
    }

    /// The row under the cursor.
    pub fn cur_row_mut(&mut self) -> &mut Row {
        self.row_mut(self.cursor.point.row)
    }

    // ── Damage ──────────────────────────────────────────────────────

    fn push_damage(&mut self, kind: DamageKind, region: ScrollRegion, lines: usize) {
        let record = Damage {
            kind,
            region,
            lines,
        };
        if let Some(last) = self.scroll_damage.last_mut()
            && last.absorb(&record)
        {
            return;
        }
        self.scroll_damage.push(record);
    }

    /// Drain accumulated scroll records (renderer side).
    pub fn take_damage(&mut self) -> Vec<Damage> {
        std::mem::take(&mut self.scroll_damage)
    }

    #[must_use]
    pub fn pending_damage(&self) -> &[Damage] {
        &self.scroll_damage
    }

    /// Mark every visible row dirty (reverse-video toggle, palette swap).
    pub fn damage_all(&mut self) {
        for r in 0..self.screen_rows {
            self.row_mut(r).dirty = true;
        }
        self.scroll_damage.clear();
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll `region` up by `lines`. A full-screen region bumps the ring
    /// offset (growing scrollback); a partial region rotates rows in place.
    /// Recycled rows release their hyperlink spans through `links`.
    pub fn scroll_up(
        &mut self,
        region: ScrollRegion,
        lines: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        let lines = lines.min(region.len());
        if lines == 0 || region.is_empty() {
            return;
        }
        let in_view = self.view != self.offset;

        if region.start == 0 && region.end == self.screen_rows {
            self.offset = (self.offset + lines) % self.ring_rows;
            let capacity = self.ring_rows - self.screen_rows;
            self.scrollback_len = (self.scrollback_len + lines).min(capacity);

            // Recycled slots: the new bottom rows.
            for r in self.screen_rows - lines..self.screen_rows {
                let abs = self.rel_to_abs(r);
                self.drop_sixels_on_abs(abs);
                let cols = self.cols;
                self.rows[abs].reset_with_width(cols, attrs, links);
            }

            if in_view {
                // Keep the rewound view pinned to content, clamped to what
                // scrollback still holds.
                let max_behind = self.scrollback_len;
                if self.view_behind() > max_behind {
                    self.view =
                        (self.offset + self.ring_rows - max_behind) % self.ring_rows;
                }
            } else {
                self.view = self.offset;
            }
        } else {
            self.rotate_region(region, lines, attrs, links, false);
        }

        let kind = if in_view {
            DamageKind::ScrollInView
        } else {
            DamageKind::Scroll
        };
        self.push_damage(kind, region, lines);
    }

    /// Scroll `region` down by `lines` (reverse index / IL at the top).
    pub fn scroll_down(
        &mut self,
        region: ScrollRegion,
        lines: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        let lines = lines.min(region.len());
        if lines == 0 || region.is_empty() {
            return;
        }
        let in_view = self.view != self.offset;

        if region.start == 0 && region.end == self.screen_rows {
            self.offset = (self.offset + self.ring_rows - lines) % self.ring_rows;
            // The freshest scrollback rows were consumed as the new top.
            self.scrollback_len = self.scrollback_len.saturating_sub(lines);

            for r in 0..lines {
                let abs = self.rel_to_abs(r);
                self.drop_sixels_on_abs(abs);
                let cols = self.cols;
                self.rows[abs].reset_with_width(cols, attrs, links);
            }

            if !in_view || self.view_behind() > self.scrollback_len {
                self.view = self.offset;
            }
        } else {
            self.rotate_region(region, lines, attrs, links, true);
        }

        let kind = if in_view {
            DamageKind::ScrollReverseInView
        } else {
            DamageKind::ScrollReverse
        };
        self.push_damage(kind, region, lines);
    }

    /// Rotate the rows of a partial scroll region in place.
    fn rotate_region(
        &mut self,
        region: ScrollRegion,
        lines: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
        reverse: bool,
    ) {
        let slots: Vec<usize> = (region.start..region.end)
            .map(|r| self.rel_to_abs(r))
            .collect();
        let mut taken: Vec<Row> = slots
            .iter()
            .map(|&i| std::mem::take(&mut self.rows[i]))
            .collect();
        if reverse {
            taken.rotate_right(lines);
        } else {
            taken.rotate_left(lines);
        }
        for (&slot, row) in slots.iter().zip(taken) {
            self.rows[slot] = row;
        }

        // Blank the vacated rows and drop images the rotation garbled.
        let vacated = if reverse {
            region.start..region.start + lines
        } else {
            region.end - lines..region.end
        };
        for r in vacated {
            let abs = self.rel_to_abs(r);
            let cols = self.cols;
            self.rows[abs].reset_with_width(cols, attrs, links);
        }
        for r in region.start..region.end {
            let abs = self.rel_to_abs(r);
            self.drop_sixels_on_abs(abs);
            self.rows[abs].dirty = true;
        }
    }

    // ── View (scrollback rewind) ────────────────────────────────────

    /// Rewind the view `lines` further into scrollback.
    pub fn view_up(&mut self, lines: usize) {
        let behind = (self.view_behind() + lines).min(self.scrollback_len);
        self.view = (self.offset + self.ring_rows - behind) % self.ring_rows;
    }

    /// Move the view `lines` back toward the live offset.
    pub fn view_down(&mut self, lines: usize) {
        let behind = self.view_behind().saturating_sub(lines);
        self.view = (self.offset + self.ring_rows - behind) % self.ring_rows;
    }

    /// Snap the view back to the live grid.
    pub fn reset_view(&mut self) {
        self.view = self.offset;
    }

    // ── Cell editing ────────────────────────────────────────────────

    /// Write a code point (scalar or composed sentinel) of the given column
    /// width at `(row, col)`, fixing up any wide glyph it overlaps.
    /// `width` must be 1 or 2; a 2-wide write that does not fit is ignored.
    pub fn write_cp(
        &mut self,
        row: usize,
        col: usize,
        cp: u32,
        width: usize,
        attrs: Attributes,
    ) {
        if row >= self.screen_rows || col >= self.cols {
            return;
        }
        if width == 2 && col + 1 >= self.cols {
            return;
        }
        let cols = self.cols;
        let row_ref = self.row_mut(row);

        // Overwriting the trailing half of a wide glyph orphans its head.
        if col > 0 && row_ref.cells[col].is_spacer() {
            row_ref.cells[col - 1].erase(attrs);
        }
        // Overwriting a wide head orphans its spacer.
        if col + 1 < cols && row_ref.cells[col + 1].is_spacer() {
            row_ref.cells[col + 1].erase(attrs);
        }

        row_ref.cells[col] = Cell { cp, attrs };
        if width == 2 {
            // The write target may itself have been a wide head whose
            // spacer sits at col+2.
            if col + 2 < cols && row_ref.cells[col + 2].is_spacer() {
                row_ref.cells[col + 2].erase(attrs);
            }
            row_ref.cells[col + 1] = Cell {
                cp: WIDE_SPACER,
                attrs,
            };
        }
        row_ref.dirty = true;
    }

    /// Erase all cells between `start` and `end` inclusive (logical
    /// coordinates, row-major order), releasing covered hyperlink spans.
    pub fn erase_cells(
        &mut self,
        start: Coord,
        end: Coord,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        if start > end {
            return;
        }
        let last_row = end.row.min(self.screen_rows.saturating_sub(1));
        for r in start.row..=last_row {
            let from = if r == start.row { start.col } else { 0 };
            let to = if r == end.row {
                (end.col + 1).min(self.cols)
            } else {
                self.cols
            };
            if from >= to {
                continue;
            }
            let abs = self.rel_to_abs(r);
            self.drop_sixels_on_abs(abs);
            let row = self.row_mut(r);
            for cell in &mut row.cells[from..to] {
                cell.erase(attrs);
            }
            row.dirty = true;
            row.clear_links(from, to, links);
        }
    }

    /// ICH: insert `count` blanks at `(row, col)`, shifting right.
    pub fn insert_chars(
        &mut self,
        row: usize,
        col: usize,
        count: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        if row >= self.screen_rows || col >= self.cols || count == 0 {
            return;
        }
        let cols = self.cols;
        let n = count.min(cols - col);
        let row_ref = self.row_mut(row);

        if row_ref.cells[col].is_spacer() && col > 0 {
            row_ref.cells[col - 1].erase(attrs);
        }
        for i in (col + n..cols).rev() {
            row_ref.cells[i] = row_ref.cells[i - n];
        }
        for cell in &mut row_ref.cells[col..col + n] {
            cell.erase(attrs);
        }
        // A wide head shifted into the last column lost its spacer.
        if row_ref.cells[cols - 1].cp != WIDE_SPACER
            && cols >= 2
            && row_ref.cells[cols - 1].ch().map(Cell::display_width) == Some(2)
        {
            row_ref.cells[cols - 1].erase(attrs);
        }
        // An orphaned spacer right of the inserted gap.
        if col + n < cols && row_ref.cells[col + n].is_spacer() {
            row_ref.cells[col + n].erase(attrs);
        }
        row_ref.dirty = true;
        // Shifting invalidates span bookkeeping for the row tail.
        row_ref.clear_links(col, cols, links);
    }

    /// DCH: delete `count` cells at `(row, col)`, shifting left and
    /// blanking the vacated tail.
    pub fn delete_chars(
        &mut self,
        row: usize,
        col: usize,
        count: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        if row >= self.screen_rows || col >= self.cols || count == 0 {
            return;
        }
        let cols = self.cols;
        let n = count.min(cols - col);
        let row_ref = self.row_mut(row);

        if row_ref.cells[col].is_spacer() && col > 0 {
            row_ref.cells[col - 1].erase(attrs);
        }
        for i in col..cols - n {
            row_ref.cells[i] = row_ref.cells[i + n];
        }
        for cell in &mut row_ref.cells[cols - n..] {
            cell.erase(attrs);
        }
        if row_ref.cells[col].is_spacer() {
            row_ref.cells[col].erase(attrs);
        }
        row_ref.dirty = true;
        row_ref.clear_links(col, cols, links);
    }

    /// Blank the whole visible screen.
    pub fn reset_screen(&mut self, attrs: Attributes, links: &mut LinkRegistry) {
        if self.screen_rows == 0 || self.cols == 0 {
            return;
        }
        self.erase_cells(
            Coord::new(0, 0),
            Coord::new(self.screen_rows - 1, self.cols - 1),
            attrs,
            links,
        );
    }

    /// Drop all scrollback content (ED 3), releasing its hyperlink spans.
    /// The visible screen is untouched.
    pub fn clear_scrollback(&mut self, links: &mut LinkRegistry) {
        for stream in 0..self.scrollback_len {
            if let Some(abs) = self.abs_of_stream(stream) {
                self.rows[abs].clear_all_links(links);
            }
        }
        self.scrollback_len = 0;
        self.view = self.offset;
    }

    /// Release every hyperlink reference this grid's rows hold. Used when
    /// the grid is about to be dropped wholesale (resize, hard reset).
    pub fn release_all_links(&self, links: &mut LinkRegistry) {
        for row in &self.rows {
            for span in row.link_spans() {
                links.release_id(span.id);
            }
        }
    }

    // ── Sixel images ────────────────────────────────────────────────

    pub fn add_sixel(&mut self, image: SixelImage) {
        self.sixel_images.push(image);
    }

    #[must_use]
    pub fn sixels(&self) -> &[SixelImage] {
        &self.sixel_images
    }

    fn drop_sixels_on_abs(&mut self, abs: usize) {
        let ring = self.ring_rows;
        self.sixel_images
            .retain(|img| !img.covers_row(abs, ring));
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// A resized copy. Width changes truncate or blank-extend each row
    /// (no reflow); height changes shuffle rows between the screen and
    /// scrollback, bottom-aligning existing content.
    ///
    /// Kept rows take fresh hyperlink references; the caller still owns the
    /// old grid's references and releases them via
    /// [`Self::release_all_links`] before dropping it.
    #[must_use]
    pub fn resized(
        &self,
        new_cols: usize,
        new_screen_rows: usize,
        new_scrollback_rows: usize,
        links: &mut LinkRegistry,
    ) -> Grid {
        let mut out = Grid::new(new_cols, new_screen_rows, new_scrollback_rows);
        let content = self.scrollback_len + self.screen_rows;
        let keep = content.min(new_screen_rows + new_scrollback_rows);

        // Copy the newest `keep` rows, oldest first. Logical indices run
        // from -scrollback_len (oldest) to screen_rows-1 (bottom).
        let mut kept: Vec<Row> = Vec::with_capacity(keep);
        for i in content - keep..content {
            let abs = (self.offset + self.ring_rows - self.scrollback_len + i)
                % self.ring_rows;
            let mut row = self.rows[abs].clone();
            row.cells.resize(new_cols, Cell::default());
            row.truncate_links(new_cols);
            row.acquire_links(links);
            row.dirty = true;
            kept.push(row);
        }

        let on_screen = keep.min(new_screen_rows);
        let in_scrollback = keep - on_screen;
        out.scrollback_len = in_scrollback;
        out.offset = in_scrollback % out.ring_rows;
        out.view = out.offset;

        for (i, row) in kept.into_iter().enumerate() {
            let abs = i % out.ring_rows;
            out.rows[abs] = row;
        }
        out
    }

    // ── Test / debug helpers ────────────────────────────────────────

    /// Text of a visible row (sentinels rendered as spaces, blanks as
    /// spaces), trailing blanks trimmed.
    #[must_use]
    pub fn row_text(&self, r: usize) -> String {
        let mut s = String::new();
        for cell in &self.row(r).cells {
            if cell.is_spacer() {
                continue;
            }
            s.push(cell.ch().unwrap_or(' '));
        }
        while s.ends_with(' ') {
            s.pop();
        }
        s
    }
}
