//! Terminal state and the operations the dispatcher drives.
//!
//! [`Term`] owns both grids (normal with scrollback, alternate without),
//! the mode flags, charsets, tab stops, colors, the parser state, and the
//! outbound write/event queues. All byte interpretation enters through
//! [`Term::feed`].

use std::collections::{BTreeSet, VecDeque};

use petrel_core::{
    Attributes, Cell, ComposeOutcome, ComposedTable, Coord, Grid, LinkId, LinkRegistry,
    ScrollRegion, Selection, SelectionKind,
};
use tracing::{debug, warn};

use crate::dcs::DcsState;
use crate::events::TermEvent;
use crate::params::Params;
use crate::parser::State;
use crate::pty::PtyQueue;

/// Optional hook into the font layer: replace base+mark with a precomposed
/// glyph when the font provides one of equal column width.
pub type PrecomposeFn = fn(base: char, mark: char) -> Option<char>;

/// Construction-time knobs. The host's configuration layer fills this in.
#[derive(Debug, Clone)]
pub struct TermOptions {
    pub cols: usize,
    pub rows: usize,
    pub scrollback_lines: usize,
    /// Pixels per cell, used to size sixel images in cells.
    pub cell_width: usize,
    pub cell_height: usize,
    pub sixel_max_width: usize,
    pub sixel_max_height: usize,
    pub sixel_palette_size: usize,
    pub precompose: Option<PrecomposeFn>,
}

impl Default for TermOptions {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback_lines: 1000,
            cell_width: 8,
            cell_height: 16,
            sixel_max_width: 10_000,
            sixel_max_height: 10_000,
            sixel_palette_size: 1024,
            precompose: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveGrid {
    Normal,
    Alt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorKeys {
    #[default]
    Normal,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeypadKeys {
    #[default]
    Numerical,
    Application,
}

/// What to report (DECSET 9 / 1000 / 1002 / 1003).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseTracking {
    #[default]
    None,
    X10,
    Click,
    Drag,
    Motion,
}

/// How to encode reports (DECSET 1005 / 1006 / 1015).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseReporting {
    #[default]
    Normal,
    Utf8,
    Sgr,
    Urxvt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Ascii,
    Graphic,
}

/// Palette and dynamic colors, with the configured defaults kept around so
/// OSC 104/110/111/112 can restore them.
#[derive(Debug, Clone)]
pub struct Colors {
    pub fg: u32,
    pub bg: u32,
    pub table: [u32; 256],
    pub cursor_text: u32,
    pub cursor: u32,
    pub default_fg: u32,
    pub default_bg: u32,
    pub default_table: [u32; 256],
    pub default_cursor_text: u32,
    pub default_cursor: u32,
}

impl Default for Colors {
    fn default() -> Self {
        let table = default_color_table();
        Self {
            fg: 0xdcdcdc,
            bg: 0x111111,
            table,
            cursor_text: 0x111111,
            cursor: 0xdcdcdc,
            default_fg: 0xdcdcdc,
            default_bg: 0x111111,
            default_table: table,
            default_cursor_text: 0x111111,
            default_cursor: 0xdcdcdc,
        }
    }
}

/// The standard 256-entry palette: 16 base colors, the 6×6×6 cube, and the
/// 24-step gray ramp.
#[must_use]
pub fn default_color_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let base: [u32; 16] = [
        0x000000, 0xcd0000, 0x00cd00, 0xcdcd00, 0x0000ee, 0xcd00cd, 0x00cdcd, 0xe5e5e5,
        0x7f7f7f, 0xff0000, 0x00ff00, 0xffff00, 0x5c5cff, 0xff00ff, 0x00ffff, 0xffffff,
    ];
    table[..16].copy_from_slice(&base);
    let steps = [0u32, 95, 135, 175, 215, 255];
    for r in 0..6 {
        for g in 0..6 {
            for b in 0..6 {
                table[16 + 36 * r + 6 * g + b] =
                    (steps[r] << 16) | (steps[g] << 8) | steps[b];
            }
        }
    }
    for i in 0..24 {
        let v = 8 + 10 * i as u32;
        table[232 + i] = (v << 16) | (v << 8) | v;
    }
    table
}

/// Parser-adjacent state: current/saved attributes and string collection.
#[derive(Debug, Default)]
pub struct Vt {
    pub state: State,
    pub utf8: u32,
    pub params: Params,
    /// Up to four private/intermediate bytes, later bytes in higher octets.
    pub private: u32,
    pub osc: Vec<u8>,
    pub osc_bel_terminated: bool,
    pub dcs: DcsState,
    pub attrs: Attributes,
    pub saved_attrs: Attributes,
    pub last_printed: Option<(u32, usize)>,
}

/// The terminal: display state plus interpreter state.
pub struct Term {
    pub vt: Vt,

    normal: Grid,
    alt: Grid,
    active: ActiveGrid,

    pub composed: ComposedTable,
    pub links: LinkRegistry,
    pub current_link: LinkId,

    pub cols: usize,
    pub rows: usize,
    pub cell_width: usize,
    pub cell_height: usize,

    pub scroll_region: ScrollRegion,

    pub origin: Origin,
    pub cursor_keys_mode: CursorKeys,
    pub keypad_keys_mode: KeypadKeys,
    pub reverse: bool,
    pub hide_cursor: bool,
    pub auto_margin: bool,
    pub reverse_wrap: bool,
    pub insert_mode: bool,
    pub cursor_blink: bool,
    pub bracketed_paste: bool,
    pub focus_events: bool,
    pub alt_scrolling: bool,
    pub mouse_tracking: MouseTracking,
    pub mouse_reporting: MouseReporting,
    pub meta_eight_bit: bool,
    pub meta_esc_prefix: bool,
    pub app_sync_updates: bool,

    /// XTSAVE'd DEC private mode states, keyed by mode number.
    pub xtsave: std::collections::BTreeMap<u32, bool>,

    pub charsets: Charsets,
    pub saved_charsets: Charsets,

    pub colors: Colors,

    pub tab_stops: BTreeSet<usize>,

    pub title: String,
    pub title_stack: Vec<String>,

    pub selection: Selection,

    pub writes: PtyQueue,
    pub paste_writes: PtyQueue,
    events: VecDeque<TermEvent>,

    pub scrollback_lines: usize,
    pub sixel_max_width: usize,
    pub sixel_max_height: usize,
    pub sixel_palette_size: usize,
    precompose: Option<PrecomposeFn>,
}

/// G0–G3 designations plus the locking and single shifts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Charsets {
    pub selected: usize,
    pub single_shift: Option<usize>,
    pub set: [Charset; 4],
}

impl Term {
    #[must_use]
    pub fn new(options: TermOptions) -> Self {
        let TermOptions {
            cols,
            rows,
            scrollback_lines,
            cell_width,
            cell_height,
            sixel_max_width,
            sixel_max_height,
            sixel_palette_size,
            precompose,
        } = options;
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut term = Self {
            vt: Vt::default(),
            normal: Grid::new(cols, rows, scrollback_lines),
            alt: Grid::new(cols, rows, 0),
            active: ActiveGrid::Normal,
            composed: ComposedTable::new(),
            links: LinkRegistry::new(),
            current_link: 0,
            cols,
            rows,
            cell_width: cell_width.max(1),
            cell_height: cell_height.max(1),
            scroll_region: ScrollRegion::new(0, rows),
            origin: Origin::Absolute,
            cursor_keys_mode: CursorKeys::Normal,
            keypad_keys_mode: KeypadKeys::Numerical,
            reverse: false,
            hide_cursor: false,
            auto_margin: true,
            reverse_wrap: false,
            insert_mode: false,
            cursor_blink: false,
            bracketed_paste: false,
            focus_events: false,
            alt_scrolling: false,
            mouse_tracking: MouseTracking::None,
            mouse_reporting: MouseReporting::Normal,
            meta_eight_bit: false,
            meta_esc_prefix: true,
            app_sync_updates: false,
            xtsave: std::collections::BTreeMap::new(),
            charsets: Charsets::default(),
            saved_charsets: Charsets::default(),
            colors: Colors::default(),
            tab_stops: BTreeSet::new(),
            title: String::new(),
            title_stack: Vec::new(),
            selection: Selection::none(),
            writes: PtyQueue::new(),
            paste_writes: PtyQueue::new(),
            events: VecDeque::new(),
            scrollback_lines,
            sixel_max_width,
            sixel_max_height,
            sixel_palette_size: sixel_palette_size.clamp(2, 65536),
            precompose,
        };
        term.reset_tab_stops();
        term
    }

    // ── Grid access ─────────────────────────────────────────────────

    #[must_use]
    pub fn grid(&self) -> &Grid {
        match self.active {
            ActiveGrid::Normal => &self.normal,
            ActiveGrid::Alt => &self.alt,
        }
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        match self.active {
            ActiveGrid::Normal => &mut self.normal,
            ActiveGrid::Alt => &mut self.alt,
        }
    }

    /// The active grid together with the hyperlink registry, for grid
    /// operations that create or release link spans.
    pub(crate) fn grid_and_links(&mut self) -> (&mut Grid, &mut LinkRegistry) {
        match self.active {
            ActiveGrid::Normal => (&mut self.normal, &mut self.links),
            ActiveGrid::Alt => (&mut self.alt, &mut self.links),
        }
    }

    #[must_use]
    pub fn active_grid(&self) -> ActiveGrid {
        self.active
    }

    #[must_use]
    pub fn in_alt_screen(&self) -> bool {
        self.active == ActiveGrid::Alt
    }

    // ── Host plumbing ───────────────────────────────────────────────

    /// Interpret a chunk of slave output.
    pub fn feed(&mut self, bytes: &[u8]) {
        crate::parser::feed(self, bytes);
    }

    /// Queue a reply toward the application.
    pub fn reply(&mut self, bytes: impl Into<Vec<u8>>) {
        self.writes.push(bytes.into());
    }

    pub(crate) fn push_event(&mut self, event: TermEvent) {
        self.events.push_back(event);
    }

    /// Drain queued host events.
    pub fn take_events(&mut self) -> Vec<TermEvent> {
        self.events.drain(..).collect()
    }

    // ── Cursor motion ───────────────────────────────────────────────

    /// Absolute move with clamping. In origin mode, `row` is relative to
    /// the scroll region and confined to it.
    pub fn cursor_to(&mut self, row: usize, col: usize) {
        let (top, bottom) = match self.origin {
            Origin::Absolute => (0, self.rows),
            Origin::Relative => (self.scroll_region.start, self.scroll_region.end),
        };
        let row = (top + row).min(bottom.saturating_sub(1));
        let col = col.min(self.cols.saturating_sub(1));
        let cursor = &mut self.grid_mut().cursor;
        cursor.point = Coord::new(row, col);
        cursor.lcf = false;
    }

    pub fn cursor_home(&mut self) {
        self.cursor_to(0, 0);
    }

    pub fn cursor_left(&mut self, count: usize) {
        let cursor = &mut self.grid_mut().cursor;
        cursor.point.col = cursor.point.col.saturating_sub(count.max(1));
        cursor.lcf = false;
    }

    pub fn cursor_right(&mut self, count: usize) {
        let cols = self.cols;
        let cursor = &mut self.grid_mut().cursor;
        cursor.point.col = (cursor.point.col + count.max(1)).min(cols.saturating_sub(1));
        cursor.lcf = false;
    }

    /// Up, stopping at the scroll-region top when starting inside it.
    pub fn cursor_up(&mut self, count: usize) {
        let top = if self.grid().cursor.point.row >= self.scroll_region.start {
            self.scroll_region.start
        } else {
            0
        };
        let cursor = &mut self.grid_mut().cursor;
        cursor.point.row = cursor
            .point
            .row
            .saturating_sub(count.max(1))
            .max(top);
        cursor.lcf = false;
    }

    /// Down, stopping at the scroll-region bottom when starting inside it.
    pub fn cursor_down(&mut self, count: usize) {
        let bottom = if self.grid().cursor.point.row < self.scroll_region.end {
            self.scroll_region.end
        } else {
            self.rows
        };
        let cursor = &mut self.grid_mut().cursor;
        cursor.point.row = (cursor.point.row + count.max(1)).min(bottom.saturating_sub(1));
        cursor.lcf = false;
    }

    pub fn carriage_return(&mut self) {
        let cursor = &mut self.grid_mut().cursor;
        cursor.point.col = 0;
        cursor.lcf = false;
    }

    /// LF: move down, scrolling when at the region bottom. Marks the line
    /// hard-terminated (selection extraction inserts a newline here).
    pub fn linefeed(&mut self) {
        self.grid_mut().cur_row_mut().linebreak = true;
        self.advance_line();
    }

    /// Auto-wrap variant of [`Self::linefeed`]: the logical line continues
    /// onto the next row, so no linebreak marker is left behind.
    fn wrap_line(&mut self) {
        self.grid_mut().cur_row_mut().linebreak = false;
        self.carriage_return();
        self.advance_line();
        self.grid_mut().cur_row_mut().linebreak = false;
    }

    fn advance_line(&mut self) {
        let row = self.grid().cursor.point.row;
        if row + 1 == self.scroll_region.end {
            self.scroll_up(1);
        } else if row + 1 < self.rows {
            let cursor = &mut self.grid_mut().cursor;
            cursor.point.row += 1;
            cursor.lcf = false;
        } else {
            self.grid_mut().cursor.lcf = false;
        }
    }

    /// RI: move up, scrolling down when at the region top.
    pub fn reverse_index(&mut self) {
        let row = self.grid().cursor.point.row;
        if row == self.scroll_region.start {
            self.scroll_down(1);
        } else if row > 0 {
            let cursor = &mut self.grid_mut().cursor;
            cursor.point.row -= 1;
            cursor.lcf = false;
        }
    }

    /// BS with the reverse-wrap extension.
    pub fn backspace(&mut self) {
        if self.grid().cursor.lcf {
            self.grid_mut().cursor.lcf = false;
            return;
        }
        let point = self.grid().cursor.point;
        if point.col == 0 && self.reverse_wrap && self.auto_margin {
            if point.row > self.scroll_region.start {
                let cols = self.cols;
                let cursor = &mut self.grid_mut().cursor;
                cursor.point.row -= 1;
                cursor.point.col = cols.saturating_sub(1);
                cursor.lcf = false;
            }
        } else {
            self.cursor_left(1);
        }
    }

    // ── Tab stops ───────────────────────────────────────────────────

    pub fn reset_tab_stops(&mut self) {
        self.tab_stops = (8..self.cols).step_by(8).collect();
    }

    pub fn set_tab_stop(&mut self) {
        let col = self.grid().cursor.point.col;
        self.tab_stops.insert(col);
    }

    pub fn clear_tab_stop(&mut self) {
        let col = self.grid().cursor.point.col;
        self.tab_stops.remove(&col);
    }

    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.clear();
    }

    /// HT: advance to the next stop. When the skipped cells are blank, a
    /// visible `\t` plus spaces are written so copied text keeps its tabs.
    pub fn horizontal_tab(&mut self, count: usize) {
        for _ in 0..count.max(1) {
            let start = self.grid().cursor.point.col;
            let next = self
                .tab_stops
                .range(start + 1..)
                .next()
                .copied()
                .unwrap_or(self.cols.saturating_sub(1));
            if next <= start {
                break;
            }

            let row = self.grid_mut().cur_row_mut();
            let all_blank = row.cells[start..next].iter().all(Cell::is_blank);
            if all_blank {
                row.cells[start].cp = u32::from('\t');
                for cell in &mut row.cells[start + 1..next] {
                    cell.cp = u32::from(' ');
                }
                row.dirty = true;
            }

            // HT does not cancel a pending wrap (xterm behavior).
            let lcf = self.grid().cursor.lcf;
            self.cursor_right(next - start);
            self.grid_mut().cursor.lcf = lcf;
        }
    }

    /// CBT: move back `count` tab stops.
    pub fn backward_tab(&mut self, count: usize) {
        for _ in 0..count.max(1) {
            let col = self.grid().cursor.point.col;
            let prev = self.tab_stops.range(..col).next_back().copied().unwrap_or(0);
            self.grid_mut().cursor.point.col = prev;
        }
        self.grid_mut().cursor.lcf = false;
    }

    // ── Scrolling (region-aware wrappers) ───────────────────────────

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_up_in(self.scroll_region, lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_down_in(self.scroll_region, lines);
    }

    pub fn scroll_up_in(&mut self, region: ScrollRegion, lines: usize) {
        self.cancel_selection_on_scroll(region, lines);
        let attrs = self.vt.attrs;
        let (grid, links) = self.grid_and_links();
        grid.scroll_up(region, lines, attrs, links);
    }

    pub fn scroll_down_in(&mut self, region: ScrollRegion, lines: usize) {
        self.cancel_selection_on_scroll(region, lines);
        let attrs = self.vt.attrs;
        let (grid, links) = self.grid_and_links();
        grid.scroll_down(region, lines, attrs, links);
    }

    fn cancel_selection_on_scroll(&mut self, region: ScrollRegion, lines: usize) {
        if !self.selection.is_active() || lines == 0 {
            return;
        }
        let full = region.start == 0 && region.end == self.rows;
        let overlaps = if full {
            // Content moves intact into scrollback; only cancel when the
            // oldest scrollback rows (possibly selected) get recycled.
            let grid = self.grid();
            let capacity = grid.ring_rows() - grid.screen_rows();
            let dropped = (grid.scrollback_len() + lines).saturating_sub(capacity);
            match self.selection.stream_span(grid) {
                Some((lo, _)) => lo.row < dropped,
                None => true,
            }
        } else {
            self.selection.overlaps_screen_rows(
                self.grid(),
                region.start,
                region.end.saturating_sub(1),
            )
        };
        if overlaps {
            self.cancel_selection();
        }
    }

    // ── Erase / edit wrappers ───────────────────────────────────────

    /// Erase between logical coords inclusive, cancelling an overlapped
    /// selection.
    pub fn erase(&mut self, start: Coord, end: Coord) {
        if self.selection.is_active()
            && self
                .selection
                .overlaps_screen_rows(self.grid(), start.row, end.row)
        {
            self.cancel_selection();
        }
        let attrs = self.vt.attrs;
        let (grid, links) = self.grid_and_links();
        grid.erase_cells(start, end, attrs, links);
    }

    pub fn erase_screen(&mut self) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        self.erase(
            Coord::new(0, 0),
            Coord::new(self.rows - 1, self.cols - 1),
        );
    }

    // ── Printing ────────────────────────────────────────────────────

    /// The print path: pending-wrap emission, insert mode, wide-glyph
    /// placement, hyperlink attribution, cursor advance / lcf latch.
    pub fn print(&mut self, cp: u32, width: usize) {
        self.vt.last_printed = Some((cp, width));
        let cols = self.cols;

        if self.grid().cursor.lcf {
            if self.auto_margin {
                self.wrap_line();
            }
            self.grid_mut().cursor.lcf = false;
        }

        let mut point = self.grid().cursor.point;

        // A wide glyph that cannot fit in the remaining columns wraps
        // early (or is dropped without auto-margin).
        if width == 2 && point.col + 1 >= cols {
            if !self.auto_margin {
                return;
            }
            self.wrap_line();
            point = self.grid().cursor.point;
        }

        if self.selection.is_active()
            && self
                .selection
                .overlaps_screen_rows(self.grid(), point.row, point.row)
        {
            self.cancel_selection();
        }

        let insert = self.insert_mode;
        let link = self.current_link;
        let attrs = self.vt.attrs;
        let (grid, links) = self.grid_and_links();
        if insert {
            grid.insert_chars(point.row, point.col, width, attrs, links);
        }
        grid.write_cp(point.row, point.col, cp, width, attrs);
        if link != 0 {
            let row = grid.row_mut(point.row);
            for c in point.col..(point.col + width).min(cols) {
                row.set_link(c, link, links);
            }
        }

        if point.col + width < cols {
            let cursor = &mut self.grid_mut().cursor;
            cursor.point.col = point.col + width;
            cursor.lcf = false;
        } else {
            self.grid_mut().cursor.lcf = true;
        }
    }

    /// Print a decoded scalar, applying charset mapping and grapheme
    /// composition.
    pub fn print_scalar(&mut self, ch: char) {
        let ch = self.map_charset(ch);
        let width = Cell::display_width(ch);

        if width == 0 {
            self.compose_zero_width(ch);
            return;
        }
        self.print(ch as u32, width);
    }

    /// Zero-width input: attach to the base glyph left of the cursor via
    /// font precomposition or the composed table. Discarded with no base.
    fn compose_zero_width(&mut self, mark: char) {
        if (mark as u32) < 0x0300 {
            return;
        }
        let point = self.grid().cursor.point;
        let lcf = self.grid().cursor.lcf;
        if point.col == 0 && !lcf {
            return;
        }

        // Locate the base cell: one left of the cursor unless a pending
        // wrap pins us on the just-printed cell; skip spacers.
        let mut base_col = point.col;
        if !lcf {
            base_col -= 1;
        }
        {
            let row = self.grid().row(point.row);
            while base_col > 0 && row.cells[base_col].is_spacer() {
                base_col -= 1;
            }
        }

        let base_cell = self.grid().row(point.row).cells[base_col];
        let existing = base_cell
            .composed_index()
            .and_then(|i| self.composed.get(i))
            .copied();
        let base = match &existing {
            Some(chain) => chain.base,
            None => match base_cell.ch() {
                Some(ch) => ch,
                None => return,
            },
        };
        let base_width = Cell::display_width(base);
        if base_width == 0 {
            return;
        }

        // Rewind the cursor onto the base cell; the re-print advances it.
        {
            let cursor = &mut self.grid_mut().cursor;
            cursor.point.col = base_col;
            cursor.lcf = false;
        }

        // First mark: prefer a precomposed glyph of equal width.
        if existing.is_none()
            && let Some(precompose) = self.precompose
            && let Some(pre) = precompose(base, mark)
            && Cell::display_width(pre) == base_width
        {
            self.print(pre as u32, base_width);
            return;
        }

        match self.composed.extend(existing.as_ref(), base, mark) {
            ComposeOutcome::Sentinel(cp) => self.print(cp, base_width),
            ComposeOutcome::ChainFull => {
                warn!("combining chain full; dropping U+{:04X}", mark as u32);
                // Re-print the existing sentinel so the cursor ends up
                // where it was.
                self.print(base_cell.cp, base_width);
            }
            ComposeOutcome::TableFull => {
                warn!("composed-character table exhausted");
                self.print(base_cell.cp, base_width);
            }
        }
    }

    /// REP: repeat the last printed glyph.
    pub fn repeat_last(&mut self, count: usize) {
        if let Some((cp, width)) = self.vt.last_printed {
            for _ in 0..count.max(1) {
                self.print(cp, width);
            }
        }
    }

    fn map_charset(&mut self, ch: char) -> char {
        let slot = self
            .charsets
            .single_shift
            .take()
            .unwrap_or(self.charsets.selected);
        match self.charsets.set[slot] {
            Charset::Ascii => ch,
            Charset::Graphic => dec_graphics(ch),
        }
    }

    // ── Save / restore cursor ───────────────────────────────────────

    pub fn save_cursor(&mut self) {
        let cursor = self.grid().cursor;
        self.grid_mut().saved_cursor = cursor;
        self.vt.saved_attrs = self.vt.attrs;
        self.saved_charsets = self.charsets;
    }

    pub fn restore_cursor(&mut self) {
        let saved = self.grid().saved_cursor;
        let row = saved.point.row.min(self.rows.saturating_sub(1));
        let col = saved.point.col.min(self.cols.saturating_sub(1));
        let cursor = &mut self.grid_mut().cursor;
        cursor.point = Coord::new(row, col);
        cursor.lcf = false;
        self.vt.attrs = self.vt.saved_attrs;
        self.charsets = self.saved_charsets;
    }

    // ── Alternate screen ────────────────────────────────────────────

    /// Enter the alt grid (`clear`: blank it first, as DECSET 1049 does).
    pub fn enter_alt_screen(&mut self, clear: bool) {
        if self.active == ActiveGrid::Alt {
            return;
        }
        self.cancel_selection();
        self.active = ActiveGrid::Alt;
        // The alt grid starts from the normal grid's cursor.
        self.alt.cursor = self.normal.cursor;
        if clear {
            let attrs = self.vt.attrs;
            self.alt.reset_screen(attrs, &mut self.links);
        }
        self.alt.damage_all();
        self.push_event(TermEvent::GridSwapped);
    }

    pub fn leave_alt_screen(&mut self) {
        if self.active == ActiveGrid::Normal {
            return;
        }
        self.cancel_selection();
        self.active = ActiveGrid::Normal;
        self.normal.damage_all();
        self.push_event(TermEvent::GridSwapped);
    }

    // ── Selection (host-driven) ─────────────────────────────────────

    /// Begin a selection at a view-relative position.
    pub fn selection_begin(&mut self, kind: SelectionKind, view_row: usize, col: usize) {
        if self.selection.is_active() {
            self.cancel_selection();
        }
        let abs = self.grid().view_to_abs(view_row);
        self.selection.begin(kind, Coord::new(abs, col));
        let sel = self.selection;
        sel.apply_highlight(self.grid_mut());
    }

    pub fn selection_update(&mut self, view_row: usize, col: usize) {
        if !self.selection.is_active() {
            return;
        }
        Selection::clear_highlight(self.grid_mut());
        let abs = self.grid().view_to_abs(view_row);
        let grid_sel = {
            let grid = self.grid();
            let mut sel = self.selection;
            sel.update(grid, Coord::new(abs, col));
            sel
        };
        self.selection = grid_sel;
        let sel = self.selection;
        sel.apply_highlight(self.grid_mut());
    }

    pub fn selection_finish(&mut self) {
        self.selection.finish();
    }

    pub fn cancel_selection(&mut self) {
        if !self.selection.is_active() {
            return;
        }
        Selection::clear_highlight(self.grid_mut());
        self.selection.cancel();
    }

    /// Extract the selected text, or `None` with no active selection.
    #[must_use]
    pub fn selection_text(&self) -> Option<String> {
        if !self.selection.is_active() {
            return None;
        }
        let text = self.selection.extract_text(self.grid(), &self.composed);
        (!text.is_empty()).then_some(text)
    }

    // ── Synchronized updates ────────────────────────────────────────

    pub fn begin_synchronized_update(&mut self) {
        if !self.app_sync_updates {
            self.app_sync_updates = true;
            self.push_event(TermEvent::SyncBegin);
        }
    }

    /// Host- or watchdog-driven end of the synchronized window.
    pub fn end_synchronized_update(&mut self) {
        if self.app_sync_updates {
            self.app_sync_updates = false;
            self.push_event(TermEvent::SyncEnd);
        }
    }

    // ── Reset / resize ──────────────────────────────────────────────

    /// RIS (`hard`) or DECSTR soft reset.
    pub fn reset(&mut self, hard: bool) {
        self.vt.attrs = Attributes::new();
        self.vt.saved_attrs = Attributes::new();
        self.vt.last_printed = None;
        self.origin = Origin::Absolute;
        self.insert_mode = false;
        self.auto_margin = true;
        self.reverse_wrap = false;
        self.hide_cursor = false;
        self.scroll_region = ScrollRegion::new(0, self.rows);
        self.charsets = Charsets::default();
        self.saved_charsets = Charsets::default();
        self.cursor_keys_mode = CursorKeys::Normal;
        self.keypad_keys_mode = KeypadKeys::Numerical;
        if !hard {
            return;
        }

        self.cancel_selection();
        self.normal = Grid::new(self.cols, self.rows, self.scrollback_lines);
        self.alt = Grid::new(self.cols, self.rows, 0);
        self.active = ActiveGrid::Normal;
        self.reverse = false;
        self.bracketed_paste = false;
        self.focus_events = false;
        self.alt_scrolling = false;
        self.cursor_blink = false;
        self.mouse_tracking = MouseTracking::None;
        self.mouse_reporting = MouseReporting::Normal;
        self.meta_eight_bit = false;
        self.meta_esc_prefix = true;
        self.end_synchronized_update();
        self.xtsave.clear();
        // Both grids were replaced above; their spans die with the registry.
        self.links.clear();
        self.current_link = 0;
        self.colors = Colors::default();
        self.reset_tab_stops();
        self.title_stack.clear();
        self.vt.params.clear();
        self.vt.private = 0;
        self.vt.dcs = DcsState::default();
        self.vt.state = State::Ground;
    }

    /// Resize both grids, clamping the cursor and resetting the region.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cancel_selection();

        let normal_cursor = self.normal.cursor;
        let alt_cursor = self.alt.cursor;
        // Kept rows re-acquire their hyperlink references; the old grids'
        // references are dropped with the grids.
        let new_normal = self
            .normal
            .resized(cols, rows, self.scrollback_lines, &mut self.links);
        self.normal.release_all_links(&mut self.links);
        self.normal = new_normal;
        let new_alt = self.alt.resized(cols, rows, 0, &mut self.links);
        self.alt.release_all_links(&mut self.links);
        self.alt = new_alt;
        self.cols = cols;
        self.rows = rows;
        self.scroll_region = ScrollRegion::new(0, rows);
        self.reset_tab_stops();

        self.normal.cursor.point = Coord::new(
            normal_cursor.point.row.min(rows - 1),
            normal_cursor.point.col.min(cols - 1),
        );
        self.normal.cursor.lcf = false;
        self.alt.cursor.point = Coord::new(
            alt_cursor.point.row.min(rows - 1),
            alt_cursor.point.col.min(cols - 1),
        );
        self.alt.cursor.lcf = false;
        self.normal.damage_all();
        self.alt.damage_all();
    }

    // ── Sixel attachment ────────────────────────────────────────────

    /// Pin a finished sixel raster at the cursor and advance past it.
    pub fn attach_sixel(&mut self, data: Vec<u32>, width: usize, height: usize) {
        if width == 0 || height == 0 {
            return;
        }
        let img_cols = width.div_ceil(self.cell_width);
        let img_rows = height.div_ceil(self.cell_height);
        let point = self.grid().cursor.point;
        let abs = self.grid().rel_to_abs(point.row);
        self.grid_mut().add_sixel(petrel_core::SixelImage {
            data,
            width,
            height,
            cols: img_cols,
            rows: img_rows,
            pos: Coord::new(abs, point.col),
        });
        for r in 0..img_rows {
            let row = point.row.saturating_add(r).min(self.rows - 1);
            self.grid_mut().row_mut(row).dirty = true;
        }
        // Leave the cursor on the row following the image.
        for _ in 0..img_rows {
            self.linefeed();
        }
        self.carriage_return();
        self.push_event(TermEvent::SixelAttached);
    }

    // ── Mouse reporting ─────────────────────────────────────────────

    /// Encode a mouse event per the active reporting mode and queue it.
    /// `button` is 0/1/2 (left/middle/right), 3 = release (normal mode),
    /// 64/65 = wheel. `col`/`row` are 0-based cell coordinates.
    pub fn mouse_report(
        &mut self,
        button: u32,
        col: usize,
        row: usize,
        pressed: bool,
        shift: bool,
        alt: bool,
        ctrl: bool,
    ) {
        if self.mouse_tracking == MouseTracking::None {
            return;
        }
        let mods = if self.mouse_tracking == MouseTracking::X10 {
            0
        } else {
            (u32::from(shift) << 2) | (u32::from(alt) << 3) | (u32::from(ctrl) << 4)
        };

        match self.mouse_reporting {
            MouseReporting::Sgr => {
                let final_byte = if pressed { 'M' } else { 'm' };
                let seq = format!(
                    "\x1b[<{};{};{}{}",
                    button | mods,
                    col + 1,
                    row + 1,
                    final_byte
                );
                self.reply(seq.into_bytes());
            }
            MouseReporting::Urxvt => {
                let code = 32 + if pressed { button | mods } else { 3 | mods };
                let seq = format!("\x1b[{};{};{}M", code, col + 1, row + 1);
                self.reply(seq.into_bytes());
            }
            MouseReporting::Utf8 => {
                let code = 32 + if pressed { button | mods } else { 3 | mods };
                let mut seq = String::from("\x1b[M");
                for v in [
                    code,
                    32 + (col as u32 + 1),
                    32 + (row as u32 + 1),
                ] {
                    if let Some(ch) = char::from_u32(v) {
                        seq.push(ch);
                    }
                }
                self.reply(seq.into_bytes());
            }
            MouseReporting::Normal => {
                // Coordinates past 223 cannot be encoded; clamp.
                let code = 32 + if pressed { button | mods } else { 3 | mods };
                let cx = 32 + (col as u32 + 1).min(223);
                let cy = 32 + (row as u32 + 1).min(223);
                let bytes = vec![
                    0x1b,
                    b'[',
                    b'M',
                    code.min(255) as u8,
                    cx as u8,
                    cy as u8,
                ];
                self.reply(bytes);
            }
        }
    }

    /// Queue paste data toward the slave, wrapped in bracketed-paste
    /// markers when the application asked for them. Paste data rides its
    /// own FIFO so replies and keystrokes are never stuck behind it.
    pub fn send_paste(&mut self, data: &[u8]) {
        if self.bracketed_paste {
            self.paste_writes.push(b"\x1b[200~".to_vec());
            self.paste_writes.push(data.to_vec());
            self.paste_writes.push(b"\x1b[201~".to_vec());
        } else {
            self.paste_writes.push(data.to_vec());
        }
    }

    // ── OSC 52 host reply ───────────────────────────────────────────

    /// Answer a pending clipboard query with `data` (host side of OSC 52).
    pub fn reply_clipboard(&mut self, target: crate::events::ClipboardTarget, data: &[u8]) {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let which = match target {
            crate::events::ClipboardTarget::Clipboard => 'c',
            crate::events::ClipboardTarget::Primary => 'p',
        };
        let terminator = if self.vt.osc_bel_terminated { "\x07" } else { "\x1b\\" };
        self.reply(format!("\x1b]52;{which};{encoded}{terminator}").into_bytes());
    }

    // ── Misc ────────────────────────────────────────────────────────

    pub fn set_title(&mut self, title: &str) {
        if self.title != title {
            self.title = title.to_string();
            self.push_event(TermEvent::TitleChanged(title.to_string()));
        }
    }

    pub fn bell(&mut self) {
        self.push_event(TermEvent::Bell);
    }

    /// DECALN: fill the screen with `E` and reset region + cursor.
    pub fn screen_alignment_test(&mut self) {
        self.cancel_selection();
        self.scroll_region = ScrollRegion::new(0, self.rows);
        let rows = self.rows;
        let (grid, links) = self.grid_and_links();
        for r in 0..rows {
            let row = grid.row_mut(r);
            row.clear_all_links(links);
            for cell in &mut row.cells {
                *cell = Cell::new('E', Attributes::new());
            }
            row.dirty = true;
            row.linebreak = false;
        }
        self.cursor_home();
    }

    /// Cursor position report (DSR 6), origin-mode aware.
    pub fn report_cursor_position(&mut self) {
        let point = self.grid().cursor.point;
        let row = match self.origin {
            Origin::Absolute => point.row,
            Origin::Relative => point.row.saturating_sub(self.scroll_region.start),
        };
        self.reply(format!("\x1b[{};{}R", row + 1, point.col + 1).into_bytes());
    }

    pub(crate) fn unhandled(&self, what: &str) {
        debug!(sequence = what, "unhandled escape");
    }
}

/// DEC special graphics (`ESC ( 0`): map `0x60..=0x7e` to line-drawing
/// glyphs; everything else passes through.
#[must_use]
pub fn dec_graphics(ch: char) -> char {
    match ch {
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        _ => ch,
    }
}
