//! Terminal cell: the fundamental unit of the grid.
//!
//! Cells are kept deliberately small (12 bytes): larger cells mean
//! fewer scrollback lines and more cache misses on scroll. A cell is a raw
//! 32-bit code point slot plus a packed 8-byte attribute record.
//!
//! The code point slot holds either a Unicode scalar value, the trailing
//! half of a double-width glyph ([`WIDE_SPACER`]), or an index into the
//! composed-character table encoded in the private range
//! `[COMPOSED_LO, COMPOSED_HI]` (above the Unicode code space, so the three
//! cases can never collide).

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

/// First sentinel of the composed-character range.
pub const COMPOSED_LO: u32 = 0x4000_0000;
/// Last sentinel of the composed-character range (inclusive).
pub const COMPOSED_HI: u32 = 0x400f_ffff;
/// Trailing half of a double-width glyph.
pub const WIDE_SPACER: u32 = 0x4010_0000;

bitflags! {
    /// SGR style bits, one per ECMA-48 rendition aspect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const STRIKETHROUGH = 1 << 4;
        const BLINK         = 1 << 5;
        const CONCEAL       = 1 << 6;
        const REVERSE       = 1 << 7;
    }
}

/// Cell highlight state (2 bits in the attribute word).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Highlight {
    #[default]
    None = 0,
    /// Part of the active selection.
    Selection = 1,
    /// Part of a search match.
    Match = 2,
}

impl Highlight {
    fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            1 => Highlight::Selection,
            2 => Highlight::Match,
            _ => Highlight::None,
        }
    }
}

/// Packed cell attributes: two 32-bit words.
///
/// Word 0: style flags (8 bits) | fg (24 bits).
/// Word 1: clean, have_fg, have_bg, highlight (2 bits), reserved (3 bits)
/// | bg (24 bits).
///
/// Colors are stored as resolved 24-bit RGB; `have_fg`/`have_bg` distinguish
/// "use the default color" from an explicit value, so the renderer can apply
/// theme defaults (and reverse video) late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Attributes {
    style_fg: u32,
    meta_bg: u32,
}

const META_CLEAN: u32 = 1 << 0;
const META_HAVE_FG: u32 = 1 << 1;
const META_HAVE_BG: u32 = 1 << 2;
const META_HIGHLIGHT_SHIFT: u32 = 3;
const META_HIGHLIGHT_MASK: u32 = 0x3 << META_HIGHLIGHT_SHIFT;
const COLOR_SHIFT: u32 = 8;
const COLOR_MASK: u32 = 0x00ff_ffff;

impl Attributes {
    /// Attributes with every aspect at its default.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            style_fg: 0,
            meta_bg: 0,
        }
    }

    #[must_use]
    pub fn style(&self) -> StyleFlags {
        StyleFlags::from_bits_truncate((self.style_fg & 0xff) as u8)
    }

    pub fn set_style(&mut self, style: StyleFlags) {
        self.style_fg = (self.style_fg & !0xff) | u32::from(style.bits());
    }

    pub fn insert_style(&mut self, style: StyleFlags) {
        self.set_style(self.style() | style);
    }

    pub fn remove_style(&mut self, style: StyleFlags) {
        self.set_style(self.style() - style);
    }

    /// Explicit foreground, or `None` for the terminal default.
    #[must_use]
    pub fn fg(&self) -> Option<u32> {
        if self.meta_bg & META_HAVE_FG != 0 {
            Some(self.style_fg >> COLOR_SHIFT)
        } else {
            None
        }
    }

    pub fn set_fg(&mut self, fg: Option<u32>) {
        match fg {
            Some(rgb) => {
                self.style_fg =
                    (self.style_fg & 0xff) | ((rgb & COLOR_MASK) << COLOR_SHIFT);
                self.meta_bg |= META_HAVE_FG;
            }
            None => {
                self.style_fg &= 0xff;
                self.meta_bg &= !META_HAVE_FG;
            }
        }
    }

    /// Explicit background, or `None` for the terminal default.
    #[must_use]
    pub fn bg(&self) -> Option<u32> {
        if self.meta_bg & META_HAVE_BG != 0 {
            Some(self.meta_bg >> COLOR_SHIFT)
        } else {
            None
        }
    }

    pub fn set_bg(&mut self, bg: Option<u32>) {
        match bg {
            Some(rgb) => {
                self.meta_bg = (self.meta_bg & 0xff)
                    | ((rgb & COLOR_MASK) << COLOR_SHIFT)
                    | META_HAVE_BG;
            }
            None => {
                self.meta_bg &= 0xff;
                self.meta_bg &= !META_HAVE_BG;
            }
        }
    }

    /// Renderer bookkeeping: the cell's pixels match its contents.
    #[must_use]
    pub fn clean(&self) -> bool {
        self.meta_bg & META_CLEAN != 0
    }

    pub fn set_clean(&mut self, clean: bool) {
        if clean {
            self.meta_bg |= META_CLEAN;
        } else {
            self.meta_bg &= !META_CLEAN;
        }
    }

    #[must_use]
    pub fn highlight(&self) -> Highlight {
        Highlight::from_bits(self.meta_bg >> META_HIGHLIGHT_SHIFT)
    }

    pub fn set_highlight(&mut self, hl: Highlight) {
        self.meta_bg = (self.meta_bg & !META_HIGHLIGHT_MASK)
            | ((hl as u32) << META_HIGHLIGHT_SHIFT);
    }

    /// Attributes carrying only this set's background (used by erase: BCE).
    #[must_use]
    pub fn erased(&self) -> Self {
        let mut out = Self::new();
        out.set_bg(self.bg());
        out
    }
}

/// A single grid cell: code point slot + attributes. Exactly 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct Cell {
    /// Scalar value, [`WIDE_SPACER`], a composed sentinel, or 0 when blank.
    pub cp: u32,
    pub attrs: Attributes,
}

impl Cell {
    #[must_use]
    pub fn new(ch: char, attrs: Attributes) -> Self {
        Self {
            cp: ch as u32,
            attrs,
        }
    }

    /// A blank cell carrying only the given attribute set's background.
    #[must_use]
    pub fn blank(attrs: Attributes) -> Self {
        Self {
            cp: 0,
            attrs: attrs.erased(),
        }
    }

    /// Whether this cell renders as empty space.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cp == 0 || self.cp == u32::from(' ')
    }

    #[must_use]
    pub fn is_spacer(&self) -> bool {
        self.cp == WIDE_SPACER
    }

    #[must_use]
    pub fn is_composed(&self) -> bool {
        (COMPOSED_LO..=COMPOSED_HI).contains(&self.cp)
    }

    /// Index into the composed table, when the slot holds a sentinel.
    #[must_use]
    pub fn composed_index(&self) -> Option<usize> {
        self.is_composed().then(|| (self.cp - COMPOSED_LO) as usize)
    }

    /// The scalar value, when the slot holds one (not a sentinel, not blank).
    #[must_use]
    pub fn ch(&self) -> Option<char> {
        if self.cp == 0 || self.cp >= COMPOSED_LO {
            None
        } else {
            char::from_u32(self.cp)
        }
    }

    /// Blank the cell in place, inheriting the background (BCE).
    pub fn erase(&mut self, attrs: Attributes) {
        self.cp = 0;
        self.attrs = attrs.erased();
    }

    /// Column width of a scalar value: 0, 1, or 2.
    #[must_use]
    pub fn display_width(ch: char) -> usize {
        UnicodeWidthChar::width(ch).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<Cell>(), 12);
        assert_eq!(std::mem::size_of::<Attributes>(), 8);
    }

    #[test]
    fn default_cell_is_blank() {
        let cell = Cell::default();
        assert!(cell.is_blank());
        assert_eq!(cell.ch(), None);
        assert_eq!(cell.attrs, Attributes::new());
    }

    #[test]
    fn fg_bg_round_trip() {
        let mut attrs = Attributes::new();
        assert_eq!(attrs.fg(), None);
        assert_eq!(attrs.bg(), None);

        attrs.set_fg(Some(0xff00_7f));
        attrs.set_bg(Some(0x00c0_ff));
        assert_eq!(attrs.fg(), Some(0xff007f));
        assert_eq!(attrs.bg(), Some(0x00c0ff));

        attrs.set_fg(None);
        assert_eq!(attrs.fg(), None);
        assert_eq!(attrs.bg(), Some(0x00c0ff));
    }

    #[test]
    fn style_does_not_disturb_colors() {
        let mut attrs = Attributes::new();
        attrs.set_fg(Some(0x123456));
        attrs.insert_style(StyleFlags::BOLD | StyleFlags::REVERSE);
        assert_eq!(attrs.fg(), Some(0x123456));
        assert_eq!(attrs.style(), StyleFlags::BOLD | StyleFlags::REVERSE);
        attrs.remove_style(StyleFlags::BOLD);
        assert_eq!(attrs.style(), StyleFlags::REVERSE);
        assert_eq!(attrs.fg(), Some(0x123456));
    }

    #[test]
    fn highlight_round_trip() {
        let mut attrs = Attributes::new();
        attrs.set_bg(Some(0xabcdef));
        for hl in [Highlight::Selection, Highlight::Match, Highlight::None] {
            attrs.set_highlight(hl);
            assert_eq!(attrs.highlight(), hl);
            assert_eq!(attrs.bg(), Some(0xabcdef));
        }
    }

    #[test]
    fn clean_bit_round_trip() {
        let mut attrs = Attributes::new();
        attrs.set_clean(true);
        assert!(attrs.clean());
        attrs.set_clean(false);
        assert!(!attrs.clean());
    }

    #[test]
    fn erase_keeps_background_only() {
        let mut attrs = Attributes::new();
        attrs.set_fg(Some(0xff0000));
        attrs.set_bg(Some(0x0000ff));
        attrs.insert_style(StyleFlags::BOLD);

        let mut cell = Cell::new('X', attrs);
        cell.erase(attrs);
        assert!(cell.is_blank());
        assert_eq!(cell.attrs.bg(), Some(0x0000ff));
        assert_eq!(cell.attrs.fg(), None);
        assert_eq!(cell.attrs.style(), StyleFlags::empty());
    }

    #[test]
    fn sentinels_are_not_chars() {
        let spacer = Cell {
            cp: WIDE_SPACER,
            attrs: Attributes::new(),
        };
        assert!(spacer.is_spacer());
        assert_eq!(spacer.ch(), None);

        let composed = Cell {
            cp: COMPOSED_LO + 7,
            attrs: Attributes::new(),
        };
        assert!(composed.is_composed());
        assert_eq!(composed.composed_index(), Some(7));
        assert_eq!(composed.ch(), None);
    }

    #[test]
    fn display_width_classes() {
        assert_eq!(Cell::display_width('a'), 1);
        assert_eq!(Cell::display_width('中'), 2);
        assert_eq!(Cell::display_width('\u{0301}'), 0);
    }
}
