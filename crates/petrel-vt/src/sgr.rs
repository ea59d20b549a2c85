//! SGR: select graphic rendition.
//!
//! Supports the legacy `;`-separated forms, the `:` sub-parameter forms
//! (including `38:2::r:g:b` with a color-space id), 256-color and direct
//! RGB, and the underline-style extension `4:n`.

use petrel_core::StyleFlags;
use smallvec::SmallVec;
use tracing::debug;

use crate::term::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedColor {
    Indexed(u8),
    Rgb(u32),
}

/// Parse `5;n` / `2;r;g;b` following a 38/48/58. Returns the color and how
/// many values were consumed (including the leading selector). Only the
/// colon form may carry a color-space id (`2:cs:r:g:b`).
fn extended_color(args: &[u32], colon: bool) -> Option<(ParsedColor, usize)> {
    match args.first()? {
        5 => {
            let n = *args.get(1)?;
            Some((ParsedColor::Indexed(n.min(255) as u8), 2))
        }
        2 => {
            let (r, g, b, used) = if colon && args.len() >= 5 {
                (args[2], args[3], args[4], 5)
            } else if args.len() >= 4 {
                (args[1], args[2], args[3], 4)
            } else {
                return None;
            };
            let rgb = ((r.min(255)) << 16) | ((g.min(255)) << 8) | b.min(255);
            Some((ParsedColor::Rgb(rgb), used))
        }
        _ => None,
    }
}

fn resolve(term: &Term, color: ParsedColor) -> u32 {
    match color {
        ParsedColor::Indexed(n) => term.colors.table[usize::from(n)],
        ParsedColor::Rgb(rgb) => rgb,
    }
}

/// Dispatch the collected parameter list as SGR.
pub(crate) fn dispatch(term: &mut Term) {
    // Snapshot: (value, sub-parameters) per parameter.
    let params: SmallVec<[(u32, SmallVec<[u32; 4]>); 8]> = term
        .vt
        .params
        .iter()
        .map(|p| (p.value, p.sub.clone()))
        .collect();

    if params.is_empty() {
        term.vt.attrs = petrel_core::Attributes::new();
        return;
    }

    let mut i = 0;
    while i < params.len() {
        let (value, ref subs) = params[i];
        let mut consumed = 1;
        match value {
            0 => term.vt.attrs = petrel_core::Attributes::new(),
            1 => term.vt.attrs.insert_style(StyleFlags::BOLD),
            2 => term.vt.attrs.insert_style(StyleFlags::DIM),
            3 => term.vt.attrs.insert_style(StyleFlags::ITALIC),
            4 => {
                // 4:0 = off, 4:1..=5 = underline styles (all rendered as
                // plain underline here).
                match subs.first() {
                    Some(0) => term.vt.attrs.remove_style(StyleFlags::UNDERLINE),
                    _ => term.vt.attrs.insert_style(StyleFlags::UNDERLINE),
                }
            }
            5 | 6 => term.vt.attrs.insert_style(StyleFlags::BLINK),
            7 => term.vt.attrs.insert_style(StyleFlags::REVERSE),
            8 => term.vt.attrs.insert_style(StyleFlags::CONCEAL),
            9 => term.vt.attrs.insert_style(StyleFlags::STRIKETHROUGH),
            21 => term.vt.attrs.insert_style(StyleFlags::UNDERLINE),
            22 => term
                .vt
                .attrs
                .remove_style(StyleFlags::BOLD | StyleFlags::DIM),
            23 => term.vt.attrs.remove_style(StyleFlags::ITALIC),
            24 => term.vt.attrs.remove_style(StyleFlags::UNDERLINE),
            25 => term.vt.attrs.remove_style(StyleFlags::BLINK),
            27 => term.vt.attrs.remove_style(StyleFlags::REVERSE),
            28 => term.vt.attrs.remove_style(StyleFlags::CONCEAL),
            29 => term.vt.attrs.remove_style(StyleFlags::STRIKETHROUGH),

            30..=37 => {
                let rgb = term.colors.table[(value - 30) as usize];
                term.vt.attrs.set_fg(Some(rgb));
            }
            38 | 48 | 58 => {
                let parsed = if !subs.is_empty() {
                    extended_color(subs, true).map(|(c, _)| c)
                } else {
                    let tail: SmallVec<[u32; 8]> =
                        params[i + 1..].iter().map(|(v, _)| *v).collect();
                    extended_color(&tail, false).map(|(c, used)| {
                        consumed += used;
                        c
                    })
                };
                match parsed {
                    Some(color) => {
                        let rgb = resolve(term, color);
                        match value {
                            38 => term.vt.attrs.set_fg(Some(rgb)),
                            48 => term.vt.attrs.set_bg(Some(rgb)),
                            // Underline color: accepted, not stored (the
                            // attribute word has no room for a third color).
                            _ => {}
                        }
                    }
                    None => debug!(value, "malformed extended color"),
                }
            }
            39 => term.vt.attrs.set_fg(None),
            40..=47 => {
                let rgb = term.colors.table[(value - 40) as usize];
                term.vt.attrs.set_bg(Some(rgb));
            }
            49 => term.vt.attrs.set_bg(None),
            59 => {} // reset underline color

            90..=97 => {
                let rgb = term.colors.table[(value - 90 + 8) as usize];
                term.vt.attrs.set_fg(Some(rgb));
            }
            100..=107 => {
                let rgb = term.colors.table[(value - 100 + 8) as usize];
                term.vt.attrs.set_bg(Some(rgb));
            }

            _ => debug!(value, "unimplemented SGR"),
        }
        i += consumed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermOptions;

    fn term_after(bytes: &[u8]) -> Term {
        let mut t = Term::new(TermOptions::default());
        t.feed(bytes);
        t
    }

    #[test]
    fn legacy_colors_resolve_through_palette() {
        let t = term_after(b"\x1b[31m");
        assert_eq!(t.vt.attrs.fg(), Some(0xcd0000));
        let t = term_after(b"\x1b[91m");
        assert_eq!(t.vt.attrs.fg(), Some(0xff0000));
        let t = term_after(b"\x1b[44m");
        assert_eq!(t.vt.attrs.bg(), Some(0x0000ee));
    }

    #[test]
    fn sgr_zero_resets() {
        let t = term_after(b"\x1b[1;31m\x1b[0m");
        assert_eq!(t.vt.attrs, petrel_core::Attributes::new());
    }

    #[test]
    fn indexed_256_semicolon_form() {
        let t = term_after(b"\x1b[38;5;196m");
        assert_eq!(t.vt.attrs.fg(), Some(t.colors.table[196]));
    }

    #[test]
    fn direct_rgb_semicolon_form() {
        let t = term_after(b"\x1b[38;2;1;2;3m\x1b[48;2;255;0;128m");
        assert_eq!(t.vt.attrs.fg(), Some(0x010203));
        assert_eq!(t.vt.attrs.bg(), Some(0xff0080));
    }

    #[test]
    fn colon_subparameter_forms() {
        let t = term_after(b"\x1b[38:5:21m");
        assert_eq!(t.vt.attrs.fg(), Some(t.colors.table[21]));
        let t = term_after(b"\x1b[38:2:10:20:30m");
        assert_eq!(t.vt.attrs.fg(), Some(0x0a141e));
        // With a color-space id.
        let t = term_after(b"\x1b[38:2::10:20:30m");
        assert_eq!(t.vt.attrs.fg(), Some(0x0a141e));
    }

    #[test]
    fn semicolon_rgb_consumes_following_params() {
        let t = term_after(b"\x1b[38;2;10;20;30;1m");
        assert_eq!(t.vt.attrs.fg(), Some(0x0a141e));
        assert!(t.vt.attrs.style().contains(StyleFlags::BOLD));
    }

    #[test]
    fn underline_style_subparams() {
        let t = term_after(b"\x1b[4:3m");
        assert!(t.vt.attrs.style().contains(StyleFlags::UNDERLINE));
        let t = term_after(b"\x1b[4m\x1b[4:0m");
        assert!(!t.vt.attrs.style().contains(StyleFlags::UNDERLINE));
    }

    #[test]
    fn set_and_clear_pairs() {
        let t = term_after(b"\x1b[1;2;3;4;5;7;8;9m\x1b[22;23;24;25;27;28;29m");
        assert_eq!(t.vt.attrs.style(), StyleFlags::empty());
    }

    #[test]
    fn underline_color_is_consumed_without_effect() {
        let t = term_after(b"\x1b[58;2;9;9;9;1m");
        assert!(t.vt.attrs.style().contains(StyleFlags::BOLD));
        assert_eq!(t.vt.attrs.fg(), None);
    }

    #[test]
    fn default_fg_bg_restore() {
        let t = term_after(b"\x1b[31;41m\x1b[39;49m");
        assert_eq!(t.vt.attrs.fg(), None);
        assert_eq!(t.vt.attrs.bg(), None);
    }
}
