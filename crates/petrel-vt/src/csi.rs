//! CSI dispatch: switch on the packed private/intermediate word, then on
//! the final byte.

use petrel_core::{Coord, ScrollRegion};
use tracing::debug;

use crate::sgr;
use crate::term::{
    CursorKeys, KeypadKeys, MouseReporting, MouseTracking, Origin, Term,
};

pub(crate) fn dispatch(term: &mut Term, final_byte: u8) {
    match term.vt.private {
        0 => dispatch_plain(term, final_byte),
        // '?'
        0x3f => dispatch_question(term, final_byte),
        // '>'
        0x3e => dispatch_gt(term, final_byte),
        // '!'
        0x21 => match final_byte {
            b'p' => term.reset(false), // DECSTR
            _ => term.unhandled("CSI !"),
        },
        // '? $': DECRQM.
        0x243f => match final_byte {
            b'p' => {
                let mode = term.vt.params.raw(0);
                let status = match mode_state(term, mode) {
                    Some(true) => 1,
                    Some(false) => 2,
                    None => 0,
                };
                term.reply(format!("\x1b[?{mode};{status}$y").into_bytes());
            }
            _ => term.unhandled("CSI ? $"),
        },
        _ => term.unhandled("CSI private"),
    }
}

fn dispatch_plain(term: &mut Term, final_byte: u8) {
    let p0 = term.vt.params.get(0, 1) as usize;
    match final_byte {
        b'A' => term.cursor_up(p0),
        b'B' | b'e' => term.cursor_down(p0),
        b'C' | b'a' => term.cursor_right(p0),
        b'D' => term.cursor_left(p0),
        b'E' => {
            term.cursor_down(p0);
            term.carriage_return();
        }
        b'F' => {
            term.cursor_up(p0);
            term.carriage_return();
        }
        b'G' | b'`' => {
            let row = term.grid().cursor.point.row;
            let col = (p0 - 1).min(term.cols - 1);
            let cursor = &mut term.grid_mut().cursor;
            cursor.point = Coord::new(row, col);
            cursor.lcf = false;
        }
        b'd' => {
            // VPA: row absolute (origin-aware), column kept.
            let col = term.grid().cursor.point.col;
            term.cursor_to(p0 - 1, col);
        }
        b'H' | b'f' => {
            let col = term.vt.params.get(1, 1) as usize;
            term.cursor_to(p0 - 1, col - 1);
        }
        b'I' => term.horizontal_tab(p0),
        b'Z' => term.backward_tab(p0),

        b'J' => match term.vt.params.raw(0) {
            0 => {
                let point = term.grid().cursor.point;
                let end = Coord::new(term.rows - 1, term.cols - 1);
                term.erase(point, end);
            }
            1 => {
                let point = term.grid().cursor.point;
                term.erase(Coord::new(0, 0), point);
            }
            2 => term.erase_screen(),
            3 => {
                let (grid, links) = term.grid_and_links();
                grid.clear_scrollback(links);
            }
            _ => term.unhandled("CSI J"),
        },
        b'K' => {
            let point = term.grid().cursor.point;
            match term.vt.params.raw(0) {
                0 => term.erase(point, Coord::new(point.row, term.cols - 1)),
                1 => term.erase(Coord::new(point.row, 0), point),
                2 => term.erase(
                    Coord::new(point.row, 0),
                    Coord::new(point.row, term.cols - 1),
                ),
                _ => term.unhandled("CSI K"),
            }
        }

        b'L' => {
            // IL: scroll down within [cursor, region bottom).
            let row = term.grid().cursor.point.row;
            if term.scroll_region.contains(row) {
                let region = ScrollRegion::new(row, term.scroll_region.end);
                term.scroll_down_in(region, p0);
            }
        }
        b'M' => {
            let row = term.grid().cursor.point.row;
            if term.scroll_region.contains(row) {
                let region = ScrollRegion::new(row, term.scroll_region.end);
                term.scroll_up_in(region, p0);
            }
        }

        b'@' => {
            let point = term.grid().cursor.point;
            let attrs = term.vt.attrs;
            let (grid, links) = term.grid_and_links();
            grid.insert_chars(point.row, point.col, p0, attrs, links);
        }
        b'P' => {
            let point = term.grid().cursor.point;
            let attrs = term.vt.attrs;
            let (grid, links) = term.grid_and_links();
            grid.delete_chars(point.row, point.col, p0, attrs, links);
        }
        b'X' => {
            let point = term.grid().cursor.point;
            let end = Coord::new(point.row, (point.col + p0 - 1).min(term.cols - 1));
            term.erase(point, end);
        }

        b'S' => term.scroll_up(p0),
        b'T' => term.scroll_down(p0),
        b'b' => term.repeat_last(p0),

        b'c' => {
            // Primary DA: VT220 family with sixel and color.
            term.reply(b"\x1b[?62;4;22c".to_vec());
        }

        b'g' => match term.vt.params.raw(0) {
            0 => term.clear_tab_stop(),
            3 => term.clear_all_tab_stops(),
            _ => term.unhandled("CSI g"),
        },

        b'h' | b'l' => {
            let enable = final_byte == b'h';
            for i in 0..term.vt.params.len() {
                match term.vt.params.raw(i) {
                    4 => term.insert_mode = enable,
                    mode => debug!(mode, enable, "unimplemented ANSI mode"),
                }
            }
        }

        b'm' => sgr::dispatch(term),

        b'n' => match term.vt.params.raw(0) {
            5 => term.reply(b"\x1b[0n".to_vec()),
            6 => term.report_cursor_position(),
            _ => term.unhandled("CSI n"),
        },

        b'r' => {
            // DECSTBM. Bottom defaults to (and is clamped to) the last row.
            let top = term.vt.params.get(0, 1) as usize;
            let bottom = term.vt.params.get(1, term.rows as u32) as usize;
            let top = top.min(term.rows);
            let bottom = bottom.min(term.rows);
            if top < bottom {
                term.scroll_region = ScrollRegion::new(top - 1, bottom);
                term.cursor_to(0, 0);
            }
        }

        b's' => term.save_cursor(),
        b'u' => term.restore_cursor(),

        b't' => {
            // XTWINOPS, restricted to the title-stack subset.
            match term.vt.params.raw(0) {
                22 => {
                    let title = term.title.clone();
                    term.title_stack.push(title);
                }
                23 => {
                    if let Some(title) = term.title_stack.pop() {
                        term.set_title(&title);
                    }
                }
                op => debug!(op, "ignored XTWINOPS"),
            }
        }

        _ => term.unhandled("CSI"),
    }
}

fn dispatch_question(term: &mut Term, final_byte: u8) {
    match final_byte {
        b'h' | b'l' => {
            let enable = final_byte == b'h';
            for i in 0..term.vt.params.len() {
                let mode = term.vt.params.raw(i);
                decset(term, mode, enable);
            }
        }
        b's' => {
            for i in 0..term.vt.params.len() {
                let mode = term.vt.params.raw(i);
                if let Some(state) = mode_state(term, mode) {
                    term.xtsave.insert(mode, state);
                }
            }
        }
        b'r' => {
            for i in 0..term.vt.params.len() {
                let mode = term.vt.params.raw(i);
                if let Some(&state) = term.xtsave.get(&mode) {
                    decset(term, mode, state);
                }
            }
        }
        _ => term.unhandled("CSI ?"),
    }
}

fn dispatch_gt(term: &mut Term, final_byte: u8) {
    match final_byte {
        // Secondary DA: VT420-class.
        b'c' => term.reply(b"\x1b[>41;0;0c".to_vec()),
        _ => term.unhandled("CSI >"),
    }
}

/// DECSET/DECRST.
pub(crate) fn decset(term: &mut Term, mode: u32, enable: bool) {
    use crate::events::TermEvent;
    match mode {
        1 => {
            term.cursor_keys_mode = if enable {
                CursorKeys::Application
            } else {
                CursorKeys::Normal
            };
        }
        3 => {
            // DECCOLM: column switching is not supported, but the mandated
            // side effects (clear + home + region reset) are honored.
            term.scroll_region = ScrollRegion::new(0, term.rows);
            term.erase_screen();
            term.cursor_to(0, 0);
        }
        5 => {
            if term.reverse != enable {
                term.reverse = enable;
                term.grid_mut().damage_all();
                term.push_event(TermEvent::ReverseVideoChanged(enable));
            }
        }
        6 => {
            term.origin = if enable {
                Origin::Relative
            } else {
                Origin::Absolute
            };
            term.cursor_to(0, 0);
        }
        7 => {
            term.auto_margin = enable;
            term.grid_mut().cursor.lcf = false;
        }
        9 => {
            set_tracking(term, MouseTracking::X10, enable);
        }
        12 => {
            term.cursor_blink = enable;
            term.push_event(TermEvent::CursorBlinkChanged(enable));
        }
        25 => {
            term.hide_cursor = !enable;
            term.push_event(TermEvent::CursorVisibilityChanged(enable));
        }
        45 => term.reverse_wrap = enable,
        47 => {
            if enable {
                term.enter_alt_screen(false);
            } else {
                term.leave_alt_screen();
            }
        }
        66 => {
            term.keypad_keys_mode = if enable {
                KeypadKeys::Application
            } else {
                KeypadKeys::Numerical
            };
        }
        1000 => set_tracking(term, MouseTracking::Click, enable),
        1002 => set_tracking(term, MouseTracking::Drag, enable),
        1003 => set_tracking(term, MouseTracking::Motion, enable),
        1004 => term.focus_events = enable,
        1005 => set_reporting(term, MouseReporting::Utf8, enable),
        1006 => set_reporting(term, MouseReporting::Sgr, enable),
        1007 => term.alt_scrolling = enable,
        1015 => set_reporting(term, MouseReporting::Urxvt, enable),
        1034 => term.meta_eight_bit = enable,
        1036 => term.meta_esc_prefix = enable,
        1047 => {
            if enable {
                term.enter_alt_screen(true);
            } else {
                term.leave_alt_screen();
            }
        }
        1048 => {
            if enable {
                term.save_cursor();
            } else {
                term.restore_cursor();
            }
        }
        1049 => {
            if enable {
                term.save_cursor();
                term.enter_alt_screen(true);
            } else {
                term.leave_alt_screen();
                term.restore_cursor();
            }
        }
        2004 => term.bracketed_paste = enable,
        2026 => {
            if enable {
                term.begin_synchronized_update();
            } else {
                term.end_synchronized_update();
            }
        }
        _ => debug!(mode, enable, "unimplemented DEC private mode"),
    }
}

fn set_tracking(term: &mut Term, tracking: MouseTracking, enable: bool) {
    use crate::events::TermEvent;
    if enable {
        term.mouse_tracking = tracking;
    } else if term.mouse_tracking == tracking {
        term.mouse_tracking = MouseTracking::None;
    }
    term.push_event(TermEvent::MouseModesChanged);
}

fn set_reporting(term: &mut Term, reporting: MouseReporting, enable: bool) {
    use crate::events::TermEvent;
    if enable {
        term.mouse_reporting = reporting;
    } else if term.mouse_reporting == reporting {
        term.mouse_reporting = MouseReporting::Normal;
    }
    term.push_event(TermEvent::MouseModesChanged);
}

/// Current SET state of a DEC private mode, for XTSAVE and DECRQM.
/// `None` for modes this terminal does not track.
fn mode_state(term: &Term, mode: u32) -> Option<bool> {
    match mode {
        1 => Some(term.cursor_keys_mode == CursorKeys::Application),
        5 => Some(term.reverse),
        6 => Some(term.origin == Origin::Relative),
        7 => Some(term.auto_margin),
        9 => Some(term.mouse_tracking == MouseTracking::X10),
        12 => Some(term.cursor_blink),
        25 => Some(!term.hide_cursor),
        45 => Some(term.reverse_wrap),
        47 | 1047 | 1049 => Some(term.in_alt_screen()),
        66 => Some(term.keypad_keys_mode == KeypadKeys::Application),
        1000 => Some(term.mouse_tracking == MouseTracking::Click),
        1002 => Some(term.mouse_tracking == MouseTracking::Drag),
        1003 => Some(term.mouse_tracking == MouseTracking::Motion),
        1004 => Some(term.focus_events),
        1005 => Some(term.mouse_reporting == MouseReporting::Utf8),
        1006 => Some(term.mouse_reporting == MouseReporting::Sgr),
        1007 => Some(term.alt_scrolling),
        1015 => Some(term.mouse_reporting == MouseReporting::Urxvt),
        1034 => Some(term.meta_eight_bit),
        1036 => Some(term.meta_esc_prefix),
        2004 => Some(term.bracketed_paste),
        2026 => Some(term.app_sync_updates),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermOptions;

    fn term() -> Term {
        Term::new(TermOptions {
            cols: 10,
            rows: 5,
            scrollback_lines: 20,
            ..TermOptions::default()
        })
    }

    fn drain(term: &mut Term) -> Vec<u8> {
        let mut out = Vec::new();
        term.writes
            .drain_with(|b| {
                out.extend_from_slice(b);
                Ok(b.len())
            })
            .unwrap();
        out
    }

    #[test]
    fn cursor_moves_and_cup() {
        let mut t = term();
        t.feed(b"\x1b[3;4H");
        assert_eq!(t.grid().cursor.point, Coord::new(2, 3));
        t.feed(b"\x1b[2A\x1b[3C");
        assert_eq!(t.grid().cursor.point, Coord::new(0, 6));
        t.feed(b"\x1b[B\x1b[2D");
        assert_eq!(t.grid().cursor.point, Coord::new(1, 4));
        // Clamping.
        t.feed(b"\x1b[99;99H");
        assert_eq!(t.grid().cursor.point, Coord::new(4, 9));
    }

    #[test]
    fn ed_variants() {
        let mut t = term();
        t.feed(b"aaaaaaaaaa\r\nbbbbbbbbbb\r\ncccccccccc");
        t.feed(b"\x1b[2;5H\x1b[0J");
        assert_eq!(t.grid().row_text(0), "aaaaaaaaaa");
        assert_eq!(t.grid().row_text(1), "bbbb");
        assert_eq!(t.grid().row_text(2), "");

        let mut t = term();
        t.feed(b"aaaaaaaaaa\r\nbbbbbbbbbb\r\ncccccccccc");
        t.feed(b"\x1b[2;5H\x1b[1J");
        assert_eq!(t.grid().row_text(0), "");
        assert_eq!(t.grid().row_text(1), "     bbbbb");
        assert_eq!(t.grid().row_text(2), "cccccccccc");

        let mut t = term();
        t.feed(b"hello\x1b[2J\x1b[H");
        assert_eq!(t.grid().row_text(0), "");
        assert_eq!(t.grid().cursor.point, Coord::new(0, 0));
    }

    #[test]
    fn el_variants() {
        let mut t = term();
        t.feed(b"0123456789\x1b[1;5H\x1b[K");
        assert_eq!(t.grid().row_text(0), "0123");
        t.feed(b"\x1b[1;3H\x1b[1K");
        assert_eq!(t.grid().row_text(0), "   3");
    }

    #[test]
    fn insert_delete_lines_respect_region() {
        let mut t = term();
        t.feed(b"A\r\nB\r\nC\r\nD\r\nE");
        t.feed(b"\x1b[2;4r"); // region rows 1..4
        t.feed(b"\x1b[2;1H\x1b[M"); // delete line at region top
        assert_eq!(t.grid().row_text(0), "A");
        assert_eq!(t.grid().row_text(1), "C");
        assert_eq!(t.grid().row_text(2), "D");
        assert_eq!(t.grid().row_text(3), "");
        assert_eq!(t.grid().row_text(4), "E");
        t.feed(b"\x1b[2;1H\x1b[L");
        assert_eq!(t.grid().row_text(1), "");
        assert_eq!(t.grid().row_text(2), "C");
    }

    #[test]
    fn ich_dch_ech() {
        let mut t = term();
        t.feed(b"abcdef\x1b[1;2H\x1b[2@");
        assert_eq!(t.grid().row_text(0), "a  bcdef");
        t.feed(b"\x1b[1;2H\x1b[2P");
        assert_eq!(t.grid().row_text(0), "abcdef");
        t.feed(b"\x1b[1;2H\x1b[3X");
        assert_eq!(t.grid().row_text(0), "a   ef");
    }

    #[test]
    fn decstbm_homes_cursor_and_scrolls_within() {
        let mut t = term();
        t.feed(b"\x1b[2;4r");
        assert_eq!(t.scroll_region, ScrollRegion::new(1, 4));
        assert_eq!(t.grid().cursor.point, Coord::new(0, 0));
        t.feed(b"\x1b[4;1Hx\n");
        // LF at region bottom scrolls rows 1..4 only.
        assert_eq!(t.grid().scrollback_len(), 0);
    }

    #[test]
    fn origin_mode_confines_cursor() {
        let mut t = term();
        t.feed(b"\x1b[2;4r\x1b[?6h");
        assert_eq!(t.grid().cursor.point, Coord::new(1, 0));
        t.feed(b"\x1b[1;1H");
        assert_eq!(t.grid().cursor.point, Coord::new(1, 0));
        t.feed(b"\x1b[99;1H");
        assert_eq!(t.grid().cursor.point, Coord::new(3, 0));
        t.feed(b"\x1b[?6l");
        t.feed(b"\x1b[1;1H");
        assert_eq!(t.grid().cursor.point, Coord::new(0, 0));
    }

    #[test]
    fn device_attributes_and_dsr() {
        let mut t = term();
        t.feed(b"\x1b[c");
        assert_eq!(drain(&mut t), b"\x1b[?62;4;22c");
        t.feed(b"\x1b[>c");
        assert_eq!(drain(&mut t), b"\x1b[>41;0;0c");
        t.feed(b"\x1b[3;4H\x1b[6n");
        assert_eq!(drain(&mut t), b"\x1b[3;4R");
        t.feed(b"\x1b[5n");
        assert_eq!(drain(&mut t), b"\x1b[0n");
    }

    #[test]
    fn cpr_is_origin_relative() {
        let mut t = term();
        t.feed(b"\x1b[2;4r\x1b[?6h\x1b[2;1H\x1b[6n");
        assert_eq!(drain(&mut t), b"\x1b[2;1R");
    }

    #[test]
    fn decset_decrst_round_trip() {
        let mut t = term();
        t.feed(b"\x1b[?7l");
        assert!(!t.auto_margin);
        t.feed(b"\x1b[?7h");
        assert!(t.auto_margin);

        t.feed(b"\x1b[?25l");
        assert!(t.hide_cursor);
        t.feed(b"\x1b[?25h");
        assert!(!t.hide_cursor);

        t.feed(b"\x1b[?2004h\x1b[?1006h\x1b[?1002h");
        assert!(t.bracketed_paste);
        assert_eq!(t.mouse_reporting, MouseReporting::Sgr);
        assert_eq!(t.mouse_tracking, MouseTracking::Drag);
        t.feed(b"\x1b[?2004l\x1b[?1006l\x1b[?1002l");
        assert!(!t.bracketed_paste);
        assert_eq!(t.mouse_reporting, MouseReporting::Normal);
        assert_eq!(t.mouse_tracking, MouseTracking::None);
    }

    #[test]
    fn xtsave_xtrestore_round_trip() {
        let mut t = term();
        t.feed(b"\x1b[?7s");
        t.feed(b"\x1b[?7l");
        assert!(!t.auto_margin);
        t.feed(b"\x1b[?7r");
        assert!(t.auto_margin);
    }

    #[test]
    fn alt_screen_1049_round_trip() {
        let mut t = term();
        t.feed(b"content\x1b[1;3H");
        t.feed(b"\x1b[?1049h\x1b[2J");
        assert!(t.in_alt_screen());
        assert_eq!(t.grid().row_text(0), "");
        t.feed(b"altstuff");
        t.feed(b"\x1b[?1049l");
        assert!(!t.in_alt_screen());
        assert_eq!(t.grid().row_text(0), "content");
        assert_eq!(t.grid().cursor.point, Coord::new(0, 2));
    }

    #[test]
    fn decrqm_reports_sync_update_state() {
        let mut t = term();
        t.feed(b"\x1b[?2026$p");
        assert_eq!(drain(&mut t), b"\x1b[?2026;2$y");
        t.feed(b"\x1b[?2026h\x1b[?2026$p");
        assert_eq!(drain(&mut t), b"\x1b[?2026;1$y");
    }

    #[test]
    fn title_stack_push_pop() {
        let mut t = term();
        t.set_title("first");
        t.feed(b"\x1b[22t");
        t.set_title("second");
        t.feed(b"\x1b[23t");
        assert_eq!(t.title, "first");
    }

    #[test]
    fn rep_repeats_last_glyph() {
        let mut t = term();
        t.feed(b"x\x1b[4b");
        assert_eq!(t.grid().row_text(0), "xxxxx");
    }

    #[test]
    fn scroll_up_down_csi() {
        let mut t = term();
        t.feed(b"A\r\nB\r\nC");
        t.feed(b"\x1b[2S");
        assert_eq!(t.grid().row_text(0), "C");
        t.feed(b"\x1b[1T");
        assert_eq!(t.grid().row_text(0), "");
        assert_eq!(t.grid().row_text(1), "C");
    }

    #[test]
    fn soft_reset_keeps_screen() {
        let mut t = term();
        t.feed(b"keep\x1b[2;4r\x1b[?6h\x1b[!p");
        assert_eq!(t.grid().row_text(0), "keep");
        assert_eq!(t.scroll_region, ScrollRegion::new(0, 5));
        assert_eq!(t.origin, Origin::Absolute);
    }
}
