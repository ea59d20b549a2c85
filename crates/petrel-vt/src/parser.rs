//! The DEC ANSI parser, extended with UTF-8 decoding.
//!
//! State machine per the canonical parser (vt100.net/emu/dec_ansi_parser),
//! with three deviations that match modern UTF-8-only terminals:
//!
//! - UTF-8 lead bytes branch into dedicated continuation states; a bad
//!   continuation byte returns to ground without emitting.
//! - 8-bit C1 controls are not honored as sequence introducers; they abort
//!   the current sequence and drop to ground.
//! - OSC strings accept bytes `0x20..=0xff` so titles can carry UTF-8.

use crate::term::Term;
use crate::{csi, dcs, osc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    OscString,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsIgnore,
    DcsPassthrough,
    SosPmApcString,
    Utf8T21,
    Utf8T31,
    Utf8T32,
    Utf8T41,
    Utf8T42,
    Utf8T43,
}

/// Feed a chunk of slave output through the state machine.
pub(crate) fn feed(term: &mut Term, bytes: &[u8]) {
    let mut state = term.vt.state;
    for &b in bytes {
        state = match state {
            State::Ground => ground(term, b),
            State::Escape => escape(term, b),
            State::EscapeIntermediate => escape_intermediate(term, b),
            State::CsiEntry => csi_entry(term, b),
            State::CsiParam => csi_param(term, b),
            State::CsiIntermediate => csi_intermediate(term, b),
            State::CsiIgnore => csi_ignore(term, b),
            State::OscString => osc_string(term, b),
            State::DcsEntry => dcs_entry(term, b),
            State::DcsParam => dcs_param(term, b),
            State::DcsIntermediate => dcs_intermediate(term, b),
            State::DcsIgnore => dcs_ignore(term, b),
            State::DcsPassthrough => dcs_passthrough(term, b),
            State::SosPmApcString => sos_pm_apc(term, b),
            State::Utf8T21 => utf8_final(term, b),
            State::Utf8T31 => utf8_continue(term, b, 6, State::Utf8T32),
            State::Utf8T32 => utf8_final(term, b),
            State::Utf8T41 => utf8_continue(term, b, 12, State::Utf8T42),
            State::Utf8T42 => utf8_continue(term, b, 6, State::Utf8T43),
            State::Utf8T43 => utf8_final(term, b),
        };
        term.vt.state = state;
    }
}

// ── Actions ─────────────────────────────────────────────────────────

fn action_clear(term: &mut Term) {
    term.vt.params.clear();
    term.vt.private = 0;
}

/// Pack a private/intermediate byte; later bytes land in higher octets.
fn action_collect(term: &mut Term, b: u8) {
    let private = &mut term.vt.private;
    if *private & 0xff == 0 {
        *private = u32::from(b);
    } else if (*private >> 8) & 0xff == 0 {
        *private |= u32::from(b) << 8;
    } else if (*private >> 16) & 0xff == 0 {
        *private |= u32::from(b) << 16;
    } else if (*private >> 24) & 0xff == 0 {
        *private |= u32::from(b) << 24;
    } else {
        tracing::warn!("more than four private/intermediate bytes");
    }
}

fn action_execute(term: &mut Term, c: u8) {
    match c {
        0x00 => {}
        0x07 => term.bell(),
        0x08 => term.backspace(),
        0x09 => term.horizontal_tab(1),
        // LF, VT and FF all act as line feed.
        0x0a | 0x0b | 0x0c => term.linefeed(),
        0x0d => term.carriage_return(),
        0x0e => term.charsets.selected = 1, // SO
        0x0f => term.charsets.selected = 0, // SI
        _ => {}
    }
}

fn action_print(term: &mut Term, c: u8) {
    term.print_scalar(c as char);
}

fn action_utf8_print(term: &mut Term, cp: u32) {
    // Surrogates and values past U+10FFFF fail the conversion and drop.
    if let Some(ch) = char::from_u32(cp) {
        term.print_scalar(ch);
    }
}

fn action_esc_dispatch(term: &mut Term, final_byte: u8) {
    match term.vt.private {
        0 => match final_byte {
            b'7' => term.save_cursor(),
            b'8' => term.restore_cursor(),
            b'c' => term.reset(true),
            b'D' => term.linefeed(),
            b'E' => {
                term.carriage_return();
                term.linefeed();
            }
            b'H' => term.set_tab_stop(),
            b'M' => term.reverse_index(),
            b'N' => term.charsets.single_shift = Some(2),
            b'O' => term.charsets.single_shift = Some(3),
            b'n' => term.charsets.selected = 2,
            b'o' => term.charsets.selected = 3,
            b'\\' => {} // ST
            b'=' => term.keypad_keys_mode = crate::term::KeypadKeys::Application,
            b'>' => term.keypad_keys_mode = crate::term::KeypadKeys::Numerical,
            _ => term.unhandled("ESC"),
        },

        // Designate G0-G3.
        p @ (0x28..=0x2b) => {
            let slot = (p - 0x28) as usize;
            match final_byte {
                b'0' => term.charsets.set[slot] = crate::term::Charset::Graphic,
                b'B' => term.charsets.set[slot] = crate::term::Charset::Ascii,
                _ => term.unhandled("ESC charset"),
            }
        }

        0x23 => match final_byte {
            // DECALN
            b'8' => term.screen_alignment_test(),
            _ => term.unhandled("ESC #"),
        },

        _ => term.unhandled("ESC private"),
    }
}

// ── Per-state switches ──────────────────────────────────────────────

/// 0x18/0x1A abort and execute, ESC restarts, C1 drops to ground;
/// everything else stays in the current state.
fn anywhere(term: &mut Term, b: u8) -> State {
    match b {
        0x18 | 0x1a => {
            action_execute(term, b);
            State::Ground
        }
        0x1b => {
            action_clear(term);
            State::Escape
        }
        0x80..=0x9f => State::Ground,
        _ => term.vt.state,
    }
}

fn ground(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::Ground
        }
        // 0x7f is DEL: a zero-width non-glyph, ignored.
        0x20..=0x7e => {
            action_print(term, b);
            State::Ground
        }
        0xc2..=0xdf => {
            term.vt.utf8 = u32::from(b & 0x1f) << 6;
            State::Utf8T21
        }
        0xe0..=0xef => {
            term.vt.utf8 = u32::from(b & 0x0f) << 12;
            State::Utf8T31
        }
        0xf0..=0xf4 => {
            term.vt.utf8 = u32::from(b & 0x07) << 18;
            State::Utf8T41
        }
        _ => anywhere(term, b),
    }
}

fn escape(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::Escape
        }
        0x20..=0x2f => {
            action_collect(term, b);
            State::EscapeIntermediate
        }
        0x50 => {
            action_clear(term);
            State::DcsEntry
        }
        0x58 | 0x5e | 0x5f => State::SosPmApcString,
        0x5b => {
            action_clear(term);
            State::CsiEntry
        }
        0x5d => {
            term.vt.osc.clear();
            State::OscString
        }
        0x30..=0x4f | 0x51..=0x57 | 0x59 | 0x5a | 0x5c | 0x60..=0x7e => {
            action_esc_dispatch(term, b);
            State::Ground
        }
        0x7f => State::Escape,
        _ => anywhere(term, b),
    }
}

fn escape_intermediate(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::EscapeIntermediate
        }
        0x20..=0x2f => {
            action_collect(term, b);
            State::EscapeIntermediate
        }
        0x30..=0x7e => {
            action_esc_dispatch(term, b);
            State::Ground
        }
        0x7f => State::EscapeIntermediate,
        _ => anywhere(term, b),
    }
}

fn csi_entry(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::CsiEntry
        }
        0x20..=0x2f => {
            action_collect(term, b);
            State::CsiIntermediate
        }
        0x30..=0x3b => {
            term.vt.params.collect(b);
            State::CsiParam
        }
        0x3c..=0x3f => {
            action_collect(term, b);
            State::CsiParam
        }
        0x40..=0x7e => {
            csi::dispatch(term, b);
            State::Ground
        }
        0x7f => State::CsiEntry,
        _ => anywhere(term, b),
    }
}

fn csi_param(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::CsiParam
        }
        0x20..=0x2f => {
            action_collect(term, b);
            State::CsiIntermediate
        }
        0x30..=0x3b => {
            term.vt.params.collect(b);
            State::CsiParam
        }
        0x3c..=0x3f => State::CsiIgnore,
        0x40..=0x7e => {
            csi::dispatch(term, b);
            State::Ground
        }
        0x7f => State::CsiParam,
        _ => anywhere(term, b),
    }
}

fn csi_intermediate(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::CsiIntermediate
        }
        0x20..=0x2f => {
            action_collect(term, b);
            State::CsiIntermediate
        }
        0x30..=0x3f => State::CsiIgnore,
        0x40..=0x7e => {
            csi::dispatch(term, b);
            State::Ground
        }
        0x7f => State::CsiIntermediate,
        _ => anywhere(term, b),
    }
}

fn csi_ignore(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => {
            action_execute(term, b);
            State::CsiIgnore
        }
        0x20..=0x3f | 0x7f => State::CsiIgnore,
        0x40..=0x7e => State::Ground,
        _ => anywhere(term, b),
    }
}

fn osc_string(term: &mut Term, b: u8) -> State {
    match b {
        // BEL terminator.
        0x07 => {
            term.vt.osc_bel_terminated = true;
            osc::dispatch(term);
            State::Ground
        }
        0x00..=0x06 | 0x08..=0x17 | 0x19 | 0x1c..=0x1f => State::OscString,
        0x18 | 0x1a => {
            term.vt.osc_bel_terminated = false;
            osc::dispatch(term);
            action_execute(term, b);
            State::Ground
        }
        // ESC: dispatch now; a following `\` is the ST no-op.
        0x1b => {
            term.vt.osc_bel_terminated = false;
            osc::dispatch(term);
            action_clear(term);
            State::Escape
        }
        // 0x20..=0xff: UTF-8 payloads pass through raw.
        _ => {
            term.vt.osc.push(b);
            State::OscString
        }
    }
}

fn dcs_entry(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => State::DcsEntry,
        0x20..=0x2f => {
            action_collect(term, b);
            State::DcsIntermediate
        }
        0x30..=0x39 | 0x3b => {
            term.vt.params.collect(b);
            State::DcsParam
        }
        0x3a => State::DcsIgnore,
        0x3c..=0x3f => {
            action_collect(term, b);
            State::DcsParam
        }
        0x40..=0x7e => {
            dcs::hook(term, b);
            State::DcsPassthrough
        }
        0x7f => State::DcsEntry,
        _ => anywhere(term, b),
    }
}

fn dcs_param(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => State::DcsParam,
        0x20..=0x2f => {
            action_collect(term, b);
            State::DcsIntermediate
        }
        0x30..=0x39 | 0x3b => {
            term.vt.params.collect(b);
            State::DcsParam
        }
        0x3a | 0x3c..=0x3f => State::DcsIgnore,
        0x40..=0x7e => {
            dcs::hook(term, b);
            State::DcsPassthrough
        }
        0x7f => State::DcsParam,
        _ => anywhere(term, b),
    }
}

fn dcs_intermediate(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x1f => State::DcsIntermediate,
        0x20..=0x2f => {
            action_collect(term, b);
            State::DcsIntermediate
        }
        0x30..=0x3f => State::DcsIgnore,
        0x40..=0x7e => {
            dcs::hook(term, b);
            State::DcsPassthrough
        }
        0x7f => State::DcsIntermediate,
        _ => anywhere(term, b),
    }
}

fn dcs_ignore(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x7f => State::DcsIgnore,
        _ => anywhere(term, b),
    }
}

fn dcs_passthrough(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x7e => {
            dcs::put(term, b);
            State::DcsPassthrough
        }
        0x7f => State::DcsPassthrough,
        0x18 | 0x1a => {
            dcs::unhook(term);
            action_execute(term, b);
            State::Ground
        }
        0x1b => {
            dcs::unhook(term);
            action_clear(term);
            State::Escape
        }
        0x80..=0x9f => {
            dcs::unhook(term);
            State::Ground
        }
        _ => State::DcsPassthrough,
    }
}

fn sos_pm_apc(term: &mut Term, b: u8) -> State {
    match b {
        0x00..=0x17 | 0x19 | 0x1c..=0x7f => State::SosPmApcString,
        _ => anywhere(term, b),
    }
}

// ── UTF-8 continuation states ───────────────────────────────────────

fn utf8_continue(term: &mut Term, b: u8, shift: u32, next: State) -> State {
    if (0x80..=0xbf).contains(&b) {
        term.vt.utf8 |= u32::from(b & 0x3f) << shift;
        next
    } else {
        State::Ground
    }
}

fn utf8_final(term: &mut Term, b: u8) -> State {
    if (0x80..=0xbf).contains(&b) {
        let cp = term.vt.utf8 | u32::from(b & 0x3f);
        action_utf8_print(term, cp);
    }
    State::Ground
}
