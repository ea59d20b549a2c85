//! DCS: device control strings.
//!
//! On hook the private word + final byte select a consumer for the
//! passthrough bytes: the sixel decoder, the synchronized-update toggle,
//! or a collect-and-ignore buffer for everything else.

use tracing::debug;

use crate::sixel::SixelDecoder;
use crate::term::Term;

#[derive(Debug, Default)]
pub enum DcsConsumer {
    #[default]
    None,
    Sixel(Box<SixelDecoder>),
    /// `DCS = 1 s`: begin synchronized update on unhook.
    SyncBegin,
    /// `DCS = 2 s`: end synchronized update on unhook.
    SyncEnd,
    /// Unrecognized family: collected, then dropped on unhook.
    Collect(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct DcsState {
    pub consumer: DcsConsumer,
}

pub(crate) fn hook(term: &mut Term, final_byte: u8) {
    term.vt.dcs.consumer = match (term.vt.private, final_byte) {
        (0, b'q') => {
            // DECSIXEL: P2 selects the background mode (1 = transparent).
            let transparent = term.vt.params.raw(1) == 1;
            DcsConsumer::Sixel(Box::new(SixelDecoder::new(
                transparent,
                term.colors.bg,
                term.sixel_max_width,
                term.sixel_max_height,
                term.sixel_palette_size,
            )))
        }
        // '=': the iTerm2 synchronized-update protocol.
        (0x3d, b's') => match term.vt.params.raw(0) {
            1 => DcsConsumer::SyncBegin,
            2 => DcsConsumer::SyncEnd,
            p => {
                debug!(param = p, "unrecognized synchronized-update request");
                DcsConsumer::Collect(Vec::new())
            }
        },
        (private, final_byte) => {
            debug!(private, final_byte, "unimplemented DCS; collecting and ignoring");
            DcsConsumer::Collect(Vec::new())
        }
    };
}

pub(crate) fn put(term: &mut Term, byte: u8) {
    match &mut term.vt.dcs.consumer {
        DcsConsumer::Sixel(decoder) => decoder.put(byte),
        DcsConsumer::Collect(buf) => {
            // Grow in multiples of 128 bytes.
            if buf.len() == buf.capacity() {
                let target = (buf.len() + 1 + 127) / 128 * 128;
                buf.reserve_exact(target - buf.len());
            }
            buf.push(byte);
        }
        _ => {}
    }
}

pub(crate) fn unhook(term: &mut Term) {
    match std::mem::take(&mut term.vt.dcs.consumer) {
        DcsConsumer::Sixel(decoder) => {
            let (data, width, height) = decoder.finish();
            term.attach_sixel(data, width, height);
        }
        DcsConsumer::SyncBegin => term.begin_synchronized_update(),
        DcsConsumer::SyncEnd => term.end_synchronized_update(),
        DcsConsumer::Collect(buf) => {
            debug!(len = buf.len(), "dropping unrecognized DCS payload");
        }
        DcsConsumer::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TermEvent;
    use crate::term::TermOptions;

    fn term() -> Term {
        Term::new(TermOptions::default())
    }

    #[test]
    fn bsu_esu_toggle_sync_updates() {
        let mut t = term();
        t.feed(b"\x1bP=1s\x1b\\");
        assert!(t.app_sync_updates);
        t.feed(b"\x1bP=2s\x1b\\");
        assert!(!t.app_sync_updates);
        let events = t.take_events();
        assert_eq!(events, vec![TermEvent::SyncBegin, TermEvent::SyncEnd]);
    }

    #[test]
    fn duplicate_bsu_is_single_event() {
        let mut t = term();
        t.feed(b"\x1bP=1s\x1b\\\x1bP=1s\x1b\\");
        assert_eq!(t.take_events(), vec![TermEvent::SyncBegin]);
    }

    #[test]
    fn unknown_dcs_is_collected_and_dropped() {
        let mut t = term();
        t.feed(b"\x1bP+q544e\x1b\\after");
        assert_eq!(t.grid().row_text(0), "after");
        assert!(t.vt.state == crate::parser::State::Ground);
    }

    #[test]
    fn can_aborts_dcs_passthrough() {
        let mut t = term();
        t.feed(b"\x1bP=1s");
        t.feed(&[0x18]);
        // Unhook ran on CAN: the BSU still fires (terminator-agnostic),
        // matching the state machine's abort-executes-unhook rule.
        assert!(t.app_sync_updates);
        t.feed(b"x");
        assert_eq!(t.grid().row_text(0), "x");
    }

    #[test]
    fn sixel_dcs_attaches_image() {
        let mut t = term();
        // One red pixel column: select color 1 (default palette red-ish),
        // emit a full sixel column.
        t.feed(b"\x1bPq#1~\x1b\\");
        assert_eq!(t.grid().sixels().len(), 1);
        let events = t.take_events();
        assert!(events.iter().any(|e| matches!(e, TermEvent::SixelAttached)));
    }
}
