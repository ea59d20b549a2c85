//! VT/ANSI byte-stream interpreter.
//!
//! `petrel-vt` turns the byte stream read from the pseudoterminal into
//! mutations of the [`petrel-core`](petrel_core) display model. It owns the
//! terminal state ([`Term`]): both grids, modes, charsets, colors, the DEC
//! ANSI parser, the OSC/DCS sub-protocol handlers, and the sixel decoder.
//!
//! The crate is host-agnostic: replies to the application (DA, DSR, OSC
//! queries) are queued on a write FIFO, and side effects the host must act
//! on (bell, title, clipboard, synchronized updates) are queued as
//! [`TermEvent`]s. Feeding bytes never blocks and never performs I/O.

pub mod csi;
pub mod dcs;
pub mod events;
pub mod osc;
pub mod params;
pub mod parser;
pub mod pty;
pub mod sgr;
pub mod sixel;
pub mod term;

pub use events::{ClipboardTarget, ShellMarker, TermEvent};
pub use params::Params;
pub use parser::State;
pub use pty::PtyQueue;
pub use sixel::SixelDecoder;
pub use term::{ActiveGrid, Term, TermOptions};
