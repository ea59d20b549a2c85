#![forbid(unsafe_code)]

//! Host-agnostic terminal display model.
//!
//! `petrel-core` is the platform-independent data model at the heart of
//! petrel. It owns the cell grid, scrollback ring, cursor, selection, and
//! damage tracking, all without any host I/O dependencies.
//!
//! # Primary responsibilities
//!
//! - **Cell**: 12-byte code point + packed attribute record.
//! - **Row**: cell array + dirty/linebreak flags + hyperlink spans.
//! - **Grid**: ring of rows with a viewport offset, rewindable view, and
//!   region-aware scrolling.
//! - **Composed table**: interning of base+combining character chains.
//! - **Selection**: character/block/word/line spans over the ring.
//! - **Damage**: scroll records consumed by the renderer.
//!
//! # Design principles
//!
//! - **No I/O**: all types are pure data + logic; the interpreter crate
//!   supplies bytes and the host supplies pixels.
//! - **Index-addressed rows**: the ring is a row arena addressed by ring
//!   position, so scrolling never invalidates a reference.
//! - **`#![forbid(unsafe_code)]`**: safety enforced at compile time.

pub mod cell;
pub mod composed;
pub mod damage;
pub mod grid;
pub mod image;
pub mod link;
pub mod row;
pub mod selection;

pub use cell::{Attributes, Cell, Highlight, StyleFlags, COMPOSED_HI, COMPOSED_LO, WIDE_SPACER};
pub use composed::{ComposeOutcome, Composed, ComposedTable, MAX_COMBINING};
pub use damage::{Damage, DamageKind, ScrollRegion};
pub use grid::{Coord, Cursor, Grid};
pub use image::SixelImage;
pub use link::{LinkId, LinkRegistry};
pub use row::{LinkSpan, Row};
pub use selection::{Selection, SelectionDirection, SelectionKind, DEFAULT_WORD_DELIMITERS};
