//! Interning table for base + combining character chains.
//!
//! When a zero-width combining character lands on a cell that already holds
//! a base glyph, the pair (or chain) is interned here and the cell's code
//! point slot is rewritten to `COMPOSED_LO + index`. Entries are
//! append-only: an interned chain keeps its index forever, so sentinels in
//! scrollback stay valid for the lifetime of the terminal.

use crate::cell::{COMPOSED_HI, COMPOSED_LO};

/// Maximum combining characters per chain; further marks are dropped.
pub const MAX_COMBINING: usize = 5;

/// One interned chain: a base glyph plus up to [`MAX_COMBINING`] marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composed {
    pub base: char,
    pub combining: [char; MAX_COMBINING],
    pub count: u8,
}

impl Composed {
    /// The marks actually present.
    #[must_use]
    pub fn marks(&self) -> &[char] {
        &self.combining[..usize::from(self.count)]
    }
}

/// Outcome of an intern request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOutcome {
    /// Chain interned (or found); the cell should store this sentinel.
    Sentinel(u32),
    /// The chain already carries [`MAX_COMBINING`] marks; drop the new one.
    ChainFull,
    /// The sentinel range is exhausted; drop the new mark.
    TableFull,
}

/// Append-only chain table. Capacity is bounded by the sentinel range.
#[derive(Debug, Clone, Default)]
pub struct ComposedTable {
    entries: Vec<Composed>,
}

impl ComposedTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Composed> {
        self.entries.get(index)
    }

    /// Resolve a cell sentinel to its chain.
    #[must_use]
    pub fn resolve(&self, cp: u32) -> Option<&Composed> {
        if (COMPOSED_LO..=COMPOSED_HI).contains(&cp) {
            self.get((cp - COMPOSED_LO) as usize)
        } else {
            None
        }
    }

    /// Intern `existing`'s chain (or a bare `base`) extended with `mark`.
    ///
    /// `existing` is the chain behind the cell's current sentinel, if the
    /// cell already holds one. The full chain is compared on lookup, so
    /// distinct chains never alias.
    pub fn extend(
        &mut self,
        existing: Option<&Composed>,
        base: char,
        mark: char,
    ) -> ComposeOutcome {
        let prior = existing.map_or(0, |c| usize::from(c.count));
        if prior >= MAX_COMBINING {
            return ComposeOutcome::ChainFull;
        }

        let mut combining = ['\0'; MAX_COMBINING];
        if let Some(existing) = existing {
            combining[..prior].copy_from_slice(existing.marks());
        }
        combining[prior] = mark;
        let count = (prior + 1) as u8;

        // Existing chain?
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.base == base
                && entry.count == count
                && entry.marks() == &combining[..usize::from(count)]
            {
                return ComposeOutcome::Sentinel(COMPOSED_LO + i as u32);
            }
        }

        let capacity = (COMPOSED_HI - COMPOSED_LO + 1) as usize;
        if self.entries.len() >= capacity {
            return ComposeOutcome::TableFull;
        }

        self.entries.push(Composed {
            base,
            combining,
            count,
        });
        ComposeOutcome::Sentinel(COMPOSED_LO + (self.entries.len() - 1) as u32)
    }
}
