//! Property-based invariants for the ring grid.
//!
//! 1. Every visible row always holds exactly `cols` cells.
//! 2. `offset` and `view` stay inside the ring.
//! 3. The view never rewinds past the accumulated scrollback.
//! 4. Identical operation sequences produce identical grids.
//! 5. Hyperlink registry references stay balanced: once every span is
//!    erased or recycled and the open link is closed, the registry drains.

use petrel_core::{Attributes, Grid, LinkId, LinkRegistry, ScrollRegion};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollRegionUp { start: usize, end: usize, n: usize },
    Write { row: usize, col: usize, ch: char },
    LinkSpan { row: usize, col: usize, len: usize },
    ViewUp(usize),
    ViewDown(usize),
    EraseRow(usize),
    InsertChars { row: usize, col: usize, n: usize },
    DeleteChars { row: usize, col: usize, n: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..4).prop_map(Op::ScrollUp),
        (1usize..4).prop_map(Op::ScrollDown),
        (0usize..8, 0usize..10, 1usize..4)
            .prop_map(|(start, end, n)| Op::ScrollRegionUp { start, end, n }),
        (0usize..8, 0usize..20, proptest::char::any())
            .prop_map(|(row, col, ch)| Op::Write { row, col, ch }),
        (0usize..8, 0usize..20, 1usize..6)
            .prop_map(|(row, col, len)| Op::LinkSpan { row, col, len }),
        (1usize..16).prop_map(Op::ViewUp),
        (1usize..16).prop_map(Op::ViewDown),
        (0usize..8).prop_map(Op::EraseRow),
        (0usize..8, 0usize..20, 1usize..6)
            .prop_map(|(row, col, n)| Op::InsertChars { row, col, n }),
        (0usize..8, 0usize..20, 1usize..6)
            .prop_map(|(row, col, n)| Op::DeleteChars { row, col, n }),
    ]
}

fn apply(grid: &mut Grid, links: &mut LinkRegistry, open_link: LinkId, op: &Op) {
    let attrs = Attributes::new();
    let screen = grid.screen_rows();
    let full = ScrollRegion::new(0, screen);
    match *op {
        Op::ScrollUp(n) => grid.scroll_up(full, n, attrs, links),
        Op::ScrollDown(n) => grid.scroll_down(full, n, attrs, links),
        Op::ScrollRegionUp { start, end, n } => {
            let start = start.min(screen);
            let end = end.min(screen);
            if start < end {
                grid.scroll_up(ScrollRegion::new(start, end), n, attrs, links);
            }
        }
        Op::Write { row, col, ch } => {
            let width = petrel_core::Cell::display_width(ch);
            if width > 0 {
                grid.write_cp(row, col, ch as u32, width, attrs);
            }
        }
        Op::LinkSpan { row, col, len } => {
            if row < screen {
                for c in col..(col + len).min(grid.cols()) {
                    grid.row_mut(row).set_link(c, open_link, links);
                }
            }
        }
        Op::ViewUp(n) => grid.view_up(n),
        Op::ViewDown(n) => grid.view_down(n),
        Op::EraseRow(row) => {
            if row < screen && grid.cols() > 0 {
                grid.erase_cells(
                    petrel_core::Coord::new(row, 0),
                    petrel_core::Coord::new(row, grid.cols() - 1),
                    attrs,
                    links,
                );
            }
        }
        Op::InsertChars { row, col, n } => {
            grid.insert_chars(row, col, n, attrs, links);
        }
        Op::DeleteChars { row, col, n } => {
            grid.delete_chars(row, col, n, attrs, links);
        }
    }
}

proptest! {
    #[test]
    fn structural_invariants_hold(
        (cols, rows, scrollback) in (1usize..40, 1usize..8, 0usize..20),
        ops in proptest::collection::vec(op(), 0..64),
    ) {
        let mut grid = Grid::new(cols, rows, scrollback);
        let mut links = LinkRegistry::new();
        let open_link = links.acquire("https://invariant.test");
        for op in &ops {
            apply(&mut grid, &mut links, open_link, op);

            prop_assert!(grid.offset() < grid.ring_rows());
            prop_assert!(grid.view() < grid.ring_rows());
            prop_assert!(grid.view_behind() <= grid.scrollback_len());
            prop_assert!(grid.scrollback_len() <= grid.ring_rows() - grid.screen_rows());
            for r in 0..grid.screen_rows() {
                prop_assert_eq!(grid.row(r).cols(), cols);
            }
        }

        // Reference accounting: dropping every span and closing the open
        // link must drain the registry completely.
        grid.release_all_links(&mut links);
        links.release_id(open_link);
        prop_assert!(links.is_empty());
    }

    #[test]
    fn op_sequences_are_deterministic(
        ops in proptest::collection::vec(op(), 0..48),
    ) {
        let mut a = Grid::new(20, 6, 12);
        let mut b = Grid::new(20, 6, 12);
        let mut links_a = LinkRegistry::new();
        let mut links_b = LinkRegistry::new();
        let open_a = links_a.acquire("https://determinism.test");
        let open_b = links_b.acquire("https://determinism.test");
        for op in &ops {
            apply(&mut a, &mut links_a, open_a, op);
            apply(&mut b, &mut links_b, open_b, op);
        }
        for r in 0..a.screen_rows() {
            prop_assert_eq!(a.row_text(r), b.row_text(r));
        }
        prop_assert_eq!(a.offset(), b.offset());
        prop_assert_eq!(a.scrollback_len(), b.scrollback_len());
        prop_assert_eq!(links_a.len(), links_b.len());
    }
}
