//! A single grid row: cells, dirty tracking, and hyperlink spans.

use crate::cell::{Attributes, Cell};
use crate::link::{LinkId, LinkRegistry};

/// Inclusive column span carrying one hyperlink id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSpan {
    pub start: usize,
    pub end: usize,
    pub id: LinkId,
}

/// A fixed-width array of cells plus per-row bookkeeping.
///
/// `linebreak` records a hard line termination (CR/LF or an erase reaching
/// the margin), as opposed to an auto-wrap continuation; selection
/// extraction and resize use it to decide where real newlines are.
///
/// Each live span holds one [`LinkRegistry`] reference, so every mutation
/// that creates or drops spans takes the registry and keeps the counts
/// balanced.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub dirty: bool,
    pub linebreak: bool,
    links: Vec<LinkSpan>,
}

impl Row {
    #[must_use]
    pub fn new(cols: usize) -> Self {
        Self {
            cells: vec![Cell::default(); cols],
            dirty: false,
            linebreak: false,
            links: Vec::new(),
        }
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cells.len()
    }

    /// Blank the whole row (BCE background from `attrs`), releasing link
    /// spans and dropping the linebreak marker. Keeps the allocation.
    pub fn reset(&mut self, attrs: Attributes, links: &mut LinkRegistry) {
        self.clear_all_links(links);
        for cell in &mut self.cells {
            cell.erase(attrs);
        }
        self.dirty = true;
        self.linebreak = false;
    }

    /// Recycle the row at a possibly different width.
    pub fn reset_with_width(
        &mut self,
        cols: usize,
        attrs: Attributes,
        links: &mut LinkRegistry,
    ) {
        self.cells.resize(cols, Cell::default());
        self.reset(attrs, links);
    }

    // ── Hyperlink spans ─────────────────────────────────────────────

    /// Record that `col` carries `id`, merging into the previous span when
    /// contiguous. A newly created span takes a registry reference.
    pub fn set_link(&mut self, col: usize, id: LinkId, links: &mut LinkRegistry) {
        if id == 0 {
            return;
        }
        if let Some(last) = self.links.last_mut()
            && last.id == id
            && col >= last.start
            && col <= last.end + 1
        {
            last.end = last.end.max(col);
            return;
        }
        self.links.push(LinkSpan {
            start: col,
            end: col,
            id,
        });
        links.acquire_id(id);
    }

    /// The hyperlink id at `col`, or 0.
    #[must_use]
    pub fn link_at(&self, col: usize) -> LinkId {
        self.links
            .iter()
            .rev()
            .find(|span| col >= span.start && col <= span.end)
            .map_or(0, |span| span.id)
    }

    /// Remove link attribution from `[start, end)`, splitting spans that
    /// straddle the boundary. Fully covered spans release their registry
    /// reference; a span split into two surviving halves takes one more.
    pub fn clear_links(&mut self, start: usize, end: usize, links: &mut LinkRegistry) {
        if start >= end || self.links.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.links.len());
        for span in self.links.drain(..) {
            if span.end < start || span.start >= end {
                out.push(span);
                continue;
            }
            let mut kept = 0;
            if span.start < start {
                out.push(LinkSpan {
                    start: span.start,
                    end: start - 1,
                    id: span.id,
                });
                kept += 1;
            }
            if span.end >= end {
                out.push(LinkSpan {
                    start: end,
                    end: span.end,
                    id: span.id,
                });
                kept += 1;
            }
            match kept {
                0 => links.release_id(span.id),
                2 => links.acquire_id(span.id),
                _ => {}
            }
        }
        self.links = out;
    }

    /// Drop every span, releasing its registry reference (row recycle).
    pub fn clear_all_links(&mut self, links: &mut LinkRegistry) {
        for span in self.links.drain(..) {
            links.release_id(span.id);
        }
    }

    /// Drop or clamp spans past `cols` WITHOUT touching the registry.
    /// Only for freshly cloned rows whose spans hold no references yet.
    pub fn truncate_links(&mut self, cols: usize) {
        self.links.retain_mut(|span| {
            if span.start >= cols {
                return false;
            }
            span.end = span.end.min(cols.saturating_sub(1));
            true
        });
    }

    /// Take one registry reference per span (freshly cloned rows).
    pub fn acquire_links(&self, links: &mut LinkRegistry) {
        for span in &self.links {
            links.acquire_id(span.id);
        }
    }

    #[must_use]
    pub fn link_spans(&self) -> &[LinkSpan] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StyleFlags;

    #[test]
    fn reset_blanks_cells_and_releases_spans() {
        let mut links = LinkRegistry::new();
        let id = links.acquire("https://row.test");
        let mut row = Row::new(4);
        let mut attrs = Attributes::new();
        attrs.insert_style(StyleFlags::BOLD);
        attrs.set_bg(Some(0x112233));
        row.cells[1] = Cell::new('x', attrs);
        row.set_link(1, id, &mut links);
        row.linebreak = true;
        assert_eq!(links.ref_count(id), 2);

        row.reset(attrs, &mut links);
        assert!(row.cells[1].is_blank());
        assert_eq!(row.cells[1].attrs.bg(), Some(0x112233));
        assert_eq!(row.cells[1].attrs.style(), StyleFlags::empty());
        assert!(!row.linebreak);
        assert!(row.dirty);
        assert_eq!(row.link_at(1), 0);
        assert_eq!(links.ref_count(id), 1);
    }

    #[test]
    fn contiguous_links_merge_with_one_reference() {
        let mut links = LinkRegistry::new();
        let id = links.acquire("https://merge.test");
        let mut row = Row::new(10);
        row.set_link(2, id, &mut links);
        row.set_link(3, id, &mut links);
        row.set_link(4, id, &mut links);
        assert_eq!(row.link_spans().len(), 1);
        assert_eq!(row.link_at(3), id);
        assert_eq!(row.link_at(5), 0);
        // One for the open link, one for the merged span.
        assert_eq!(links.ref_count(id), 2);
    }

    #[test]
    fn clear_links_splits_straddling_span() {
        let mut links = LinkRegistry::new();
        let id = links.acquire("https://split.test");
        let mut row = Row::new(10);
        for col in 2..=8 {
            row.set_link(col, id, &mut links);
        }
        assert_eq!(links.ref_count(id), 2);

        // The split leaves two spans, so the id gains a reference.
        row.clear_links(4, 7, &mut links);
        assert_eq!(row.link_at(3), id);
        assert_eq!(row.link_at(5), 0);
        assert_eq!(row.link_at(8), id);
        assert_eq!(links.ref_count(id), 3);

        row.clear_links(0, 10, &mut links);
        assert_eq!(links.ref_count(id), 1);
    }

    #[test]
    fn fully_cleared_span_frees_closed_link() {
        let mut links = LinkRegistry::new();
        let id = links.acquire("https://gone.test");
        let mut row = Row::new(10);
        row.set_link(4, id, &mut links);
        row.set_link(5, id, &mut links);
        // Close the link: only the span keeps the URI alive.
        links.release_id(id);
        assert_eq!(links.ref_count(id), 1);

        row.clear_links(0, 10, &mut links);
        assert_eq!(row.link_at(4), 0);
        assert_eq!(links.uri(id), None);
        assert!(links.is_empty());
    }

    #[test]
    fn truncate_and_acquire_for_cloned_rows() {
        let mut links = LinkRegistry::new();
        let id = links.acquire("https://clone.test");
        let mut row = Row::new(10);
        for col in 3..=8 {
            row.set_link(col, id, &mut links);
        }
        assert_eq!(links.ref_count(id), 2);

        // A clone's spans hold no references until acquired.
        let mut clone = row.clone();
        clone.truncate_links(5);
        assert_eq!(clone.link_spans(), &[LinkSpan { start: 3, end: 4, id }]);
        clone.acquire_links(&mut links);
        assert_eq!(links.ref_count(id), 3);
    }

    #[test]
    fn reset_with_width_resizes() {
        let mut links = LinkRegistry::new();
        let mut row = Row::new(4);
        row.reset_with_width(7, Attributes::new(), &mut links);
        assert_eq!(row.cols(), 7);
        row.reset_with_width(2, Attributes::new(), &mut links);
        assert_eq!(row.cols(), 2);
    }
}
