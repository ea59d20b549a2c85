//! Hyperlink URI interning for OSC 8.
//!
//! Cells cannot carry a URI, or even a 16-bit id (the 12-byte cell has
//! three spare attribute bits), so rows carry compact id spans and this
//! registry maps ids to URIs. Ids are reference counted so the registry can
//! shed URIs whose rows have been recycled out of the ring.

use std::collections::HashMap;

/// Interned hyperlink id. Zero means "no link".
pub type LinkId = u16;

#[derive(Debug, Clone)]
struct LinkSlot {
    uri: String,
    ref_count: u32,
}

/// Registry mapping [`LinkId`]s to URIs, with deduplication and
/// reference-counted release.
#[derive(Debug, Clone, Default)]
pub struct LinkRegistry {
    /// Slots indexed by id (0 reserved).
    slots: Vec<Option<LinkSlot>>,
    lookup: HashMap<String, LinkId>,
    free_list: Vec<LinkId>,
}

impl LinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: vec![None],
            lookup: HashMap::new(),
            free_list: Vec::new(),
        }
    }

    /// Intern a URI and take one reference to it.
    ///
    /// Empty URIs return 0 ("no link"), as does id-space exhaustion.
    pub fn acquire(&mut self, uri: &str) -> LinkId {
        if uri.is_empty() {
            return 0;
        }
        if let Some(&id) = self.lookup.get(uri) {
            self.acquire_id(id);
            return id;
        }

        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                let next = self.slots.len();
                if next > usize::from(LinkId::MAX) {
                    return 0;
                }
                self.slots.push(None);
                next as LinkId
            }
        };

        self.slots[usize::from(id)] = Some(LinkSlot {
            uri: uri.to_string(),
            ref_count: 1,
        });
        self.lookup.insert(uri.to_string(), id);
        id
    }

    /// Take an additional reference to an existing id. 0 and stale ids are
    /// ignored.
    pub fn acquire_id(&mut self, id: LinkId) {
        if id == 0 {
            return;
        }
        if let Some(Some(slot)) = self.slots.get_mut(usize::from(id)) {
            slot.ref_count = slot.ref_count.saturating_add(1);
        }
    }

    /// Drop one reference; the slot is freed when the count reaches zero.
    pub fn release_id(&mut self, id: LinkId) {
        if id == 0 {
            return;
        }
        let Some(entry) = self.slots.get_mut(usize::from(id)) else {
            return;
        };
        let emptied = match entry.as_mut() {
            Some(slot) if slot.ref_count > 0 => {
                slot.ref_count -= 1;
                slot.ref_count == 0
            }
            _ => false,
        };
        if emptied && let Some(removed) = entry.take() {
            self.lookup.remove(&removed.uri);
            self.free_list.push(id);
        }
    }

    #[must_use]
    pub fn uri(&self, id: LinkId) -> Option<&str> {
        self.slots
            .get(usize::from(id))
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.uri.as_str())
    }

    /// Current reference count for `id` (0 for stale or freed ids).
    #[must_use]
    pub fn ref_count(&self, id: LinkId) -> u32 {
        self.slots
            .get(usize::from(id))
            .and_then(|slot| slot.as_ref())
            .map_or(0, |slot| slot.ref_count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.slots.push(None);
        self.lookup.clear();
        self.free_list.clear();
    }
}
