// ABOUTME: Per-image-ID usage counter, the source of truth for "in use".
// ABOUTME: An ID absent from the map is untracked; reaching zero removes it.

use std::collections::HashMap;

use crate::types::ImageId;

/// Result of releasing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decrement {
    /// The ID had no count; nothing changed.
    Untracked,
    /// Still referenced by this many users.
    Remaining(u32),
    /// The last reference went away and the entry was removed.
    Released,
}

#[derive(Debug, Default)]
pub(crate) struct ReferenceCounts {
    counts: HashMap<ImageId, u32>,
}

impl ReferenceCounts {
    /// Add one reference, starting at 1 for an unseen ID. Returns the new count.
    pub(crate) fn increment(&mut self, id: &ImageId) -> u32 {
        let count = self.counts.entry(id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub(crate) fn decrement(&mut self, id: &ImageId) -> Decrement {
        let Some(count) = self.counts.get_mut(id) else {
            return Decrement::Untracked;
        };

        *count -= 1;
        if *count > 0 {
            return Decrement::Remaining(*count);
        }

        self.counts.remove(id);
        Decrement::Released
    }

    pub(crate) fn get(&self, id: &ImageId) -> Option<u32> {
        self.counts.get(id).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ImageId, u32)> {
        self.counts.iter().map(|(id, count)| (id, *count))
    }
}
