use std::collections::HashSet;

use crate::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The checkpoint id was rendered; nothing older needs to be looked at.
    BoundaryReached,
    /// Keep rendering.
    Continue,
}

/// Delta-crawl bookkeeping over successive renderings of a newest-first listing.
///
/// Each pass sees everything currently rendered, so ids repeat between
/// passes; they are collected once, in first-seen order. The checkpoint id
/// itself is never collected. Ids older than the checkpoint (pinned or
/// re-ordered entries) are skipped as well since they are not new.
#[derive(Debug, Clone)]
pub struct DeltaScan {
    boundary: Option<ItemId>,
    seen: HashSet<ItemId>,
    newest_first: Vec<ItemId>,
    boundary_reached: bool,
    passes: usize,
}

impl DeltaScan {
    pub fn new(boundary: Option<ItemId>) -> Self {
        Self {
            boundary,
            seen: HashSet::new(),
            newest_first: Vec::new(),
            boundary_reached: false,
            passes: 0,
        }
    }

    pub fn observe_pass<I>(&mut self, rendered: I) -> PassOutcome
    where
        I: IntoIterator<Item = ItemId>,
    {
        if self.boundary_reached {
            return PassOutcome::BoundaryReached;
        }
        self.passes += 1;

        for id in rendered {
            if let Some(boundary) = self.boundary.as_ref() {
                if &id == boundary {
                    self.boundary_reached = true;
                    return PassOutcome::BoundaryReached;
                }
                if !id.is_newer_than(boundary) {
                    continue;
                }
            }
            if self.seen.insert(id.clone()) {
                self.newest_first.push(id);
            }
        }
        PassOutcome::Continue
    }

    pub fn boundary_reached(&self) -> bool {
        self.boundary_reached
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn len(&self) -> usize {
        self.newest_first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.newest_first.is_empty()
    }

    /// Collected ids, oldest first.
    pub fn into_oldest_first(self) -> Vec<ItemId> {
        let mut ids = self.newest_first;
        ids.reverse();
        ids
    }
}
