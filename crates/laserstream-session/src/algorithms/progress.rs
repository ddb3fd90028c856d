//! Progress Tracker
//!
//! Tracks the highest slot delivered to the consumer and the keys of recently
//! delivered items, so that a reconnect can resume from the right slot and
//! replayed items are not delivered twice.
//!
//! Items are keyed per entity type; each type has its own bounded window, so
//! a burst of account writes cannot push transaction signatures out.

use crate::domain::{invariant_resume_not_ahead, EntityType, ItemKey, Slot};
use crate::algorithms::recent_keys::RecentKeys;

/// Delivery progress of one session.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    last_delivered: Option<Slot>,
    starting_slot: Option<Slot>,
    windows: [RecentKeys<ItemKey>; EntityType::COUNT],
    resume_margin: u64,
    delivered: u64,
    suppressed: u64,
}

impl ProgressTracker {
    /// Create a tracker.
    ///
    /// `starting_slot` is the caller's requested `fromSlot`; resume points
    /// are never placed before it.
    pub fn new(starting_slot: Option<Slot>, window_capacity: usize, resume_margin: u64) -> Self {
        Self {
            last_delivered: None,
            starting_slot,
            windows: std::array::from_fn(|_| RecentKeys::new(window_capacity)),
            resume_margin,
            delivered: 0,
            suppressed: 0,
        }
    }

    /// Record an item about to be delivered.
    ///
    /// Returns `true` if the item is a duplicate and must be dropped. The
    /// last delivered slot only moves forward, and only for items that are
    /// actually delivered.
    pub fn record_delivered(
        &mut self,
        slot: Slot,
        entity: EntityType,
        key: Option<ItemKey>,
    ) -> bool {
        if let Some(key) = key {
            if !self.windows[entity.index()].insert(key) {
                self.suppressed += 1;
                return true;
            }
        }

        self.delivered += 1;
        if self.last_delivered.map_or(true, |last| slot >= last) {
            self.last_delivered = Some(slot);
        }
        false
    }

    /// Whether an item with this key was delivered recently.
    pub fn is_recent(&self, entity: EntityType, key: &ItemKey) -> bool {
        self.windows[entity.index()].contains(key)
    }

    /// Highest slot delivered so far.
    pub fn last_delivered(&self) -> Option<Slot> {
        self.last_delivered
    }

    /// Slot to request on the next subscribe.
    ///
    /// Before anything was delivered this is the caller's starting slot
    /// (possibly `None`, meaning the live tip). Afterwards it is the last
    /// delivered slot minus the margin, never earlier than the starting slot.
    pub fn resume_point(&self) -> Option<Slot> {
        let resume = match self.last_delivered {
            None => self.starting_slot,
            Some(last) => {
                let with_margin = last.saturating_sub(self.resume_margin);
                Some(match self.starting_slot {
                    Some(start) => with_margin.max(start.min(last)),
                    None => with_margin,
                })
            }
        };
        debug_assert!(invariant_resume_not_ahead(resume, self.last_delivered));
        resume
    }

    /// Items delivered.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Items dropped as duplicates.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
