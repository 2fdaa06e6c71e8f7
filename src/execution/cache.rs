//! Per-node cache of accelerated filter handles.
//!
//! A node can be turned into a backend filter object once per combination of
//! operating color space and premultiplied-validity requirement, so the cache
//! has exactly four slots. Invalidating the node empties all of them.

use crate::core::color_space::ColorSpace;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque handle produced by an [`ImageFilterBuilder`](crate::execution::ImageFilterBuilder).
pub type ImageFilterHandle = Arc<dyn Any + Send + Sync>;

/// Number of distinct handle slots per node.
pub const IMAGE_FILTER_SLOTS: usize = 4;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to call the builder.
    pub misses: u64,
    /// Times the cache was emptied while holding at least one handle.
    pub clears: u64,
}

impl CacheStats {
    /// Calculate hit ratio.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

struct Slots {
    handles: [Option<ImageFilterHandle>; IMAGE_FILTER_SLOTS],
    stats: CacheStats,
}

/// Thread-safe four-slot handle cache.
///
/// Lookups go through `&self` because builders recurse into a node's inputs
/// while only holding a shared borrow of the graph.
pub struct ImageFilterCache {
    slots: Mutex<Slots>,
}

impl ImageFilterCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                handles: Default::default(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Slot for a (color space, validity) pair.
    pub fn slot_index(color_space: ColorSpace, requires_valid_premultiplied: bool) -> usize {
        color_space.index() * 2 + requires_valid_premultiplied as usize
    }

    /// Cached handle, counting a hit or a miss.
    pub fn get(&self, color_space: ColorSpace, requires_valid_premultiplied: bool) -> Option<ImageFilterHandle> {
        let mut slots = self.slots.lock();
        let handle = slots.handles[Self::slot_index(color_space, requires_valid_premultiplied)].clone();
        if handle.is_some() {
            slots.stats.hits += 1;
        } else {
            slots.stats.misses += 1;
        }
        handle
    }

    /// Store a handle, replacing whatever the slot held.
    pub fn put(&self, color_space: ColorSpace, requires_valid_premultiplied: bool, handle: ImageFilterHandle) {
        let mut slots = self.slots.lock();
        slots.handles[Self::slot_index(color_space, requires_valid_premultiplied)] = Some(handle);
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.lock().handles.iter().filter(|h| h.is_some()).count()
    }

    /// True when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every handle.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        if slots.handles.iter().any(Option::is_some) {
            slots.stats.clears += 1;
        }
        slots.handles = Default::default();
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        self.slots.lock().stats
    }
}

impl Default for ImageFilterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ImageFilterCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFilterCache")
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
