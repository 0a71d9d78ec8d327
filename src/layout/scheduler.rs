//! Frame scheduling for the masonry grid.
//!
//! Events never lay out directly. They update item state and mark the grid
//! dirty; the host calls [`MasonryGrid::frame`] once per animation frame and
//! gets at most one layout pass back, however many events arrived.
//!
//! Time is always passed in by the caller, so the scheduler is deterministic
//! under test.

use super::engine::{ItemState, Layout, LayoutConfig, compute_layout};
use std::time::{Duration, Instant};

/// Trailing-edge debounce: fires once `delay` after the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Restart the wait.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True exactly once, on the first poll at or after the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

#[derive(Debug)]
pub struct MasonryGrid {
    config: LayoutConfig,
    items: Vec<ItemState>,
    container_width: f64,
    viewport_width: f64,
    pending_size: Option<(f64, f64)>,
    debouncer: Debouncer,
    dirty: bool,
    layout: Layout,
    passes: usize,
}

impl MasonryGrid {
    /// A grid whose items are all pending. The first frame lays it out.
    pub fn new(
        config: LayoutConfig,
        item_count: usize,
        container_width: f64,
        viewport_width: f64,
    ) -> Self {
        Self::with_items(config, vec![ItemState::Pending; item_count], container_width, viewport_width)
    }

    pub fn with_items(
        config: LayoutConfig,
        items: Vec<ItemState>,
        container_width: f64,
        viewport_width: f64,
    ) -> Self {
        let debouncer = Debouncer::new(config.resize_debounce);
        Self {
            config,
            items,
            container_width,
            viewport_width,
            pending_size: None,
            debouncer,
            dirty: true,
            layout: Layout::empty(),
            passes: 0,
        }
    }

    /// Record an item's natural size. Returns whether anything changed.
    ///
    /// Failed items stay failed; a late size for them is ignored.
    pub fn resolve(&mut self, index: usize, width: u32, height: u32) -> bool {
        let Some(state) = self.items.get_mut(index) else {
            return false;
        };
        let next = ItemState::Measured { width, height };
        if *state == ItemState::Failed || *state == next {
            return false;
        }
        *state = next;
        self.dirty = true;
        true
    }

    /// Mark a pending item as failed. Only the first failure requests a
    /// re-layout.
    pub fn fail(&mut self, index: usize) -> bool {
        match self.items.get_mut(index) {
            Some(state @ ItemState::Pending) => {
                *state = ItemState::Failed;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Queue a size change. It takes effect after the debounce delay.
    pub fn resize(&mut self, container_width: f64, viewport_width: f64, now: Instant) {
        self.pending_size = Some((container_width, viewport_width));
        self.debouncer.trigger(now);
    }

    /// Run at most one layout pass. `Some` when the layout was recomputed.
    pub fn frame(&mut self, now: Instant) -> Option<&Layout> {
        if self.debouncer.poll(now)
            && let Some((container, viewport)) = self.pending_size.take()
            && (container != self.container_width || viewport != self.viewport_width)
        {
            self.container_width = container;
            self.viewport_width = viewport;
            self.dirty = true;
        }

        if !self.dirty {
            return None;
        }
        self.layout = compute_layout(
            &self.items,
            self.container_width,
            self.viewport_width,
            &self.config,
        );
        self.dirty = false;
        self.passes += 1;
        Some(&self.layout)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn items(&self) -> &[ItemState] {
        &self.items
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Layout passes run so far.
    pub fn passes(&self) -> usize {
        self.passes
    }
}
