//! Reusable per-request dispatch state.
//!
//! # Responsibilities
//! - Hold parameter bindings and the continuation flag for one dispatch
//! - Recycle state between requests so the hot path does not allocate
//! - Reset every field before an instance is handed out again
//!
//! # Design Decisions
//! - Parameter values are byte spans into the request path, not copies
//! - Parameter names are shared with the matched route (`Arc<[String]>`)
//! - Capture buffers live in the pooled state, so matching does not allocate once warm
//! - Release happens in `Drop`, so a panicking handler still returns state
//! - Pool size is capped; surplus instances are simply dropped

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use regex::CaptureLocations;

use crate::routing::pattern::Pattern;

/// Default cap on idle instances kept by a [`ContextPool`].
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// Mutable state of a single dispatch.
#[derive(Debug, Default)]
pub struct RequestState {
    /// Copy of the request path; capacity is reused across requests.
    path: String,
    /// Names of the matched route's parameters.
    names: Option<Arc<[String]>>,
    /// `(start, end)` of each value within `path`, aligned with `names`.
    spans: Vec<(usize, usize)>,
    /// Set by a handler that wants the scan to continue.
    next: bool,
    /// Capture buffers per route slot, tagged with the names of the pattern
    /// they were built for. Kept across resets.
    locations: Vec<Option<(Arc<[String]>, CaptureLocations)>>,
}

impl RequestState {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn load_path(&mut self, path: &str) {
        self.path.clear();
        self.path.push_str(path);
    }

    /// Value bound to `name`, if the matched route declared it.
    pub fn param(&self, name: &str) -> Option<&str> {
        let names = self.names.as_deref()?;
        let index = names.iter().position(|n| n == name)?;
        let &(start, end) = self.spans.get(index)?;
        self.path.get(start..end)
    }

    /// All bound `(name, value)` pairs in template order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let names = self.names.as_deref().unwrap_or(&[]);
        names
            .iter()
            .zip(self.spans.iter())
            .map(|(name, &(start, end))| (name.as_str(), self.path.get(start..end).unwrap_or("")))
    }

    pub fn has_params(&self) -> bool {
        self.names.is_some()
    }

    pub fn is_continuing(&self) -> bool {
        self.next
    }

    pub(crate) fn request_next(&mut self) {
        self.next = true;
    }

    /// Clear the continuation flag, returning its previous value.
    pub(crate) fn take_next(&mut self) -> bool {
        std::mem::take(&mut self.next)
    }

    pub(crate) fn clear_params(&mut self) {
        self.names = None;
        self.spans.clear();
    }

    /// Run the pattern's matcher against the stored path and bind its captures.
    ///
    /// `slot` identifies the route so its capture buffer can be reused across
    /// requests. Returns false when the pattern has no matcher or does not
    /// match. A match with fewer captures than declared names binds nothing.
    /// Optional groups that did not participate bind the empty string.
    pub(crate) fn capture(&mut self, slot: usize, pattern: &Pattern) -> bool {
        let Pattern::Dynamic { regex, names } = pattern else {
            return false;
        };

        if self.locations.len() <= slot {
            self.locations.resize_with(slot + 1, || None);
        }
        let stale = !matches!(
            &self.locations[slot],
            Some((owner, _)) if Arc::ptr_eq(owner, names)
        );
        if stale {
            self.locations[slot] = Some((Arc::clone(names), regex.capture_locations()));
        }
        let Some((_, locs)) = self.locations[slot].as_mut() else {
            return false;
        };
        if regex.captures_read(locs, &self.path).is_none() {
            return false;
        }

        if names.is_empty() || locs.len() - 1 < names.len() {
            return true;
        }

        self.spans.clear();
        self.spans
            .extend((1..=names.len()).map(|i| locs.get(i).unwrap_or((0, 0))));
        self.names = Some(Arc::clone(names));
        true
    }

    /// Return every field to its initial value, keeping buffer capacity.
    pub fn reset(&mut self) {
        self.path.clear();
        self.clear_params();
        self.next = false;
    }
}

/// A bounded pool of [`RequestState`] shared by concurrent dispatches.
#[derive(Debug)]
pub struct ContextPool {
    idle: Mutex<Vec<RequestState>>,
    max_idle: usize,
    allocated: AtomicUsize,
}

impl ContextPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
            allocated: AtomicUsize::new(0),
        }
    }

    /// Take an idle instance, or allocate one if none is available.
    pub fn acquire(&self) -> Pooled<'_> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let state = reused.unwrap_or_else(|| {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            RequestState::default()
        });

        Pooled { state, pool: self }
    }

    /// Return an instance. Equivalent to dropping the guard.
    pub fn release(&self, pooled: Pooled<'_>) {
        drop(pooled);
    }

    /// Number of instances currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of instances created since the pool was built.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    fn put_back(&self, mut state: RequestState) {
        state.reset();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(state);
        }
    }
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE)
    }
}

/// Exclusive handle on a pooled [`RequestState`]. Returns it to the pool on drop.
#[derive(Debug)]
pub struct Pooled<'p> {
    state: RequestState,
    pool: &'p ContextPool,
}

impl Deref for Pooled<'_> {
    type Target = RequestState;

    fn deref(&self) -> &RequestState {
        &self.state
    }
}

impl DerefMut for Pooled<'_> {
    fn deref_mut(&mut self) -> &mut RequestState {
        &mut self.state
    }
}

impl Drop for Pooled<'_> {
    fn drop(&mut self) {
        self.pool.put_back(std::mem::take(&mut self.state));
    }
}
