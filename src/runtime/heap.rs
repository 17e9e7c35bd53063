//! In-process managed object space
//!
//! Values are allocated through [`Heap::alloc`], which hands back the only
//! strong reference. The heap keeps a weak reference per object, so an object
//! is live exactly as long as the caller holds on to it. While tracing is on,
//! the allocation site passed to `alloc` is recorded alongside the object and
//! the object is pinned, so values dropped inside a tracing window stay live
//! until the tracing state is cleared.

use super::{AllocationSite, LiveObject, ObjectId, ObjectRef, ObjectSpace, TracedValue};
use crate::trace::TraceError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug)]
struct Slot {
    value: Weak<dyn TracedValue>,
    site: Option<AllocationSite>,
    pinned: Option<ObjectRef>,
}

#[derive(Debug)]
pub struct Heap {
    /// Objects indexed by id
    objects: DashMap<ObjectId, Slot>,
    next_id: AtomicU64,
    tracing: AtomicBool,
    /// Whether this heap can attribute allocations at all
    supports_tracing: bool,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            next_id: AtomicU64::new(1),
            tracing: AtomicBool::new(false),
            supports_tracing: true,
        }
    }

    /// A heap without allocation-site support; `begin_tracing` always fails
    pub fn unsupported() -> Self {
        Self {
            supports_tracing: false,
            ..Self::new()
        }
    }

    /// Allocate `value`, recording `site` if tracing is active
    pub fn alloc<T: TracedValue + 'static>(&self, value: T, site: AllocationSite) -> Arc<T> {
        let object = Arc::new(value);
        let handle: ObjectRef = object.clone();
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let traced = self.tracing.load(Ordering::Acquire);
        self.objects.insert(
            id,
            Slot {
                value: Arc::downgrade(&handle),
                site: traced.then_some(site),
                pinned: traced.then_some(handle),
            },
        );

        object
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing.load(Ordering::Acquire)
    }

    /// Number of objects still alive
    pub fn live_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|entry| entry.value().value.strong_count() > 0)
            .count()
    }

    /// Drop bookkeeping for collected objects. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|_, slot| slot.value.strong_count() > 0);
        let removed = before - self.objects.len();
        if removed > 0 {
            tracing::debug!(removed, "swept collected heap objects");
        }
        removed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectSpace for Heap {
    fn begin_tracing(&self) -> Result<(), TraceError> {
        if !self.supports_tracing {
            return Err(TraceError::Unsupported);
        }
        if self.tracing.swap(true, Ordering::AcqRel) {
            return Err(TraceError::AlreadyTracing);
        }
        Ok(())
    }

    fn stop_tracing(&self) {
        self.tracing.store(false, Ordering::Release);
    }

    /// Unpin traced objects and drop the slots of everything collected
    fn clear_tracing_state(&self) {
        let before = self.objects.len();
        self.objects.retain(|_, slot| {
            slot.site = None;
            slot.pinned = None;
            slot.value.strong_count() > 0
        });
        tracing::debug!(
            removed = before - self.objects.len(),
            "cleared heap tracing state"
        );
    }

    fn live_objects(&self) -> Vec<LiveObject> {
        let mut live: Vec<LiveObject> = self
            .objects
            .iter()
            .filter_map(|entry| {
                entry.value().value.upgrade().map(|value| LiveObject {
                    id: *entry.key(),
                    value,
                })
            })
            .collect();
        // Ids grow monotonically, so this is allocation order
        live.sort_by_key(|object| object.id);
        live
    }

    fn allocation_site(&self, id: ObjectId) -> Option<AllocationSite> {
        self.objects.get(&id).and_then(|slot| slot.site.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Object;

    #[test]
    fn test_untraced_allocations_have_no_site() {
        let heap = Heap::new();
        let _s = heap.alloc(Object::str("x"), AllocationSite::new("/a.rs", 1));

        let live = heap.live_objects();
        assert_eq!(live.len(), 1);
        assert_eq!(heap.allocation_site(live[0].id), None);
    }

    #[test]
    fn test_traced_allocations_record_site() {
        let heap = Heap::new();
        heap.begin_tracing().unwrap();
        let _s = heap.alloc(Object::str("x"), AllocationSite::new("/a.rs", 7));
        heap.stop_tracing();
        let _after = heap.alloc(Object::str("y"), AllocationSite::new("/a.rs", 9));

        let live = heap.live_objects();
        assert_eq!(live.len(), 2);
        assert_eq!(
            heap.allocation_site(live[0].id),
            Some(AllocationSite::new("/a.rs", 7))
        );
        assert_eq!(heap.allocation_site(live[1].id), None);

        heap.clear_tracing_state();
        assert_eq!(heap.allocation_site(live[0].id), None);
    }

    #[test]
    fn test_dropped_objects_are_not_live() {
        let heap = Heap::new();
        let kept = heap.alloc(Object::Integer(1), AllocationSite::unknown());
        let dropped = heap.alloc(Object::Integer(2), AllocationSite::unknown());
        drop(dropped);

        assert_eq!(heap.live_count(), 1);
        assert_eq!(heap.sweep(), 1);
        assert_eq!(heap.live_objects().len(), 1);
        drop(kept);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_live_objects_in_allocation_order() {
        let heap = Heap::new();
        let objects: Vec<_> = (0..20)
            .map(|i| heap.alloc(Object::Integer(i), AllocationSite::unknown()))
            .collect();

        let ids: Vec<ObjectId> = heap.live_objects().iter().map(|o| o.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), objects.len());
    }

    #[test]
    fn test_tracing_window_pins_allocations() {
        let heap = Heap::new();
        heap.begin_tracing().unwrap();
        drop(heap.alloc(Object::str("temp"), AllocationSite::new("/a.rs", 3)));
        heap.stop_tracing();

        assert_eq!(heap.live_count(), 1);
        heap.clear_tracing_state();
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_cleared_tracing_state_drops_dead_slots() {
        let heap = Heap::new();
        let kept = heap.alloc(Object::Integer(0), AllocationSite::unknown());

        for _ in 0..100 {
            heap.begin_tracing().unwrap();
            for i in 0..100 {
                heap.alloc(Object::Integer(i), AllocationSite::new("/a.rs", 1));
            }
            heap.stop_tracing();
            heap.clear_tracing_state();
        }

        assert_eq!(heap.live_count(), 1);
        assert_eq!(heap.objects.len(), heap.live_count());
        drop(kept);
    }

    #[test]
    fn test_double_begin_rejected() {
        let heap = Heap::new();
        heap.begin_tracing().unwrap();
        assert!(matches!(heap.begin_tracing(), Err(TraceError::AlreadyTracing)));
    }

    #[test]
    fn test_unsupported_heap() {
        let heap = Heap::unsupported();
        assert!(matches!(heap.begin_tracing(), Err(TraceError::Unsupported)));
        assert!(!heap.is_tracing());
    }
}
