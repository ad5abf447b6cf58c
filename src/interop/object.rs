//! Scoped ownership of reference counted interop objects.
//!
//! Every interop type (paints, paths, display lists, textures, contexts, surfaces) lives behind an
//! atomically reference counted allocation. [`ScopedObject`] is the owning handle Rust code uses:
//!
//! * [`ScopedObject::create`] allocates with a count of 1 that the handle already owns,
//! * `clone()` retains, moving transfers, dropping releases,
//! * [`ScopedObject::leak`] hands the reference to a raw pointer for the C boundary,
//! * [`ScopedObject::adopt`] takes such a reference back without retaining,
//! * [`ScopedObject::ref_raw`] wraps a raw pointer the caller does not own, retaining.
//!
//! ```
//! use impeller_toolkit::interop::ScopedObject;
//!
//! let a = ScopedObject::create(String::from("paint"));
//! let b = a.clone();
//! assert_eq!(a.ref_count(), 2);
//! assert!(a.ptr_eq(&b));
//! ```

use crate::interop::handle;
use std::fmt;
use std::sync::Arc;

/// Owning, possibly empty handle to a reference counted object.
pub struct ScopedObject<T> {
    object: Option<Arc<T>>,
}

impl<T> ScopedObject<T> {
    /// Allocates `value` with a reference count of 1 owned by the returned handle.
    pub fn create(value: T) -> Self {
        Self { object: Some(Arc::new(value)) }
    }

    /// An empty handle. Dropping it does nothing.
    pub fn empty() -> Self {
        Self { object: None }
    }

    /// Takes ownership of the +1 reference carried by `raw`. Null gives an empty handle.
    ///
    /// # Safety
    /// See [`handle::adopt`].
    pub unsafe fn adopt(raw: *const T) -> Self {
        Self { object: handle::adopt(raw) }
    }

    /// Wraps a raw pointer not owned by the caller, retaining it.
    ///
    /// # Safety
    /// See [`handle::ref_counted`].
    pub unsafe fn ref_raw(raw: *const T) -> Self {
        Self { object: handle::ref_counted(raw) }
    }

    /// Hands this handle's reference to the returned raw pointer and leaves the handle empty.
    /// Returns null for an empty handle.
    pub fn leak(&mut self) -> *const T {
        match self.object.take() {
            Some(object) => handle::leak(object),
            None => std::ptr::null(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.object.as_deref()
    }

    pub fn as_arc(&self) -> Option<&Arc<T>> {
        self.object.as_ref()
    }

    pub fn into_arc(self) -> Option<Arc<T>> {
        self.object
    }

    pub fn is_some(&self) -> bool {
        self.object.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.object.is_none()
    }

    /// Current strong count of the referenced object, 0 for an empty handle.
    pub fn ref_count(&self) -> usize {
        self.object.as_ref().map_or(0, Arc::strong_count)
    }

    /// True when both handles refer to the same object, or are both empty.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.object, &other.object) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Copy-assignment: retains `other`'s object and releases the current one. Assigning a handle
    /// to the object it already refers to leaves the count unchanged.
    pub fn assign(&mut self, other: &Self) {
        if self.ptr_eq(other) {
            return;
        }
        self.object = other.object.clone();
    }

    /// Moves the object out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        Self { object: self.object.take() }
    }

    /// Releases the object (if any) and leaves the handle empty.
    pub fn reset(&mut self) {
        self.object = None;
    }
}

impl<T> Clone for ScopedObject<T> {
    fn clone(&self) -> Self {
        Self { object: self.object.clone() }
    }
}

impl<T> Default for ScopedObject<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Arc<T>> for ScopedObject<T> {
    fn from(object: Arc<T>) -> Self {
        Self { object: Some(object) }
    }
}

impl<T> fmt::Debug for ScopedObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(object) => f
                .debug_struct("ScopedObject")
                .field("type", &std::any::type_name::<T>())
                .field("ptr", &Arc::as_ptr(object))
                .field("ref_count", &Arc::strong_count(object))
                .finish(),
            None => f.write_str("ScopedObject(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked() -> (ScopedObject<Tracked>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (ScopedObject::create(Tracked { drops: drops.clone() }), drops)
    }

    #[test]
    fn create_starts_at_one() {
        let (obj, drops) = tracked();
        assert_eq!(obj.ref_count(), 1);
        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn balanced_random_retains_and_releases_keep_object_alive() {
        let mut rng = StdRng::seed_from_u64(0x5eed_1e55);
        for _ in 0..32 {
            let (mut obj, drops) = tracked();
            let raw = obj.leak();
            let n = rng.random_range(1..64);

            // Interleave retains and releases without ever dropping below the creation reference.
            let mut extra = 0;
            let mut retained = 0;
            while retained < n || extra > 0 {
                if retained < n && (extra == 0 || rng.random_bool(0.5)) {
                    unsafe { handle::retain(raw) };
                    retained += 1;
                    extra += 1;
                } else {
                    unsafe { handle::release(raw) };
                    extra -= 1;
                }
            }
            assert_eq!(drops.load(Ordering::SeqCst), 0, "destroyed after {n} balanced pairs");

            unsafe { handle::release(raw) };
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn leak_then_single_release_destroys() {
        let (mut obj, drops) = tracked();
        let raw = obj.leak();
        assert!(obj.is_empty());
        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        unsafe { handle::release(raw) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn leak_of_empty_handle_is_null() {
        let mut empty: ScopedObject<Tracked> = ScopedObject::empty();
        assert!(empty.leak().is_null());
        assert_eq!(empty.ref_count(), 0);
    }

    #[test]
    fn adopt_takes_over_without_retaining() {
        let (mut obj, drops) = tracked();
        let raw = obj.leak();

        let adopted = unsafe { ScopedObject::adopt(raw) };
        assert_eq!(adopted.ref_count(), 1);
        drop(adopted);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ref_raw_is_independent() {
        let (mut obj, drops) = tracked();
        let raw = obj.leak();

        let referenced = unsafe { ScopedObject::ref_raw(raw) };
        assert_eq!(referenced.ref_count(), 2);

        unsafe { handle::release(raw) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(referenced.ref_count(), 1);

        drop(referenced);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn copy_retains_and_shares() {
        let (a, _) = tracked();
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert!(a.ptr_eq(&b));
        assert!(std::ptr::eq(a.get().unwrap(), b.get().unwrap()));
    }

    #[test]
    fn move_leaves_source_empty_and_count_unchanged() {
        let (mut a, _) = tracked();
        let b = a.take();
        assert!(a.is_empty());
        assert_eq!(b.ref_count(), 1);

        let c = b;
        assert_eq!(c.ref_count(), 1);
    }

    #[test]
    fn self_assignment_is_idempotent() {
        let (mut a, drops) = tracked();
        let alias = a.clone();
        assert_eq!(a.ref_count(), 2);

        a.assign(&alias);
        assert_eq!(a.ref_count(), 2);
        drop(alias);
        assert_eq!(a.ref_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn assign_releases_previous_object() {
        let (mut a, a_drops) = tracked();
        let (b, b_drops) = tracked();

        a.assign(&b);
        assert_eq!(a_drops.load(Ordering::SeqCst), 1);
        assert_eq!(b.ref_count(), 2);

        a.reset();
        assert_eq!(b.ref_count(), 1);
        assert_eq!(b_drops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handles_cross_threads() {
        let (obj, drops) = tracked();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let local = obj.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let tmp = local.clone();
                        drop(tmp);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(obj.ref_count(), 1);
        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
