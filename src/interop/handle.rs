//! Raw handle protocol for objects crossing the C boundary.
//!
//! This is the only module that turns reference counted objects into raw pointers and back. A raw
//! pointer handed out by [`leak`] carries one strong reference ("+1"). Whoever holds it must give
//! that reference back exactly once, either with [`release`] or by [`adopt`]ing it into an owned
//! `Arc`. Everything outside this module works with `Arc`/`ScopedObject` only.
//!
//! Misuse (releasing twice, releasing a pointer that was never leaked, using a pointer after its
//! last release) is undefined behaviour, the same contract C callers get from any handle based
//! graphics API. Debug builds keep a ledger of outstanding raw references per address and assert
//! on a release that has no matching leak or retain. The ledger is consulted before the pointer is
//! dereferenced, so a double release is caught even after the object is gone.

use std::sync::Arc;

#[cfg(debug_assertions)]
mod ledger {
    use lazy_static::lazy_static;
    use std::collections::HashMap;
    use std::sync::Mutex;

    lazy_static! {
        static ref OUTSTANDING: Mutex<HashMap<usize, u64>> = Mutex::new(HashMap::new());
    }

    pub(super) fn add(addr: usize) {
        let mut map = OUTSTANDING.lock().unwrap_or_else(|e| e.into_inner());
        *map.entry(addr).or_insert(0) += 1;
    }

    /// Returns false when there was no outstanding raw reference to give back.
    pub(super) fn remove(addr: usize) -> bool {
        let mut map = OUTSTANDING.lock().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(&addr) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                map.remove(&addr);
                true
            }
            None => false,
        }
    }

    pub(super) fn outstanding(addr: usize) -> u64 {
        let map = OUTSTANDING.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&addr).copied().unwrap_or(0)
    }
}

#[inline]
fn track_leak<T>(_raw: *const T) {
    #[cfg(debug_assertions)]
    ledger::add(_raw as usize);
}

#[inline]
fn track_return<T>(_raw: *const T, _op: &str) {
    #[cfg(debug_assertions)]
    {
        let known = ledger::remove(_raw as usize);
        debug_assert!(
            known,
            "{_op} of {} handle {:p} without an outstanding reference (double release?)",
            std::any::type_name::<T>(),
            _raw
        );
    }
}

/// Number of raw references currently handed out for `raw`. Always 0 in release builds.
pub fn outstanding_raw_refs<T>(_raw: *const T) -> u64 {
    #[cfg(debug_assertions)]
    {
        ledger::outstanding(_raw as usize)
    }
    #[cfg(not(debug_assertions))]
    {
        0
    }
}

/// Transfers the strong reference held by `object` to the returned raw pointer.
pub fn leak<T>(object: Arc<T>) -> *const T {
    let raw = Arc::into_raw(object);
    track_leak(raw);
    raw
}

/// Takes ownership of the +1 reference carried by `raw` without retaining. Null gives `None`.
///
/// # Safety
/// `raw` must be null or come from [`leak`] (or have been [`retain`]ed) for the same `T`, and the
/// reference it carries must not be returned again afterwards.
pub unsafe fn adopt<T>(raw: *const T) -> Option<Arc<T>> {
    if raw.is_null() {
        return None;
    }
    track_return(raw, "adopt");
    Some(Arc::from_raw(raw))
}

/// Adds a strong reference on behalf of the raw pointer's holder. Null is a no-op.
///
/// # Safety
/// `raw` must be null or point at a live object obtained from [`leak`].
pub unsafe fn retain<T>(raw: *const T) {
    if raw.is_null() {
        return;
    }
    Arc::increment_strong_count(raw);
    track_leak(raw);
}

/// Gives back one raw reference, destroying the object on this call if it was the last one.
/// Null is a no-op.
///
/// # Safety
/// `raw` must be null or carry an outstanding reference from [`leak`] or [`retain`].
pub unsafe fn release<T>(raw: *const T) {
    if raw.is_null() {
        return;
    }
    track_return(raw, "release");
    Arc::decrement_strong_count(raw);
}

/// Wraps a raw pointer the caller does not own, retaining so the result is independent.
///
/// # Safety
/// `raw` must be null or point at a live object obtained from [`leak`].
pub unsafe fn ref_counted<T>(raw: *const T) -> Option<Arc<T>> {
    if raw.is_null() {
        return None;
    }
    Arc::increment_strong_count(raw);
    Some(Arc::from_raw(raw))
}

/// Borrows the object behind a raw pointer without touching its count.
///
/// # Safety
/// `raw` must be null or point at a live object, which must outlive `'a`.
pub unsafe fn borrow<'a, T>(raw: *const T) -> Option<&'a T> {
    raw.as_ref()
}

/// Casts an object pointer to the opaque handle type exposed over the C ABI.
pub fn to_opaque<T, H>(raw: *const T) -> *mut H {
    raw.cast_mut().cast()
}

/// Casts an opaque C handle back to the object pointer it was made from.
pub fn from_opaque<H, T>(handle: *mut H) -> *const T {
    handle.cast_const().cast()
}
