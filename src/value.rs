//! The contract between [`SparseMap`](crate::SparseMap) and its slot values.
//!
//! A slot that holds the [`EMPTY`](Value::EMPTY) value is indistinguishable
//! from a slot that was never written: `get` returns `EMPTY` for both and
//! iteration skips both. All slot accesses go through the matching atomic
//! type so that readers can run alongside concurrent insertions.

use std::{
    cell::UnsafeCell,
    sync::atomic::{
        AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicIsize, AtomicPtr, AtomicU16, AtomicU32,
        AtomicU64, AtomicU8, AtomicUsize, Ordering,
    },
};

/// A type that can be stored in the slots of a [`SparseMap`](crate::SparseMap).
///
/// # Safety
///
/// Implementations must route `load` and `store` through an atomic type with
/// the same size and bit validity as `Self`, so that a slot written by one
/// thread can be read by another without a data race. The provided
/// implementations cover the integer primitives up to word size and raw
/// pointers.
pub unsafe trait Value: Copy + Eq {
    /// The zero-equivalent value that marks an absent slot.
    const EMPTY: Self;

    /// Read the slot.
    fn load(slot: &UnsafeCell<Self>) -> Self;

    /// Write the slot.
    fn store(slot: &UnsafeCell<Self>, value: Self);
}

macro_rules! impl_value_for_int {
    ($($int:ty => $atomic:ty),+ $(,)?) => {
        $(
            // SAFETY: the standard library documents that `$atomic` has the
            // same size and bit validity as `$int`.
            unsafe impl Value for $int {
                const EMPTY: Self = 0;

                #[inline]
                fn load(slot: &UnsafeCell<Self>) -> Self {
                    const {
                        assert!(std::mem::size_of::<$int>() == std::mem::size_of::<$atomic>());
                    }
                    // SAFETY: same layout per the impl contract, and the
                    // shared reference keeps the slot alive for the access.
                    let atomic = unsafe { &*(slot as *const UnsafeCell<$int>).cast::<$atomic>() };
                    atomic.load(Ordering::Acquire)
                }

                #[inline]
                fn store(slot: &UnsafeCell<Self>, value: Self) {
                    // SAFETY: same layout per the impl contract.
                    let atomic = unsafe { &*(slot as *const UnsafeCell<$int>).cast::<$atomic>() };
                    atomic.store(value, Ordering::Release)
                }
            }
        )+
    };
}

impl_value_for_int!(
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
);

// SAFETY: `AtomicPtr<T>` has the same size and bit validity as `*mut T`.
unsafe impl<T> Value for *mut T {
    const EMPTY: Self = std::ptr::null_mut();

    #[inline]
    fn load(slot: &UnsafeCell<Self>) -> Self {
        // SAFETY: same layout per the impl contract.
        let atomic = unsafe { &*(slot as *const UnsafeCell<*mut T>).cast::<AtomicPtr<T>>() };
        atomic.load(Ordering::Acquire)
    }

    #[inline]
    fn store(slot: &UnsafeCell<Self>, value: Self) {
        // SAFETY: same layout per the impl contract.
        let atomic = unsafe { &*(slot as *const UnsafeCell<*mut T>).cast::<AtomicPtr<T>>() };
        atomic.store(value, Ordering::Release)
    }
}
