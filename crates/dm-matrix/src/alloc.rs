use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::trace;

use crate::error::{MatrixError, Result};

#[derive(Debug, Default)]
struct Counters {
    bytes: AtomicUsize,
    allocated: AtomicUsize,
    deallocated: AtomicUsize,
}

/// Allocation counters shared between every clone of the handle.
///
/// `allocated` and `deallocated` count calls, `bytes` is the number of bytes
/// currently held by live buffers.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter {
    inner: Arc<Counters>,
}

/// A point-in-time copy of a [`ByteCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes: usize,
    pub allocated: usize,
    pub deallocated: usize,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn increase(&self, amount: usize) {
        self.inner.bytes.fetch_add(amount, Ordering::Relaxed);
        self.inner.allocated.fetch_add(1, Ordering::Relaxed);
    }

    fn decrease(&self, amount: usize) {
        self.inner.bytes.fetch_sub(amount, Ordering::Relaxed);
        self.inner.deallocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes allocated and not yet released.
    pub fn bytes(&self) -> usize {
        self.inner.bytes.load(Ordering::Relaxed)
    }

    /// Number of allocation calls made so far.
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }

    /// Number of deallocation calls made so far.
    pub fn deallocated(&self) -> usize {
        self.inner.deallocated.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            bytes: self.bytes(),
            allocated: self.allocated(),
            deallocated: self.deallocated(),
        }
    }

    /// Returns true if both handles update the same counters.
    pub fn ptr_eq(&self, other: &ByteCounter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Allocator handle that records every allocation and release in a
/// [`ByteCounter`].
///
/// Handles are cheap to clone. Two handles compare equal when they share a
/// counter, which is what a container checks before moving storage between
/// instances.
#[derive(Debug, Clone, Default)]
pub struct TrackingAllocator {
    counter: ByteCounter,
}

impl TrackingAllocator {
    /// Create an allocator with its own, zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide allocator used by [`crate::Matrix::new`].
    pub fn global() -> &'static TrackingAllocator {
        static GLOBAL: OnceLock<TrackingAllocator> = OnceLock::new();
        GLOBAL.get_or_init(TrackingAllocator::new)
    }

    pub fn counter(&self) -> &ByteCounter {
        &self.counter
    }

    /// Allocate storage for `n` default-initialised elements.
    ///
    /// A zero-length request does not touch the system allocator and is not
    /// counted.
    ///
    /// # Errors
    /// Returns [`MatrixError::Allocation`] if the byte size overflows or the
    /// system allocator cannot satisfy the request.
    pub fn allocate<T: Clone + Default>(&self, n: usize) -> Result<TrackedBuffer<T>> {
        if n == 0 {
            return Ok(TrackedBuffer::empty(self.clone()));
        }

        let elem_size = mem::size_of::<T>();
        let failed = || MatrixError::Allocation {
            elements: n,
            elem_size,
        };
        let bytes = n.checked_mul(elem_size).ok_or_else(failed)?;

        let mut data = Vec::new();
        data.try_reserve_exact(n).map_err(|_| failed())?;
        data.resize(n, T::default());

        self.counter.increase(bytes);
        trace!(elements = n, bytes, "allocate");
        Ok(TrackedBuffer {
            data,
            alloc: self.clone(),
        })
    }

    /// Release a buffer previously obtained from [`allocate`](Self::allocate).
    ///
    /// Equivalent to dropping it.
    ///
    /// # Panics
    /// Panics if `buffer` was allocated by an allocator that does not share
    /// this one's counter. The buffer is still released to its own counter.
    pub fn deallocate<T>(&self, buffer: TrackedBuffer<T>) {
        assert!(
            buffer.alloc == *self,
            "buffer released through a foreign allocator"
        );
        drop(buffer);
    }

    fn release(&self, bytes: usize) {
        self.counter.decrease(bytes);
        trace!(bytes, "deallocate");
    }

    pub fn bytes(&self) -> usize {
        self.counter.bytes()
    }

    pub fn allocated(&self) -> usize {
        self.counter.allocated()
    }

    pub fn deallocated(&self) -> usize {
        self.counter.deallocated()
    }
}

impl PartialEq for TrackingAllocator {
    fn eq(&self, other: &Self) -> bool {
        self.counter.ptr_eq(&other.counter)
    }
}

impl Eq for TrackingAllocator {}

/// Bytes currently held through the global allocator.
pub fn bytes() -> usize {
    TrackingAllocator::global().bytes()
}

/// Allocation calls made through the global allocator.
pub fn allocated() -> usize {
    TrackingAllocator::global().allocated()
}

/// Deallocation calls made through the global allocator.
pub fn deallocated() -> usize {
    TrackingAllocator::global().deallocated()
}

/// Contiguous owned storage obtained from a [`TrackingAllocator`].
///
/// The release is recorded when the buffer is dropped.
pub struct TrackedBuffer<T> {
    data: Vec<T>,
    alloc: TrackingAllocator,
}

impl<T> TrackedBuffer<T> {
    /// An empty buffer that owns no storage.
    pub fn empty(alloc: TrackingAllocator) -> Self {
        TrackedBuffer {
            data: Vec::new(),
            alloc,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn allocator(&self) -> &TrackingAllocator {
        &self.alloc
    }

    fn byte_len(&self) -> usize {
        self.data.len() * mem::size_of::<T>()
    }
}

impl<T> Drop for TrackedBuffer<T> {
    fn drop(&mut self) {
        if !self.data.is_empty() {
            self.alloc.release(self.byte_len());
        }
    }
}

impl<T: Clone> Clone for TrackedBuffer<T> {
    fn clone(&self) -> Self {
        if self.data.is_empty() {
            return TrackedBuffer::empty(self.alloc.clone());
        }
        let data = self.data.clone();
        self.alloc.counter.increase(self.byte_len());
        trace!(elements = data.len(), "allocate (clone)");
        TrackedBuffer {
            data,
            alloc: self.alloc.clone(),
        }
    }
}

impl<T> Deref for TrackedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for TrackedBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: fmt::Debug> fmt::Debug for TrackedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.data.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_counts_bytes_and_calls() {
        let alloc = TrackingAllocator::new();
        let buf = alloc.allocate::<f64>(100).unwrap();
        assert_eq!(buf.len(), 100);
        assert!(buf.iter().all(|&v| v == 0.0));
        assert_eq!(alloc.bytes(), 800);
        assert_eq!(alloc.allocated(), 1);
        assert_eq!(alloc.deallocated(), 0);

        alloc.deallocate(buf);
        assert_eq!(alloc.bytes(), 0);
        assert_eq!(alloc.allocated(), 1);
        assert_eq!(alloc.deallocated(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let alloc = TrackingAllocator::new();
        {
            let _a = alloc.allocate::<u32>(4).unwrap();
            let _b = alloc.allocate::<u8>(3).unwrap();
            assert_eq!(alloc.bytes(), 19);
        }
        assert_eq!(
            alloc.counter().snapshot(),
            CounterSnapshot {
                bytes: 0,
                allocated: 2,
                deallocated: 2,
            }
        );
    }

    #[test]
    fn test_zero_length_not_counted() {
        let alloc = TrackingAllocator::new();
        let buf = alloc.allocate::<f64>(0).unwrap();
        assert!(buf.is_empty());
        drop(buf);
        assert_eq!(alloc.counter().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_clone_is_counted() {
        let alloc = TrackingAllocator::new();
        let mut a = alloc.allocate::<f64>(2).unwrap();
        a[1] = 5.0;
        let b = a.clone();
        assert_eq!(&b[..], &[0.0, 5.0]);
        assert_eq!(alloc.allocated(), 2);
        assert_eq!(alloc.bytes(), 32);
        assert_eq!(b.allocator(), &alloc);
    }

    #[test]
    fn test_overflow_is_an_error() {
        let alloc = TrackingAllocator::new();
        let err = alloc.allocate::<f64>(usize::MAX).unwrap_err();
        assert_eq!(
            err,
            MatrixError::Allocation {
                elements: usize::MAX,
                elem_size: 8
            }
        );
        assert!(alloc.allocate::<f64>(usize::MAX / 8).is_err());
        assert_eq!(alloc.counter().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn test_equality_follows_counter() {
        let a = TrackingAllocator::new();
        let b = a.clone();
        let c = TrackingAllocator::new();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(TrackingAllocator::global(), TrackingAllocator::global());
    }

    #[test]
    fn test_allocated_never_below_deallocated() {
        let alloc = TrackingAllocator::new();
        for n in 1..20 {
            let buf = alloc.allocate::<f64>(n).unwrap();
            assert!(alloc.allocated() > alloc.deallocated());
            drop(buf);
            assert_eq!(alloc.allocated(), alloc.deallocated());
        }
        assert_eq!(alloc.allocated(), 19);
    }

    #[test]
    fn test_deallocate_through_clone() {
        let alloc = TrackingAllocator::new();
        let buf = alloc.allocate::<f64>(3).unwrap();
        alloc.clone().deallocate(buf);
        assert_eq!(alloc.deallocated(), 1);
        assert_eq!(alloc.bytes(), 0);
    }

    #[test]
    #[should_panic(expected = "foreign allocator")]
    fn test_deallocate_foreign_buffer_panics() {
        let owner = TrackingAllocator::new();
        let other = TrackingAllocator::new();
        let buf = owner.allocate::<f64>(3).unwrap();
        other.deallocate(buf);
    }
}
