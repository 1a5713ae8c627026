//! Recyclable views over pooled buffers.
//!
//! A [`BufferSegment`] is a window (`offset`, `len`) onto a
//! [`BackingStore`]. Segments are cheap to clone and slice: every view shares
//! the same store, so [`BufferSegment::set`] writes through to all of them.
//! Releasing any view hands the store back to its [`BufferPool`]; from then on
//! every view of that store reports [`SegmentError::InvalidState`], and a
//! second release fails the same way.
//!
//! Segments never convert implicitly from vectors or slices. Build them with
//! [`BufferSegment::new`], [`BufferSegment::with_range`] or
//! [`BufferSegment::rent`].

mod error;
pub mod pool;
mod store;

pub use error::{SegmentError, SegmentState};
pub use pool::{BufferPool, PoolStats};
pub use store::BackingStore;
use store::check_window;

/// Bounded, non-owning view over a shared backing store.
///
/// The default value is the *absent* segment: it has no store and every
/// accessor fails with [`SegmentState::Absent`].
///
/// # Examples
///
/// ```
/// use devicewire::segment::{BackingStore, BufferSegment};
///
/// let store = BackingStore::unpooled(vec![10u8, 20, 30, 40]);
/// let segment = BufferSegment::with_range(store, 1, 2).expect("window fits");
/// assert_eq!(segment.get(0), Ok(20));
/// assert_eq!(segment.to_vec(), Ok(vec![20, 30]));
/// ```
pub struct BufferSegment<T = u8> {
    store: Option<BackingStore<T>>,
    offset: usize,
    count: usize,
}

impl<T> Clone for BufferSegment<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            offset: self.offset,
            count: self.count,
        }
    }
}

impl<T> Default for BufferSegment<T> {
    fn default() -> Self {
        Self {
            store: None,
            offset: 0,
            count: 0,
        }
    }
}

impl<T> std::fmt::Debug for BufferSegment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSegment")
            .field("store", &self.store)
            .field("offset", &self.offset)
            .field("count", &self.count)
            .finish()
    }
}

/// Segments are equal when they view the same store over the same window.
/// Contents are not compared.
impl<T> PartialEq for BufferSegment<T> {
    fn eq(&self, other: &Self) -> bool {
        let same_store = match (&self.store, &other.store) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        same_store && self.offset == other.offset && self.count == other.count
    }
}

impl<T> Eq for BufferSegment<T> {}

impl<T> BufferSegment<T> {
    /// View the whole of `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the store was released.
    pub fn new(store: BackingStore<T>) -> Result<Self, SegmentError> {
        let len = store.len();
        Self::with_range(store, 0, len)
    }

    /// View `count` elements of `store` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::RangeOutOfBounds`] if the window does not fit
    /// and [`SegmentError::InvalidState`] if the store was released.
    pub fn with_range(
        store: BackingStore<T>,
        offset: usize,
        count: usize,
    ) -> Result<Self, SegmentError> {
        store.ensure_live()?;
        check_window(offset, count, store.len())?;
        Ok(Self {
            store: Some(store),
            offset,
            count,
        })
    }

    /// Offset of the window inside its backing store.
    #[must_use]
    pub fn offset(&self) -> usize { self.offset }

    /// Number of elements visible through this segment.
    #[must_use]
    pub fn len(&self) -> usize { self.count }

    /// Returns `true` if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.count == 0 }

    /// Returns `true` for the default, store-less segment.
    #[must_use]
    pub fn is_absent(&self) -> bool { self.store.is_none() }

    /// The backing store, if any.
    #[must_use]
    pub fn backing_store(&self) -> Option<&BackingStore<T>> { self.store.as_ref() }

    fn live_store(&self) -> Result<&BackingStore<T>, SegmentError> {
        let store = self
            .store
            .as_ref()
            .ok_or(SegmentError::InvalidState(SegmentState::Absent))?;
        store.ensure_live()?;
        Ok(store)
    }

    fn window(&self) -> std::ops::Range<usize> { self.offset..self.offset + self.count }

    fn check_index(&self, index: usize) -> Result<(), SegmentError> {
        if index >= self.count {
            return Err(SegmentError::IndexOutOfRange {
                index,
                len: self.count,
            });
        }
        Ok(())
    }

    /// Segment over `[index, len)` of this one.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::IndexOutOfRange`] if `index > len` and
    /// [`SegmentError::InvalidState`] if the segment is absent or released.
    pub fn slice(&self, index: usize) -> Result<Self, SegmentError> {
        let store = self.live_store()?;
        if index > self.count {
            return Err(SegmentError::IndexOutOfRange {
                index,
                len: self.count,
            });
        }
        Ok(Self {
            store: Some(store.clone()),
            offset: self.offset + index,
            count: self.count - index,
        })
    }

    /// Segment over `[index, index + len)` of this one.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::RangeOutOfBounds`] if the window does not fit
    /// and [`SegmentError::InvalidState`] if the segment is absent or released.
    pub fn slice_len(&self, index: usize, len: usize) -> Result<Self, SegmentError> {
        let store = self.live_store()?;
        check_window(index, len, self.count)?;
        Ok(Self {
            store: Some(store.clone()),
            offset: self.offset + index,
            count: len,
        })
    }

    /// Borrow the window for the duration of `f`.
    ///
    /// The store is locked while `f` runs; do not touch other views of the
    /// same store from inside it.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> Result<R, SegmentError> {
        self.live_store()?.with_range(self.window(), |window| f(window))
    }

    /// Mutably borrow the window for the duration of `f`.
    ///
    /// Writes are visible through every view of the store.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Result<R, SegmentError> {
        self.live_store()?.with_range(self.window(), f)
    }

    /// Return the backing store to its pool.
    ///
    /// The store is shared, so releasing one view releases all of them.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or the
    /// store was already released through any view.
    pub fn release(self) -> Result<(), SegmentError> {
        let store = self
            .store
            .ok_or(SegmentError::InvalidState(SegmentState::Absent))?;
        store.release()
    }
}

impl<T: Clone + Default> BufferSegment<T> {
    /// Rent a store of at least `len` elements from `pool` and view exactly
    /// `len` of them.
    #[must_use]
    pub fn rent(pool: &BufferPool<T>, len: usize) -> Self {
        Self {
            store: Some(pool.rent(len)),
            offset: 0,
            count: len,
        }
    }
}

impl<T: Copy> BufferSegment<T> {
    /// Read the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::IndexOutOfRange`] outside `[0, len)` and
    /// [`SegmentError::InvalidState`] if the segment is absent or released.
    pub fn get(&self, index: usize) -> Result<T, SegmentError> {
        let store = self.live_store()?;
        self.check_index(index)?;
        let at = self.offset + index;
        store.with_range(at..at + 1, |cell| cell[0])
    }

    /// Write `value` at `index`, visible through every view of the store.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::IndexOutOfRange`] outside `[0, len)` and
    /// [`SegmentError::InvalidState`] if the segment is absent or released.
    pub fn set(&self, index: usize, value: T) -> Result<(), SegmentError> {
        let store = self.live_store()?;
        self.check_index(index)?;
        let at = self.offset + index;
        store.with_range(at..at + 1, |cell| cell[0] = value)
    }

    /// Copy the window into the front of `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::DestinationTooSmall`] if `destination` is
    /// shorter than the segment.
    pub fn copy_to_slice(&self, destination: &mut [T]) -> Result<(), SegmentError> {
        let store = self.live_store()?;
        let available = destination.len();
        let target = destination
            .get_mut(..self.count)
            .ok_or(SegmentError::DestinationTooSmall {
                required: self.count,
                available,
            })?;
        store.with_range(self.window(), |window| target.copy_from_slice(window))
    }

    /// Copy the window into the front of another segment.
    ///
    /// Overlapping windows over the same store are handled.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::DestinationTooSmall`] if `destination` is
    /// shorter than this segment and [`SegmentError::InvalidState`] if either
    /// segment is absent or released.
    pub fn copy_to_segment(&self, destination: &BufferSegment<T>) -> Result<(), SegmentError> {
        let source = self.live_store()?;
        let target = destination.live_store()?;
        if self.count > destination.count {
            return Err(SegmentError::DestinationTooSmall {
                required: self.count,
                available: destination.count,
            });
        }
        BackingStore::copy_between(source, self.window(), target, destination.offset)
    }

    /// Copy the window into a new vector.
    ///
    /// Empty segments yield an empty vector without allocating.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn to_vec(&self) -> Result<Vec<T>, SegmentError> {
        let store = self.live_store()?;
        if self.count == 0 {
            return Ok(Vec::new());
        }
        store.with_range(self.window(), |window| window.to_vec())
    }

    /// Iterate over the elements of the window by value.
    ///
    /// Iteration stops early if the store is released part-way through.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn iter(&self) -> Result<Iter<'_, T>, SegmentError> {
        self.live_store()?;
        Ok(Iter {
            segment: self,
            next: 0,
        })
    }
}

impl<T: PartialEq> BufferSegment<T> {
    /// Position of the first element equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn index_of(&self, value: &T) -> Result<Option<usize>, SegmentError> {
        self.with_slice(|window| window.iter().position(|item| item == value))
    }

    /// Returns `true` if some element equals `value`.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::InvalidState`] if the segment is absent or
    /// released.
    pub fn contains(&self, value: &T) -> Result<bool, SegmentError> {
        self.with_slice(|window| window.contains(value))
    }
}

/// By-value iterator over a [`BufferSegment`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    segment: &'a BufferSegment<T>,
    next: usize,
}

impl<T: Copy> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.segment.get(self.next).ok()?;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.segment.len().saturating_sub(self.next)))
    }
}

#[cfg(test)]
mod tests;
