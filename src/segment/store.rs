//! Shared backing storage for buffer segments.

use std::{
    fmt,
    ops::Range,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use super::{
    SegmentError,
    SegmentState,
    pool::PoolShared,
};

/// Handle to a backing buffer that segments view into.
///
/// Cloning the handle shares the same buffer. Identity, not contents,
/// determines segment equality. A store rented from a
/// [`BufferPool`](super::BufferPool) goes back to that pool on release; an
/// unpooled store is simply dropped.
pub struct BackingStore<T> {
    inner: Arc<StoreInner<T>>,
}

struct StoreInner<T> {
    len: usize,
    data: Mutex<Option<Vec<T>>>,
    pool: Option<Weak<PoolShared<T>>>,
}

impl<T> Clone for BackingStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for BackingStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("len", &self.inner.len)
            .field("pooled", &self.inner.pool.is_some())
            .field("released", &self.is_released())
            .finish()
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> BackingStore<T> {
    /// Wrap an owned vector that does not belong to any pool.
    ///
    /// # Examples
    ///
    /// ```
    /// use devicewire::segment::BackingStore;
    ///
    /// let store = BackingStore::unpooled(vec![1u8, 2, 3]);
    /// assert_eq!(store.len(), 3);
    /// ```
    #[must_use]
    pub fn unpooled(data: Vec<T>) -> Self { Self::build(data, None) }

    pub(super) fn pooled(data: Vec<T>, pool: Weak<PoolShared<T>>) -> Self {
        Self::build(data, Some(pool))
    }

    fn build(data: Vec<T>, pool: Option<Weak<PoolShared<T>>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                len: data.len(),
                data: Mutex::new(Some(data)),
                pool,
            }),
        }
    }

    /// Number of elements in the backing buffer.
    #[must_use]
    pub fn len(&self) -> usize { self.inner.len }

    /// Returns `true` if the backing buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.inner.len == 0 }

    /// Returns `true` once the buffer has been handed back.
    #[must_use]
    pub fn is_released(&self) -> bool { lock(&self.inner.data).is_none() }

    /// Returns `true` if both handles refer to the same buffer.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }

    pub(super) fn ensure_live(&self) -> Result<(), SegmentError> {
        if self.is_released() {
            Err(SegmentError::InvalidState(SegmentState::Released))
        } else {
            Ok(())
        }
    }

    /// Run `f` over `range` of the live buffer.
    pub(super) fn with_range<R>(
        &self,
        range: Range<usize>,
        f: impl FnOnce(&mut [T]) -> R,
    ) -> Result<R, SegmentError> {
        let mut guard = lock(&self.inner.data);
        let data = guard
            .as_mut()
            .ok_or(SegmentError::InvalidState(SegmentState::Released))?;
        let len = data.len();
        let window = data
            .get_mut(range.clone())
            .ok_or(SegmentError::RangeOutOfBounds {
                offset: range.start,
                count: range.len(),
                len,
            })?;
        Ok(f(window))
    }

    /// Take the buffer out of the store and return it to its pool.
    ///
    /// Every view of this store observes the release.
    pub(super) fn release(&self) -> Result<(), SegmentError> {
        let data = lock(&self.inner.data)
            .take()
            .ok_or(SegmentError::InvalidState(SegmentState::Released))?;
        if let Some(pool) = self.inner.pool.as_ref().and_then(Weak::upgrade) {
            pool.give_back(data);
        }
        Ok(())
    }
}

impl<T: Copy> BackingStore<T> {
    /// Copy `src_range` of `src` into `dst` starting at `dst_offset`.
    ///
    /// Locks are taken in address order so concurrent copies in opposite
    /// directions cannot deadlock. Copies within one store may overlap.
    pub(super) fn copy_between(
        src: &Self,
        src_range: Range<usize>,
        dst: &Self,
        dst_offset: usize,
    ) -> Result<(), SegmentError> {
        let count = src_range.len();
        if src.ptr_eq(dst) {
            let mut guard = lock(&src.inner.data);
            let data = guard
                .as_mut()
                .ok_or(SegmentError::InvalidState(SegmentState::Released))?;
            check_window(src_range.start, count, data.len())?;
            check_window(dst_offset, count, data.len())?;
            data.copy_within(src_range, dst_offset);
            return Ok(());
        }

        let src_first = Arc::as_ptr(&src.inner) < Arc::as_ptr(&dst.inner);
        let (mut first, mut second) = if src_first {
            (lock(&src.inner.data), lock(&dst.inner.data))
        } else {
            (lock(&dst.inner.data), lock(&src.inner.data))
        };
        let (src_guard, dst_guard) = if src_first {
            (&mut first, &mut second)
        } else {
            (&mut second, &mut first)
        };

        let released = SegmentError::InvalidState(SegmentState::Released);
        let src_data = (**src_guard).as_ref().ok_or(released)?;
        let dst_data = (**dst_guard).as_mut().ok_or(released)?;
        let src_len = src_data.len();
        let dst_len = dst_data.len();
        let from = src_data
            .get(src_range.clone())
            .ok_or(SegmentError::RangeOutOfBounds {
                offset: src_range.start,
                count,
                len: src_len,
            })?;
        let to = dst_data
            .get_mut(dst_offset..dst_offset.saturating_add(count))
            .ok_or(SegmentError::RangeOutOfBounds {
                offset: dst_offset,
                count,
                len: dst_len,
            })?;
        to.copy_from_slice(from);
        Ok(())
    }
}

pub(super) fn check_window(offset: usize, count: usize, len: usize) -> Result<(), SegmentError> {
    if offset > len || count > len - offset {
        return Err(SegmentError::RangeOutOfBounds { offset, count, len });
    }
    Ok(())
}
