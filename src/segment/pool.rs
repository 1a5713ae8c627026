//! Thread-safe pool of reusable backing buffers.
//!
//! Buffers are grouped into power-of-two size classes between
//! [`MIN_CLASS_LEN`] and [`MAX_CLASS_LEN`] elements. A rental is rounded up to
//! the next class; requests larger than the biggest class are served with a
//! fresh, unpooled allocation. Returned buffers keep their previous contents.

use std::sync::{
    Arc,
    Mutex,
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

use super::store::{BackingStore, lock};

/// Smallest pooled buffer length.
pub const MIN_CLASS_LEN: usize = 16;
/// Largest pooled buffer length (1 MiB of bytes).
pub const MAX_CLASS_LEN: usize = 1 << 20;
/// Default number of idle buffers retained per size class.
pub const DEFAULT_MAX_RETAINED: usize = 32;

const CLASS_COUNT: usize = (MAX_CLASS_LEN.trailing_zeros() - MIN_CLASS_LEN.trailing_zeros()) as usize + 1;

/// Snapshot of pool activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers handed out, pooled or not.
    pub rented: u64,
    /// Rentals satisfied by a previously returned buffer.
    pub reused: u64,
    /// Rentals too large for any size class.
    pub unpooled: u64,
    /// Buffers accepted back into a size class.
    pub returned: u64,
    /// Idle buffers currently held by the pool.
    pub retained: usize,
}

#[derive(Default)]
struct Counters {
    rented: AtomicU64,
    reused: AtomicU64,
    unpooled: AtomicU64,
    returned: AtomicU64,
}

pub(super) struct PoolShared<T> {
    classes: Vec<Mutex<Vec<Vec<T>>>>,
    max_retained: usize,
    counters: Counters,
}

impl<T> PoolShared<T> {
    pub(super) fn give_back(&self, buf: Vec<T>) {
        let Some(index) = exact_class(buf.len()) else {
            return;
        };
        let Some(class) = self.classes.get(index) else {
            return;
        };
        let mut idle = lock(class);
        if idle.len() < self.max_retained {
            idle.push(buf);
            self.counters.returned.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Size class for a rental of `len` elements, if it is poolable.
fn class_for(len: usize) -> Option<usize> {
    let rounded = len.max(MIN_CLASS_LEN).checked_next_power_of_two()?;
    exact_class(rounded)
}

/// Size class whose buffers are exactly `len` elements long.
fn exact_class(len: usize) -> Option<usize> {
    if !len.is_power_of_two() || !(MIN_CLASS_LEN..=MAX_CLASS_LEN).contains(&len) {
        return None;
    }
    Some((len.trailing_zeros() - MIN_CLASS_LEN.trailing_zeros()) as usize)
}

/// Cloneable handle to a pool of reusable buffers.
///
/// All clones share the same free lists, so a pool can be handed to many
/// clients and transports at once.
///
/// # Examples
///
/// ```
/// use devicewire::segment::{BufferPool, BufferSegment};
///
/// let pool = BufferPool::<u8>::new();
/// let segment = BufferSegment::rent(&pool, 100);
/// assert_eq!(segment.len(), 100);
/// segment.release().expect("first release succeeds");
/// assert_eq!(pool.stats().returned, 1);
/// ```
pub struct BufferPool<T> {
    shared: Arc<PoolShared<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for BufferPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("max_retained", &self.shared.max_retained)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<T> Default for BufferPool<T> {
    fn default() -> Self { Self::with_max_retained(DEFAULT_MAX_RETAINED) }
}

impl BufferPool<u8> {
    /// The process-wide byte pool shared by every client in the process.
    #[must_use]
    pub fn shared() -> Self {
        static SHARED: OnceLock<BufferPool<u8>> = OnceLock::new();
        SHARED.get_or_init(BufferPool::new).clone()
    }
}

impl<T> BufferPool<T> {
    /// Create an empty pool with default retention.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create an empty pool keeping at most `max_retained` idle buffers per
    /// size class.
    #[must_use]
    pub fn with_max_retained(max_retained: usize) -> Self {
        let classes = (0..CLASS_COUNT).map(|_| Mutex::new(Vec::new())).collect();
        Self {
            shared: Arc::new(PoolShared {
                classes,
                max_retained,
                counters: Counters::default(),
            }),
        }
    }

    /// Current activity counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            rented: counters.rented.load(Ordering::Relaxed),
            reused: counters.reused.load(Ordering::Relaxed),
            unpooled: counters.unpooled.load(Ordering::Relaxed),
            returned: counters.returned.load(Ordering::Relaxed),
            retained: self.shared.classes.iter().map(|class| lock(class).len()).sum(),
        }
    }
}

impl<T: Clone + Default> BufferPool<T> {
    /// Rent a backing store holding at least `min_len` elements.
    ///
    /// Fresh buffers are filled with `T::default()`; reused buffers keep
    /// whatever the previous renter wrote.
    #[must_use]
    pub fn rent(&self, min_len: usize) -> BackingStore<T> {
        let counters = &self.shared.counters;
        counters.rented.fetch_add(1, Ordering::Relaxed);

        let Some(index) = class_for(min_len) else {
            counters.unpooled.fetch_add(1, Ordering::Relaxed);
            return BackingStore::unpooled(vec![T::default(); min_len]);
        };

        let reused = self.shared.classes.get(index).and_then(|class| lock(class).pop());
        let buf = if let Some(buf) = reused {
            counters.reused.fetch_add(1, Ordering::Relaxed);
            buf
        } else {
            vec![T::default(); MIN_CLASS_LEN << index]
        };
        BackingStore::pooled(buf, Arc::downgrade(&self.shared))
    }
}
