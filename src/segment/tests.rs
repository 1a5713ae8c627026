//! Unit tests for buffer segments.

use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::*;

const BACKING_LEN: usize = 8;

#[fixture]
fn store() -> BackingStore<u8> { BackingStore::unpooled((0..BACKING_LEN as u8).collect()) }

#[rstest]
fn whole_store_segment_covers_every_element(store: BackingStore<u8>) {
    let segment = BufferSegment::new(store).expect("segment over whole store");
    assert_eq!(segment.offset(), 0);
    assert_eq!(segment.len(), BACKING_LEN);
    assert_eq!(segment.to_vec(), Ok((0..BACKING_LEN as u8).collect::<Vec<_>>()));
}

#[rstest]
#[case(0, 9)]
#[case(9, 0)]
#[case(4, 5)]
#[case(usize::MAX, 1)]
#[case(1, usize::MAX)]
fn windows_outside_the_store_are_rejected(
    store: BackingStore<u8>,
    #[case] offset: usize,
    #[case] count: usize,
) {
    let err = BufferSegment::with_range(store, offset, count).expect_err("window must not fit");
    assert!(matches!(err, SegmentError::RangeOutOfBounds { .. }), "got {err:?}");
}

#[rstest]
fn indexing_is_bounded_by_count(store: BackingStore<u8>) {
    let segment = BufferSegment::with_range(store, 2, 3).expect("segment");
    assert_eq!(segment.get(2), Ok(4));
    assert_eq!(
        segment.get(3),
        Err(SegmentError::IndexOutOfRange { index: 3, len: 3 })
    );
    assert_eq!(
        segment.set(3, 0),
        Err(SegmentError::IndexOutOfRange { index: 3, len: 3 })
    );
}

#[rstest]
fn set_writes_through_to_every_view(store: BackingStore<u8>) {
    let segment = BufferSegment::new(store.clone()).expect("segment");
    let tail = segment.slice(4).expect("tail");
    tail.set(0, 99).expect("set through slice");

    assert_eq!(segment.get(4), Ok(99));
    let other = BufferSegment::with_range(store, 4, 1).expect("second view");
    assert_eq!(other.get(0), Ok(99));
}

#[rstest]
fn slices_are_views_not_copies(store: BackingStore<u8>) {
    let segment = BufferSegment::with_range(store, 1, 6).expect("segment");
    let slice = segment.slice_len(2, 3).expect("slice");
    assert_eq!(slice.offset(), 3);
    assert_eq!(slice.len(), 3);
    assert!(
        slice
            .backing_store()
            .zip(segment.backing_store())
            .is_some_and(|(a, b)| a.ptr_eq(b))
    );
}

#[rstest]
#[case(7, 0)]
#[case(0, 7)]
#[case(3, 4)]
fn slice_len_rejects_windows_past_the_end(
    store: BackingStore<u8>,
    #[case] index: usize,
    #[case] len: usize,
) {
    let segment = BufferSegment::with_range(store, 1, 6).expect("segment");
    assert!(matches!(
        segment.slice_len(index, len),
        Err(SegmentError::RangeOutOfBounds { .. })
    ));
}

#[rstest]
fn slice_past_the_end_is_rejected(store: BackingStore<u8>) {
    let segment = BufferSegment::with_range(store, 0, 4).expect("segment");
    assert!(segment.slice(4).is_ok_and(|empty| empty.is_empty()));
    assert_eq!(
        segment.slice(5),
        Err(SegmentError::IndexOutOfRange { index: 5, len: 4 })
    );
}

#[rstest]
fn equality_is_identity_and_window(store: BackingStore<u8>) {
    let a = BufferSegment::with_range(store.clone(), 1, 3).expect("a");
    let b = BufferSegment::with_range(store, 1, 3).expect("b");
    let c = BufferSegment::with_range(BackingStore::unpooled((0..8).collect()), 1, 3)
        .expect("same contents, different store");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, a.slice(1).expect("narrower"));
    assert_eq!(BufferSegment::<u8>::default(), BufferSegment::default());
}

#[rstest]
fn copy_to_slice_requires_capacity(store: BackingStore<u8>) {
    let segment = BufferSegment::with_range(store, 2, 4).expect("segment");
    let mut short = [0u8; 3];
    assert_eq!(
        segment.copy_to_slice(&mut short),
        Err(SegmentError::DestinationTooSmall {
            required: 4,
            available: 3,
        })
    );

    let mut roomy = [0u8; 6];
    segment.copy_to_slice(&mut roomy).expect("copy");
    assert_eq!(roomy, [2, 3, 4, 5, 0, 0]);
}

#[rstest]
fn copy_to_segment_between_stores(store: BackingStore<u8>) {
    let source = BufferSegment::with_range(store, 0, 3).expect("source");
    let destination = BufferSegment::new(BackingStore::unpooled(vec![0u8; 5])).expect("dest");
    source.copy_to_segment(&destination).expect("copy");
    assert_eq!(destination.to_vec(), Ok(vec![0, 1, 2, 0, 0]));

    let tiny = BufferSegment::new(BackingStore::unpooled(vec![0u8; 2])).expect("tiny");
    assert_eq!(
        source.copy_to_segment(&tiny),
        Err(SegmentError::DestinationTooSmall {
            required: 3,
            available: 2,
        })
    );
}

#[rstest]
fn copy_to_segment_handles_overlap(store: BackingStore<u8>) {
    let whole = BufferSegment::new(store).expect("whole");
    let front = whole.slice_len(0, 4).expect("front");
    let shifted = whole.slice(2).expect("shifted");
    front.copy_to_segment(&shifted).expect("overlapping copy");
    assert_eq!(whole.to_vec(), Ok(vec![0, 1, 0, 1, 2, 3, 6, 7]));
}

#[test]
fn empty_to_vec_does_not_touch_the_pool() {
    let pool = BufferPool::<u8>::new();
    let segment = BufferSegment::rent(&pool, 0);
    let before = pool.stats();

    let first = segment.to_vec().expect("empty copy");
    let second = segment.to_vec().expect("empty copy");

    assert!(first.is_empty() && second.is_empty());
    assert_eq!(first.capacity(), 0);
    assert_eq!(pool.stats(), before);
}

#[test]
fn absent_segment_rejects_every_accessor() {
    let absent = BufferSegment::<u8>::default();
    let invalid = SegmentError::InvalidState(SegmentState::Absent);

    assert!(absent.is_absent());
    assert_eq!(absent.get(0), Err(invalid));
    assert_eq!(absent.set(0, 1), Err(invalid));
    assert_eq!(absent.slice(0), Err(invalid));
    assert_eq!(absent.slice_len(0, 0), Err(invalid));
    assert_eq!(absent.to_vec(), Err(invalid));
    assert_eq!(absent.copy_to_slice(&mut []), Err(invalid));
    assert_eq!(absent.contains(&0), Err(invalid));
    assert!(absent.iter().is_err());
    assert_eq!(absent.release(), Err(invalid));
}

#[test]
fn released_segment_rejects_every_accessor() {
    let pool = BufferPool::<u8>::new();
    let segment = BufferSegment::rent(&pool, 4);
    let view = segment.clone();
    let slice = segment.slice(1).expect("slice before release");
    segment.release().expect("first release");
    let invalid = SegmentError::InvalidState(SegmentState::Released);

    assert_eq!(view.get(0), Err(invalid));
    assert_eq!(view.set(0, 1), Err(invalid));
    assert_eq!(view.to_vec(), Err(invalid));
    assert_eq!(view.slice(0), Err(invalid));
    assert_eq!(slice.get(0), Err(invalid));
    assert_eq!(view.index_of(&0), Err(invalid));
    assert!(view.iter().is_err());
}

#[rstest]
fn copy_to_segment_rejects_dead_destinations(store: BackingStore<u8>) {
    let source = BufferSegment::with_range(store, 0, 2).expect("source");

    assert_eq!(
        source.copy_to_segment(&BufferSegment::default()),
        Err(SegmentError::InvalidState(SegmentState::Absent))
    );

    let pool = BufferPool::<u8>::new();
    let released = BufferSegment::rent(&pool, 4);
    released.clone().release().expect("release");
    assert_eq!(
        source.copy_to_segment(&released),
        Err(SegmentError::InvalidState(SegmentState::Released))
    );
    assert_eq!(source.to_vec(), Ok(vec![0, 1]), "source is untouched");
}

#[rstest]
fn copy_to_slice_reports_available_length(store: BackingStore<u8>) {
    let segment = BufferSegment::new(store).expect("segment");
    let mut empty: [u8; 0] = [];
    assert_eq!(
        segment.copy_to_slice(&mut empty),
        Err(SegmentError::DestinationTooSmall {
            required: BACKING_LEN,
            available: 0,
        })
    );
}

#[test]
fn double_release_is_rejected() {
    let pool = BufferPool::<u8>::new();
    let segment = BufferSegment::rent(&pool, 16);
    let copy = segment.clone();

    segment.release().expect("first release");
    assert_eq!(
        copy.release(),
        Err(SegmentError::InvalidState(SegmentState::Released))
    );
    assert_eq!(pool.stats().returned, 1, "store returned exactly once");
}

#[test]
fn released_store_cannot_back_new_segments() {
    let pool = BufferPool::<u8>::new();
    let store = pool.rent(16);
    BufferSegment::new(store.clone())
        .expect("segment")
        .release()
        .expect("release");
    assert_eq!(
        BufferSegment::new(store),
        Err(SegmentError::InvalidState(SegmentState::Released))
    );
}

#[rstest]
fn list_like_queries(store: BackingStore<u8>) {
    let segment = BufferSegment::with_range(store, 3, 3).expect("segment");
    assert_eq!(segment.index_of(&4), Ok(Some(1)));
    assert_eq!(segment.index_of(&0), Ok(None));
    assert_eq!(segment.contains(&5), Ok(true));
    assert_eq!(segment.contains(&6), Ok(false));
    let collected: Vec<u8> = segment.iter().expect("iter").collect();
    assert_eq!(collected, vec![3, 4, 5]);
}

proptest! {
    #[test]
    fn valid_windows_index_the_backing_store(
        data in proptest::collection::vec(any::<u8>(), 0..64),
        offset_seed in any::<usize>(),
        count_seed in any::<usize>(),
    ) {
        let offset = offset_seed % (data.len() + 1);
        let count = count_seed % (data.len() - offset + 1);
        let segment = BufferSegment::with_range(BackingStore::unpooled(data.clone()), offset, count)
            .expect("window within bounds");
        for i in 0..count {
            prop_assert_eq!(segment.get(i), Ok(data[offset + i]));
        }
    }

    #[test]
    fn invalid_windows_are_range_errors(
        len in 0usize..64,
        offset in 0usize..128,
        count in 0usize..128,
    ) {
        prop_assume!(offset > len || count > len - offset);
        let result = BufferSegment::with_range(BackingStore::unpooled(vec![0u8; len]), offset, count);
        let is_range_error = matches!(result, Err(SegmentError::RangeOutOfBounds { .. }));
        prop_assert!(is_range_error);
    }

    #[test]
    fn slice_then_copy_matches_indexed_reads(
        data in proptest::collection::vec(any::<u8>(), 1..64),
        start_seed in any::<usize>(),
        len_seed in any::<usize>(),
    ) {
        let segment = BufferSegment::new(BackingStore::unpooled(data)).expect("segment");
        let start = start_seed % segment.len();
        let len = len_seed % (segment.len() - start + 1);
        let slice = segment.slice_len(start, len).expect("slice");

        let mut copied = vec![0u8; len];
        slice.copy_to_slice(&mut copied).expect("copy");
        let direct: Vec<u8> = (start..start + len)
            .map(|i| segment.get(i).expect("in bounds"))
            .collect();
        prop_assert_eq!(copied, direct);
    }
}
