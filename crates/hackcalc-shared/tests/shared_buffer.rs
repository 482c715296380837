#![cfg(not(target_arch = "wasm32"))]

use hackcalc_shared::layout::ROM_WORDS;
use hackcalc_shared::{with_shared_buffer, MemoryError, SharedBuffer, VecHeap};
use proptest::prelude::*;

const HEAP_BYTES: usize = 256 * 1024;

fn round_trip(bytes: &[u8]) -> Vec<u8> {
    let mut heap = VecHeap::new(HEAP_BYTES);
    let out = with_shared_buffer(&mut heap, bytes, |heap, buf| {
        assert_eq!(buf.len(), bytes.len());
        buf.read_bytes(heap)
    })
    .expect("round trip");
    assert_eq!(heap.live_allocations(), 0, "buffer must be released");
    out
}

#[test]
fn round_trip_boundary_lengths() {
    assert_eq!(round_trip(&[]), Vec::<u8>::new());
    assert_eq!(round_trip(&[0xA5]), vec![0xA5]);

    let rom: Vec<u8> = (0..ROM_WORDS).map(|i| (i * 7 + 3) as u8).collect();
    assert_eq!(round_trip(&rom), rom);
}

#[test]
fn many_scoped_buffers_do_not_leak() {
    let mut heap = VecHeap::new(HEAP_BYTES);
    for i in 0..64usize {
        let payload = vec![i as u8; i];
        let res: Result<(), MemoryError> = with_shared_buffer(&mut heap, &payload, |_, _| {
            if i % 3 == 0 {
                Err(MemoryError::Backend("rejected".into()))
            } else {
                Ok(())
            }
        });
        assert_eq!(res.is_err(), i % 3 == 0);
    }
    assert_eq!(heap.allocations(), 64);
    assert_eq!(heap.releases(), 64);
    assert_eq!(heap.live_allocations(), 0);
}

#[test]
fn explicit_release_frees_exactly_once() {
    let mut heap = VecHeap::new(HEAP_BYTES);
    let buf = SharedBuffer::create(&mut heap, b"class Main {}").unwrap();
    assert_eq!(heap.live_allocations(), 1);
    buf.release(&mut heap).unwrap();
    assert_eq!(heap.releases(), 1);
    assert_eq!(heap.live_allocations(), 0);
}

proptest! {
    #[test]
    fn read_bytes_returns_what_was_created(
        bytes in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        prop_assert_eq!(round_trip(&bytes), bytes);
    }
}
