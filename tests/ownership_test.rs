// Buffer ownership protocol across the exported C ABI
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use geobridge::codec::{decode, encode};
use geobridge::ffi::{free_buffer, get_buffer_size, point3d_array_roundtrip};
use geobridge::geometry::Vec3;
use geobridge::ownership::{registry, BufferState, NativeBuffer, ProducedBuffer, ProtocolViolation};

static COUNTED_RELEASES: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn counting_free(ptr: *mut c_void) {
    COUNTED_RELEASES.fetch_add(1, Ordering::SeqCst);
    free_buffer(ptr);
}

static SKIPPED_RELEASES: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn skipped_free(ptr: *mut c_void) {
    SKIPPED_RELEASES.fetch_add(1, Ordering::SeqCst);
    free_buffer(ptr);
}

fn call_point_array(points: &[Vec3]) -> (bool, *mut u8, i32) {
    let input = encode(&points.to_vec());
    let mut out = ptr::null_mut();
    let mut size = 0;
    let ok = unsafe { point3d_array_roundtrip(input.as_ptr(), input.len() as i32, &mut out, &mut size) };
    (ok, out, size)
}

#[test]
fn test_consumer_copies_once_and_releases_once() {
    let points = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)];
    let (ok, out, size) = call_point_array(&points);
    assert!(ok, "Round trip should succeed");
    assert_eq!(unsafe { get_buffer_size(out.cast()) }, size);

    let before = COUNTED_RELEASES.load(Ordering::SeqCst);
    let buffer = unsafe { NativeBuffer::adopt(out, size as i64, counting_free) }.expect("Buffer should be adopted");
    assert_eq!(buffer.state(), BufferState::Transferred);
    let bytes = buffer.into_vec().expect("Copy should succeed");
    assert_eq!(COUNTED_RELEASES.load(Ordering::SeqCst), before + 1);

    let decoded: Vec<Vec3> = decode(&bytes).expect("Failed to decode returned buffer");
    assert_eq!(decoded, points);
}

#[test]
fn test_zero_size_skips_copy_and_free() {
    let (ok, out, size) = call_point_array(&[Vec3::UNIT_Z]);
    assert!(ok);

    assert!(unsafe { NativeBuffer::adopt(out, 0, skipped_free) }.is_none());
    assert!(unsafe { NativeBuffer::adopt(out, -4, skipped_free) }.is_none());
    assert_eq!(SKIPPED_RELEASES.load(Ordering::SeqCst), 0);

    // still outstanding, release it properly
    assert_eq!(unsafe { get_buffer_size(out.cast()) }, size);
    unsafe { free_buffer(out.cast()) };
}

#[test]
fn test_producer_registry_rejects_unknown_release() {
    let mut stack_bytes = [0u8; 16];
    let err = registry::release(stack_bytes.as_mut_ptr()).unwrap_err();
    assert_eq!(err, ProtocolViolation::UnknownBuffer { address: stack_bytes.as_ptr() as usize });

    // exported free ignores it too
    unsafe { free_buffer(stack_bytes.as_mut_ptr().cast()) };
}

#[test]
fn test_produced_buffer_lifecycle() {
    let produced = ProducedBuffer::new(vec![1, 2, 3, 4]).expect("Non-empty payload");
    assert_eq!(produced.state(), BufferState::OwnedByProducer);
    let (ptr, len) = produced.into_raw().expect("Hand out should succeed");
    assert_eq!(registry::size_of(ptr), Some(len));

    let bytes = unsafe { NativeBuffer::adopt(ptr, len as i64, free_buffer) }
        .expect("Buffer should be adopted")
        .into_vec()
        .expect("Copy should succeed");
    assert_eq!(bytes, vec![1, 2, 3, 4]);
}

#[test]
fn test_illegal_transitions_are_violations() {
    let err = BufferState::Freed.transition(BufferState::Freed).unwrap_err();
    assert_eq!(
        err,
        ProtocolViolation::IllegalTransition { from: BufferState::Freed, to: BufferState::Freed }
    );
    assert!(BufferState::Unowned.transition(BufferState::OwnedByConsumer).is_err());
}

#[test]
fn test_concurrent_round_trips_keep_buffers_apart() {
    let results: Vec<Vec<Vec3>> = (0..64)
        .into_par_iter()
        .map(|i| {
            let points: Vec<Vec3> = (0..i).map(|j| Vec3::new(i as f64, j as f64, 0.5)).collect();
            let (ok, out, size) = call_point_array(&points);
            assert!(ok);
            let bytes = unsafe { NativeBuffer::adopt(out, size as i64, free_buffer) }
                .expect("Buffer should be adopted")
                .into_vec()
                .expect("Copy should succeed");
            decode(&bytes).expect("Failed to decode returned buffer")
        })
        .collect();

    for (i, points) in results.iter().enumerate() {
        assert_eq!(points.len(), i);
        assert!(points.iter().all(|p| p.x == i as f64));
    }
}
