//! Consumer side of the buffer ownership protocol
//!
//! A `(pointer, size)` pair returned by the producer is adopted into a
//! `NativeBuffer`. The handle is the only way to reach the bytes; converting
//! it consumes it, so the payload is copied once and released once.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::slice;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

/// Producer-designated release function (`free_buffer` on the native side)
pub type ReleaseFn = unsafe extern "C" fn(*mut c_void);

/// Lifecycle of one buffer handed across the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BufferState {
    Unowned,
    OwnedByProducer,
    Transferred,
    OwnedByConsumer,
    Freed,
}

impl BufferState {
    pub fn can_transition_to(self, next: BufferState) -> bool {
        use BufferState::*;
        matches!(
            (self, next),
            (Unowned, OwnedByProducer)
                | (OwnedByProducer, Transferred)
                | (OwnedByProducer, Freed)
                | (Transferred, OwnedByConsumer)
                | (Transferred, Freed)
                | (OwnedByConsumer, Freed)
        )
    }

    pub fn transition(self, next: BufferState) -> Result<BufferState, ProtocolViolation> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ProtocolViolation::IllegalTransition { from: self, to: next })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("illegal buffer transition {from:?} -> {to:?}")]
    IllegalTransition { from: BufferState, to: BufferState },

    #[error("no outstanding buffer at {address:#x}")]
    UnknownBuffer { address: usize },
}

/// Buffer allocated by the producer and owned by this side until released
pub struct NativeBuffer {
    ptr: NonNull<u8>,
    len: usize,
    release: ReleaseFn,
    state: BufferState,
}

impl NativeBuffer {
    /// Take responsibility for a buffer the producer just returned.
    ///
    /// Returns `None` for a null pointer or a non-positive size; nothing is
    /// copied or released in that case.
    ///
    /// # Safety
    /// - `ptr` must point to `size` readable bytes allocated by the producer
    ///   that `release` belongs to
    /// - the same pointer must not be adopted twice
    pub unsafe fn adopt(ptr: *mut u8, size: i64, release: ReleaseFn) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        if size <= 0 {
            warn!("native buffer {:p} reported size {}, ignoring", ptr, size);
            return None;
        }
        Some(Self {
            ptr,
            len: size as usize,
            release,
            state: BufferState::Transferred,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Copy the payload into owned memory and release the original
    pub fn into_vec(mut self) -> Result<Vec<u8>, ProtocolViolation> {
        self.state = self.state.transition(BufferState::OwnedByConsumer)?;
        // SAFETY: adopt's contract guarantees `len` readable bytes until release
        let bytes = unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }.to_vec();
        self.release_once()?;
        Ok(bytes)
    }

    fn release_once(&mut self) -> Result<(), ProtocolViolation> {
        self.state = self.state.transition(BufferState::Freed)?;
        debug!("releasing native buffer {:p} ({} bytes)", self.ptr, self.len);
        // SAFETY: the state machine admits exactly one transition into Freed
        unsafe { (self.release)(self.ptr.as_ptr().cast()) };
        Ok(())
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if self.state != BufferState::Freed {
            if let Err(err) = self.release_once() {
                warn!("native buffer {:p}: {}", self.ptr, err);
            }
        }
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("state", &self.state)
            .finish()
    }
}

/// Copy `size` bytes without releasing them. Empty for null/non-positive.
///
/// # Safety
/// `ptr` must point to at least `size` readable bytes when non-null.
pub unsafe fn copy_foreign(ptr: *const u8, size: i64) -> Vec<u8> {
    if ptr.is_null() || size <= 0 {
        return Vec::new();
    }
    slice::from_raw_parts(ptr, size as usize).to_vec()
}

/// Copy then release through `release`. Empty (and nothing released) for
/// null/non-positive.
///
/// # Safety
/// Same contract as [`NativeBuffer::adopt`].
pub unsafe fn copy_and_release(ptr: *mut u8, size: i64, release: ReleaseFn) -> Vec<u8> {
    match NativeBuffer::adopt(ptr, size, release) {
        Some(buffer) => match buffer.into_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("copy_and_release: {}", err);
                Vec::new()
            }
        },
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn count_release(ptr: *mut c_void) {
        RELEASED.fetch_add(1, Ordering::SeqCst);
        drop(Box::from_raw(ptr.cast::<[u8; 4]>()));
    }

    unsafe extern "C" fn never_release(_ptr: *mut c_void) {
        panic!("release must not be called");
    }

    fn leaked() -> *mut u8 {
        Box::into_raw(Box::new([1u8, 2, 3, 4])).cast()
    }

    #[test]
    fn test_transition_table() {
        use BufferState::*;
        assert!(Unowned.can_transition_to(OwnedByProducer));
        assert!(Transferred.can_transition_to(OwnedByConsumer));
        assert!(OwnedByConsumer.can_transition_to(Freed));
        assert!(!Freed.can_transition_to(Freed));
        assert!(!Unowned.can_transition_to(Transferred));
        assert!(!OwnedByConsumer.can_transition_to(OwnedByConsumer));
        assert_eq!(
            Freed.transition(OwnedByConsumer),
            Err(ProtocolViolation::IllegalTransition { from: Freed, to: OwnedByConsumer })
        );
    }

    // One test drives the shared counter so parallel tests can't interleave
    #[test]
    fn test_copy_and_drop_each_release_once() {
        let before = RELEASED.load(Ordering::SeqCst);

        let buffer = unsafe { NativeBuffer::adopt(leaked(), 4, count_release) }.unwrap();
        assert_eq!(buffer.state(), BufferState::Transferred);
        assert_eq!(buffer.into_vec().unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 1);

        let dropped = unsafe { NativeBuffer::adopt(leaked(), 4, count_release) }.unwrap();
        drop(dropped);
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 2);

        let copied = unsafe { copy_and_release(leaked(), 4, count_release) };
        assert_eq!(copied, vec![1, 2, 3, 4]);
        assert_eq!(RELEASED.load(Ordering::SeqCst), before + 3);
    }

    #[test]
    fn test_null_or_non_positive_size_short_circuits() {
        assert!(unsafe { NativeBuffer::adopt(std::ptr::null_mut(), 16, never_release) }.is_none());

        let mut bytes = [9u8; 4];
        assert!(unsafe { NativeBuffer::adopt(bytes.as_mut_ptr(), 0, never_release) }.is_none());
        assert!(unsafe { NativeBuffer::adopt(bytes.as_mut_ptr(), -5, never_release) }.is_none());
        assert!(unsafe { copy_and_release(bytes.as_mut_ptr(), 0, never_release) }.is_empty());
    }

    #[test]
    fn test_copy_foreign_leaves_source_alone() {
        let bytes = [5u8, 6, 7];
        assert_eq!(unsafe { copy_foreign(bytes.as_ptr(), 3) }, vec![5, 6, 7]);
        assert!(unsafe { copy_foreign(std::ptr::null(), 3) }.is_empty());
        assert!(unsafe { copy_foreign(bytes.as_ptr(), -1) }.is_empty());
    }
}
