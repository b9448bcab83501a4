//! Producer side of the buffer ownership protocol
//!
//! Buffers handed to foreign code stay owned by a process-wide registry keyed
//! by address until the consumer calls `release` (exported as
//! `free_buffer`). Releasing an address the registry does not know is
//! reported, never dereferenced.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use log::{debug, warn};

use super::handle::{BufferState, ProtocolViolation};

static PRODUCED: OnceLock<Mutex<HashMap<usize, Box<[u8]>>>> = OnceLock::new();

fn produced() -> MutexGuard<'static, HashMap<usize, Box<[u8]>>> {
    let registry = PRODUCED.get_or_init(|| Mutex::new(HashMap::new()));
    match registry.lock() {
        Ok(lock) => lock,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// A byte block this side produced and has not handed out yet
#[derive(Debug)]
pub struct ProducedBuffer {
    bytes: Box<[u8]>,
    state: BufferState,
}

impl ProducedBuffer {
    /// `None` for an empty payload: zero-length buffers are never handed out
    pub fn new(bytes: Vec<u8>) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            bytes: bytes.into_boxed_slice(),
            state: BufferState::Unowned.transition(BufferState::OwnedByProducer).ok()?,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Hand the block to foreign code. It stays alive until `release` is
    /// called with the returned pointer.
    pub fn into_raw(mut self) -> Result<(*mut u8, usize), ProtocolViolation> {
        self.state.transition(BufferState::Transferred)?;
        let len = self.bytes.len();
        let ptr = self.bytes.as_mut_ptr();
        produced().insert(ptr as usize, self.bytes);
        debug!("handed out buffer {:p} ({} bytes)", ptr, len);
        Ok((ptr, len))
    }
}

/// Register `bytes` and return the pointer/size pair for the consumer.
/// `None` when there is nothing to hand out.
pub fn produce(bytes: Vec<u8>) -> Option<(*mut u8, usize)> {
    ProducedBuffer::new(bytes)?.into_raw().ok()
}

/// Size of an outstanding buffer, `None` when the address is unknown
pub fn size_of(ptr: *const u8) -> Option<usize> {
    produced().get(&(ptr as usize)).map(|bytes| bytes.len())
}

/// Free a buffer previously returned by `produce`
pub fn release(ptr: *mut u8) -> Result<(), ProtocolViolation> {
    let address = ptr as usize;
    match produced().remove(&address) {
        Some(bytes) => {
            debug!("released buffer {:#x} ({} bytes)", address, bytes.len());
            Ok(())
        }
        None => {
            warn!("release of unknown buffer {:#x} ignored", address);
            Err(ProtocolViolation::UnknownBuffer { address })
        }
    }
}

/// Number of buffers handed out and not yet released
pub fn outstanding() -> usize {
    produced().len()
}
