//! Free-exactly-once accounting for native-owned handles.
//!
//! The native side never guards its own frees, so the client must: every
//! handle it hands out is registered here while live, flipped to freed on
//! release, and checked before any use. Nothing is ever released on scope
//! exit; dropping a wrapper without freeing it leaks the native handle,
//! which is the documented ownership contract.

use std::collections::HashMap;

use crate::error::BridgeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandleState {
    Live,
    Freed,
}

/// Tracks handle state by raw address.
#[derive(Default)]
pub(crate) struct Lifecycle {
    handles: HashMap<usize, HandleState>,
}

impl Lifecycle {
    pub(crate) fn register(&mut self, addr: usize) {
        // Re-registering an address the native side recycled after a free is
        // legal; the old entry is superseded.
        self.handles.insert(addr, HandleState::Live);
    }

    pub(crate) fn assert_live(&self, addr: usize) -> Result<(), BridgeError> {
        match self.handles.get(&addr) {
            Some(HandleState::Live) => Ok(()),
            Some(HandleState::Freed) => Err(BridgeError::UseAfterFree),
            None => Err(BridgeError::UnknownHandle(addr)),
        }
    }

    pub(crate) fn release(&mut self, addr: usize) -> Result<(), BridgeError> {
        match self.handles.get_mut(&addr) {
            Some(state @ HandleState::Live) => {
                *state = HandleState::Freed;
                Ok(())
            }
            Some(HandleState::Freed) => Err(BridgeError::DoubleFree),
            None => Err(BridgeError::UnknownHandle(addr)),
        }
    }
}
