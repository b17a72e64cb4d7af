//! Native-owned operation handles.
//!
//! Transformations and Measurements are opaque to the client; all it holds
//! is the raw handle plus the metadata declared at construction (kind, input
//! tag, output tag). Wrappers are move-only and never release on drop — the
//! free call is always explicit and goes through the bridge, which accounts
//! for it in the lifecycle table.

use std::ffi::c_void;
use std::fmt;
use std::mem;

use crate::binder::SymbolSource;
use crate::error::BridgeError;
use crate::value::{Tag, TaggedValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    /// Deterministic: identical inputs produce identical outputs.
    Transformation,
    /// Randomized: repeated invocation need not be reproducible.
    Measurement,
}

impl OpKind {
    /// Kind of a combination of two operations: randomness anywhere in a
    /// pipeline makes the whole pipeline randomized.
    pub(crate) fn combined(a: OpKind, b: OpKind) -> OpKind {
        if a == OpKind::Measurement || b == OpKind::Measurement {
            OpKind::Measurement
        } else {
            OpKind::Transformation
        }
    }
}

/// An operation handle owned by the native library.
pub struct Operation {
    pub(crate) raw: *mut c_void,
    pub(crate) kind: OpKind,
    pub(crate) input_type: Tag,
    pub(crate) output_type: Tag,
    /// Interior chain links built by `chain_multi` that the caller never
    /// sees; owned by this wrapper and released together with it.
    pub(crate) hidden_links: Vec<(*mut c_void, OpKind)>,
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn input_type(&self) -> Tag {
        self.input_type
    }

    pub fn output_type(&self) -> Tag {
        self.output_type
    }

    /// Address of the native handle; stable identity for a live operation.
    pub fn raw_addr(&self) -> usize {
        self.raw as usize
    }

    /// Second wrapper over the same native handle. The lifecycle table keys
    /// on the address, so duplicated wrappers cannot double-free.
    pub(crate) fn alias(&self) -> Operation {
        Operation {
            raw: self.raw,
            kind: self.kind,
            input_type: self.input_type,
            output_type: self.output_type,
            hidden_links: Vec::new(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({} -> {}) @ {:#x}",
            self.kind, self.input_type, self.output_type, self.raw as usize
        )
    }
}

/// A native descriptor of an operation's legal value space. Same ownership
/// rules as [`Operation`].
pub struct Domain {
    pub(crate) raw: *mut c_void,
}

impl Domain {
    pub fn raw_addr(&self) -> usize {
        self.raw as usize
    }
}

pub(crate) type InvokeFn = unsafe extern "C" fn(*const c_void, TaggedValue) -> TaggedValue;
pub(crate) type FreeFn = unsafe extern "C" fn(*mut c_void);

/// The fixed-signature core entry points.
///
/// These pass the tagged value struct by value, which the manifest type set
/// cannot express, so they are resolved under well-known names instead of
/// being bootstrapped. A library missing any of them does not satisfy the
/// invoke contract at all.
pub(crate) struct CoreApi {
    pub(crate) transformation_invoke: InvokeFn,
    pub(crate) measurement_invoke: InvokeFn,
    pub(crate) transformation_free: FreeFn,
    pub(crate) measurement_free: FreeFn,
}

impl CoreApi {
    pub(crate) fn resolve(
        source: &dyn SymbolSource,
        core_prefix: &str,
    ) -> Result<CoreApi, BridgeError> {
        unsafe {
            Ok(CoreApi {
                transformation_invoke: mem::transmute(
                    source.symbol(&format!("{core_prefix}transformation_invoke"))?.0,
                ),
                measurement_invoke: mem::transmute(
                    source.symbol(&format!("{core_prefix}measurement_invoke"))?.0,
                ),
                transformation_free: mem::transmute(
                    source.symbol(&format!("{core_prefix}transformation_free"))?.0,
                ),
                measurement_free: mem::transmute(
                    source.symbol(&format!("{core_prefix}measurement_free"))?.0,
                ),
            })
        }
    }

    pub(crate) fn invoke_fn(&self, kind: OpKind) -> InvokeFn {
        match kind {
            OpKind::Transformation => self.transformation_invoke,
            OpKind::Measurement => self.measurement_invoke,
        }
    }

    pub(crate) fn free_fn(&self, kind: OpKind) -> FreeFn {
        match kind {
            OpKind::Transformation => self.transformation_free,
            OpKind::Measurement => self.measurement_free,
        }
    }
}
