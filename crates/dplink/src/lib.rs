//! Dynamic binding layer for a self-describing native computation library.
//!
//! The native side exposes, per functional area, a zero-argument bootstrap
//! entry point whose return value is a manifest of every function the area
//! offers (name, argument types, return type). This crate turns those
//! manifests into checked callables at runtime — no statically compiled
//! header, no hand-maintained signature list — and layers an operation
//! algebra on top: opaque Transformation and Measurement handles that can be
//! chained sequentially, composed in parallel, invoked on tagged values, and
//! freed exactly once.
//!
//! ```no_run
//! use dplink::{Bridge, NativeLibrary, TaggedValue, DEFAULT_AREAS};
//!
//! # fn main() -> Result<(), dplink::BridgeError> {
//! let lib = NativeLibrary::open("libdplink_native.so")?;
//! let bridge = Bridge::open(&lib, "dplink", DEFAULT_AREAS)?;
//! for ns in bridge.areas() {
//!     for f in ns.functions() {
//!         println!("{}{} / {} args", ns.prefix(), f.name(), f.arity());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod binder;
mod bridge;
mod error;
mod lifecycle;
mod manifest;
mod namespace;
mod ops;
mod types;
mod value;

#[cfg(test)]
mod fixture;

pub use binder::{bind, BoundCallable, CallArg, CallRet, NativeLibrary, SymbolSource, SymbolTable};
pub use bridge::{Bridge, DEFAULT_AREAS};
pub use error::BridgeError;
pub use manifest::{FunctionSpec, Manifest};
pub use namespace::Namespace;
pub use ops::{Domain, OpKind, Operation};
pub use types::{resolve, ConcreteType};
pub use value::{StrBuf, Tag, TaggedValue};
