//! The self-describing bootstrap protocol.
//!
//! A namespace is built by calling one well-known, zero-argument entry point
//! (`<root>_<area>__bootstrap`) whose return value is the area's manifest.
//! The native library is the single source of truth for what exists; the
//! client never enumerates functions statically. Binding is best-effort per
//! entry: one unrecognized new function must not take down a session.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::mem;

use libc::c_char;

use crate::binder::{self, BoundCallable, SymbolSource};
use crate::error::BridgeError;
use crate::manifest::Manifest;
use crate::types;

type BootstrapFn = unsafe extern "C" fn() -> *const c_char;

/// One functional area's bound callables, keyed by bare name.
pub struct Namespace {
    area: String,
    prefix: String,
    functions: BTreeMap<String, BoundCallable>,
    skipped: Vec<(String, BridgeError)>,
}

impl Namespace {
    /// Bootstraps one area: call its manifest entry point, parse, bind.
    ///
    /// A missing bootstrap symbol or an unparseable manifest fails this area
    /// (and only this area). Per-function failures are recorded in
    /// [`Namespace::skipped`] without failing the bootstrap.
    pub fn bootstrap(
        source: &dyn SymbolSource,
        root: &str,
        area: &str,
    ) -> Result<Namespace, BridgeError> {
        types::validate_tag_coverage()?;

        let prefix = format!("{root}_{area}__");
        let entry = source.symbol(&format!("{prefix}bootstrap"))?;
        let bootstrap: BootstrapFn = unsafe { mem::transmute(entry.0) };

        let raw = unsafe { bootstrap() };
        if raw.is_null() {
            return Err(BridgeError::bootstrap(area, "bootstrap returned NULL"));
        }
        let json = unsafe { CStr::from_ptr(raw) }
            .to_str()
            .map_err(|_| BridgeError::bootstrap(area, "manifest is not UTF-8"))?;
        let manifest = Manifest::parse(json)?;

        let mut functions = BTreeMap::new();
        let mut skipped = Vec::new();
        for spec in &manifest.functions {
            // An area listing its own bootstrap entry would rebind it under
            // the bare name; harmless, but skip it for clarity.
            if spec.name == "bootstrap" {
                continue;
            }
            match binder::bind(source, &prefix, spec) {
                Ok(callable) => {
                    functions.insert(spec.name.clone(), callable);
                }
                Err(err) => skipped.push((spec.name.clone(), err)),
            }
        }

        Ok(Namespace {
            area: area.to_string(),
            prefix,
            functions,
            skipped,
        })
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, name: &str) -> Result<&BoundCallable, BridgeError> {
        self.functions
            .get(name)
            .ok_or_else(|| BridgeError::UnknownFunction(format!("{}{name}", self.prefix)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Bound callables in name order.
    pub fn functions(&self) -> impl Iterator<Item = &BoundCallable> {
        self.functions.values()
    }

    /// Manifest entries that failed to bind, with the reason each was skipped.
    pub fn skipped(&self) -> &[(String, BridgeError)] {
        &self.skipped
    }
}
