//! The client-facing bridge: bootstrapped namespaces, the operation algebra,
//! and the lifecycle authority, all over one symbol source.
//!
//! Everything here is synchronous and single-threaded; every native call
//! completes before control returns. The bridge is the single owner of the
//! lifecycle table, so all construction, invocation, and release of native
//! handles must go through it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::c_void;

use crate::binder::{CallArg, SymbolSource};
use crate::error::BridgeError;
use crate::lifecycle::Lifecycle;
use crate::namespace::Namespace;
use crate::ops::{CoreApi, Domain, OpKind, Operation};
use crate::value::{Tag, TaggedValue};

/// The functional areas a conforming native library exposes.
pub const DEFAULT_AREAS: &[&str] = &["core", "data", "trans", "meas"];

pub struct Bridge {
    areas: BTreeMap<String, Namespace>,
    failures: Vec<(String, BridgeError)>,
    core_api: CoreApi,
    lifecycle: RefCell<Lifecycle>,
}

impl Bridge {
    /// Bootstraps every requested area of the library behind `source`.
    ///
    /// Area bootstrap is best-effort: a failed area is recorded in
    /// [`Bridge::failures`] and the rest still load. The fixed-signature
    /// invoke/free entry points are the exception — without them no
    /// operation can run, so their absence fails the open.
    pub fn open(
        source: &dyn SymbolSource,
        root: &str,
        areas: &[&str],
    ) -> Result<Bridge, BridgeError> {
        let core_api = CoreApi::resolve(source, &format!("{root}_core__"))?;

        let mut loaded = BTreeMap::new();
        let mut failures = Vec::new();
        for &area in areas {
            match Namespace::bootstrap(source, root, area) {
                Ok(ns) => {
                    loaded.insert(area.to_string(), ns);
                }
                Err(err) => failures.push((area.to_string(), err)),
            }
        }

        Ok(Bridge {
            areas: loaded,
            failures,
            core_api,
            lifecycle: RefCell::new(Lifecycle::default()),
        })
    }

    pub fn area(&self, name: &str) -> Result<&Namespace, BridgeError> {
        self.areas
            .get(name)
            .ok_or_else(|| BridgeError::bootstrap(name, "area not loaded"))
    }

    pub fn areas(&self) -> impl Iterator<Item = &Namespace> {
        self.areas.values()
    }

    /// Areas whose bootstrap failed, with the reason each was skipped.
    pub fn failures(&self) -> &[(String, BridgeError)] {
        &self.failures
    }

    fn core(&self) -> Result<&Namespace, BridgeError> {
        self.area("core")
    }

    // ---- construction ----

    /// Wraps a raw handle returned by a constructor callable, registering it
    /// with the lifecycle. The caller declares the metadata the constructor
    /// promised.
    pub fn register_operation(
        &self,
        raw: *mut c_void,
        kind: OpKind,
        input_type: Tag,
        output_type: Tag,
    ) -> Result<Operation, BridgeError> {
        if raw.is_null() {
            return Err(BridgeError::NullHandle);
        }
        self.lifecycle.borrow_mut().register(raw as usize);
        Ok(Operation {
            raw,
            kind,
            input_type,
            output_type,
            hidden_links: Vec::new(),
        })
    }

    /// Calls a constructor in `area` and wraps its result.
    pub fn construct_operation(
        &self,
        area: &str,
        name: &str,
        args: &[CallArg],
        kind: OpKind,
        input_type: Tag,
        output_type: Tag,
    ) -> Result<Operation, BridgeError> {
        let raw = self.area(area)?.get(name)?.call(args)?.as_ptr()?;
        self.register_operation(raw, kind, input_type, output_type)
    }

    pub fn register_domain(&self, raw: *mut c_void) -> Result<Domain, BridgeError> {
        if raw.is_null() {
            return Err(BridgeError::NullHandle);
        }
        self.lifecycle.borrow_mut().register(raw as usize);
        Ok(Domain { raw })
    }

    // ---- invocation ----

    /// Runs an operation on one tagged value.
    ///
    /// The input tag must match the operation's declared input type, checked
    /// here so the native side never sees a mistagged payload. A returned
    /// string that is not just the echoed input is native-owned and becomes
    /// a tracked value handle; release it with [`Bridge::release_value`].
    pub fn invoke(
        &self,
        op: &Operation,
        arg: TaggedValue,
    ) -> Result<TaggedValue, BridgeError> {
        self.lifecycle.borrow().assert_live(op.raw as usize)?;
        if arg.tag() != op.input_type {
            return Err(BridgeError::TagMismatch {
                expected: op.input_type,
                found: arg.tag(),
            });
        }

        let out = unsafe { (self.core_api.invoke_fn(op.kind))(op.raw, arg) };

        if out.tag() != op.output_type {
            return Err(BridgeError::TagMismatch {
                expected: op.output_type,
                found: out.tag(),
            });
        }
        if out.tag() == Tag::Str {
            let out_ptr = out.as_str_ptr()?;
            let echoed = arg.tag() == Tag::Str && arg.as_str_ptr().ok() == Some(out_ptr);
            if !out_ptr.is_null() && !echoed {
                self.lifecycle.borrow_mut().register(out_ptr as usize);
            }
        }
        Ok(out)
    }

    // ---- release ----

    /// Frees an operation exactly once, interior chain links included.
    pub fn free(&self, op: &Operation) -> Result<(), BridgeError> {
        self.lifecycle.borrow_mut().release(op.raw as usize)?;
        unsafe { (self.core_api.free_fn(op.kind))(op.raw) };
        for &(raw, kind) in &op.hidden_links {
            self.lifecycle.borrow_mut().release(raw as usize)?;
            unsafe { (self.core_api.free_fn(kind))(raw) };
        }
        Ok(())
    }

    pub fn free_domain(&self, domain: &Domain) -> Result<(), BridgeError> {
        self.lifecycle.borrow_mut().release(domain.raw as usize)?;
        self.core()?
            .get("domain_free")?
            .call(&[CallArg::Ptr(domain.raw)])?;
        Ok(())
    }

    /// Releases a native-owned value. Scalar payloads own nothing and are a
    /// no-op; a string payload must be one the bridge tracked at invoke time.
    pub fn release_value(&self, value: &TaggedValue) -> Result<(), BridgeError> {
        if value.tag() != Tag::Str {
            return Ok(());
        }
        let ptr = value.as_str_ptr()?;
        if ptr.is_null() {
            return Ok(());
        }
        self.lifecycle.borrow_mut().release(ptr as usize)?;
        self.area("data")?
            .get("str_free")?
            .call(&[CallArg::Ptr(ptr as *mut c_void)])?;
        Ok(())
    }

    // ---- combinators ----

    /// Sequential combination: `inner` runs first, `outer` consumes its
    /// output. Fails fast client-side on a type break, before any native
    /// call. Operands stay owned by the caller and are never freed here.
    pub fn chain(
        &self,
        outer: &Operation,
        inner: &Operation,
    ) -> Result<Operation, BridgeError> {
        {
            let lc = self.lifecycle.borrow();
            lc.assert_live(outer.raw as usize)?;
            lc.assert_live(inner.raw as usize)?;
        }
        if inner.output_type != outer.input_type {
            return Err(BridgeError::TypeMismatch {
                expected: outer.input_type.to_string(),
                found: inner.output_type.to_string(),
                what: "chain link",
            });
        }

        let ctor = match (outer.kind, inner.kind) {
            (OpKind::Transformation, OpKind::Transformation) => "make_chain_tt",
            (OpKind::Measurement, OpKind::Transformation) => "make_chain_mt",
            (OpKind::Transformation, OpKind::Measurement) => "make_chain_tm",
            (OpKind::Measurement, OpKind::Measurement) => "make_chain_mm",
        };
        let raw = self
            .core()?
            .get(ctor)?
            .call(&[CallArg::ConstPtr(outer.raw), CallArg::ConstPtr(inner.raw)])?
            .as_ptr()?;
        self.register_operation(
            raw,
            OpKind::combined(outer.kind, inner.kind),
            inner.input_type,
            outer.output_type,
        )
    }

    /// Right-fold of [`Bridge::chain`] over `ops`, first element outermost.
    ///
    /// A single element comes back as the same native handle, not a wrapper
    /// chain. Interior composites the caller never sees are owned by the
    /// result and released together with it.
    pub fn chain_multi(&self, ops: &[Operation]) -> Result<Operation, BridgeError> {
        match ops {
            [] => Err(BridgeError::EmptyChain),
            [only] => {
                self.lifecycle.borrow().assert_live(only.raw as usize)?;
                Ok(only.alias())
            }
            _ => {
                let n = ops.len();
                let mut acc = self.chain(&ops[n - 2], &ops[n - 1])?;
                for op in ops[..n - 2].iter().rev() {
                    let mut next = self.chain(op, &acc)?;
                    next.hidden_links.push((acc.raw, acc.kind));
                    next.hidden_links.append(&mut acc.hidden_links);
                    acc = next;
                }
                Ok(acc)
            }
        }
    }

    /// Parallel combination: both operations consume the same input and
    /// their outputs are paired. The pair crosses back as its native string
    /// rendering, so the composite's output type is `Str`.
    pub fn compose(&self, a: &Operation, b: &Operation) -> Result<Operation, BridgeError> {
        {
            let lc = self.lifecycle.borrow();
            lc.assert_live(a.raw as usize)?;
            lc.assert_live(b.raw as usize)?;
        }
        if a.input_type != b.input_type {
            return Err(BridgeError::TypeMismatch {
                expected: a.input_type.to_string(),
                found: b.input_type.to_string(),
                what: "composition input",
            });
        }
        let raw = self
            .core()?
            .get("make_composition")?
            .call(&[CallArg::ConstPtr(a.raw), CallArg::ConstPtr(b.raw)])?
            .as_ptr()?;
        self.register_operation(
            raw,
            OpKind::combined(a.kind, b.kind),
            a.input_type,
            Tag::Str,
        )
    }
}
