//! Binding manifest entries to callable native symbols.
//!
//! A [`FunctionSpec`] plus an area prefix names one native symbol; the binder
//! resolves every type name through the registry, locates the symbol, and
//! builds a libffi call interface over the declared signature. The resulting
//! [`BoundCallable`] marshals arguments positionally with no coercion: the
//! caller supplies exactly the declared kinds or the call is refused before
//! anything crosses the boundary.

use std::collections::HashMap;
use std::ffi::{CString, c_void};
use std::fmt;
use std::path::Path;

use libc::c_char;
use libffi::middle::{Arg, Cif, CodePtr};

use crate::error::BridgeError;
use crate::manifest::FunctionSpec;
use crate::types::{self, ConcreteType};
use crate::value::Payload;

/// Where symbols come from.
///
/// Production code resolves against a loaded shared library; tests resolve
/// against an in-process table of `extern "C"` functions.
pub trait SymbolSource {
    fn symbol(&self, name: &str) -> Result<CodePtr, BridgeError>;
}

/// A shared library opened with libloading.
pub struct NativeLibrary {
    lib: libloading::Library,
}

impl NativeLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<NativeLibrary, BridgeError> {
        let lib = unsafe { libloading::Library::new(path.as_ref()) }?;
        Ok(NativeLibrary { lib })
    }
}

impl SymbolSource for NativeLibrary {
    fn symbol(&self, name: &str) -> Result<CodePtr, BridgeError> {
        let mut bytes = name.as_bytes().to_vec();
        bytes.push(0);
        let sym = unsafe { self.lib.get::<unsafe extern "C" fn()>(&bytes) }
            .map_err(|_| BridgeError::SymbolNotFound(name.to_string()))?;
        let ptr = unsafe { sym.try_as_raw_ptr() }
            .ok_or_else(|| BridgeError::SymbolNotFound(name.to_string()))?;
        Ok(CodePtr(ptr))
    }
}

/// An in-memory symbol table, usable wherever a full shared library is not.
#[derive(Default)]
pub struct SymbolTable {
    entries: HashMap<String, *mut c_void>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn insert(&mut self, name: &str, addr: *mut c_void) {
        self.entries.insert(name.to_string(), addr);
    }
}

impl SymbolSource for SymbolTable {
    fn symbol(&self, name: &str) -> Result<CodePtr, BridgeError> {
        self.entries
            .get(name)
            .copied()
            .map(CodePtr)
            .ok_or_else(|| BridgeError::SymbolNotFound(name.to_string()))
    }
}

/// One primitive argument as supplied by the caller.
pub enum CallArg {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Ptr(*mut c_void),
    ConstPtr(*const c_void),
    /// Marshals as `char *` / `const char *`; the buffer lives for the call.
    Str(CString),
}

impl CallArg {
    pub fn str(s: &str) -> Result<CallArg, BridgeError> {
        Ok(CallArg::Str(CString::new(s)?))
    }

    fn matches(&self, param: ConcreteType) -> bool {
        use ConcreteType::*;
        match (self, param) {
            (CallArg::Bool(_), Bool) => true,
            (CallArg::I8(_), I8) => true,
            (CallArg::I16(_), I16) => true,
            (CallArg::I32(_), I32 | Int) => true,
            (CallArg::I64(_), I64) => true,
            (CallArg::U8(_), U8) => true,
            (CallArg::U16(_), U16) => true,
            (CallArg::U32(_), U32 | UInt) => true,
            (CallArg::U64(_), U64) => true,
            (CallArg::F32(_), F32) => true,
            (CallArg::F64(_), F64) => true,
            // A mutable pointer may cross where a const one is declared,
            // never the reverse.
            (CallArg::Ptr(_), Ptr | ConstPtr) => true,
            (CallArg::ConstPtr(_), ConstPtr) => true,
            (CallArg::Str(_), CharPtr | ConstCharPtr) => true,
            _ => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            CallArg::Bool(_) => "bool",
            CallArg::I8(_) => "i8",
            CallArg::I16(_) => "i16",
            CallArg::I32(_) => "i32",
            CallArg::I64(_) => "i64",
            CallArg::U8(_) => "u8",
            CallArg::U16(_) => "u16",
            CallArg::U32(_) => "u32",
            CallArg::U64(_) => "u64",
            CallArg::F32(_) => "f32",
            CallArg::F64(_) => "f64",
            CallArg::Ptr(_) => "ptr",
            CallArg::ConstPtr(_) => "const ptr",
            CallArg::Str(_) => "str",
        }
    }

    /// Writes the value into an eight-byte slot libffi can read from. Every
    /// union member starts at offset zero, so the slot address is valid for
    /// any declared width.
    fn slot(&self) -> Payload {
        match *self {
            CallArg::Bool(v) => Payload { bool_: v },
            CallArg::I8(v) => Payload { i8_: v },
            CallArg::I16(v) => Payload { i16_: v },
            CallArg::I32(v) => Payload { i32_: v },
            CallArg::I64(v) => Payload { i64_: v },
            CallArg::U8(v) => Payload { u8_: v },
            CallArg::U16(v) => Payload { u16_: v },
            CallArg::U32(v) => Payload { u32_: v },
            CallArg::U64(v) => Payload { u64_: v },
            CallArg::F32(v) => Payload { f32_: v },
            CallArg::F64(v) => Payload { f64_: v },
            CallArg::Ptr(v) => Payload {
                str_: v as *const c_char,
            },
            CallArg::ConstPtr(v) => Payload {
                str_: v as *const c_char,
            },
            CallArg::Str(ref v) => Payload {
                str_: v.as_ptr(),
            },
        }
    }
}

/// The single return value of a bound call.
#[derive(Clone, Copy, Debug)]
pub enum CallRet {
    Void,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Ptr(*mut c_void),
    Str(*const c_char),
}

impl CallRet {
    pub fn as_ptr(&self) -> Result<*mut c_void, BridgeError> {
        match *self {
            CallRet::Ptr(p) => Ok(p),
            other => Err(BridgeError::TypeMismatch {
                expected: "ptr".to_string(),
                found: format!("{other:?}"),
                what: "return value",
            }),
        }
    }

    pub fn as_str_ptr(&self) -> Result<*const c_char, BridgeError> {
        match *self {
            CallRet::Str(p) => Ok(p),
            other => Err(BridgeError::TypeMismatch {
                expected: "str".to_string(),
                found: format!("{other:?}"),
                what: "return value",
            }),
        }
    }

    pub fn as_i64(&self) -> Result<i64, BridgeError> {
        match *self {
            CallRet::I64(v) => Ok(v),
            other => Err(BridgeError::TypeMismatch {
                expected: "i64".to_string(),
                found: format!("{other:?}"),
                what: "return value",
            }),
        }
    }
}

/// A native function with its signature fixed at bind time.
pub struct BoundCallable {
    name: String,
    params: Vec<ConcreteType>,
    ret: ConcreteType,
    cif: Cif,
    code: CodePtr,
}

/// Resolves a manifest entry into a callable.
///
/// Failure leaves no trace: an unknown type name or missing symbol aborts
/// this entry only, and the caller decides whether that sinks the whole
/// area (it does not, during bootstrap).
pub fn bind(
    source: &dyn SymbolSource,
    prefix: &str,
    spec: &FunctionSpec,
) -> Result<BoundCallable, BridgeError> {
    let params = spec
        .args
        .iter()
        .map(|name| types::resolve(name))
        .collect::<Result<Vec<_>, _>>()?;
    if params.contains(&ConcreteType::Void) {
        return Err(BridgeError::TypeMismatch {
            expected: "non-void parameter".to_string(),
            found: "void".to_string(),
            what: "manifest signature",
        });
    }
    let ret = types::resolve(&spec.ret)?;
    let code = source.symbol(&format!("{prefix}{}", spec.name))?;
    let cif = Cif::new(
        params.iter().map(|t| t.ffi_type()),
        ret.ffi_type(),
    );
    Ok(BoundCallable {
        name: spec.name.clone(),
        params,
        ret,
        cif,
        code,
    })
}

impl BoundCallable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ConcreteType] {
        &self.params
    }

    pub fn ret(&self) -> ConcreteType {
        self.ret
    }

    /// Invokes the native function with positional arguments.
    ///
    /// Arguments are checked against the declared signature first; nothing
    /// reaches the native side on a mismatch. The call itself blocks until
    /// the native function returns.
    pub fn call(&self, args: &[CallArg]) -> Result<CallRet, BridgeError> {
        if args.len() != self.params.len() {
            return Err(BridgeError::ArityMismatch {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        for (arg, &param) in args.iter().zip(&self.params) {
            if !arg.matches(param) {
                return Err(BridgeError::TypeMismatch {
                    expected: param.to_string(),
                    found: arg.describe().to_string(),
                    what: "argument",
                });
            }
        }

        let slots: Vec<Payload> = args.iter().map(CallArg::slot).collect();
        let ffi_args: Vec<Arg> = slots
            .iter()
            .map(|slot| unsafe { Arg::new(&slot.u64_) })
            .collect();

        // The CStrings inside `args` and the slot buffer both outlive the
        // call; libffi reads argument memory only during it.
        let ret = unsafe {
            match self.ret {
                ConcreteType::Void => {
                    self.cif.call::<()>(self.code, &ffi_args);
                    CallRet::Void
                }
                ConcreteType::Bool => {
                    CallRet::Bool(self.cif.call::<u8>(self.code, &ffi_args) != 0)
                }
                ConcreteType::I8 => CallRet::I8(self.cif.call(self.code, &ffi_args)),
                ConcreteType::I16 => CallRet::I16(self.cif.call(self.code, &ffi_args)),
                ConcreteType::Int | ConcreteType::I32 => {
                    CallRet::I32(self.cif.call(self.code, &ffi_args))
                }
                ConcreteType::I64 => CallRet::I64(self.cif.call(self.code, &ffi_args)),
                ConcreteType::U8 => CallRet::U8(self.cif.call(self.code, &ffi_args)),
                ConcreteType::U16 => CallRet::U16(self.cif.call(self.code, &ffi_args)),
                ConcreteType::UInt | ConcreteType::U32 => {
                    CallRet::U32(self.cif.call(self.code, &ffi_args))
                }
                ConcreteType::U64 => CallRet::U64(self.cif.call(self.code, &ffi_args)),
                ConcreteType::F32 => CallRet::F32(self.cif.call(self.code, &ffi_args)),
                ConcreteType::F64 => CallRet::F64(self.cif.call(self.code, &ffi_args)),
                ConcreteType::Ptr | ConcreteType::ConstPtr => {
                    CallRet::Ptr(self.cif.call(self.code, &ffi_args))
                }
                ConcreteType::CharPtr | ConcreteType::ConstCharPtr => {
                    CallRet::Str(self.cif.call(self.code, &ffi_args))
                }
            }
        };
        Ok(ret)
    }
}

impl fmt::Debug for BoundCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCallable")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    fn spec(name: &str, args: &[&str], ret: &str) -> FunctionSpec {
        FunctionSpec {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            ret: ret.to_string(),
        }
    }

    #[test]
    fn bind_checks_every_type_name() {
        let table = fixture::symbols();
        let bad = spec("make_identity", &["int32_t", "struct tm *"], "void *");
        match bind(&table, fixture::area_prefix("trans"), &bad) {
            Err(BridgeError::UnknownType(name)) => assert_eq!(name, "struct tm *"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn bind_reports_missing_symbols() {
        let table = fixture::symbols();
        let gone = spec("make_rocket", &[], "void *");
        assert!(matches!(
            bind(&table, fixture::area_prefix("trans"), &gone),
            Err(BridgeError::SymbolNotFound(_))
        ));
    }

    #[test]
    fn arity_is_fixed_at_bind_time() {
        let table = fixture::symbols();
        let f = bind(
            &table,
            fixture::area_prefix("trans"),
            &spec("make_identity", &["int32_t"], "void *"),
        )
        .unwrap();
        assert_eq!(f.arity(), 1);
        assert!(matches!(
            f.call(&[]),
            Err(BridgeError::ArityMismatch {
                expected: 1,
                found: 0
            })
        ));
    }

    #[test]
    fn arguments_are_not_coerced() {
        let table = fixture::symbols();
        let f = bind(
            &table,
            fixture::area_prefix("trans"),
            &spec("make_identity", &["int32_t"], "void *"),
        )
        .unwrap();
        // i64 where i32 is declared: refused before the native call.
        assert!(matches!(
            f.call(&[CallArg::I64(3)]),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn round_trips_a_string_through_the_native_side() {
        let table = fixture::symbols();
        let echo = bind(
            &table,
            fixture::area_prefix("data"),
            &spec("echo", &["const char *"], "const char *"),
        )
        .unwrap();
        // The fixture's echo returns its own argument pointer, so the
        // argument buffer must stay alive while the result is read.
        let args = [CallArg::str("hello, world!").unwrap()];
        let ret = echo.call(&args).unwrap();
        let ptr = ret.as_str_ptr().unwrap();
        let s = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(s, "hello, world!");
    }
}
