//! An in-process stand-in for a conforming native library.
//!
//! Exposes the same surface a real library would — per-area bootstrap entry
//! points returning manifests, constructors, the fixed-signature invoke and
//! free entry points — as plain `extern "C"` functions collected into a
//! [`SymbolTable`]. Tests drive the whole protocol against it without
//! loading anything from disk.

use std::ffi::{c_void, CString};
use std::ptr;
use std::sync::atomic::{AtomicI64, Ordering};

use libc::c_char;

use crate::binder::SymbolTable;
use crate::ops::OpKind;
use crate::value::{Tag, TaggedValue};

pub(crate) const ROOT: &str = "dplink";

pub(crate) fn area_prefix(area: &str) -> &'static str {
    match area {
        "core" => "dplink_core__",
        "data" => "dplink_data__",
        "trans" => "dplink_trans__",
        "meas" => "dplink_meas__",
        other => panic!("fixture has no area {other:?}"),
    }
}

// ---- the "native" operation representation ----

struct NativeOp {
    kind: OpKind,
    run: Box<dyn Fn(TaggedValue) -> TaggedValue>,
}

fn op_into_raw(op: NativeOp) -> *mut c_void {
    Box::into_raw(Box::new(op)) as *mut c_void
}

unsafe fn op_ref<'a>(p: *const c_void) -> &'a NativeOp {
    &*(p as *const NativeOp)
}

// Deterministic but draw-dependent "noise": successive samples always
// differ, which is all the randomized-mechanism tests rely on.
static NOISE: AtomicI64 = AtomicI64::new(1);

fn next_noise() -> i64 {
    NOISE.fetch_add(1, Ordering::Relaxed)
}

fn render(v: &TaggedValue) -> String {
    match v.tag() {
        Tag::I64 => v.as_i64().unwrap().to_string(),
        Tag::F64 => v.as_f64().unwrap().to_string(),
        Tag::Str => v.to_str().unwrap(),
        other => format!("<{other}>"),
    }
}

// ---- bootstrap entry points ----

const CORE_MANIFEST: &str = concat!(
    r#"{
    "functions": [
        { "name": "make_chain_tt", "args": [ ["const void *", "outer"], ["const void *", "inner"] ], "ret": "void *" },
        { "name": "make_chain_tm", "args": [ ["const void *", "outer"], ["const void *", "inner"] ], "ret": "void *" },
        { "name": "make_chain_mt", "args": [ ["const void *", "outer"], ["const void *", "inner"] ], "ret": "void *" },
        { "name": "make_chain_mm", "args": [ ["const void *", "outer"], ["const void *", "inner"] ], "ret": "void *" },
        { "name": "make_composition", "args": [ ["const void *", "a"], ["const void *", "b"] ], "ret": "void *" },
        { "name": "domain_free", "args": [ ["void *", "this"] ] }
    ]
}"#,
    "\0"
);

const DATA_MANIFEST: &str = concat!(
    r#"{
    "functions": [
        { "name": "echo", "args": [ "const char *" ], "ret": "const char *" },
        { "name": "str_free", "args": [ ["void *", "s"] ] },
        { "name": "from_blob", "args": [ ["blob_t", "b"] ], "ret": "void *" },
        { "name": "vanished" }
    ]
}"#,
    "\0"
);

const TRANS_MANIFEST: &str = concat!(
    r#"{
    "functions": [
        { "name": "make_identity", "args": [ ["int32_t", "tag"] ], "ret": "void *" },
        { "name": "make_clamp", "args": [ ["int32_t", "tag"], ["const void *", "lower"], ["const void *", "upper"] ], "ret": "void *" },
        { "name": "make_select", "args": [ ["int32_t", "tag"], ["unsigned int", "column"] ], "ret": "void *" },
        { "name": "make_interval_domain", "args": [ ["int32_t", "tag"], ["const void *", "lower"], ["const void *", "upper"] ], "ret": "void *" }
    ]
}"#,
    "\0"
);

const MEAS_MANIFEST: &str = concat!(
    r#"{
    "functions": [
        { "name": "make_base_laplace", "args": [ ["int32_t", "tag"], ["double", "scale"] ], "ret": "void *" }
    ]
}"#,
    "\0"
);

unsafe extern "C" fn core_bootstrap() -> *const c_char {
    CORE_MANIFEST.as_ptr() as *const c_char
}

unsafe extern "C" fn data_bootstrap() -> *const c_char {
    DATA_MANIFEST.as_ptr() as *const c_char
}

unsafe extern "C" fn trans_bootstrap() -> *const c_char {
    TRANS_MANIFEST.as_ptr() as *const c_char
}

unsafe extern "C" fn meas_bootstrap() -> *const c_char {
    MEAS_MANIFEST.as_ptr() as *const c_char
}

// ---- fixed-signature core entry points ----

unsafe extern "C" fn core_transformation_invoke(
    op: *const c_void,
    arg: TaggedValue,
) -> TaggedValue {
    (op_ref(op).run)(arg)
}

unsafe extern "C" fn core_measurement_invoke(
    op: *const c_void,
    arg: TaggedValue,
) -> TaggedValue {
    (op_ref(op).run)(arg)
}

unsafe extern "C" fn core_transformation_free(op: *mut c_void) {
    drop(Box::from_raw(op as *mut NativeOp));
}

unsafe extern "C" fn core_measurement_free(op: *mut c_void) {
    drop(Box::from_raw(op as *mut NativeOp));
}

// ---- core constructors ----

unsafe fn chain_impl(outer: *const c_void, inner: *const c_void) -> *mut c_void {
    if outer.is_null() || inner.is_null() {
        return ptr::null_mut();
    }
    let kind = OpKind::combined(op_ref(outer).kind, op_ref(inner).kind);
    let (outer, inner) = (outer as usize, inner as usize);
    op_into_raw(NativeOp {
        kind,
        run: Box::new(move |v| unsafe {
            let first = (op_ref(inner as *const c_void).run)(v);
            (op_ref(outer as *const c_void).run)(first)
        }),
    })
}

unsafe extern "C" fn core_make_chain_tt(o: *const c_void, i: *const c_void) -> *mut c_void {
    chain_impl(o, i)
}

unsafe extern "C" fn core_make_chain_tm(o: *const c_void, i: *const c_void) -> *mut c_void {
    chain_impl(o, i)
}

unsafe extern "C" fn core_make_chain_mt(o: *const c_void, i: *const c_void) -> *mut c_void {
    chain_impl(o, i)
}

unsafe extern "C" fn core_make_chain_mm(o: *const c_void, i: *const c_void) -> *mut c_void {
    chain_impl(o, i)
}

unsafe extern "C" fn core_make_composition(
    a: *const c_void,
    b: *const c_void,
) -> *mut c_void {
    if a.is_null() || b.is_null() {
        return ptr::null_mut();
    }
    let kind = OpKind::combined(op_ref(a).kind, op_ref(b).kind);
    let (a, b) = (a as usize, b as usize);
    op_into_raw(NativeOp {
        kind,
        run: Box::new(move |v| unsafe {
            let x = (op_ref(a as *const c_void).run)(v);
            let y = (op_ref(b as *const c_void).run)(v);
            let pair = format!("({}, {})", render(&x), render(&y));
            let s = CString::new(pair).unwrap();
            TaggedValue::from_str_ptr(s.into_raw())
        }),
    })
}

unsafe extern "C" fn core_domain_free(d: *mut c_void) {
    drop(Box::from_raw(d as *mut (i64, i64)));
}

// ---- data area ----

unsafe extern "C" fn data_echo(s: *const c_char) -> *const c_char {
    s
}

unsafe extern "C" fn data_str_free(s: *mut c_void) {
    if !s.is_null() {
        drop(CString::from_raw(s as *mut c_char));
    }
}

// ---- trans area ----

unsafe extern "C" fn trans_make_identity(_tag: i32) -> *mut c_void {
    op_into_raw(NativeOp {
        kind: OpKind::Transformation,
        run: Box::new(|v| v),
    })
}

unsafe extern "C" fn trans_make_clamp(
    tag: i32,
    lower: *const c_void,
    upper: *const c_void,
) -> *mut c_void {
    if tag != Tag::I64 as i32 || lower.is_null() || upper.is_null() {
        return ptr::null_mut();
    }
    let lo = *(lower as *const i64);
    let hi = *(upper as *const i64);
    op_into_raw(NativeOp {
        kind: OpKind::Transformation,
        run: Box::new(move |v| match v.as_i64() {
            Ok(x) => TaggedValue::from_i64(x.clamp(lo, hi)),
            Err(_) => v,
        }),
    })
}

unsafe extern "C" fn trans_make_select(tag: i32, _column: u32) -> *mut c_void {
    if tag != Tag::I64 as i32 {
        return ptr::null_mut();
    }
    op_into_raw(NativeOp {
        kind: OpKind::Transformation,
        run: Box::new(|v| v),
    })
}

unsafe extern "C" fn trans_make_interval_domain(
    tag: i32,
    lower: *const c_void,
    upper: *const c_void,
) -> *mut c_void {
    if tag != Tag::I64 as i32 || lower.is_null() || upper.is_null() {
        return ptr::null_mut();
    }
    let bounds = (*(lower as *const i64), *(upper as *const i64));
    Box::into_raw(Box::new(bounds)) as *mut c_void
}

// ---- meas area ----

unsafe extern "C" fn meas_make_base_laplace(tag: i32, _scale: f64) -> *mut c_void {
    if tag != Tag::I64 as i32 {
        return ptr::null_mut();
    }
    op_into_raw(NativeOp {
        kind: OpKind::Measurement,
        run: Box::new(|v| match v.as_i64() {
            Ok(x) => TaggedValue::from_i64(x + next_noise()),
            Err(_) => v,
        }),
    })
}

/// The fixture's full symbol table.
pub(crate) fn symbols() -> SymbolTable {
    let mut t = SymbolTable::new();
    macro_rules! put {
        ($name:expr, $f:expr) => {
            t.insert($name, $f as *const () as *mut c_void)
        };
    }

    put!("dplink_core__bootstrap", core_bootstrap);
    put!("dplink_core__transformation_invoke", core_transformation_invoke);
    put!("dplink_core__measurement_invoke", core_measurement_invoke);
    put!("dplink_core__transformation_free", core_transformation_free);
    put!("dplink_core__measurement_free", core_measurement_free);
    put!("dplink_core__make_chain_tt", core_make_chain_tt);
    put!("dplink_core__make_chain_tm", core_make_chain_tm);
    put!("dplink_core__make_chain_mt", core_make_chain_mt);
    put!("dplink_core__make_chain_mm", core_make_chain_mm);
    put!("dplink_core__make_composition", core_make_composition);
    put!("dplink_core__domain_free", core_domain_free);

    put!("dplink_data__bootstrap", data_bootstrap);
    put!("dplink_data__echo", data_echo);
    put!("dplink_data__str_free", data_str_free);
    // "from_blob" exists but its manifest type is unknown; "vanished" is
    // advertised with no symbol behind it. Both exercise best-effort bind.
    put!("dplink_data__from_blob", data_echo);

    put!("dplink_trans__bootstrap", trans_bootstrap);
    put!("dplink_trans__make_identity", trans_make_identity);
    put!("dplink_trans__make_clamp", trans_make_clamp);
    put!("dplink_trans__make_select", trans_make_select);
    put!("dplink_trans__make_interval_domain", trans_make_interval_domain);

    put!("dplink_meas__bootstrap", meas_bootstrap);
    put!("dplink_meas__make_base_laplace", meas_make_base_laplace);

    t
}
