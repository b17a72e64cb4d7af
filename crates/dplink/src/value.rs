//! The tagged wire value.
//!
//! Every scalar that crosses the native boundary travels as one fixed-size
//! `{ tag, payload }` struct, passed by value. The payload is a C union whose
//! widest member is eight bytes; only the member selected by the tag is
//! meaningful, and the accessors refuse to read anything else.

use std::ffi::{CStr, CString};
use std::fmt;

use libc::c_char;

use crate::error::BridgeError;

/// Discriminant of a [`TaggedValue`]. `#[repr(i32)]` to match the wire shape.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    Bool = 0,
    I8 = 1,
    I16 = 2,
    I32 = 3,
    I64 = 4,
    U8 = 5,
    U16 = 6,
    U32 = 7,
    U64 = 8,
    F32 = 9,
    F64 = 10,
    Str = 11,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tag::Bool => "bool",
            Tag::I8 => "i8",
            Tag::I16 => "i16",
            Tag::I32 => "i32",
            Tag::I64 => "i64",
            Tag::U8 => "u8",
            Tag::U16 => "u16",
            Tag::U32 => "u32",
            Tag::U64 => "u64",
            Tag::F32 => "f32",
            Tag::F64 => "f64",
            Tag::Str => "str",
        };
        f.write_str(name)
    }
}

/// One member per [`Tag`]. All members start at offset zero; the struct as a
/// whole is always eight bytes regardless of the active member.
#[repr(C)]
#[derive(Clone, Copy)]
pub union Payload {
    pub(crate) bool_: bool,
    pub(crate) i8_: i8,
    pub(crate) i16_: i16,
    pub(crate) i32_: i32,
    pub(crate) i64_: i64,
    pub(crate) u8_: u8,
    pub(crate) u16_: u16,
    pub(crate) u32_: u32,
    pub(crate) u64_: u64,
    pub(crate) f32_: f32,
    pub(crate) f64_: f64,
    pub(crate) str_: *const c_char,
}

/// A scalar crossing the boundary: tag plus matching payload.
///
/// `Copy` duplicates the bits, not ownership: a `Str` value is a non-owning
/// view of a C string owned either by a [`StrBuf`] on the client side or by
/// the native library.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TaggedValue {
    tag: Tag,
    payload: Payload,
}

macro_rules! accessors {
    ($(($ctor:ident, $getter:ident, $ty:ty, $tag:ident, $member:ident)),* $(,)?) => {
        $(
            pub fn $ctor(v: $ty) -> TaggedValue {
                TaggedValue { tag: Tag::$tag, payload: Payload { $member: v } }
            }

            pub fn $getter(&self) -> Result<$ty, BridgeError> {
                self.expect(Tag::$tag)?;
                Ok(unsafe { self.payload.$member })
            }
        )*
    };
}

impl TaggedValue {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    fn expect(&self, tag: Tag) -> Result<(), BridgeError> {
        if self.tag == tag {
            Ok(())
        } else {
            Err(BridgeError::TagMismatch {
                expected: tag,
                found: self.tag,
            })
        }
    }

    accessors! {
        (from_bool, as_bool, bool, Bool, bool_),
        (from_i8, as_i8, i8, I8, i8_),
        (from_i16, as_i16, i16, I16, i16_),
        (from_i32, as_i32, i32, I32, i32_),
        (from_i64, as_i64, i64, I64, i64_),
        (from_u8, as_u8, u8, U8, u8_),
        (from_u16, as_u16, u16, U16, u16_),
        (from_u32, as_u32, u32, U32, u32_),
        (from_u64, as_u64, u64, U64, u64_),
        (from_f32, as_f32, f32, F32, f32_),
        (from_f64, as_f64, f64, F64, f64_),
    }

    /// Wraps a C string pointer the caller guarantees to keep alive for the
    /// lifetime of the value. Prefer [`StrBuf`] for client-built strings.
    pub(crate) fn from_str_ptr(ptr: *const c_char) -> TaggedValue {
        TaggedValue {
            tag: Tag::Str,
            payload: Payload { str_: ptr },
        }
    }

    pub(crate) fn as_str_ptr(&self) -> Result<*const c_char, BridgeError> {
        self.expect(Tag::Str)?;
        Ok(unsafe { self.payload.str_ })
    }

    /// Copies a `Str` payload out as an owned Rust string.
    pub fn to_str(&self) -> Result<String, BridgeError> {
        let ptr = self.as_str_ptr()?;
        if ptr.is_null() {
            return Ok(String::new());
        }
        let s = unsafe { CStr::from_ptr(ptr) };
        Ok(s.to_string_lossy().into_owned())
    }
}

impl PartialEq for TaggedValue {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag {
            return false;
        }
        unsafe {
            match self.tag {
                Tag::Bool => self.payload.bool_ == other.payload.bool_,
                Tag::I8 => self.payload.i8_ == other.payload.i8_,
                Tag::I16 => self.payload.i16_ == other.payload.i16_,
                Tag::I32 => self.payload.i32_ == other.payload.i32_,
                Tag::I64 => self.payload.i64_ == other.payload.i64_,
                Tag::U8 => self.payload.u8_ == other.payload.u8_,
                Tag::U16 => self.payload.u16_ == other.payload.u16_,
                Tag::U32 => self.payload.u32_ == other.payload.u32_,
                Tag::U64 => self.payload.u64_ == other.payload.u64_,
                Tag::F32 => self.payload.f32_ == other.payload.f32_,
                Tag::F64 => self.payload.f64_ == other.payload.f64_,
                // Content comparison; both sides must still be live.
                Tag::Str => match (self.to_str(), other.to_str()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                },
            }
        }
    }
}

impl fmt::Debug for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        unsafe {
            match self.tag {
                Tag::Bool => write!(f, "Bool({})", self.payload.bool_),
                Tag::I8 => write!(f, "I8({})", self.payload.i8_),
                Tag::I16 => write!(f, "I16({})", self.payload.i16_),
                Tag::I32 => write!(f, "I32({})", self.payload.i32_),
                Tag::I64 => write!(f, "I64({})", self.payload.i64_),
                Tag::U8 => write!(f, "U8({})", self.payload.u8_),
                Tag::U16 => write!(f, "U16({})", self.payload.u16_),
                Tag::U32 => write!(f, "U32({})", self.payload.u32_),
                Tag::U64 => write!(f, "U64({})", self.payload.u64_),
                Tag::F32 => write!(f, "F32({})", self.payload.f32_),
                Tag::F64 => write!(f, "F64({})", self.payload.f64_),
                Tag::Str => match self.to_str() {
                    Ok(s) => write!(f, "Str({s:?})"),
                    Err(_) => write!(f, "Str(<invalid>)"),
                },
            }
        }
    }
}

/// Client-owned backing store for a string value.
///
/// The native side never owns strings built here; the buffer must outlive
/// every [`TaggedValue`] handed out by [`StrBuf::value`].
pub struct StrBuf {
    inner: CString,
}

impl StrBuf {
    pub fn new(s: &str) -> Result<StrBuf, BridgeError> {
        Ok(StrBuf {
            inner: CString::new(s)?,
        })
    }

    pub fn value(&self) -> TaggedValue {
        TaggedValue::from_str_ptr(self.inner.as_ptr())
    }
}
