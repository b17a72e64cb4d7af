//! Canonical type-name registry.
//!
//! The native manifest names types with C spellings ("int32_t", "void *",
//! "const char *", ...). This table is the single place those spellings are
//! given a concrete layout; a name missing here is a hard failure wherever it
//! shows up. The set is fixed and bounded: the native side only ever emits
//! primitives, opaque pointers, and C strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use libffi::middle::Type;

use crate::error::BridgeError;
use crate::value::Tag;

/// Concrete layout of a manifest type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConcreteType {
    Void,
    /// `void *`
    Ptr,
    /// `const void *`
    ConstPtr,
    /// `int`; C `int` is 32-bit on every platform this crate targets.
    Int,
    /// `unsigned int`
    UInt,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// `char *`
    CharPtr,
    /// `const char *`
    ConstCharPtr,
    Bool,
}

static REGISTRY: OnceLock<HashMap<&'static str, ConcreteType>> = OnceLock::new();

fn registry() -> &'static HashMap<&'static str, ConcreteType> {
    REGISTRY.get_or_init(|| {
        use ConcreteType::*;
        HashMap::from([
            ("void", Void),
            ("void *", Ptr),
            ("const void *", ConstPtr),
            ("int", Int),
            ("unsigned int", UInt),
            ("int8_t", I8),
            ("int16_t", I16),
            ("int32_t", I32),
            ("int64_t", I64),
            ("uint8_t", U8),
            ("uint16_t", U16),
            ("uint32_t", U32),
            ("uint64_t", U64),
            ("float", F32),
            ("double", F64),
            ("char *", CharPtr),
            ("const char *", ConstCharPtr),
            ("bool", Bool),
        ])
    })
}

/// Looks a canonical type name up in the static table.
pub fn resolve(name: &str) -> Result<ConcreteType, BridgeError> {
    registry()
        .get(name)
        .copied()
        .ok_or_else(|| BridgeError::UnknownType(name.to_string()))
}

impl ConcreteType {
    /// The libffi description used when building a call interface.
    pub(crate) fn ffi_type(self) -> Type {
        match self {
            ConcreteType::Void => Type::void(),
            ConcreteType::Ptr | ConcreteType::ConstPtr => Type::pointer(),
            ConcreteType::CharPtr | ConcreteType::ConstCharPtr => Type::pointer(),
            ConcreteType::Int | ConcreteType::I32 => Type::i32(),
            ConcreteType::UInt | ConcreteType::U32 => Type::u32(),
            ConcreteType::I8 => Type::i8(),
            ConcreteType::I16 => Type::i16(),
            ConcreteType::I64 => Type::i64(),
            ConcreteType::U8 | ConcreteType::Bool => Type::u8(),
            ConcreteType::U16 => Type::u16(),
            ConcreteType::U64 => Type::u64(),
            ConcreteType::F32 => Type::f32(),
            ConcreteType::F64 => Type::f64(),
        }
    }

    /// The tag a scalar of this type carries inside a tagged value, if it is
    /// a kind that crosses as a tagged payload at all.
    pub fn tag(self) -> Option<Tag> {
        match self {
            ConcreteType::Bool => Some(Tag::Bool),
            ConcreteType::I8 => Some(Tag::I8),
            ConcreteType::I16 => Some(Tag::I16),
            ConcreteType::Int | ConcreteType::I32 => Some(Tag::I32),
            ConcreteType::I64 => Some(Tag::I64),
            ConcreteType::U8 => Some(Tag::U8),
            ConcreteType::U16 => Some(Tag::U16),
            ConcreteType::UInt | ConcreteType::U32 => Some(Tag::U32),
            ConcreteType::U64 => Some(Tag::U64),
            ConcreteType::F32 => Some(Tag::F32),
            ConcreteType::F64 => Some(Tag::F64),
            ConcreteType::CharPtr | ConcreteType::ConstCharPtr => Some(Tag::Str),
            ConcreteType::Void | ConcreteType::Ptr | ConcreteType::ConstPtr => None,
        }
    }

    fn is_scalar(self) -> bool {
        !matches!(
            self,
            ConcreteType::Void | ConcreteType::Ptr | ConcreteType::ConstPtr
        )
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Registry/tag lockstep check, run once per bootstrap.
///
/// Adding a scalar kind to the registry without giving it a tag (or the
/// reverse) is a programming error in this crate, caught here rather than as
/// a marshaling surprise later.
pub(crate) fn validate_tag_coverage() -> Result<(), BridgeError> {
    for (name, ty) in registry() {
        if ty.is_scalar() && ty.tag().is_none() {
            return Err(BridgeError::bootstrap(
                "registry",
                format!("scalar type {name:?} has no tag"),
            ));
        }
    }
    Ok(())
}
