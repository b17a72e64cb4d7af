use crate::value::Tag;

/// Errors raised by the binding layer.
///
/// Bootstrap recovers from `UnknownType` and `SymbolNotFound` at the
/// granularity of a single manifest entry, and from `Bootstrap` at the
/// granularity of a functional area. Everything else propagates to the
/// immediate caller; marshaling and ownership violations are never masked.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown type name {0:?}")]
    UnknownType(String),

    #[error("native symbol {0:?} not found")]
    SymbolNotFound(String),

    #[error("no function named {0:?} in this namespace")]
    UnknownFunction(String),

    #[error("value is tagged {found}, expected {expected}")]
    TagMismatch { expected: Tag, found: Tag },

    #[error("{what}: expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        what: &'static str,
    },

    #[error("expected {expected} arguments, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("use of a handle that was already freed")]
    UseAfterFree,

    #[error("handle freed twice")]
    DoubleFree,

    #[error("handle {0:#x} is not tracked by this bridge")]
    UnknownHandle(usize),

    #[error("chain requires at least one operation")]
    EmptyChain,

    #[error("native constructor returned NULL")]
    NullHandle,

    #[error("bootstrap failed for area {area:?}: {reason}")]
    Bootstrap { area: String, reason: String },

    #[error("malformed manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("interior NUL in string argument")]
    Nul(#[from] std::ffi::NulError),

    #[error("failed to load native library: {0}")]
    Load(#[from] libloading::Error),
}

impl BridgeError {
    pub(crate) fn bootstrap(area: &str, reason: impl Into<String>) -> Self {
        BridgeError::Bootstrap {
            area: area.to_string(),
            reason: reason.into(),
        }
    }
}
