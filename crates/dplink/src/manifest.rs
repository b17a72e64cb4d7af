//! The bootstrap manifest.
//!
//! Each functional area of the native library exposes a zero-argument
//! `bootstrap` entry point returning a JSON document listing every function
//! the area offers. Two argument spellings occur in the wild and both are
//! accepted: a bare type name, or a list whose first element is the type
//! name and whose remaining elements are documentation (typically the
//! parameter name). A missing `ret` means `void`; missing `args` means none.

use serde::Deserialize;

use crate::error::BridgeError;

/// One native function as declared by its area's manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    /// Argument type names in positional order.
    pub args: Vec<String>,
    pub ret: String,
}

/// Everything one functional area exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub functions: Vec<FunctionSpec>,
}

#[derive(Deserialize)]
struct RawManifest {
    functions: Vec<RawFunctionSpec>,
}

#[derive(Deserialize)]
struct RawFunctionSpec {
    name: String,
    #[serde(default)]
    args: Vec<RawArg>,
    #[serde(default = "void_ret")]
    ret: String,
}

fn void_ret() -> String {
    "void".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArg {
    Name(String),
    Documented(Vec<String>),
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Manifest, BridgeError> {
        let raw: RawManifest = serde_json::from_str(json)?;
        let functions = raw
            .functions
            .into_iter()
            .map(FunctionSpec::from_raw)
            .collect::<Result<_, _>>()?;
        Ok(Manifest { functions })
    }
}

impl FunctionSpec {
    fn from_raw(raw: RawFunctionSpec) -> Result<FunctionSpec, BridgeError> {
        let mut args = Vec::with_capacity(raw.args.len());
        for arg in raw.args {
            match arg {
                RawArg::Name(name) => args.push(name),
                RawArg::Documented(parts) => match parts.into_iter().next() {
                    Some(name) => args.push(name),
                    None => {
                        return Err(BridgeError::bootstrap(
                            &raw.name,
                            "empty argument spec in manifest",
                        ))
                    }
                },
            }
        }
        Ok(FunctionSpec {
            name: raw.name,
            args,
            ret: raw.ret,
        })
    }
}
