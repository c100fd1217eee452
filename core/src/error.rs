use crate::bind::FieldType;
use crate::request::Encoding;
use thiserror::Error;

/// Failure of a single binding attempt. Every variant is local to one
/// request; none of them is fatal to the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("missing required parameter `{name}`")]
    MissingParameter { name: String },

    #[error("could not coerce value `{raw}` of parameter `{name}` into {expected}")]
    TypeCoercion {
        name: String,
        raw: String,
        expected: FieldType,
    },

    /// The body was consumed without a declared character encoding.
    /// There is no implicit default, so this is always a caller error.
    #[error("request body has no declared character encoding")]
    MissingEncoding,

    #[error("request body is not valid {encoding}")]
    InvalidBody { encoding: Encoding },
}

impl BindError {
    pub(crate) fn missing(name: &str) -> Self {
        Self::MissingParameter {
            name: name.to_string(),
        }
    }

    pub(crate) fn coercion(name: &str, raw: &str, expected: FieldType) -> Self {
        Self::TypeCoercion {
            name: name.to_string(),
            raw: raw.to_string(),
            expected,
        }
    }
}
