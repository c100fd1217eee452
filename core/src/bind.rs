use crate::error::BindError;
use crate::request::RawRequest;
use anyhow::bail;
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

pub use rebind_macros::FromRaw;

/// What a single declared field expects to be coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,

    /// Collect every value sent under the field's name, in request order,
    /// without coercing the individual entries.
    Seq,
}

impl Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::Str => "string",
            FieldType::Int => "integer",
            FieldType::Float => "float",
            FieldType::Bool => "boolean",
            FieldType::Seq => "sequence",
        })
    }
}

/// Declarative description of one bindable field: its name, the expected
/// type, and the required/default policy applied on absence.
///
/// ```
/// use rebind::bind::FieldSpec;
///
/// let _table = vec![
///     FieldSpec::string("username").required(),
///     FieldSpec::integer("age").default_value("-1"),
/// ];
/// ```
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    expected: FieldType,
    required: bool,
    default: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, expected: FieldType) -> Self {
        Self {
            name: name.into(),
            expected,
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Str)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn sequence(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Seq)
    }

    /// Marks the field as mandatory. A missing required field fails the
    /// whole binding unless a default is registered as well.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Literal used when the parameter is absent from the request. The
    /// default wins over `required`, and it may be an empty string.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected(&self) -> FieldType {
        self.expected
    }
}

/// One successfully coerced value inside a [`BoundObject`].
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Seq(Vec<String>),
}

/// The result of applying a table of [`FieldSpec`]s against one request.
/// Optional fields that were truly absent simply have no entry, so every
/// accessor returns `Option`.
///
/// Constructed per request and dropped once the handler returned.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BoundObject {
    values: HashMap<String, BoundValue>,
}

impl BoundObject {
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(BoundValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(BoundValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn float_field(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(BoundValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(BoundValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn seq_field(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(BoundValue::Seq(values)) => Some(values),
            _ => None,
        }
    }

    /// Re-coerces a bound string field into a domain type via [`FromRaw`].
    /// Returns `Ok(None)` when the field is absent.
    pub fn parse<T: FromRaw>(&self, name: &str) -> anyhow::Result<Option<T>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(BoundValue::Str(raw)) => Ok(Some(T::from_raw(raw.clone())?)),
            Some(other) => bail!("parameter `{}` is not stored as a string: {:?}", name, other),
        }
    }

    fn insert(&mut self, name: &str, value: BoundValue) {
        self.values.insert(name.to_string(), value);
    }
}

/// Applies a binding table against the raw data of one request.
///
/// Resolution per field: a present value (an empty string included) is
/// coerced as-is; on true absence the default literal applies when one is
/// registered, otherwise a required field fails with
/// [`BindError::MissingParameter`] and an optional one is skipped.
///
/// ```
/// use rebind::bind::{bind, FieldSpec};
/// use rebind::request::RawRequest;
///
/// let mut request = RawRequest::new();
/// request.push_param("username", "john");
///
/// let table = vec![
///     FieldSpec::string("username").required(),
///     FieldSpec::integer("age").default_value("-1"),
/// ];
///
/// let bound = bind(&table, &request).unwrap();
/// assert_eq!(bound.str_field("username"), Some("john"));
/// assert_eq!(bound.int_field("age"), Some(-1));
/// ```
pub fn bind(table: &[FieldSpec], request: &RawRequest) -> Result<BoundObject, BindError> {
    let mut object = BoundObject::default();

    for spec in table {
        if spec.expected == FieldType::Seq {
            if let Some(values) = request.all(&spec.name) {
                object.insert(&spec.name, BoundValue::Seq(values.to_vec()));
                continue;
            }
        } else if let Some(value) = request.first(&spec.name) {
            object.insert(&spec.name, coerce(spec, value.to_owned())?);
            continue;
        }

        // True absence. The default wins over the required flag.
        match &spec.default {
            Some(value) => object.insert(&spec.name, coerce(spec, value.clone())?),
            None if spec.required => return Err(BindError::missing(&spec.name)),
            None => {}
        }
    }

    Ok(object)
}

/// A defaulted literal goes through the same coercion as a supplied value.
fn coerce(spec: &FieldSpec, raw: String) -> Result<BoundValue, BindError> {
    match spec.expected {
        FieldType::Str => Ok(BoundValue::Str(raw)),
        FieldType::Int => match raw.parse() {
            Ok(value) => Ok(BoundValue::Int(value)),
            Err(_) => Err(BindError::coercion(&spec.name, &raw, spec.expected)),
        },
        FieldType::Float => match raw.parse() {
            Ok(value) => Ok(BoundValue::Float(value)),
            Err(_) => Err(BindError::coercion(&spec.name, &raw, spec.expected)),
        },
        FieldType::Bool => match raw.parse() {
            Ok(value) => Ok(BoundValue::Bool(value)),
            Err(_) => Err(BindError::coercion(&spec.name, &raw, spec.expected)),
        },
        FieldType::Seq => Ok(BoundValue::Seq(vec![raw])),
    }
}

/// Raw-body variant of binding: the whole body is one opaque field decoded
/// with the request's declared encoding. A non-empty body without a
/// declared encoding fails with [`BindError::MissingEncoding`].
pub fn decode_body(request: &RawRequest) -> Result<String, BindError> {
    let body = match request.body() {
        Some(body) => body,
        None => return Ok(String::new()),
    };
    let encoding = request.encoding().ok_or(BindError::MissingEncoding)?;
    encoding.decode(body)
}

/// Builds `Self` out of the raw text of one bound parameter. Implemented
/// for everything that is `FromStr`, and derivable for single-field tuple
/// structs via `#[derive(FromRaw)]`.
pub trait FromRaw: Sized {
    fn from_raw(raw: String) -> anyhow::Result<Self>;
}

impl<S> FromRaw for S
where
    S: FromStr,
    <S as FromStr>::Err: Debug,
{
    fn from_raw(raw: String) -> anyhow::Result<Self> {
        match S::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => bail!("could not convert `{}`: {:?}", raw, e),
        }
    }
}
