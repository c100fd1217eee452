use crate::bind::BoundObject;
use crate::error::BindError;
use crate::response::body_to_bytes;
use anyhow::Context;
use bytes::Bytes;
use hyper::{
    header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST},
    http::request::Parts,
    Body, HeaderMap, Request,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::{self, Display};

/// Character encoding declared for a request body. UTF-8 is the only
/// encoding recognized; anything else counts as undeclared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
}

impl Encoding {
    pub fn from_charset(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8") {
            Some(Self::Utf8)
        } else {
            None
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, BindError> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| BindError::InvalidBody { encoding: self }),
        }
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Utf8 => "UTF-8",
        })
    }
}

/// The unprocessed parameter and body data of one inbound call.
///
/// Parameters keep every value sent under a name, in request order; the
/// single-valued view of a name is its first value. Query-string pairs,
/// urlencoded form fields and router-captured path values all land in the
/// same namespace. Built per request and discarded right after binding.
#[derive(Debug, Default, Clone)]
pub struct RawRequest {
    params: HashMap<String, Vec<String>>,
    body: Option<Bytes>,
    encoding: Option<Encoding>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value for `name`, after any value already recorded.
    pub fn push_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>, encoding: Option<Encoding>) {
        self.body = Some(body.into());
        self.encoding = encoding;
    }

    /// First value recorded for `name`. An empty string is a value, so
    /// `Some("")` and `None` are different answers.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value recorded for `name`, in request order.
    pub fn all(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).map(Vec::as_slice)
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Collects the raw data of a request whose body has already been
    /// materialized: query pairs, an urlencoded form body, and the path
    /// values captured by the matched route.
    pub fn from_parts(
        parts: &Parts,
        param_segments: &HashMap<String, usize>,
        body: Bytes,
    ) -> anyhow::Result<Self> {
        let mut raw = Self::new();

        let segments: Vec<&str> = parts.uri.path().split('/').skip(1).collect();
        for (name, inx) in param_segments {
            if let Some(value) = segments.get(*inx) {
                raw.push_param(name.clone(), value.to_string());
            }
        }

        if let Some(query) = parts.uri.query() {
            let pairs: Vec<(String, String)> =
                serde_urlencoded::from_str(query).context("malformed query string")?;
            for (name, value) in pairs {
                raw.push_param(name, value);
            }
        }

        if !body.is_empty() {
            // Form fields share the parameter namespace with the query.
            if is_urlencoded_form(&parts.headers) {
                let pairs: Vec<(String, String)> =
                    serde_urlencoded::from_bytes(&body).context("malformed form body")?;
                for (name, value) in pairs {
                    raw.push_param(name, value);
                }
            }
            raw.set_body(body, charset(&parts.headers));
        }

        Ok(raw)
    }
}

/// Declared charset of the request body, read off the `Content-Type`
/// header attributes.
pub(crate) fn charset(headers: &HeaderMap) -> Option<Encoding> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|attribute| {
        let (key, value) = attribute.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Encoding::from_charset(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

/// Allows various types to be created from request head data alone,
/// leaving the body untouched for the final handler parameter.
pub trait FromRequestParts: Sized {
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self>;
}

/// Marker for [`FromRequest`] implementations that only consume the head.
pub struct ViaParts;

/// Marker for [`FromRequest`] implementations that consume the whole
/// request, body included.
pub struct ViaRequest;

/// Allows various types to be created from a whole request. The marker
/// parameter keeps the blanket head-only implementation apart from the
/// body-consuming ones.
pub trait FromRequest<B, M = ViaRequest>: Sized {
    fn from_request(req: Request<B>) -> anyhow::Result<Self>;
}

impl<T, B> FromRequest<B, ViaParts> for T
where
    T: FromRequestParts,
{
    fn from_request(req: Request<B>) -> anyhow::Result<Self> {
        let (mut parts, _) = req.into_parts();
        T::from_request_parts(&mut parts)
    }
}

impl<B> FromRequest<B> for Request<B> {
    fn from_request(req: Request<B>) -> anyhow::Result<Self> {
        Ok(req)
    }
}

/// The route's binding table applied to this request.
///
/// Available only on routes registered with a table (`get_bound` and
/// friends); dispatch has already run the binder by the time the handler
/// executes, so a handler never observes a half-bound object.
///
/// ```
/// use rebind::request::Bound;
///
/// fn handler(Bound(params): Bound) -> String {
///     params.str_field("username").unwrap_or_default().to_string()
/// }
/// ```
pub struct Bound(pub BoundObject);

impl FromRequestParts for Bound {
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        parts
            .extensions
            .remove::<BoundObject>()
            .map(Bound)
            .context("no binding table registered for this route")
    }
}

/// The raw body decoded as one opaque text field, using the declared
/// charset of the request. A non-empty body without a charset is refused
/// with [`BindError::MissingEncoding`].
pub struct Text(pub String);

impl FromRequest<Body> for Text {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let encoding = charset(req.headers());
        let bytes = body_to_bytes(req.into_body())?;
        if bytes.is_empty() {
            return Ok(Text(String::new()));
        }
        let encoding = encoding.ok_or(BindError::MissingEncoding)?;
        Ok(Text(encoding.decode(&bytes)?))
    }
}

/// A value deserialized from a JSON body.
///
/// ```
/// use rebind::request::Json;
///
/// #[derive(serde::Deserialize)]
/// struct OwnBody {
///     val: String,
/// }
///
/// fn handler(Json(body): Json<OwnBody>) -> String {
///     body.val
/// }
/// ```
pub struct Json<T>(pub T);

impl<T> FromRequest<Body> for Json<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let bytes = body_to_bytes(req.into_body())?;
        let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);

        let value = T::deserialize(deserializer)?;
        Ok(Json(value))
    }
}

/// The whole query string deserialized into `T`, the map-shaped sibling
/// of table-driven binding, for handlers that want every parameter.
pub struct Query<T>(pub T);

impl<T> FromRequestParts for Query<T>
where
    T: DeserializeOwned,
{
    fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
        let query = parts.uri.query().unwrap_or_default();
        let value = serde_urlencoded::from_str(query).context("malformed query string")?;
        Ok(Query(value))
    }
}

/// Trait implemented by types that can be read out of the header map
/// under a fixed key, usable directly as handler parameters.
pub trait TypedHeader: Sized {
    /// Returns header's key.
    fn key() -> HeaderName;

    /// Tries to create Self from HeaderValue.
    fn try_from_header_value(header_value: &HeaderValue) -> anyhow::Result<Self>;

    fn try_from_header_map(map: &HeaderMap<HeaderValue>) -> anyhow::Result<Self> {
        let value = map
            .get(Self::key())
            .with_context(|| format!("header `{}` not found", Self::key()))?;
        Self::try_from_header_value(value)
    }
}

macro_rules! derive_header {
    ($type:ident(_), name: $name:ident) => {
        impl TypedHeader for $type {
            fn key() -> HeaderName {
                $name
            }

            fn try_from_header_value(header_value: &HeaderValue) -> anyhow::Result<Self> {
                Ok($type(header_value.to_str()?.to_string()))
            }
        }

        impl FromRequestParts for $type {
            fn from_request_parts(parts: &mut Parts) -> anyhow::Result<Self> {
                Self::try_from_header_map(&parts.headers)
            }
        }
    };
}

pub struct ContentType(pub String);
derive_header!(ContentType(_), name: CONTENT_TYPE);

pub struct Host(pub String);
derive_header!(Host(_), name: HOST);
