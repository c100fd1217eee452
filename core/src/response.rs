use crate::error::BindError;
use crate::request::Json;
use anyhow::Context;
use bytes::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Body, StatusCode};
use serde::Serialize;

pub type Response = hyper::Response<Body>;

/// Turns a handler's return value into the literal response body. There
/// is no view or template layer behind this.
pub trait Responder {
    fn into_response(self) -> anyhow::Result<Response>;
}

/// Handlers without a result answer with an empty 200.
impl Responder for () {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(Response::new(Body::empty()))
    }
}

impl Responder for Response {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(self)
    }
}

impl<'a> Responder for &'a str {
    fn into_response(self) -> anyhow::Result<Response> {
        self.to_string().into_response()
    }
}

impl Responder for String {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(hyper::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(self))?)
    }
}

/// A structured value serialized straight into the body as JSON.
impl<T> Responder for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(hyper::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&self.0)?))?)
    }
}

impl<T> Responder for anyhow::Result<T>
where
    T: Responder,
{
    fn into_response(self) -> anyhow::Result<Response> {
        match self {
            Ok(responder) => responder.into_response(),
            Err(e) => Ok(error_response(e)),
        }
    }
}

/// Response for a failed extraction or handler. Binding failures are the
/// caller's fault and answer 400; everything else is a 500.
pub fn error_response(err: anyhow::Error) -> Response {
    let status = if err.downcast_ref::<BindError>().is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    hyper::Response::builder()
        .status(status)
        .body(Body::from(err.to_string()))
        .unwrap_or_default()
}

/// Collects a body into memory. Bodies here are always already buffered,
/// so blocking on the collect is fine.
pub fn body_to_bytes(body: Body) -> anyhow::Result<Bytes> {
    Ok(futures_executor::block_on(hyper::body::to_bytes(body))?)
}

/// Renders a response into wire bytes for a raw TCP stream.
pub fn response_to_bytes(response: Response) -> anyhow::Result<Vec<u8>> {
    use std::fmt::Write as _; // import without risk of name clashing

    let (parts, body) = response.into_parts();
    let body = body_to_bytes(body)?;

    let mut head = String::new();
    write!(
        &mut head,
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("Unknown")
    )?;
    for (key, value) in &parts.headers {
        if key == &CONTENT_LENGTH {
            continue;
        }
        write!(
            &mut head,
            "{}: {}\r\n",
            key,
            value.to_str().context("non-textual header value")?
        )?;
    }
    write!(&mut head, "content-length: {}\r\n\r\n", body.len())?;

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_becomes_the_literal_body() {
        let response = "hello".into_response().expect("valid response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_bytes(response.into_body()).expect("buffered body");
        assert_eq!(&body[..], b"hello");
    }

    #[test]
    fn bind_errors_answer_bad_request() {
        let err = anyhow::Error::from(BindError::MissingEncoding);
        let response = error_response(err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_errors_answer_internal_server_error() {
        let response = error_response(anyhow::anyhow!("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn wire_bytes_carry_status_line_and_body() {
        let response = "ok".into_response().expect("valid response");
        let bytes = response_to_bytes(response).expect("wire bytes");
        let text = String::from_utf8(bytes).expect("ascii response");

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("content-length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nok"));
    }
}
