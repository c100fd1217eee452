use crate::{
    response::{response_to_bytes, Response},
    route::Router,
};
use anyhow::{bail, Context};
use hyper::{Body, Request, StatusCode};
use log::{error, info, warn};
use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    sync::Arc,
    thread,
};

/// Plain TCP transport around a [`Router`]. Every accepted connection is
/// handled on its own thread; requests never share state, so there is
/// nothing to coordinate between them.
pub struct Server {
    host: String,
    port: u32,
    router: Router,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
            router: Router::default(),
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Starts the accept loop.
    pub fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(format!("{}:{}", self.host, self.port))?;
        info!("listening on {}:{}", self.host, self.port);

        let server = Arc::new(self);

        for stream in listener.incoming() {
            let stream = stream?;
            let s = server.clone();
            thread::spawn(move || {
                if let Err(e) = s.handle(stream) {
                    error!("got error during handling connection: {:#}", e);
                }
            });
        }
        Ok(())
    }

    /// Reads one request off the stream, dispatches it, and writes the
    /// response back. Dispatch failures (typically: no matching route)
    /// answer 404 instead of dropping the connection.
    fn handle(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        let request = read_request(&mut stream)?;

        let response = match self.router.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                warn!("dispatch failed: {:#}", e);
                not_found(e)
            }
        };

        stream.write_all(&response_to_bytes(response)?)?;
        Ok(())
    }

    /// In-process dispatch entry, used by the test client to route a
    /// request without opening a socket.
    pub fn fire(&self, request: Request<Body>) -> anyhow::Result<Response> {
        self.router.dispatch(request)
    }
}

fn not_found(err: anyhow::Error) -> Response {
    hyper::Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::from(err.to_string()))
        .unwrap_or_default()
}

const READ_CHUNK: usize = 1024;

/// Reads a whole request off a TCP stream: the head until httparse call
/// it complete, then the body to its declared content-length. The body is
/// fully materialized before anything downstream looks at it.
fn read_request(stream: &mut TcpStream) -> anyhow::Result<Request<Body>> {
    let mut received: Vec<u8> = vec![];
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = stream.read(&mut chunk)?;
        received.extend_from_slice(&chunk[..read]);

        let mut headers = [httparse::EMPTY_HEADER; 64];
        let mut parsed = httparse::Request::new(&mut headers);

        if let httparse::Status::Complete(body_start) = parsed.parse(&received)? {
            let mut builder = hyper::Request::builder()
                .method(parsed.method.context("request line misses a method")?)
                .uri(parsed.path.context("request line misses a path")?);

            let mut content_length = 0usize;
            for header in parsed.headers.iter() {
                if header.name.eq_ignore_ascii_case("content-length") {
                    content_length = std::str::from_utf8(header.value)?.trim().parse()?;
                }
                builder = builder.header(header.name, header.value);
            }

            let mut body = received[body_start..].to_vec();
            while body.len() < content_length {
                let read = stream.read(&mut chunk)?;
                if read == 0 {
                    bail!("connection closed before the whole body arrived");
                }
                body.extend_from_slice(&chunk[..read]);
            }

            return Ok(builder.body(Body::from(body))?);
        }

        if read == 0 {
            bail!("connection closed before the request head was complete");
        }
    }
}
