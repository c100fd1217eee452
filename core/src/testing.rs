use crate::{response::Response, route::Router, server::Server};
use hyper::{Body, Request};

/// In-process client that routes requests through `Server::fire` without
/// opening a socket. Used by the integration tests.
pub struct Client {
    server: Server,
}

impl Client {
    pub fn new(router: Router) -> Self {
        Self {
            server: Server::new("", 0).router(router),
        }
    }

    pub fn send(&self, request: Request<Body>) -> anyhow::Result<Response> {
        self.server.fire(request)
    }
}
