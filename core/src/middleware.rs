use hyper::{Body, Request};
use log::debug;

use crate::response::Response;

/// Splitting MiddlewareClone into its own trait allows a blanket
/// implementation for every compatible type without touching the rest of
/// Middleware. `Middleware: Clone` directly would make the trait not
/// object safe, and routes store middlewares boxed.
pub trait MiddlewareClone {
    fn clone_box(&self) -> Box<dyn Middleware>;
}

impl<T> MiddlewareClone for T
where
    T: 'static + Middleware + Clone,
{
    fn clone_box(&self) -> Box<dyn Middleware> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Middleware> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub trait Middleware<B = Body>: MiddlewareClone + Send + Sync {
    /// Runs on every request that goes into the matched route.
    fn on_request(&self, _req: &mut Request<B>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on every response that goes out of the matched route.
    fn on_response(&self, _res: &mut Response) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Logs one line per request and one per response through the `log`
/// facade.
#[derive(Debug, Clone, Copy)]
pub struct LogMiddleware {}

impl Middleware for LogMiddleware {
    fn on_request(&self, req: &mut Request<Body>) -> anyhow::Result<()> {
        debug!("--> {} {}", req.method(), req.uri().path());
        Ok(())
    }

    fn on_response(&self, res: &mut Response) -> anyhow::Result<()> {
        debug!("<-- {}", res.status());
        Ok(())
    }
}
