use crate::{
    bind::{bind, FieldSpec},
    handler::{BoxedService, HandlerTrait, Service},
    middleware::Middleware,
    request::RawRequest,
    response::{body_to_bytes, error_response, Response},
};
use anyhow::{bail, Context};
use hyper::{Body, Method, Request};
use log::debug;
use std::{collections::HashMap, sync::Arc};

/// Method table of registered routes plus the global middlewares.
///
/// Routes can carry a binding table: dispatch then resolves the table
/// against the request's raw data before the handler runs, and a binding
/// failure answers 400 without invoking it.
///
/// ```no_run
/// use rebind::route::Router;
/// use rebind::server::Server;
///
/// let app = Router::default().get("/hello", || "hello");
///
/// Server::new("127.0.0.1", 8080).router(app).run().unwrap();
/// ```
#[derive(Default, Clone)]
pub struct Router {
    routes: HashMap<Method, Vec<Route>>,

    /// Run around every dispatched request. Each route can have its own
    /// middlewares on top, so behavior can differ per route.
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Router {
    /// Registers GET route.
    pub fn get<H, Q>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::GET, path, None, handler)
    }

    /// Registers GET route with a binding table.
    pub fn get_bound<H, Q>(
        self,
        path: impl Into<String>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::GET, path, Some(table), handler)
    }

    /// Registers POST route.
    pub fn post<H, Q>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::POST, path, None, handler)
    }

    /// Registers POST route with a binding table.
    pub fn post_bound<H, Q>(
        self,
        path: impl Into<String>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::POST, path, Some(table), handler)
    }

    /// Registers PUT route.
    pub fn put<H, Q>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PUT, path, None, handler)
    }

    /// Registers PUT route with a binding table.
    pub fn put_bound<H, Q>(
        self,
        path: impl Into<String>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PUT, path, Some(table), handler)
    }

    /// Registers PATCH route.
    pub fn patch<H, Q>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PATCH, path, None, handler)
    }

    /// Registers PATCH route with a binding table.
    pub fn patch_bound<H, Q>(
        self,
        path: impl Into<String>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PATCH, path, Some(table), handler)
    }

    /// Registers DELETE route.
    pub fn delete<H, Q>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::DELETE, path, None, handler)
    }

    /// Registers DELETE route with a binding table.
    pub fn delete_bound<H, Q>(
        self,
        path: impl Into<String>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::DELETE, path, Some(table), handler)
    }

    fn register<H, Q>(
        mut self,
        method: Method,
        path: impl Into<String>,
        table: Option<Vec<FieldSpec>>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        let route = Route::new(path, handler.into_service().into(), table)
            .expect("tried to register route with invalid path");
        self.routes.entry(method).or_default().push(route);
        self
    }

    /// Registers new middleware, run for every route.
    pub fn middleware<M>(mut self, m: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(m));
        self
    }

    /// Takes a vector of `RouteGroup`s and adds their routes to the
    /// already registered ones.
    pub fn groups(mut self, groups: Vec<RouteGroup>) -> Self {
        groups.into_iter().for_each(|group| {
            for (method, routes) in group.routes() {
                self.routes.entry(method).or_default().extend(routes);
            }
        });
        self
    }

    /// Finds the matching route and runs the request through it. The
    /// caller decides what a dispatch error (typically: no such route)
    /// turns into on the wire.
    pub fn dispatch(&self, mut request: Request<Body>) -> anyhow::Result<Response> {
        let route = self
            .routes
            .get(request.method())
            .with_context(|| format!("no routes registered for {} method", request.method()))?
            .iter()
            .find(|route| route.should_fire_on_path(request.uri().path()))
            .context("no matching route")?;

        for m in &self.middlewares {
            m.on_request(&mut request)?;
        }

        let mut response = route.fire(request)?;

        for m in &self.middlewares {
            m.on_response(&mut response)?;
        }

        Ok(response)
    }
}

/// RouteGroup enables grouping endpoints under a common prefix path,
/// mirroring resource-style layouts such as `/users`, `/users/<userId>`.
///
/// ```
/// use rebind::route::{RouteGroup, Router};
///
/// let v1 = RouteGroup::new("/v1").get("/user", || "v1");
/// let v2 = RouteGroup::new("/v2").get("/user", || "v2");
///
/// let app = Router::default().groups(vec![v1, v2]);
/// ```
#[derive(Default, Clone)]
pub struct RouteGroup {
    prefix: String,
    routes: HashMap<Method, Vec<Route>>,

    /// Registered middlewares of this group, passed to each route when
    /// the group is merged into a router.
    middlewares: Vec<Box<dyn Middleware>>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Injects group middlewares into the registered routes and returns
    /// them.
    pub fn routes(&self) -> HashMap<Method, Vec<Route>> {
        let mut routes = self.routes.clone();

        for routes in routes.values_mut() {
            for route in routes {
                route.middlewares = self.middlewares.clone();
            }
        }
        routes
    }

    /// Registers GET route under the group prefix.
    pub fn get<H, Q>(self, path: impl AsRef<str>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::GET, path, None, handler)
    }

    /// Registers GET route with a binding table under the group prefix.
    pub fn get_bound<H, Q>(self, path: impl AsRef<str>, table: Vec<FieldSpec>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::GET, path, Some(table), handler)
    }

    /// Registers POST route under the group prefix.
    pub fn post<H, Q>(self, path: impl AsRef<str>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::POST, path, None, handler)
    }

    /// Registers POST route with a binding table under the group prefix.
    pub fn post_bound<H, Q>(self, path: impl AsRef<str>, table: Vec<FieldSpec>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::POST, path, Some(table), handler)
    }

    /// Registers PUT route under the group prefix.
    pub fn put<H, Q>(self, path: impl AsRef<str>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PUT, path, None, handler)
    }

    /// Registers PUT route with a binding table under the group prefix.
    pub fn put_bound<H, Q>(self, path: impl AsRef<str>, table: Vec<FieldSpec>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PUT, path, Some(table), handler)
    }

    /// Registers PATCH route under the group prefix.
    pub fn patch<H, Q>(self, path: impl AsRef<str>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PATCH, path, None, handler)
    }

    /// Registers PATCH route with a binding table under the group prefix.
    pub fn patch_bound<H, Q>(self, path: impl AsRef<str>, table: Vec<FieldSpec>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::PATCH, path, Some(table), handler)
    }

    /// Registers DELETE route under the group prefix.
    pub fn delete<H, Q>(self, path: impl AsRef<str>, handler: H) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::DELETE, path, None, handler)
    }

    /// Registers DELETE route with a binding table under the group prefix.
    pub fn delete_bound<H, Q>(
        self,
        path: impl AsRef<str>,
        table: Vec<FieldSpec>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        self.register(Method::DELETE, path, Some(table), handler)
    }

    /// Registers new middleware, copied into every route of the group
    /// when `routes` is called.
    pub fn middleware<M>(mut self, m: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(m));
        self
    }

    fn register<H, Q>(
        mut self,
        method: Method,
        path: impl AsRef<str>,
        table: Option<Vec<FieldSpec>>,
        handler: H,
    ) -> Self
    where
        H: HandlerTrait<Q, Body>,
        Q: 'static,
    {
        let path = format!("{}{}", self.prefix, path.as_ref());
        let route = Route::new(path, handler.into_service().into(), table)
            .expect("tried to register route with invalid path");
        self.routes.entry(method).or_default().push(route);
        self
    }
}

/// Smallest unit of routing logic. Usually not constructed directly;
/// use the registration methods on `Router` or `RouteGroup`.
#[derive(Clone)]
pub struct Route {
    pub service: Arc<BoxedService<Request<Body>, Response>>,

    /// Metadata parsed out of the registered path.
    pub metadata: RouteMetadata,

    /// Middlewares of this single route.
    pub middlewares: Vec<Box<dyn Middleware>>,

    /// Declared fields resolved against the raw request before the
    /// handler runs. Routes without a table skip binding entirely.
    table: Option<Vec<FieldSpec>>,
}

impl Route {
    /// Creates new Route; parsing the path into `RouteMetadata` rejects
    /// malformed templates.
    pub fn new(
        path: impl Into<String>,
        service: BoxedService<Request<Body>, Response>,
        table: Option<Vec<FieldSpec>>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            service: Arc::new(service),
            metadata: RouteMetadata::try_from(path.into())?,
            middlewares: vec![],
            table,
        })
    }

    /// Indicates if a request's path matches this route's template.
    ///
    /// '/test/john/doe'  & '/test/<name>/<surname>' => true,
    /// '/test/test'      & '/test/test'             => true,
    /// '/test/test/test' & '/test/test'             => false,
    pub fn should_fire_on_path(&self, path: impl AsRef<str>) -> bool {
        let mut route_segments = self.metadata.origin.split('/');
        let mut path_segments = path.as_ref().split('/');

        loop {
            match (route_segments.next(), path_segments.next()) {
                (None, None) => return true,
                (Some(route), Some(path)) => {
                    if route != path && !(route.starts_with('<') && route.ends_with('>')) {
                        return false;
                    }
                }
                // one side still has segments left.
                _ => return false,
            }
        }
    }

    /// Materializes the body, builds the raw request, runs the binding
    /// table when one is registered, and only then fires middlewares and
    /// the handler.
    pub fn fire(&self, request: Request<Body>) -> anyhow::Result<Response> {
        let (mut parts, body) = request.into_parts();
        let body = body_to_bytes(body)?;

        let raw = RawRequest::from_parts(&parts, &self.metadata.param_segments, body.clone())?;
        if let Some(table) = &self.table {
            match bind(table, &raw) {
                Ok(bound) => {
                    parts.extensions.insert(bound);
                }
                Err(e) => {
                    debug!("binding failed on {}: {}", self.metadata.origin, e);
                    return Ok(error_response(e.into()));
                }
            }
        }

        let mut request = Request::from_parts(parts, Body::from(body));
        for m in &self.middlewares {
            m.on_request(&mut request)?;
        }

        let mut response = self.service.0.call(request);

        for m in &self.middlewares {
            m.on_response(&mut response)?;
        }
        Ok(response)
    }
}

/// Metadata about a registered route.
#[derive(Debug, Default, Clone)]
pub struct RouteMetadata {
    /// Original, registered path template.
    origin: String,

    /// Parameter names mapped to their segment index counted after the
    /// leading '/'.
    ///
    /// `/users/<userId>/orders/<orderId>` -> { "userId": 1, "orderId": 3 }
    pub param_segments: HashMap<String, usize>,
}

impl TryFrom<String> for RouteMetadata {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Self {
            param_segments: parse_param_segments(&value)?,
            origin: value,
        })
    }
}

fn parse_param_segments(path: &str) -> anyhow::Result<HashMap<String, usize>> {
    let mut param_segments = HashMap::new();

    for (inx, segment) in path.split('/').skip(1).enumerate() {
        if let Some(name) = segment.strip_prefix('<') {
            let name = name
                .strip_suffix('>')
                .with_context(|| format!("param segment not closed in path {}", path))?;
            if name.is_empty() {
                bail!("empty param segment in path {}", path);
            }
            if param_segments.insert(name.to_string(), inx).is_some() {
                bail!("duplicated param `{}` in path {}", name, path);
            }
        } else if segment.contains('<') || segment.contains('>') {
            bail!("misplaced param bracket in path {}", path);
        }
    }

    Ok(param_segments)
}
