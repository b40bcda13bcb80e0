//! Route table and dispatch.
//!
//! # Responsibilities
//! - Compile and store routes in registration order
//! - Scan routes for each request, first match wins
//! - Bind parameters and invoke handlers
//! - Resume the scan when a handler calls `next()`
//!
//! # Design Decisions
//! - Append-only during setup, read-only while serving (no locks on reads)
//! - Exact template comparison before regex evaluation
//! - Handler panics are contained; the dispatch reports `Aborted`
//! - No built-in not-found response; callers decide on `Unhandled`

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use thiserror::Error;
use walkdir::WalkDir;

use crate::http::transport::Transport;
use crate::routing::context::Context;
use crate::routing::pattern::PatternError;
use crate::routing::pool::{ContextPool, DEFAULT_MAX_IDLE};
use crate::routing::route::{Handler, Route, METHODS};

/// Registration failures. Any of these should abort startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("static mount {0:?} must begin with '/'")]
    InvalidMount(String),

    #[error("failed to read static directory {}: {source}", dir.display())]
    StaticDir {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler finished the request without calling `next()`.
    Handled { invoked: usize },
    /// Every handler that ran called `next()` and no further route matched.
    Exhausted { invoked: usize },
    /// No route matched the method and path.
    Unhandled,
    /// The handler of the route at this index panicked.
    Aborted { route: usize },
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        matches!(self, Dispatch::Handled { .. })
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dispatch::Handled { .. } => "handled",
            Dispatch::Exhausted { .. } => "exhausted",
            Dispatch::Unhandled => "unhandled",
            Dispatch::Aborted { .. } => "aborted",
        }
    }
}

/// An ordered route table with its dispatcher.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
    pool: ContextPool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::with_pool_size(DEFAULT_MAX_IDLE)
    }

    /// Create a router whose context pool keeps at most `max_idle` idle instances.
    pub fn with_pool_size(max_idle: usize) -> Self {
        Self {
            routes: Vec::new(),
            pool: ContextPool::new(max_idle),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    // --- registration ---

    /// Append a route for one method.
    pub fn register<H>(&mut self, method: Method, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.push(Some(method), template, Arc::new(handler))
    }

    pub fn get<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::GET, template, handler)
    }

    pub fn put<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::PUT, template, handler)
    }

    pub fn post<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::POST, template, handler)
    }

    pub fn delete<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::DELETE, template, handler)
    }

    pub fn head<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::HEAD, template, handler)
    }

    pub fn patch<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::PATCH, template, handler)
    }

    pub fn options<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::OPTIONS, template, handler)
    }

    pub fn trace<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::TRACE, template, handler)
    }

    pub fn connect<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.register(Method::CONNECT, template, handler)
    }

    /// Register the handler once per method in [`METHODS`], in that order.
    pub fn all<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        for method in METHODS {
            self.push(Some(method), template, Arc::clone(&handler))?;
        }
        Ok(self)
    }

    /// Register a single route that accepts any method, including extension methods.
    pub fn any<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.push(None, template, Arc::new(handler))
    }

    /// Register a handler for every path and method at the current position.
    ///
    /// Middleware only sees requests for routes registered after it, and must
    /// call [`Context::next`] to let them run.
    pub fn middleware<H>(&mut self, handler: H) -> Result<&mut Self, RouteError>
    where
        H: Fn(&mut Context<'_>) + Send + Sync + 'static,
    {
        self.all("*", handler)
    }

    /// Register every file below `dir` as a GET route under `mount`.
    ///
    /// `index.html` is also served at its directory's path. File names are
    /// matched literally, never compiled as templates.
    pub fn serve_dir(&mut self, mount: &str, dir: impl AsRef<Path>) -> Result<&mut Self, RouteError> {
        if !mount.starts_with('/') {
            return Err(RouteError::InvalidMount(mount.to_owned()));
        }
        let dir = dir.as_ref();
        let base = mount.trim_end_matches('/');
        let mut registered = 0usize;

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|source| RouteError::StaticDir {
                dir: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };

            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if segments.is_empty() {
                continue;
            }
            let url = format!("{}/{}", base, segments.join("/"));
            let handler = static_file_handler(entry.path().to_path_buf());

            if entry.file_name() == "index.html" {
                let parent = &segments[..segments.len() - 1];
                let index_url = if parent.is_empty() {
                    mount.to_owned()
                } else {
                    format!("{}/{}", base, parent.join("/"))
                };
                self.routes.push(Route::exact(Some(Method::GET), index_url, Arc::clone(&handler)));
                registered += 1;
            }

            self.routes.push(Route::exact(Some(Method::GET), url, handler));
            registered += 1;
        }

        tracing::debug!(mount = %mount, dir = %dir.display(), routes = registered, "Static directory mounted");
        Ok(self)
    }

    fn push(&mut self, method: Option<Method>, template: &str, handler: Handler) -> Result<&mut Self, RouteError> {
        let route = Route::new(method, template, handler)?;
        tracing::debug!(
            index = self.routes.len(),
            method = ?route.method(),
            template = %template,
            dynamic = !route.pattern().is_static(),
            "Route registered"
        );
        self.routes.push(route);
        Ok(self)
    }

    // --- dispatch ---

    /// Dispatch one request through the route table.
    pub fn incoming(&self, transport: &mut dyn Transport) -> Dispatch {
        let mut state = self.pool.acquire();
        let method = transport.method().clone();
        state.load_path(transport.path());

        let mut invoked = 0usize;

        for (index, route) in self.routes.iter().enumerate() {
            if !route.accepts(&method) {
                continue;
            }

            state.clear_params();
            if route.template() != state.path() && !state.capture(index, route.pattern()) {
                continue;
            }

            tracing::trace!(route = index, template = %route.template(), path = %state.path(), "Route matched");

            let handler = &**route.handler();
            let mut ctx = Context::new(&mut state, &mut *transport);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut ctx)));
            invoked += 1;

            if outcome.is_err() {
                tracing::error!(
                    route = index,
                    method = %method,
                    path = %state.path(),
                    "Handler panicked"
                );
                return Dispatch::Aborted { route: index };
            }

            if !state.take_next() {
                return Dispatch::Handled { invoked };
            }
        }

        if invoked == 0 {
            tracing::debug!(method = %method, path = %state.path(), "No route matched");
            Dispatch::Unhandled
        } else {
            tracing::debug!(method = %method, path = %state.path(), invoked, "Route chain exhausted");
            Dispatch::Exhausted { invoked }
        }
    }
}

fn static_file_handler(file: PathBuf) -> Handler {
    Arc::new(move |ctx: &mut Context<'_>| {
        if let Err(e) = ctx.send_file(&file) {
            tracing::warn!(file = %file.display(), error = %e, "Failed to read static file");
            ctx.status(StatusCode::NOT_FOUND);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Exchange;
    use axum::http::Uri;
    use std::sync::Mutex;

    fn request(method: Method, uri: &str) -> Exchange {
        Exchange::new(method, uri.parse::<Uri>().unwrap())
    }

    fn body(exchange: &Exchange) -> &str {
        std::str::from_utf8(exchange.response_body()).unwrap()
    }

    #[test]
    fn static_route_matches_exactly() {
        let mut router = Router::new();
        router.get("/about", |ctx| ctx.send("about")).unwrap();

        let mut ex = request(Method::GET, "/about");
        assert_eq!(router.incoming(&mut ex), Dispatch::Handled { invoked: 1 });
        assert_eq!(body(&ex), "about");

        let mut ex = request(Method::GET, "/about/");
        assert_eq!(router.incoming(&mut ex), Dispatch::Unhandled);
    }

    #[test]
    fn first_registered_route_wins() {
        let mut router = Router::new();
        router
            .get("/users/:id", |ctx| {
                let id = ctx.param("id").to_owned();
                ctx.send(format!("user {id}"));
            })
            .unwrap()
            .get("/users/*", |ctx| ctx.send("wildcard"))
            .unwrap();

        let mut ex = request(Method::GET, "/users/42");
        assert_eq!(router.incoming(&mut ex), Dispatch::Handled { invoked: 1 });
        assert_eq!(body(&ex), "user 42");

        let mut ex = request(Method::GET, "/users/42/posts");
        router.incoming(&mut ex);
        assert_eq!(body(&ex), "wildcard");
    }

    #[test]
    fn next_continues_to_following_match() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        router
            .get("/a", move |ctx| {
                first.lock().unwrap().push(1);
                ctx.next();
            })
            .unwrap()
            .post("/a", |_ctx| panic!("wrong method"))
            .unwrap()
            .get("/a", move |_ctx| second.lock().unwrap().push(2))
            .unwrap()
            .get("/a", |_ctx| panic!("should not run"))
            .unwrap();

        let mut ex = request(Method::GET, "/a");
        assert_eq!(router.incoming(&mut ex), Dispatch::Handled { invoked: 2 });
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn params_do_not_leak_between_routes() {
        let seen = Arc::new(Mutex::new(None));
        let mut router = Router::new();
        let sink = Arc::clone(&seen);
        router
            .get("/items/:id", |ctx| ctx.next())
            .unwrap()
            .get("/items/*", move |ctx| {
                *sink.lock().unwrap() = Some((ctx.param("id").to_owned(), ctx.param("*").to_owned()));
            })
            .unwrap();

        let mut ex = request(Method::GET, "/items/9");
        router.incoming(&mut ex);
        assert_eq!(*seen.lock().unwrap(), Some((String::new(), "9".to_owned())));
    }

    #[test]
    fn continuing_past_the_last_match_is_exhausted() {
        let mut router = Router::new();
        router
            .middleware(|ctx| {
                ctx.set("x-seen", "1");
                ctx.next();
            })
            .unwrap()
            .get("/known", |ctx| ctx.send("known"))
            .unwrap();

        let mut ex = request(Method::GET, "/unknown");
        assert_eq!(router.incoming(&mut ex), Dispatch::Exhausted { invoked: 1 });
        assert_eq!(ex.response_header("x-seen"), Some("1"));

        let mut ex = request(Method::GET, "/known");
        assert_eq!(router.incoming(&mut ex), Dispatch::Handled { invoked: 2 });
    }

    #[test]
    fn method_mismatch_is_unhandled() {
        let mut router = Router::new();
        router.get("/submit", |ctx| ctx.send("get")).unwrap();

        let mut ex = request(Method::POST, "/submit");
        assert_eq!(router.incoming(&mut ex), Dispatch::Unhandled);
        assert!(ex.response_body().is_empty());
        assert_eq!(router.pool().idle(), 1);
    }

    #[test]
    fn any_accepts_extension_methods() {
        let mut router = Router::new();
        router.any("/dav/*", |ctx| ctx.send("dav")).unwrap();

        let mut ex = request(Method::from_bytes(b"PROPFIND").unwrap(), "/dav/file");
        assert!(router.incoming(&mut ex).is_handled());
    }

    #[test]
    fn all_fans_out_over_methods() {
        let mut router = Router::new();
        router.all("/ping", |ctx| ctx.send("pong")).unwrap();
        assert_eq!(router.len(), METHODS.len());
        for method in METHODS {
            let mut ex = request(method.clone(), "/ping");
            assert!(router.incoming(&mut ex).is_handled(), "{method} not routed");
        }
    }

    #[test]
    fn exact_template_text_short_circuits_matcher() {
        let mut router = Router::new();
        router
            .get("/users/:id", |ctx| {
                let bound = ctx.params().count();
                ctx.send(bound.to_string());
            })
            .unwrap();

        let mut ex = request(Method::GET, "/users/:id");
        router.incoming(&mut ex);
        assert_eq!(body(&ex), "0");
    }

    #[test]
    fn panicking_handler_is_contained() {
        let mut router = Router::new();
        router.get("/boom", |_ctx| panic!("boom")).unwrap();

        let mut ex = request(Method::GET, "/boom");
        assert_eq!(router.incoming(&mut ex), Dispatch::Aborted { route: 0 });
        assert_eq!(router.pool().idle(), 1);

        let mut ex = request(Method::GET, "/boom");
        assert_eq!(router.incoming(&mut ex), Dispatch::Aborted { route: 0 });
        assert_eq!(router.pool().allocated(), 1);
    }

    #[test]
    fn invalid_templates_fail_registration() {
        let mut router = Router::new();
        assert!(matches!(
            router.get("no-slash", |_ctx| {}),
            Err(RouteError::Pattern(PatternError::MissingLeadingSlash(_)))
        ));
        assert!(router.get("/a/*/b/*", |_ctx| {}).is_err());
        assert!(router.is_empty());
    }
}
