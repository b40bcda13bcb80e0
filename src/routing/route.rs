//! Registered routes.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::routing::context::Context;
use crate::routing::pattern::{self, Pattern, PatternError};

/// The fixed method set used by [`Router::all`](crate::routing::Router::all).
pub const METHODS: [Method; 9] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::HEAD,
    Method::PATCH,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// A request handler. Shared so one handler can back several routes.
pub type Handler = Arc<dyn Fn(&mut Context<'_>) + Send + Sync>;

/// A compiled route. Immutable once registered.
pub struct Route {
    /// `None` accepts every method.
    method: Option<Method>,
    template: String,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    /// Compile `template` into a route.
    pub fn new(method: Option<Method>, template: &str, handler: Handler) -> Result<Self, PatternError> {
        Ok(Self {
            method,
            template: template.to_owned(),
            pattern: pattern::compile(template)?,
            handler,
        })
    }

    /// A route matched only by string equality, bypassing the compiler.
    ///
    /// Used for paths derived from file names, which may contain pattern syntax.
    pub fn exact(method: Option<Method>, path: impl Into<String>, handler: Handler) -> Self {
        Self {
            method,
            template: path.into(),
            pattern: Pattern::Static,
            handler,
        }
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Returns true if this route accepts the request method.
    #[inline]
    pub fn accepts(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(m) => m == method,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}
