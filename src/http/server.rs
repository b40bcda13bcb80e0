//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app with a single fallback into the route table
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bound concurrent dispatches and buffered body size
//! - Run dispatch on the blocking pool and map its outcome to a response
//! - Bind server to listener and stop on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::exchange::Exchange;
use crate::http::request::{request_id, RequestIdLayer};
use crate::http::transport::Transport;
use crate::lifecycle::{signals, Shutdown, ShutdownSignal};
use crate::observability::metrics;
use crate::routing::{Dispatch, Router};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub permits: Arc<Semaphore>,
    pub max_body_bytes: usize,
}

/// HTTP front end for a [`Router`].
pub struct HttpServer {
    app: axum::Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let state = AppState {
            router: Arc::new(router),
            permits: Arc::new(Semaphore::new(config.listener.max_in_flight)),
            max_body_bytes: config.limits.max_body_bytes,
        };
        let app = Self::build_app(&config, state);
        Self { app, config }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_app(config: &ServerConfig, state: AppState) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// The Axum app, for driving requests without a socket.
    pub fn app(&self) -> axum::Router {
        self.app.clone()
    }

    /// Serve connections from `listener` until `shutdown` resolves.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Router {
    /// Serve this router on `0.0.0.0:port` with default settings until SIGINT/SIGTERM.
    pub async fn listen(self, port: u16) -> Result<(), ServerError> {
        let mut config = ServerConfig::default();
        config.listener.bind_address = format!("0.0.0.0:{port}");

        let listener = TcpListener::bind(&config.listener.bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listener.bind_address.clone(),
                source,
            })?;

        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        signals::spawn_listener(shutdown);

        HttpServer::new(config, self).run(listener, signal).await
    }
}

/// Fallback handler: every request goes through the route table.
async fn dispatch_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().as_str().to_owned();
    let request_id = request_id(&request).unwrap_or("unknown").to_owned();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let Ok(permit) = state.permits.clone().acquire_owned().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down").into_response();
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting request body");
            metrics::record_dispatch(&method, "rejected", 413, start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let exchange = Exchange::from_parts(parts, body, remote_addr);
    let router = state.router.clone();
    // Held until the handler returns, even if a timeout drops this future.
    let joined = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let mut exchange = exchange;
        let outcome = router.incoming(&mut exchange);
        (outcome, exchange)
    })
    .await;

    let (outcome, mut exchange) = match joined {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Dispatch task failed");
            metrics::record_dispatch(&method, "aborted", 500, start);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = match outcome {
        Dispatch::Handled { .. } => exchange.into_response(),
        Dispatch::Exhausted { .. } if exchange.response_started() => exchange.into_response(),
        Dispatch::Unhandled | Dispatch::Exhausted { .. } => {
            let message = format!("Cannot {} {}", exchange.method(), exchange.path());
            exchange.set_status(StatusCode::NOT_FOUND);
            exchange.set_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            exchange.set_body(message.into_bytes());
            exchange.into_response()
        }
        Dispatch::Aborted { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    };

    let status = response.status();
    metrics::record_dispatch(&method, outcome.as_str(), status.as_u16(), start);
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        outcome = outcome.as_str(),
        status = status.as_u16(),
        "Request dispatched"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;
    use tower::ServiceExt;

    fn server(config: ServerConfig) -> HttpServer {
        let mut router = Router::new();
        router
            .middleware(|ctx| {
                ctx.set("x-powered-by", "waypoint");
                ctx.next();
            })
            .unwrap()
            .get("/hello/:name", |ctx| {
                let greeting = format!("hello {}", ctx.param("name"));
                ctx.send(greeting);
            })
            .unwrap()
            .post("/echo", |ctx| {
                let body = ctx.body().to_vec();
                ctx.send(body);
            })
            .unwrap()
            .get("/boom", |_ctx| panic!("handler failure"))
            .unwrap();
        HttpServer::new(config, router)
    }

    async fn call(app: axum::Router, method: Method, uri: &str, body: Body) -> (StatusCode, axum::http::HeaderMap, String) {
        let response = app
            .oneshot(axum::http::Request::builder().method(method).uri(uri).body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn handled_request_keeps_handler_output() {
        let app = server(ServerConfig::default()).app();
        let (status, headers, body) = call(app, Method::GET, "/hello/ana", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hello ana");
        assert_eq!(headers["x-powered-by"], "waypoint");
        assert!(headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn exhausted_chain_is_not_found_with_middleware_headers() {
        let app = server(ServerConfig::default()).app();
        let (status, headers, body) = call(app, Method::GET, "/missing", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Cannot GET /missing");
        assert_eq!(headers["x-powered-by"], "waypoint");
    }

    #[tokio::test]
    async fn exhausted_chain_keeps_a_written_response() {
        let mut router = Router::new();
        router
            .get("/report", |ctx| {
                ctx.send("report body");
                ctx.next();
            })
            .unwrap()
            .get("/moved", |ctx| {
                ctx.redirect("/report");
                ctx.next();
            })
            .unwrap()
            .post("/report", |ctx| ctx.send("posted"))
            .unwrap();
        let app = HttpServer::new(ServerConfig::default(), router).app();

        let (status, _, body) = call(app.clone(), Method::GET, "/report", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "report body");

        let (status, headers, _) = call(app, Method::GET, "/moved", Body::empty()).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(headers["location"], "/report");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = ServerConfig::default();
        config.limits.max_body_bytes = 4;
        let app = server(config).app();
        let (status, _, _) = call(app, Method::POST, "/echo", Body::from("too long")).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn body_within_limit_reaches_handler() {
        let app = server(ServerConfig::default()).app();
        let (status, _, body) = call(app, Method::POST, "/echo", Body::from("ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ping");
    }

    #[tokio::test]
    async fn panicking_handler_is_internal_error() {
        let app = server(ServerConfig::default()).app();
        let (status, _, _) = call(app.clone(), Method::GET, "/boom", Body::empty()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _, _) = call(app, Method::GET, "/hello/again", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }
}
