//! Buffered request/response pair handed to the dispatcher.
//!
//! # Responsibilities
//! - Own the request parts and buffered body for one dispatch
//! - Accumulate status, headers and body written by handlers
//! - Convert the result into an Axum response
//!
//! # Design Decisions
//! - Request data is immutable once built
//! - Can be built without a socket, which is how dispatch is tested

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::request::Parts;
use axum::http::uri::Scheme;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode, Uri, Version};

use crate::http::transport::Transport;

/// One request and the response being built for it.
#[derive(Debug)]
pub struct Exchange {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    secure: bool,

    status: StatusCode,
    response_headers: HeaderMap,
    response_body: Vec<u8>,
}

impl Exchange {
    /// Build an exchange with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        let secure = uri.scheme() == Some(&Scheme::HTTPS);
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            secure,
            status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Vec::new(),
        }
    }

    /// Build an exchange from a received request.
    pub fn from_parts(parts: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        let mut exchange = Self::new(parts.method, parts.uri);
        exchange.version = parts.version;
        exchange.headers = parts.headers;
        exchange.body = body;
        exchange.remote_addr = remote_addr;
        exchange
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// True once a status other than 200 or any body bytes have been written.
    /// Headers alone do not count.
    pub fn response_started(&self) -> bool {
        self.status != StatusCode::OK || !self.response_body.is_empty()
    }

    /// Finish the exchange as an HTTP response.
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.response_body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.response_headers;
        response
    }
}

impl Transport for Exchange {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    fn write(&mut self, chunk: &[u8]) {
        self.response_body.extend_from_slice(chunk);
    }

    fn set_body(&mut self, body: Vec<u8>) {
        self.response_body = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, Request};

    #[test]
    fn from_parts_keeps_request_data() {
        let (parts, _) = Request::builder()
            .method(Method::POST)
            .uri("/users?id=1")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let exchange = Exchange::from_parts(parts, Bytes::from_static(b"{}"), Some(addr));

        assert_eq!(exchange.method(), Method::POST);
        assert_eq!(exchange.path(), "/users");
        assert_eq!(exchange.header("Content-Type"), Some("application/json"));
        assert_eq!(exchange.body(), b"{}");
        assert_eq!(exchange.remote_addr(), Some(addr));
        assert!(!exchange.is_secure());
    }

    #[test]
    fn response_writes_accumulate() {
        let mut exchange = Exchange::new(Method::GET, Uri::from_static("/"));
        exchange.set_status(StatusCode::CREATED);
        exchange.set_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        exchange.write(b"hello ");
        exchange.write(b"world");
        assert_eq!(exchange.response_body(), b"hello world");
        assert_eq!(exchange.response_header("content-type"), Some("text/plain"));

        let response = exchange.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn headers_alone_do_not_start_a_response() {
        let mut exchange = Exchange::new(Method::GET, Uri::from_static("/"));
        exchange.set_header(header::SERVER, HeaderValue::from_static("waypoint"));
        assert!(!exchange.response_started());

        exchange.write(b"x");
        assert!(exchange.response_started());

        let mut exchange = Exchange::new(Method::GET, Uri::from_static("/"));
        exchange.set_status(StatusCode::NO_CONTENT);
        assert!(exchange.response_started());
    }

    #[test]
    fn redirect_sets_location_and_status() {
        let mut exchange = Exchange::new(Method::GET, Uri::from_static("/old"));
        exchange.redirect(HeaderValue::from_static("/new"), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(exchange.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(exchange.response_header("location"), Some("/new"));
    }

    #[test]
    fn https_uri_is_secure() {
        let exchange = Exchange::new(Method::GET, Uri::from_static("https://example.com/"));
        assert!(exchange.is_secure());
    }
}
