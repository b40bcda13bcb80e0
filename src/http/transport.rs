//! The request/response surface the dispatcher works against.
//!
//! # Responsibilities
//! - Expose the request line, headers and body to handlers
//! - Accept status, header and body writes for the response
//!
//! # Design Decisions
//! - Object safe: the router takes `&mut dyn Transport`
//! - Infallible setters; validation of header text happens in `Context`
//! - Byte transmission is the implementor's concern

use std::net::SocketAddr;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri};

pub trait Transport {
    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    fn path(&self) -> &str {
        self.uri().path()
    }

    /// Request header value, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// Buffered request body.
    fn body(&self) -> &[u8];

    fn remote_addr(&self) -> Option<SocketAddr>;

    fn is_secure(&self) -> bool;

    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    /// Response header value, if set and valid UTF-8.
    fn response_header(&self, name: &str) -> Option<&str>;

    /// Set a response header, replacing any previous value.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Append to the response body.
    fn write(&mut self, chunk: &[u8]);

    /// Replace the response body.
    fn set_body(&mut self, body: Vec<u8>);

    fn redirect(&mut self, location: HeaderValue, status: StatusCode) {
        self.set_header(header::LOCATION, location);
        self.set_status(status);
    }
}
