//! Handler-facing view of a dispatch.
//!
//! A [`Context`] pairs the pooled [`RequestState`] (parameter bindings and
//! the continuation flag) with the transport for the duration of one handler
//! call. Request accessors read from the transport; response helpers write
//! through it.

use std::borrow::Cow;
use std::io;
use std::net::IpAddr;
use std::path::Path;

use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;

use crate::http::mime;
use crate::http::transport::Transport;
use crate::routing::pool::RequestState;

pub struct Context<'a> {
    state: &'a mut RequestState,
    transport: &'a mut dyn Transport,
}

impl<'a> Context<'a> {
    pub(crate) fn new(state: &'a mut RequestState, transport: &'a mut dyn Transport) -> Self {
        Self { state, transport }
    }

    // --- dispatch ---

    /// Value of the named route parameter, or `""` if unbound.
    ///
    /// A wildcard segment binds the name `"*"`.
    pub fn param(&self, name: &str) -> &str {
        self.state.param(name).unwrap_or("")
    }

    /// All bound parameters in template order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.state.params()
    }

    /// Continue the route scan with the next matching route once this handler returns.
    ///
    /// Call this last; parameter bindings are dropped immediately.
    pub fn next(&mut self) {
        self.state.request_next();
        self.state.clear_params();
    }

    /// Direct access to the underlying transport.
    pub fn transport(&mut self) -> &mut (dyn Transport + 'a) {
        &mut *self.transport
    }

    // --- request ---

    pub fn method(&self) -> &Method {
        self.transport.method()
    }

    pub fn path(&self) -> &str {
        self.state.path()
    }

    /// Path and query as received.
    pub fn url(&self) -> &str {
        let uri = self.transport.uri();
        uri.path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path())
    }

    /// First URL-decoded value of a query string key.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.transport.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Request header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.transport.header(name)
    }

    pub fn body(&self) -> &[u8] {
        self.transport.body()
    }

    /// Request body as text, replacing invalid UTF-8.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.transport.body())
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.transport.remote_addr().map(|addr| addr.ip())
    }

    pub fn is_secure(&self) -> bool {
        self.transport.is_secure()
    }

    pub fn protocol(&self) -> &'static str {
        if self.is_secure() {
            "https"
        } else {
            "http"
        }
    }

    /// True for requests sent with `X-Requested-With: XMLHttpRequest`.
    pub fn is_xhr(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    /// True if the request Content-Type is the media type for `ext`.
    pub fn is(&self, ext: &str) -> bool {
        self.header("content-type")
            .is_some_and(|ct| mime::matches_extension(ct, ext))
    }

    // --- response ---

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.transport.set_status(status);
        self
    }

    /// Set a response header. Invalid names or values are logged and skipped.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.transport.set_header(name, value),
            _ => tracing::warn!(header = %name, path = %self.state.path(), "Ignoring invalid response header"),
        }
        self
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.transport.response_header(name)
    }

    /// Replace the response body.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) {
        self.transport.set_body(body.into());
    }

    /// Append to the response body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.transport.write(chunk.as_ref());
    }

    /// Serialize `value` as the JSON response body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        self.transport
            .set_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.transport.set_body(body);
        Ok(())
    }

    /// Set Content-Type from a file extension. Unknown extensions are left unset.
    pub fn content_type(&mut self, ext: &str) -> &mut Self {
        match mime::for_extension(ext) {
            Some(mime) => self
                .transport
                .set_header(header::CONTENT_TYPE, HeaderValue::from_static(mime)),
            None => tracing::debug!(ext = %ext, "No media type for extension"),
        }
        self
    }

    /// Mark the response as a download, optionally naming the file.
    pub fn attachment(&mut self, filename: Option<&str>) -> &mut Self {
        let Some(filename) = filename else {
            self.transport
                .set_header(header::CONTENT_DISPOSITION, HeaderValue::from_static("attachment"));
            return self;
        };

        if let Some(ext) = Path::new(filename).extension().and_then(|e| e.to_str()) {
            self.content_type(ext);
        }
        let value = format!("attachment; filename=\"{}\"", filename.replace('"', "\\\""));
        self.set(header::CONTENT_DISPOSITION.as_str(), &value)
    }

    /// Redirect with 302 Found.
    pub fn redirect(&mut self, location: &str) {
        self.redirect_with(StatusCode::FOUND, location);
    }

    pub fn redirect_with(&mut self, status: StatusCode, location: &str) {
        match HeaderValue::from_str(location) {
            Ok(location) => self.transport.redirect(location, status),
            Err(_) => tracing::warn!(location = %location, "Ignoring redirect to invalid location"),
        }
    }

    /// Respond with the contents of a file, typed by its extension.
    pub fn send_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let contents = std::fs::read(path)?;
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.content_type(ext);
        }
        self.transport.set_body(contents);
        Ok(())
    }
}
