//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data.
//! `RequestClient` builds an `HttpRequest` from an endpoint descriptor and
//! parses an `HttpResponse` into a typed value; the `Transport` in between is
//! the only place that touches the network. Transports report failures as a
//! `TransportFailure`, which the client folds into the `ApiError` taxonomy.

use std::time::Duration;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is fully resolved, query string included. Header names keep the
/// casing they were declared with; lookups should be case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// The body is kept as raw bytes: error-message extraction has to cope with
/// payloads that are neither JSON nor valid UTF-8.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Why a transport could not produce an `HttpResponse`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    /// The device lost (or never had) a network connection.
    #[error("network connection lost")]
    Offline,

    #[error("request timed out")]
    TimedOut,

    /// DNS failure or the server refused the connection.
    #[error("host unreachable")]
    HostUnreachable,

    #[error("{0}")]
    Other(String),
}
