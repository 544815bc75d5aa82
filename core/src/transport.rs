//! Executes plain-data requests against the network.
//!
//! `Transport` is the seam between the deterministic request pipeline and
//! real I/O. `ReqwestTransport` is the production implementation; tests plug
//! in scripted transports instead.

use std::error::Error as StdError;
use std::io;

use async_trait::async_trait;
use reqwest::Method;

use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};

/// Performs one HTTP round-trip.
///
/// Implementations must honour `request.timeout` and must return non-2xx
/// responses as data, leaving status interpretation to the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// `Transport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportFailure::Other(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

/// Sort a reqwest failure into the coarse buckets the client cares about.
///
/// Timeouts win over everything else since a connect timeout also reports
/// `is_connect`. A dropped connection surfaces as an io error somewhere down
/// the source chain.
fn classify(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::TimedOut;
    }
    if let Some(kind) = io_error_kind(&err) {
        if is_connection_loss(kind) {
            return TransportFailure::Offline;
        }
    }
    if err.is_connect() {
        return TransportFailure::HostUnreachable;
    }
    TransportFailure::Other(err.to_string())
}

fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

fn is_connection_loss(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
