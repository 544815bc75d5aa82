//! Declarative descriptions of remote operations.
//!
//! An `Endpoint` is pure data: path, method, parameters, body and encoding.
//! `RequestClient` turns one into an `HttpRequest`. `VenueEndpoint` is the
//! closed set of operations the venue service exposes.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::http::HttpMethod;

/// Headers every request carries unless an endpoint overrides their value.
pub const DEFAULT_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("accept-language", "en"),
];

/// Where an endpoint's parameters travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Appended to the URL as query items.
    UrlQuery,
    /// Serialized as the JSON request body.
    JsonBody,
}

/// Scalar parameter values. Ordered by key so built URLs are deterministic.
pub type Parameters = BTreeMap<String, Value>;

/// Description of one remote operation.
///
/// Only `path` and `method` are required; the rest default to "no
/// parameters, no body, JSON encoding, default headers".
pub trait Endpoint {
    fn path(&self) -> String;

    fn method(&self) -> HttpMethod;

    fn parameters(&self) -> Option<Parameters> {
        None
    }

    /// Structured request body. Takes precedence over JSON-encoded parameters.
    fn body(&self) -> Option<Value> {
        None
    }

    fn encoding(&self) -> Encoding {
        Encoding::JsonBody
    }

    /// Per-endpoint header values. Overrides replace the value of a default
    /// header with the same name but never remove it.
    fn header_overrides(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Default headers overlaid with the endpoint's overrides.
pub fn resolved_headers<E: Endpoint + ?Sized>(endpoint: &E) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    for (name, value) in endpoint.header_overrides() {
        set_header(&mut headers, &name, value);
    }
    headers
}

/// Replace the value of `name` (case-insensitive) or append it.
pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value,
        None => headers.push((name.to_string(), value)),
    }
}

/// Render a parameter value the way it appears in a query string.
pub(crate) fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Operations offered by the venue service.
#[derive(Debug, Clone, PartialEq)]
pub enum VenueEndpoint {
    ListVenues { latitude: f64, longitude: f64 },
    SubmitScan { venue_code: String, barcode: String },
}

impl Endpoint for VenueEndpoint {
    fn path(&self) -> String {
        match self {
            VenueEndpoint::ListVenues { .. } => "/venues/".to_string(),
            VenueEndpoint::SubmitScan { venue_code, .. } => {
                format!("/venues/{venue_code}/pax/entry/scan")
            }
        }
    }

    fn method(&self) -> HttpMethod {
        match self {
            VenueEndpoint::ListVenues { .. } => HttpMethod::Get,
            VenueEndpoint::SubmitScan { .. } => HttpMethod::Post,
        }
    }

    fn parameters(&self) -> Option<Parameters> {
        match self {
            VenueEndpoint::ListVenues {
                latitude,
                longitude,
            } => {
                let mut params = Parameters::new();
                params.insert("latitude".to_string(), Value::from(*latitude));
                params.insert("longitude".to_string(), Value::from(*longitude));
                Some(params)
            }
            VenueEndpoint::SubmitScan { .. } => None,
        }
    }

    fn body(&self) -> Option<Value> {
        match self {
            VenueEndpoint::ListVenues { .. } => None,
            VenueEndpoint::SubmitScan { barcode, .. } => {
                Some(json!({ "barcode": barcode }))
            }
        }
    }

    fn encoding(&self) -> Encoding {
        match self {
            VenueEndpoint::ListVenues { .. } => Encoding::UrlQuery,
            VenueEndpoint::SubmitScan { .. } => Encoding::JsonBody,
        }
    }
}
