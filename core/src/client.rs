//! Request pipeline for the venue API.
//!
//! # Design
//! `RequestClient` holds the base URL, the injected credentials and a
//! `Transport`, and carries no mutable state between calls. A call is split
//! into `build_request` (descriptor to `HttpRequest`) and `parse_response`
//! (`HttpResponse` to typed value), both pure; `send` runs the transport in
//! between. Every failure is classified into `ApiError` before it leaves
//! this module.

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::endpoint::{self, Encoding, Endpoint};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};

/// Fixed per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_HEADER: &str = "x-api-key";
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Async client for the venue API.
///
/// Cheap to share behind an `Arc`; it performs no retries. Callers that want
/// to retry consult `ApiError::is_retryable`.
#[derive(Debug, Clone)]
pub struct RequestClient<T = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
    timeout: Duration,
}

impl RequestClient<ReqwestTransport> {
    /// Client backed by a fresh reqwest connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> RequestClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Replace the client-wide timeout. Individual requests cannot change it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build, execute, validate and decode one call.
    pub async fn send<R, E>(&self, endpoint: &E) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        E: Endpoint + ?Sized,
    {
        let request = self.build_request(endpoint)?;
        let method = request.method;
        let path = endpoint.path();
        tracing::debug!(method = method.as_str(), %path, "sending request");

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::warn!(method = method.as_str(), %path, error = %failure, "transport failure");
                return Err(failure.into());
            }
        };

        let status = response.status;
        let result = self.parse_response(response);
        match &result {
            Ok(_) => tracing::debug!(method = method.as_str(), %path, status, "request succeeded"),
            Err(err) => tracing::warn!(
                method = method.as_str(),
                %path,
                status,
                error = %err,
                cause = err.cause().unwrap_or_default(),
                "request failed"
            ),
        }
        result
    }

    /// Turn a descriptor into a wire request. No I/O.
    pub fn build_request<E: Endpoint + ?Sized>(&self, endpoint: &E) -> Result<HttpRequest, ApiError> {
        let method = endpoint.method();
        let encoding = endpoint.encoding();
        let parameters = endpoint.parameters();

        let raw = format!("{}{}", self.config.base_url(), endpoint.path());
        let mut url = Url::parse(&raw).map_err(|_| ApiError::InvalidUrl)?;
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl);
        }

        // GET always carries its parameters in the query string.
        if method == HttpMethod::Get || encoding == Encoding::UrlQuery {
            if let Some(params) = parameters.as_ref().filter(|p| !p.is_empty()) {
                let mut query = url.query_pairs_mut();
                for (name, value) in params {
                    query.append_pair(name, &endpoint::query_value(value));
                }
            }
        }

        let mut headers = endpoint::resolved_headers(endpoint);
        endpoint::set_header(&mut headers, API_KEY_HEADER, self.config.api_key().to_string());
        endpoint::set_header(
            &mut headers,
            AUTHORIZATION_HEADER,
            self.config.auth_token().to_string(),
        );

        let body = if method == HttpMethod::Get {
            None
        } else if let Some(body) = endpoint.body() {
            Some(encode_json(&body)?)
        } else if encoding == Encoding::JsonBody {
            parameters
                .map(|params| encode_json(&Value::Object(params.into_iter().collect())))
                .transpose()?
        } else {
            None
        };

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body,
            timeout: self.timeout,
        })
    }

    /// Validate the status and decode the body. No I/O.
    pub fn parse_response<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<R, ApiError> {
        check_status(&response)?;
        if response.body.is_empty() {
            return Err(ApiError::EmptyResponse);
        }
        serde_json::from_slice(&response.body).map_err(|e| ApiError::DecodeFailure(e.to_string()))
    }
}

fn encode_json(value: &Value) -> Result<String, ApiError> {
    serde_json::to_string(value).map_err(|e| ApiError::Unclassified(e.to_string()))
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    let status = response.status;
    let message = |fallback: &str| extract_message(&response.body).unwrap_or_else(|| fallback.to_string());
    match status {
        200..=299 => Ok(()),
        401 => Err(ApiError::Unauthorized {
            message: message("Unauthorised access."),
        }),
        400..=499 => Err(ApiError::RequestRejected {
            status,
            message: Some(message("Request failed.")),
        }),
        503 => Err(ApiError::ServiceUnavailable),
        500..=599 => Err(ApiError::RequestRejected {
            status,
            message: Some(message("Server error. Please try again later.")),
        }),
        _ => Err(ApiError::RequestRejected {
            status,
            message: Some(message("Unexpected error occurred.")),
        }),
    }
}

/// Best-effort human message from an error body.
///
/// A JSON object yields the first string among `message`, `error`, `status`
/// (and nothing if none is present). Anything else is taken as text, even
/// when empty; only a body that is not UTF-8 yields no message.
pub(crate) fn extract_message(body: &[u8]) -> Option<String> {
    if let Ok(Value::Object(object)) = serde_json::from_slice::<Value>(body) {
        return ["message", "error", "status"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_string);
    }
    std::str::from_utf8(body).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::*;
    use crate::endpoint::{Parameters, VenueEndpoint};
    use crate::http::TransportFailure;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        ok: bool,
    }

    /// Replays one canned result and remembers the request it was given.
    struct Scripted {
        reply: Result<HttpResponse, TransportFailure>,
        seen: Mutex<Option<HttpRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<HttpResponse, TransportFailure>) -> Self {
            Self {
                reply,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
            *self.seen.lock().unwrap() = Some(request);
            self.reply.clone()
        }
    }

    /// Endpoint with every knob exposed, for encoding edge cases.
    struct Probe {
        method: HttpMethod,
        encoding: Encoding,
        parameters: Option<Parameters>,
        body: Option<Value>,
        overrides: Vec<(String, String)>,
    }

    impl Probe {
        fn new(method: HttpMethod, encoding: Encoding) -> Self {
            let mut params = Parameters::new();
            params.insert("page".to_string(), Value::from(2));
            params.insert("q".to_string(), Value::from("gate a"));
            Self {
                method,
                encoding,
                parameters: Some(params),
                body: None,
                overrides: Vec::new(),
            }
        }
    }

    impl Endpoint for Probe {
        fn path(&self) -> String {
            "/probe".to_string()
        }

        fn method(&self) -> HttpMethod {
            self.method
        }

        fn parameters(&self) -> Option<Parameters> {
            self.parameters.clone()
        }

        fn body(&self) -> Option<Value> {
            self.body.clone()
        }

        fn encoding(&self) -> Encoding {
            self.encoding
        }

        fn header_overrides(&self) -> Vec<(String, String)> {
            self.overrides.clone()
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("https://api.example.com", "key-123", "Bearer tok").unwrap()
    }

    fn client() -> RequestClient<Scripted> {
        client_replying(Ok(HttpResponse::new(200, r#"{"ok":true}"#)))
    }

    fn client_replying(reply: Result<HttpResponse, TransportFailure>) -> RequestClient<Scripted> {
        RequestClient::with_transport(config(), Scripted::new(reply))
    }

    fn parse(status: u16, body: &str) -> Result<Echo, ApiError> {
        client().parse_response(HttpResponse::new(status, body))
    }

    #[test]
    fn list_venues_request() {
        let req = client()
            .build_request(&VenueEndpoint::ListVenues {
                latitude: -33.86,
                longitude: 151.21,
            })
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "https://api.example.com/venues/?latitude=-33.86&longitude=151.21"
        );
        assert!(req.body.is_none());
        assert_eq!(req.timeout, REQUEST_TIMEOUT);
    }

    #[test]
    fn submit_scan_request() {
        let req = client()
            .build_request(&VenueEndpoint::SubmitScan {
                venue_code: "SOH".to_string(),
                barcode: "ABC123".to_string(),
            })
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.example.com/venues/SOH/pax/entry/scan");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"barcode": "ABC123"}));
    }

    #[test]
    fn every_request_carries_defaults_and_credentials() {
        let req = client()
            .build_request(&VenueEndpoint::ListVenues {
                latitude: 1.0,
                longitude: 2.0,
            })
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("Accept-Language"), Some("en"));
        assert_eq!(req.header("x-api-key"), Some("key-123"));
        assert_eq!(req.header("Authorization"), Some("Bearer tok"));
    }

    #[test]
    fn credentials_cannot_be_overridden() {
        let mut probe = Probe::new(HttpMethod::Post, Encoding::JsonBody);
        probe.overrides = vec![
            ("X-Api-Key".to_string(), "spoofed".to_string()),
            ("Authorization".to_string(), "spoofed".to_string()),
        ];
        let req = client().build_request(&probe).unwrap();
        assert_eq!(req.header("x-api-key"), Some("key-123"));
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        let api_keys = req
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("x-api-key"))
            .count();
        assert_eq!(api_keys, 1);
    }

    #[test]
    fn get_query_encodes_even_when_declaring_json_body() {
        let req = client()
            .build_request(&Probe::new(HttpMethod::Get, Encoding::JsonBody))
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/probe?page=2&q=gate+a");
        assert!(req.body.is_none());
    }

    #[test]
    fn get_never_sends_a_body() {
        let mut probe = Probe::new(HttpMethod::Get, Encoding::UrlQuery);
        probe.body = Some(serde_json::json!({"ignored": true}));
        let req = client().build_request(&probe).unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn non_get_url_query_keeps_parameters_out_of_body() {
        let req = client()
            .build_request(&Probe::new(HttpMethod::Delete, Encoding::UrlQuery))
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/probe?page=2&q=gate+a");
        assert!(req.body.is_none());
    }

    #[test]
    fn json_parameters_become_the_body() {
        let req = client()
            .build_request(&Probe::new(HttpMethod::Put, Encoding::JsonBody))
            .unwrap();
        assert_eq!(req.url, "https://api.example.com/probe");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"page": 2, "q": "gate a"}));
    }

    #[test]
    fn structured_body_wins_over_json_parameters() {
        let mut probe = Probe::new(HttpMethod::Patch, Encoding::JsonBody);
        probe.body = Some(serde_json::json!({"barcode": "X"}));
        let req = client().build_request(&probe).unwrap();
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"barcode": "X"}));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let config = ClientConfig::new("not a url", "k", "t").unwrap();
        let client = RequestClient::with_transport(config, Scripted::new(Err(TransportFailure::Offline)));
        let err = client
            .build_request(&VenueEndpoint::ListVenues {
                latitude: 0.0,
                longitude: 0.0,
            })
            .unwrap_err();
        assert_eq!(err, ApiError::InvalidUrl);
    }

    #[test]
    fn success_range_decodes() {
        for status in [200, 201, 204, 299] {
            assert_eq!(parse(status, r#"{"ok":true}"#).unwrap(), Echo { ok: true });
        }
    }

    #[test]
    fn empty_body_is_an_error_even_on_success() {
        assert_eq!(parse(200, "").unwrap_err(), ApiError::EmptyResponse);
        assert_eq!(parse(204, "").unwrap_err(), ApiError::EmptyResponse);
    }

    #[test]
    fn structural_mismatch_is_a_decode_failure() {
        assert!(matches!(parse(200, "not json"), Err(ApiError::DecodeFailure(_))));
        assert!(matches!(parse(200, r#"{"ok":"yes"}"#), Err(ApiError::DecodeFailure(_))));
    }

    #[test]
    fn unauthorized_uses_extracted_or_default_message() {
        assert_eq!(
            parse(401, r#"{"message":"Token expired"}"#).unwrap_err(),
            ApiError::Unauthorized {
                message: "Token expired".to_string()
            }
        );
        assert_eq!(parse(401, "{}").unwrap_err().to_string(), "Unauthorised access.");
        assert_eq!(
            parse(401, "").unwrap_err(),
            ApiError::Unauthorized {
                message: String::new()
            }
        );
    }

    #[test]
    fn client_errors_are_rejections() {
        let err = parse(404, r#"{"error":"Venue not found"}"#).unwrap_err();
        assert_eq!(
            err,
            ApiError::RequestRejected {
                status: 404,
                message: Some("Venue not found".to_string())
            }
        );
        assert_eq!(parse(400, r#"{"detail":"x"}"#).unwrap_err().to_string(), "Request failed.");
        assert_eq!(
            parse(400, "\n").unwrap_err(),
            ApiError::RequestRejected {
                status: 400,
                message: Some("\n".to_string())
            }
        );
    }

    #[test]
    fn server_errors_except_503_are_rejections() {
        for status in [500, 502, 504, 599] {
            let err = parse(status, "{}").unwrap_err();
            assert_eq!(
                err,
                ApiError::RequestRejected {
                    status,
                    message: Some("Server error. Please try again later.".to_string())
                }
            );
            assert!(err.is_retryable());
        }
        assert_eq!(
            parse(500, "").unwrap_err(),
            ApiError::RequestRejected {
                status: 500,
                message: Some(String::new())
            }
        );
        assert_eq!(parse(503, r#"{"message":"down"}"#).unwrap_err(), ApiError::ServiceUnavailable);
    }

    #[test]
    fn other_statuses_are_unexpected() {
        let err = parse(302, "{}").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected error occurred.");
        assert_eq!(err.status(), Some(302));
    }

    #[test]
    fn message_extraction_order() {
        assert_eq!(extract_message(br#"{"message":"X","error":"Y"}"#).as_deref(), Some("X"));
        assert_eq!(extract_message(br#"{"error":"Y","status":"Z"}"#).as_deref(), Some("Y"));
        assert_eq!(extract_message(br#"{"status":"Z"}"#).as_deref(), Some("Z"));
        assert_eq!(extract_message(br#"{"message":3,"error":"Y"}"#).as_deref(), Some("Y"));
        assert_eq!(extract_message(br#"{"detail":"nope"}"#), None);
    }

    #[test]
    fn message_extraction_falls_back_to_text() {
        assert_eq!(extract_message(b"boom").as_deref(), Some("boom"));
        assert_eq!(extract_message(br#"["list"]"#).as_deref(), Some(r#"["list"]"#));
        assert_eq!(extract_message(&[0xff, 0xfe, 0x00]), None);
        assert_eq!(extract_message(b"").as_deref(), Some(""));
        assert_eq!(extract_message(b"  ").as_deref(), Some("  "));
    }

    #[tokio::test]
    async fn send_decodes_and_passes_built_request_to_transport() {
        let client = client();
        let endpoint = VenueEndpoint::SubmitScan {
            venue_code: "SOH".to_string(),
            barcode: "B1".to_string(),
        };
        let echo: Echo = client.send(&endpoint).await.unwrap();
        assert_eq!(echo, Echo { ok: true });

        let seen = client.transport.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen, client.build_request(&endpoint).unwrap());
    }

    #[tokio::test]
    async fn send_maps_transport_failures() {
        let endpoint = VenueEndpoint::ListVenues {
            latitude: 0.0,
            longitude: 0.0,
        };

        let err = client_replying(Err(TransportFailure::TimedOut))
            .send::<Echo, _>(&endpoint)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request timed out. Please try again.");

        let err = client_replying(Err(TransportFailure::Offline))
            .send::<Echo, _>(&endpoint)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NoConnectivity);
    }

    #[tokio::test]
    async fn send_does_not_reach_transport_for_invalid_url() {
        let config = ClientConfig::new("::::", "k", "t").unwrap();
        let client = RequestClient::with_transport(config, Scripted::new(Err(TransportFailure::Offline)));
        let err = client
            .send::<Echo, _>(&VenueEndpoint::ListVenues {
                latitude: 0.0,
                longitude: 0.0,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InvalidUrl);
        assert!(client.transport.seen.lock().unwrap().is_none());
    }

    #[test]
    fn custom_timeout_applies_to_every_request() {
        let client = client().with_timeout(Duration::from_millis(250));
        let req = client.build_request(&Probe::new(HttpMethod::Post, Encoding::JsonBody)).unwrap();
        assert_eq!(req.timeout, Duration::from_millis(250));
    }
}
