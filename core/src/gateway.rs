//! Typed facade over the venue API.
//!
//! Callers above this layer deal in `Venue` and `ScanOutcome` and never see
//! endpoints or wire envelopes. Errors pass through unchanged and nothing
//! here retries.

use async_trait::async_trait;

use crate::client::RequestClient;
use crate::endpoint::VenueEndpoint;
use crate::error::ApiError;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ScanOutcome, Venue, VenuesResponse};

#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// Venues near a coordinate. A response without a venue list is an
    /// empty list, not an error.
    async fn list_venues(&self, latitude: f64, longitude: f64) -> Result<Vec<Venue>, ApiError>;

    /// Ask the service to validate `barcode` at the venue's entry.
    async fn submit_scan(&self, venue_code: &str, barcode: &str) -> Result<ScanOutcome, ApiError>;
}

/// `VenueGateway` speaking HTTP through a `RequestClient`.
#[derive(Debug, Clone)]
pub struct HttpVenueGateway<T = ReqwestTransport> {
    client: RequestClient<T>,
}

impl<T: Transport> HttpVenueGateway<T> {
    pub fn new(client: RequestClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RequestClient<T> {
        &self.client
    }
}

#[async_trait]
impl<T: Transport> VenueGateway for HttpVenueGateway<T> {
    async fn list_venues(&self, latitude: f64, longitude: f64) -> Result<Vec<Venue>, ApiError> {
        let endpoint = VenueEndpoint::ListVenues {
            latitude,
            longitude,
        };
        let response: VenuesResponse = self.client.send(&endpoint).await?;
        let venues = response.venues.unwrap_or_default();
        tracing::info!(count = venues.len(), latitude, longitude, "loaded venues");
        Ok(venues)
    }

    async fn submit_scan(&self, venue_code: &str, barcode: &str) -> Result<ScanOutcome, ApiError> {
        let endpoint = VenueEndpoint::SubmitScan {
            venue_code: venue_code.to_string(),
            barcode: barcode.to_string(),
        };
        let outcome: ScanOutcome = self.client.send(&endpoint).await?;
        tracing::info!(
            venue_code,
            result = outcome.result.as_deref().unwrap_or("-"),
            success = outcome.is_success(),
            "scan validated"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::config::ClientConfig;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};

    /// Serves queued responses in order and records every request.
    #[derive(Default)]
    struct Queue {
        replies: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Queue {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportFailure::Other("no reply queued".to_string())))
        }
    }

    fn gateway(replies: Vec<Result<HttpResponse, TransportFailure>>) -> HttpVenueGateway<Queue> {
        let transport = Queue {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        };
        let config = ClientConfig::new("http://venues.test", "key", "token").unwrap();
        HttpVenueGateway::new(RequestClient::with_transport(config, transport))
    }

    fn requests(gateway: &HttpVenueGateway<Queue>) -> Vec<HttpRequest> {
        gateway.client().transport().requests.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn list_venues_decodes_envelope() {
        let gw = gateway(vec![Ok(HttpResponse::new(
            200,
            r#"{"venues":[{"code":"SOH","name":"Opera House"},{"name":"No Code"}]}"#,
        ))]);
        let venues = gw.list_venues(-33.86, 151.21).await.unwrap();
        assert_eq!(venues.len(), 2);
        assert_eq!(venues[0].code.as_deref(), Some("SOH"));
        assert!(venues[1].code.is_none());

        let sent = requests(&gw);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "http://venues.test/venues/?latitude=-33.86&longitude=151.21");
    }

    #[tokio::test]
    async fn missing_venue_list_is_empty() {
        let gw = gateway(vec![Ok(HttpResponse::new(200, "{}"))]);
        assert!(gw.list_venues(0.0, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_scan_posts_barcode() {
        let gw = gateway(vec![Ok(HttpResponse::new(
            200,
            r#"{"result":"SUCCESS","status":"Approved","action":"ADMIT","concession":1}"#,
        ))]);
        let outcome = gw.submit_scan("SOH", "TKT-1").await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.display_message(), "Approved");

        let sent = requests(&gw);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[0].url, "http://venues.test/venues/SOH/pax/entry/scan");
        assert_eq!(sent[0].body.as_deref(), Some(r#"{"barcode":"TKT-1"}"#));
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let gw = gateway(vec![
            Ok(HttpResponse::new(503, "")),
            Err(TransportFailure::Offline),
        ]);
        assert_eq!(gw.submit_scan("SOH", "A").await.unwrap_err(), ApiError::ServiceUnavailable);
        assert_eq!(gw.submit_scan("SOH", "B").await.unwrap_err(), ApiError::NoConnectivity);
        assert_eq!(requests(&gw).len(), 2);
    }
}
