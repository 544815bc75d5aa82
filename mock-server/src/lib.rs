use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};

pub const DEFAULT_API_KEY: &str = "test-key";
pub const DEFAULT_AUTH_TOKEN: &str = "Bearer test-token";

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub api_key: String,
    pub auth_token: String,
    /// How long the `SLOW` barcode stalls before answering.
    pub slow_delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            auth_token: DEFAULT_AUTH_TOKEN.to_string(),
            slow_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gate {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaxLocation {
    pub name: String,
    pub gates: Vec<Gate>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub code: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    #[serde(rename = "pax_locations")]
    pub pax_locations: Vec<PaxLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VenueList {
    pub venues: Vec<Venue>,
}

#[derive(Debug, Deserialize)]
pub struct VenueQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub result: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concession: Option<i64>,
}

impl ScanResult {
    fn approved() -> Self {
        Self {
            result: "SUCCESS".to_string(),
            action: "ADMIT".to_string(),
            status: Some("Approved".to_string()),
            concession: Some(0),
        }
    }

    fn already_scanned() -> Self {
        Self {
            result: "FAILED".to_string(),
            action: "DENY".to_string(),
            status: Some("Ticket already scanned".to_string()),
            concession: None,
        }
    }

    fn invalid() -> Self {
        Self {
            result: "INVALID".to_string(),
            action: "DENY".to_string(),
            status: None,
            concession: None,
        }
    }
}

/// Barcodes already admitted, keyed by venue code.
pub type Scanned = Arc<RwLock<HashSet<(String, String)>>>;

#[derive(Clone)]
struct AppState {
    config: Arc<MockConfig>,
    venues: Arc<Vec<Venue>>,
    scanned: Scanned,
}

pub fn app(config: MockConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        venues: Arc::new(seed_venues()),
        scanned: Arc::new(RwLock::new(HashSet::new())),
    };
    Router::new()
        .route("/venues/", get(list_venues))
        .route("/venues/{code}/pax/entry/scan", post(submit_scan))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

pub fn seed_venues() -> Vec<Venue> {
    vec![
        venue(
            "SOH",
            "Sydney Opera House",
            ("Bennelong Point", "Sydney", "NSW", "2000"),
            (-33.8568, 151.2153),
            "Australia/Sydney",
            &[("Forecourt", "Gate A,Gate B"), ("Concert Hall", "North")],
        ),
        venue(
            "SCG",
            "Sydney Cricket Ground",
            ("Driver Avenue", "Moore Park", "NSW", "2021"),
            (-33.8915, 151.2249),
            "Australia/Sydney",
            &[("Members", "Gate 1"), ("Brewongle Stand", "Gate 4,Gate 5")],
        ),
        venue(
            "MCG",
            "Melbourne Cricket Ground",
            ("Brunton Avenue", "Richmond", "VIC", "3002"),
            (-37.8200, 144.9834),
            "Australia/Melbourne",
            &[("Olympic Stand", "Gate 1,Gate 2,Gate 3")],
        ),
    ]
}

/// `locations` pairs a location name with its comma separated gates.
fn venue(
    code: &str,
    name: &str,
    (address, city, state, postcode): (&str, &str, &str, &str),
    (latitude, longitude): (f64, f64),
    timezone: &str,
    locations: &[(&str, &str)],
) -> Venue {
    Venue {
        code: code.to_string(),
        name: name.to_string(),
        address: address.to_string(),
        city: city.to_string(),
        state: state.to_string(),
        postcode: postcode.to_string(),
        latitude,
        longitude,
        timezone: timezone.to_string(),
        pax_locations: locations
            .iter()
            .map(|(name, gates)| PaxLocation {
                name: name.to_string(),
                gates: gates
                    .split(',')
                    .map(|gate| Gate {
                        name: gate.to_string(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Squared planar distance. Only used for ordering.
fn distance(venue: &Venue, latitude: f64, longitude: f64) -> f64 {
    let dlat = venue.latitude - latitude;
    let dlon = venue.longitude - longitude;
    dlat * dlat + dlon * dlon
}

fn check_credentials(headers: &HeaderMap, config: &MockConfig) -> Result<(), Response> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if header("x-api-key") == Some(config.api_key.as_str())
        && header("authorization") == Some(config.auth_token.as_str())
    {
        return Ok(());
    }
    Err((
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Invalid API credentials." })),
    )
        .into_response())
}

async fn list_venues(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VenueQuery>,
) -> Response {
    if let Err(rejection) = check_credentials(&headers, &state.config) {
        return rejection;
    }
    let (Some(latitude), Some(longitude)) = (query.latitude, query.longitude) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "latitude and longitude are required" })),
        )
            .into_response();
    };

    let mut venues = state.venues.as_ref().clone();
    venues.sort_by(|a, b| {
        distance(a, latitude, longitude).total_cmp(&distance(b, latitude, longitude))
    });
    Json(VenueList { venues }).into_response()
}

async fn submit_scan(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Response {
    if let Err(rejection) = check_credentials(&headers, &state.config) {
        return rejection;
    }
    if !state.venues.iter().any(|venue| venue.code == code) {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Venue not found" })),
        )
            .into_response();
    }

    let barcode = request.barcode;
    match barcode.as_str() {
        "OUTAGE" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "Scanning is paused" })),
        )
            .into_response(),
        "CRASH" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "EMPTY" => StatusCode::OK.into_response(),
        "GARBLED" => (StatusCode::OK, "<html>not json</html>").into_response(),
        "SLOW" => {
            tokio::time::sleep(state.config.slow_delay).await;
            Json(ScanResult::approved()).into_response()
        }
        valid if valid.starts_with("VALID") => {
            let first = state.scanned.write().await.insert((code, barcode.clone()));
            let result = if first {
                ScanResult::approved()
            } else {
                ScanResult::already_scanned()
            };
            Json(result).into_response()
        }
        _ => Json(ScanResult::invalid()).into_response(),
    }
}
