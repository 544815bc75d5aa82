//! Domain DTOs for the venue service.
//!
//! # Design
//! Every field the server sends is optional; the service is loose about
//! what it includes. Venue fields are camelCase on the wire except
//! `pax_locations`. Where a UI needs a stable key and the server omitted the
//! natural one, a surrogate UUID is generated once at decode time. Surrogates
//! never travel back to the server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `(latitude, longitude)` pair from the location collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A physical gate inside a pax location.
#[derive(Debug, Clone, Deserialize)]
pub struct Gate {
    pub name: Option<String>,
    #[serde(skip, default = "Uuid::new_v4")]
    surrogate: Uuid,
}

impl Gate {
    pub fn id(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.surrogate.to_string())
    }
}

/// A named entry area of a venue.
#[derive(Debug, Clone, Deserialize)]
pub struct PaxLocation {
    pub name: Option<String>,
    pub gates: Option<Vec<Gate>>,
    #[serde(skip, default = "Uuid::new_v4")]
    surrogate: Uuid,
}

impl PaxLocation {
    pub fn id(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.surrogate.to_string())
    }

    pub fn gates(&self) -> &[Gate] {
        self.gates.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub code: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    #[serde(rename = "pax_locations")]
    pub pax_locations: Option<Vec<PaxLocation>>,
    #[serde(skip, default = "Uuid::new_v4")]
    surrogate: Uuid,
}

impl Venue {
    /// A venue known only by its code, e.g. one picked on a previous run.
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            name: None,
            address: None,
            city: None,
            state: None,
            postcode: None,
            latitude: None,
            longitude: None,
            timezone: None,
            pax_locations: None,
            surrogate: Uuid::new_v4(),
        }
    }

    /// Key for lists and selection. Falls back to the surrogate when the
    /// server omitted the code; never use it as a network identifier.
    pub fn id(&self) -> String {
        self.code.clone().unwrap_or_else(|| self.surrogate.to_string())
    }

    /// Present parts of city, state and postcode, comma separated.
    pub fn formatted_location(&self) -> String {
        [&self.city, &self.state, &self.postcode]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.latitude?, self.longitude?))
    }

    pub fn pax_locations(&self) -> &[PaxLocation] {
        self.pax_locations.as_deref().unwrap_or_default()
    }
}

/// Envelope returned by `GET /venues/`.
#[derive(Debug, Clone, Deserialize)]
pub struct VenuesResponse {
    pub venues: Option<Vec<Venue>>,
}

/// Server verdict for one scanned barcode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanOutcome {
    pub status: Option<String>,
    pub action: Option<String>,
    pub result: Option<String>,
    #[serde(rename = "concession")]
    pub concession_count: Option<i64>,
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|r| r.to_uppercase() == "SUCCESS")
    }

    pub fn display_message(&self) -> String {
        if self.is_success() {
            return self.status.clone().unwrap_or_else(|| "Valid Ticket".to_string());
        }
        self.status
            .clone()
            .or_else(|| self.result.clone())
            .unwrap_or_else(|| "Ticket validation failed".to_string())
    }
}
