//! Typed network-access layer for a venue ticket-scanning client.
//!
//! # Overview
//! Endpoint descriptors are turned into validated, decoded responses by
//! `RequestClient`; every failure is classified into the closed `ApiError`
//! taxonomy. `HttpVenueGateway` exposes the two domain operations, and
//! `ScanSession` drives the scan lifecycle (scanning, processing, result or
//! error, auto-resume) on top of it.
//!
//! # Design
//! - Request building and response parsing are pure; only the `Transport`
//!   touches the network, so the pipeline is testable without sockets.
//! - Clients and gateways are constructed explicitly and injected. There is
//!   no global instance.
//! - `ScanState` has a single owner, the session worker task. Observers read
//!   it through a `watch` channel.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod http;
pub mod logging;
pub mod session;
pub mod transport;
pub mod types;
pub mod venues;

pub use client::RequestClient;
pub use config::{ClientConfig, ConfigError};
pub use endpoint::{Encoding, Endpoint, VenueEndpoint};
pub use error::ApiError;
pub use gateway::{HttpVenueGateway, VenueGateway};
pub use http::{HttpMethod, HttpRequest, HttpResponse, TransportFailure};
pub use session::{ScanSession, ScanState};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Coordinate, Gate, PaxLocation, ScanOutcome, Venue};
pub use venues::{VenueDirectory, VenueListState};
