//! Venue picker state.
//!
//! Loads the venues near the device and keeps the screen state the picker
//! renders. Failures become their display message, the same way the scan
//! session treats them.

use std::sync::Arc;

use crate::gateway::VenueGateway;
use crate::types::{Coordinate, Venue};

#[derive(Debug, Clone, Default)]
pub enum VenueListState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<Venue>),
    Failed(String),
}

impl VenueListState {
    pub fn venues(&self) -> &[Venue] {
        match self {
            VenueListState::Loaded(venues) => venues,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, VenueListState::Loading)
    }
}

pub struct VenueDirectory {
    gateway: Arc<dyn VenueGateway>,
    state: VenueListState,
    last_coordinate: Option<Coordinate>,
}

impl VenueDirectory {
    pub fn new(gateway: Arc<dyn VenueGateway>) -> Self {
        Self {
            gateway,
            state: VenueListState::Idle,
            last_coordinate: None,
        }
    }

    pub fn state(&self) -> &VenueListState {
        &self.state
    }

    /// Fetch venues near `coordinate`, replacing whatever was shown.
    pub async fn load(&mut self, coordinate: Coordinate) -> &VenueListState {
        self.last_coordinate = Some(coordinate);
        self.state = VenueListState::Loading;

        self.state = match self
            .gateway
            .list_venues(coordinate.latitude, coordinate.longitude)
            .await
        {
            Ok(venues) => VenueListState::Loaded(venues),
            Err(err) => {
                tracing::warn!(error = %err, retryable = err.is_retryable(), "venue list failed");
                VenueListState::Failed(err.to_string())
            }
        };
        &self.state
    }

    /// Reload with the last coordinate. Does nothing before the first load.
    pub async fn refresh(&mut self) -> &VenueListState {
        match self.last_coordinate {
            Some(coordinate) => self.load(coordinate).await,
            None => &self.state,
        }
    }

    /// Look up a loaded venue by its list key.
    pub fn find(&self, id: &str) -> Option<&Venue> {
        self.state.venues().iter().find(|venue| venue.id() == id)
    }
}
