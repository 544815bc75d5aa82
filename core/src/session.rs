//! Scan-session state machine.
//!
//! # Design
//! Transitions live in the pure `reduce` function: it updates the state in
//! place and returns the single `SessionEffect` the runtime must perform.
//! `ScanSession` is the runtime. It spawns one worker task that exclusively
//! owns the `ScanState`, applies events strictly in arrival order, and
//! publishes every change on a `watch` channel for read-only observers.
//! Validation calls and the auto-resume timer run as side tasks that report
//! back through the same inbox, so no two mutations ever interleave.
//!
//! Teardown cancels one `CancellationToken`; the pending timer and any
//! in-flight validation hang off it and stop without touching the state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::gateway::VenueGateway;
use crate::types::{ScanOutcome, Venue};

/// How long a result or error stays on screen before scanning resumes.
pub const RESUME_DELAY: Duration = Duration::from_secs(5);

pub const INVALID_VENUE_MESSAGE: &str = "Invalid venue configuration.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// Ready for the next barcode.
    Scanning,
    /// A validation call is in flight; scanning input is suspended.
    Processing,
    /// The service answered. `success` picks approval or denial styling.
    Result { success: bool, message: String },
    /// The validation could not be completed.
    Error { message: String },
}

impl ScanState {
    /// Whether the camera should be delivering barcodes.
    pub fn accepts_barcodes(&self) -> bool {
        matches!(self, ScanState::Scanning)
    }

    /// Showing a result or an error, waiting to resume.
    pub fn is_settled(&self) -> bool {
        matches!(self, ScanState::Result { .. } | ScanState::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BarcodeDetected(String),
    ValidationFinished(Result<ScanOutcome, ApiError>),
    /// The auto-resume timer armed as generation `n` expired.
    ResumeTimerFired(u64),
    /// The operator asked to scan the next ticket.
    ScanNext,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    Validate { venue_code: String, barcode: String },
    ArmResumeTimer,
    CancelResumeTimer,
}

/// Apply one event to the session state.
///
/// `venue_code` is the code of the venue being scanned for; without one the
/// barcode fails immediately and no validation is requested.
pub fn reduce(state: &mut ScanState, event: SessionEvent, venue_code: Option<&str>) -> SessionEffect {
    match event {
        SessionEvent::BarcodeDetected(barcode) => {
            // A live feed reports the same symbol many times; only the first counts.
            if !state.accepts_barcodes() {
                return SessionEffect::None;
            }
            match venue_code {
                Some(code) => {
                    *state = ScanState::Processing;
                    SessionEffect::Validate {
                        venue_code: code.to_string(),
                        barcode,
                    }
                }
                None => {
                    *state = ScanState::Error {
                        message: INVALID_VENUE_MESSAGE.to_string(),
                    };
                    SessionEffect::ArmResumeTimer
                }
            }
        }
        SessionEvent::ValidationFinished(result) => {
            if *state != ScanState::Processing {
                return SessionEffect::None;
            }
            *state = match result {
                Ok(outcome) => ScanState::Result {
                    success: outcome.is_success(),
                    message: outcome.display_message(),
                },
                Err(err) => ScanState::Error {
                    message: err.to_string(),
                },
            };
            SessionEffect::ArmResumeTimer
        }
        SessionEvent::ResumeTimerFired(_) => {
            if state.is_settled() {
                *state = ScanState::Scanning;
            }
            SessionEffect::None
        }
        SessionEvent::ScanNext => {
            if !state.is_settled() {
                return SessionEffect::None;
            }
            *state = ScanState::Scanning;
            SessionEffect::CancelResumeTimer
        }
    }
}

/// Single-shot auto-resume timer with at most one pending instance.
///
/// Each `arm` cancels the previous timer and bumps a generation counter; a
/// firing is only honoured if it carries the current generation and the timer
/// has not been cancelled since.
#[derive(Debug)]
pub struct ResumeTimer {
    delay: Duration,
    generation: u64,
    pending: Option<CancellationToken>,
}

impl ResumeTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    /// Start the timer, replacing any pending one. Returns its generation.
    pub fn arm(&mut self, parent: &CancellationToken, events: mpsc::UnboundedSender<SessionEvent>) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = parent.child_token();
        self.pending = Some(token.clone());

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(SessionEvent::ResumeTimerFired(generation));
                }
            }
        });
        tracing::debug!(generation, delay_ms = delay.as_millis() as u64, "resume timer armed");
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
            tracing::debug!(generation = self.generation, "resume timer cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept a firing of `generation` if it is the live timer, disarming it.
    pub fn take_fired(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

/// Handle to a running scan session.
///
/// Must be started inside a Tokio runtime. Dropping the handle tears the
/// session down; `shutdown` does the same and waits for the worker to exit.
#[derive(Debug)]
pub struct ScanSession {
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Receiver<ScanState>,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ScanSession {
    pub fn start(venue: &Venue, gateway: Arc<dyn VenueGateway>) -> Self {
        Self::start_with_delay(venue, gateway, RESUME_DELAY)
    }

    pub fn start_with_delay(venue: &Venue, gateway: Arc<dyn VenueGateway>, resume_delay: Duration) -> Self {
        let (events, inbox) = mpsc::unbounded_channel();
        let (published, state) = watch::channel(ScanState::Scanning);
        let shutdown = CancellationToken::new();
        // A blank code can never address a venue; treat it like a missing one.
        let venue_code = venue.code.clone().filter(|code| !code.trim().is_empty());

        tracing::info!(venue = %venue.id(), has_code = venue_code.is_some(), "scan session started");

        let worker = SessionWorker {
            venue_code,
            gateway,
            state: ScanState::Scanning,
            published,
            events: events.clone(),
            timer: ResumeTimer::new(resume_delay),
            shutdown: shutdown.clone(),
        };
        let worker = tokio::spawn(worker.run(inbox));

        Self {
            events,
            state,
            shutdown,
            worker: Some(worker),
        }
    }

    /// Report a barcode from the camera. Ignored unless the session is
    /// currently `Scanning`.
    pub fn barcode_detected(&self, barcode: impl Into<String>) {
        self.dispatch(SessionEvent::BarcodeDetected(barcode.into()));
    }

    /// Dismiss the current result or error and resume scanning now.
    pub fn scan_next(&self) {
        self.dispatch(SessionEvent::ScanNext);
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.state.borrow().accepts_barcodes()
    }

    /// Receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.clone()
    }

    /// Tear the session down and wait for its worker to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "scan session worker failed");
            }
        }
    }

    fn dispatch(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event dropped, scan session already stopped");
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct SessionWorker {
    venue_code: Option<String>,
    gateway: Arc<dyn VenueGateway>,
    state: ScanState,
    published: watch::Sender<ScanState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    timer: ResumeTimer,
    shutdown: CancellationToken,
}

impl SessionWorker {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = inbox.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        self.timer.cancel();
        tracing::info!("scan session stopped");
    }

    fn handle(&mut self, event: SessionEvent) {
        if let SessionEvent::ResumeTimerFired(generation) = &event {
            if !self.timer.take_fired(*generation) {
                tracing::trace!(generation, "stale resume timer ignored");
                return;
            }
        }

        let previous = self.state.clone();
        let effect = reduce(&mut self.state, event, self.venue_code.as_deref());
        if self.state != previous {
            tracing::info!(from = ?previous, to = ?self.state, "scan state changed");
            self.published.send_replace(self.state.clone());
        }

        match effect {
            SessionEffect::None => {}
            SessionEffect::Validate { venue_code, barcode } => self.spawn_validation(venue_code, barcode),
            SessionEffect::ArmResumeTimer => {
                self.timer.arm(&self.shutdown, self.events.clone());
            }
            SessionEffect::CancelResumeTimer => self.timer.cancel(),
        }
    }

    fn spawn_validation(&self, venue_code: String, barcode: String) {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        let cancel = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(%venue_code, "validation abandoned at teardown");
                }
                result = gateway.submit_scan(&venue_code, &barcode) => {
                    let _ = events.send(SessionEvent::ValidationFinished(result));
                }
            }
        });
    }
}
