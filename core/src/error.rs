//! Error taxonomy for the venue API pipeline.
//!
//! # Design
//! `ApiError` is closed: every failure leaving `RequestClient` is one of
//! these variants, never a raw transport or serde error. The `Display`
//! output is the message shown to the operator; diagnostic causes are kept
//! in the variant for logs.

use thiserror::Error;

use crate::http::TransportFailure;

pub(crate) const TIMED_OUT_MESSAGE: &str = "Request timed out. Please try again.";
pub(crate) const CANNOT_CONNECT_MESSAGE: &str = "Cannot connect to the server.";

/// Errors returned by `RequestClient` and everything layered on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Base URL plus endpoint path did not form a valid URL.
    #[error("Invalid URL.")]
    InvalidUrl,

    #[error("No internet connection. Please check your network settings.")]
    NoConnectivity,

    /// The server answered with an empty body.
    #[error("No data received from the server.")]
    EmptyResponse,

    /// The body was not the expected JSON shape. Carries the decoder's message.
    #[error("Unable to process the server response.")]
    DecodeFailure(String),

    /// The server (or the transport, with status 0) refused the request.
    #[error("{}", .message.as_deref().unwrap_or("An unexpected error occurred."))]
    RequestRejected { status: u16, message: Option<String> },

    #[error("{message}")]
    Unauthorized { message: String },

    /// HTTP 503.
    #[error("The service is temporarily unavailable. Please try again later.")]
    ServiceUnavailable,

    #[error("Something went wrong. Please try again.")]
    Unclassified(String),
}

impl ApiError {
    /// Whether the failure is likely transient. Advisory only: nothing in
    /// this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::ServiceUnavailable | ApiError::NoConnectivity => true,
            ApiError::RequestRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status associated with the failure, if the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestRejected { status, .. } if *status != 0 => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::ServiceUnavailable => Some(503),
            _ => None,
        }
    }

    /// Diagnostic detail not meant for display.
    pub fn cause(&self) -> Option<&str> {
        match self {
            ApiError::DecodeFailure(cause) | ApiError::Unclassified(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<TransportFailure> for ApiError {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Offline => ApiError::NoConnectivity,
            TransportFailure::TimedOut => ApiError::RequestRejected {
                status: 0,
                message: Some(TIMED_OUT_MESSAGE.to_string()),
            },
            TransportFailure::HostUnreachable => ApiError::RequestRejected {
                status: 0,
                message: Some(CANNOT_CONNECT_MESSAGE.to_string()),
            },
            TransportFailure::Other(cause) => ApiError::Unclassified(cause),
        }
    }
}
