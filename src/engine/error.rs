use std::io;

use thiserror::Error;

use crate::model::{BookingStatus, RecordId};

/// Failures of the booking store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of the routing collaborator.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing unavailable: {0}")]
    Unavailable(String),
    #[error("no route from {origin:?} to {destination:?}")]
    NoRoute { origin: String, destination: String },
}

impl RouteError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RouteError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("this time is no longer available (conflicts with {0}), please choose another")]
    Conflict(RecordId),
    #[error("not found: {0}")]
    NotFound(RecordId),
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },
    #[error("quote unavailable: {0}")]
    QuoteUnavailable(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ArbiterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ArbiterError::NotFound(id),
            other => ArbiterError::Store(other),
        }
    }
}

impl ArbiterError {
    /// Stable machine-readable code for the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            ArbiterError::InvalidInput(_) => "invalid_input",
            ArbiterError::LimitExceeded(_) => "limit_exceeded",
            ArbiterError::Conflict(_) => "conflict",
            ArbiterError::NotFound(_) => "not_found",
            ArbiterError::InvalidTransition { .. } => "invalid_transition",
            ArbiterError::QuoteUnavailable(_) => "quote_unavailable",
            ArbiterError::Store(_) => "store_error",
        }
    }
}
