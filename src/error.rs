//! Error taxonomy for the exporter's fetch operations.
//!
//! All variants are transient from the scheduler's point of view: they are
//! logged at the per-cadence, per-item boundary and retried on the next cycle.

use alloy::transports::{RpcError, TransportErrorKind};

/// Errors produced by the price, balance, and staking fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    /// The contract read or balance query failed: transport, node, or revert.
    ///
    /// A revert caused by a selector or encoding mismatch surfaces here too;
    /// the client cannot tell it apart from a chain-side failure.
    #[error("chain call failed: {0}")]
    ChainCall(#[from] RpcError<TransportErrorKind>),
    /// The contract returned bytes that do not match the delegator tuple
    /// shape.
    #[error("malformed delegator response: {0}")]
    MalformedResponse(#[from] MalformedResponse),
    /// The price API returned a non-success status or an unusable body.
    #[error("price upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Shape mismatch on contract return bytes.
#[derive(Debug, thiserror::Error)]
pub enum MalformedResponse {
    /// The return payload is not the fixed encoded width of the schema.
    #[error("expected {expected} return bytes, got {actual}")]
    Length {
        /// Encoded width of the delegator tuple schema.
        expected: usize,
        /// Length of the payload that was received.
        actual: usize,
    },
    /// The payload has the right width but does not decode.
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
}

/// Failure talking to the price API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request failed or timed out.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    /// The response body carries no numeric USD quote for the symbol.
    #[error("no USD quote for {0}")]
    MissingQuote(String),
    /// The quoted price is not a usable non-negative number.
    #[error("unusable price {0}")]
    InvalidPrice(f64),
}
