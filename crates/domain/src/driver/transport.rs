use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DomainError;

/// Raw request/response link to a projector.
///
/// Implementations frame replies (an ESC/VP21 reply ends with the `:` prompt)
/// and enforce the per-exchange timeout. They never retry; reconnection is
/// driven by the scheduler that owns the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection, failing with `ConnectError`
    async fn open(&mut self) -> Result<(), DomainError>;

    /// Write one request and wait for its framed reply.
    /// Fails with `IoTimeout` or `IoClosed`.
    async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, DomainError>;

    /// Release the connection. Calling it on a closed transport is a no-op.
    async fn close(&mut self) -> Result<(), DomainError>;

    /// Whether a link is currently held
    fn is_open(&self) -> bool;

    /// Time of the last successful exchange
    fn last_activity(&self) -> Option<DateTime<Utc>>;

    /// Human-readable endpoint (host:port or device path)
    fn endpoint(&self) -> String;
}
