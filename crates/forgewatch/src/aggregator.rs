//! Builds one status snapshot from the sequence of sub-queries.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::codec::{self, QueryKind, RawResponse};
use crate::endpoint::PrinterEndpoint;
use crate::error::{ErrorKind, QueryError, TransportError};
use crate::status::{PrinterStatus, StatusField};
use crate::transport::Transport;

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Every sub-query succeeded.
    Success(PrinterStatus),
    /// Some sub-queries failed; their fields are unknown.
    PartialSuccess(PrinterStatus),
    /// Nothing usable came back.
    Failure(ErrorKind),
}

impl PollOutcome {
    /// The snapshot, unless the cycle failed.
    pub fn status(&self) -> Option<&PrinterStatus> {
        match self {
            Self::Success(s) | Self::PartialSuccess(s) => Some(s),
            Self::Failure(_) => None,
        }
    }
}

/// Runs the fixed query sequence against one printer and merges the results.
#[derive(Debug)]
pub struct StatusAggregator<T> {
    transport: T,
}

impl<T: Transport> StatusAggregator<T> {
    /// Create an aggregator over a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Query the printer once.
    ///
    /// Sub-queries run strictly one after another in [`QueryKind::SEQUENCE`]
    /// order. A refused connection on the first one means the printer is off
    /// and the rest are skipped.
    pub async fn poll(&self, endpoint: &PrinterEndpoint, call_timeout: Duration) -> PollOutcome {
        let polled_at = Utc::now();
        let mut fields: Vec<StatusField> = Vec::new();
        let mut first_error: Option<ErrorKind> = None;
        let mut succeeded = 0usize;

        for (i, kind) in QueryKind::SEQUENCE.into_iter().enumerate() {
            match self.query(endpoint, kind, call_timeout).await {
                Ok(decoded) => {
                    succeeded += 1;
                    fields.extend(decoded);
                }
                Err(QueryError::Transport(TransportError::ConnectionRefused(reason))) if i == 0 => {
                    debug!(%endpoint, %reason, "printer unreachable");
                    return PollOutcome::Failure(ErrorKind::Unreachable);
                }
                Err(e) => {
                    warn!(%endpoint, query = ?kind, error = %e, "sub-query failed");
                    first_error.get_or_insert(e.kind());
                }
            }
        }

        match first_error {
            None => PollOutcome::Success(PrinterStatus::assemble(fields, polled_at, true)),
            Some(kind) if succeeded == 0 => PollOutcome::Failure(kind),
            Some(_) => PollOutcome::PartialSuccess(PrinterStatus::assemble(fields, polled_at, false)),
        }
    }

    async fn query(
        &self,
        endpoint: &PrinterEndpoint,
        kind: QueryKind,
        call_timeout: Duration,
    ) -> Result<Vec<StatusField>, QueryError> {
        let request = codec::encode(kind);
        let bytes = self.transport.send(endpoint, &request, call_timeout).await?;
        debug!(query = ?kind, len = bytes.len(), "reply received");
        let raw = RawResponse::new(kind, bytes);
        Ok(codec::decode(kind, &raw)?)
    }
}
