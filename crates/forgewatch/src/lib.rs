#![warn(missing_docs)]

//! Live telemetry for FlashForge Adventurer 5 printers.
//!
//! This crate provides:
//! - The TCP command transport (one connection per command)
//! - Encoding of status queries and decoding of their replies
//! - Aggregation of the sub-queries into one snapshot, tolerating partial failure
//! - A polling coordinator that publishes the latest snapshot and availability
//!
//! # Example
//!
//! ```ignore
//! use forgewatch::{PollSettings, PollingCoordinator, PrinterEndpoint, TcpTransport};
//!
//! let settings = PollSettings::default();
//! let printer = PollingCoordinator::new(
//!     PrinterEndpoint::new("10.0.0.5", 8899),
//!     TcpTransport::new(),
//!     settings,
//! );
//! printer.start(settings.interval(), settings.cycle_timeout())?;
//!
//! let cached = printer.current_status();
//! if let Some(status) = &cached.status {
//!     println!("available: {}, progress: {:?}%", cached.available, status.progress_percent());
//! }
//!
//! printer.stop().await;
//! ```

pub mod aggregator;
pub mod cache;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod status;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{PollOutcome, StatusAggregator};
pub use cache::{CachedStatus, StatusCache};
pub use codec::{decode, encode, QueryKind, RawResponse};
pub use config::{Config, PollSettings};
pub use coordinator::PollingCoordinator;
pub use endpoint::PrinterEndpoint;
pub use error::{ConfigError, CoordinatorError, ErrorKind, ParseError, QueryError, TransportError};
pub use status::{FieldId, FieldValue, MachineStatus, MoveMode, PrinterStatus, Reading, StatusField};
pub use transport::{TcpTransport, Transport};
