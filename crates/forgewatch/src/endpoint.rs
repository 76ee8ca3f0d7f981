//! Printer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// TCP port of the FlashForge command service.
pub const DEFAULT_PORT: u16 = 8899;

/// Port of the printer's MJPEG camera server.
pub const CAMERA_PORT: u16 = 8080;

/// One printer on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterEndpoint {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl PrinterEndpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Printer host name or IP address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Command service port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stable identifier for this printer.
    ///
    /// The `_3_` matches ids issued by earlier integrations, even for the
    /// Adventurer 5.
    pub fn device_id(&self) -> String {
        format!("flashforge_adventurer_3_{}", self.host)
    }

    /// URL of the live MJPEG stream.
    pub fn camera_url(&self) -> String {
        format!("http://{}:{}/?action=stream", self.host, CAMERA_PORT)
    }
}

impl fmt::Display for PrinterEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
