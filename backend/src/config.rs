//! Application configuration.
//!
//! Constants shared by the CLI and the HTTP server, plus the server
//! settings that can be overridden from the environment (or a `.env` file).

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Number of offending rows attached to a data quality error.
pub const SAMPLE_ROW_LIMIT: usize = 5;

/// Rows shown per table when previewing validated uploads.
pub const PREVIEW_ROWS: usize = 5;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Maximum accepted request body for uploads (in bytes).
///
/// 50 MB limit.
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Suggested download name for flat archives.
pub const FLAT_ARCHIVE_NAME: &str = "generated_pricelists.zip";

/// Suggested download name for archives grouped by relationship manager.
pub const RM_ARCHIVE_NAME: &str = "generated_pricelists_by_rm.zip";

/// Content type of every generated archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Read `PRICELIST_HOST` / `PRICELIST_PORT`, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            host: env::var("PRICELIST_HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(defaults.host),
            port: env::var("PRICELIST_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
        }
    }

    /// Override the port (CLI flag).
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_port_override() {
        let config = ServerConfig::default().with_port(Some(8080));
        assert_eq!(config.port, 8080);

        let unchanged = ServerConfig::default().with_port(None);
        assert_eq!(unchanged.port, DEFAULT_PORT);
    }
}
