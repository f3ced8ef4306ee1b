//! Sink selection: where readings go and in which wire dialect.

use std::fmt;

use url::Url;

use crate::config::ConfigError;

/// Wire dialect of the publish endpoint.
///
/// The kind fixes the serialization format, the HTTP method and headers,
/// and the status code that counts as success; keeping the three in one
/// variant is what makes an inconsistent combination unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Generic REST receiver taking one JSON object per reading.
    Rest,
    /// InfluxDB write endpoint taking line-protocol records.
    InfluxLine,
}

impl SinkKind {
    /// Canonical spelling of the configuration token.
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Rest => "REST",
            SinkKind::InfluxLine => "InfluxDB",
        }
    }

    /// Parse a configuration token. Matching is case-insensitive.
    pub fn parse(token: &str) -> Option<SinkKind> {
        if token.eq_ignore_ascii_case("REST") {
            Some(SinkKind::Rest)
        } else if token.eq_ignore_ascii_case("InfluxDB") {
            Some(SinkKind::InfluxLine)
        } else {
            None
        }
    }

    /// HTTP status the sink answers with on a successful write.
    pub fn expected_status(&self) -> u16 {
        match self {
            SinkKind::Rest => 200,
            SinkKind::InfluxLine => 204,
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of the publish endpoint, fixed for the process
/// lifetime.
#[derive(Debug, Clone)]
pub struct SinkTarget {
    pub url: Url,
    pub kind: SinkKind,
}

impl SinkTarget {
    /// Build a target from configuration strings, rejecting anything the
    /// transport could not address.
    pub fn from_config(url: &str, server_type: &str) -> Result<SinkTarget, ConfigError> {
        let kind = SinkKind::parse(server_type).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "Unknown server type {server_type:?}. Must be one of: \"REST\", \"InfluxDB\""
            ))
        })?;
        let url = Url::parse(url).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid sink URL {url:?}: {e}"))
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Sink URL must be http or https, got scheme {other:?}"
                )))
            }
        }
        Ok(SinkTarget { url, kind })
    }
}
