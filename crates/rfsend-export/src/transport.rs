//! Single-exchange HTTP transport.
//!
//! One client is built for the process; each publish runs exactly one
//! request/response cycle against the configured sink and tears its
//! connection down afterwards. No retries, no redirect games, no pooling.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONNECTION, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::{debug, trace};

use rfsend_core::{SinkKind, SinkTarget};

use crate::response::ResponseSink;

/// Outcome of one publish exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// The sink acknowledged the write with its expected status.
    pub success: bool,

    /// Status received, or 0 when the exchange died before a status line.
    pub http_status: u16,

    /// Transport-level failure description, when one occurred.
    pub transport_error: Option<String>,
}

impl PublishOutcome {
    fn success(http_status: u16) -> Self {
        Self {
            success: true,
            http_status,
            transport_error: None,
        }
    }

    fn unexpected_status(http_status: u16) -> Self {
        Self {
            success: false,
            http_status,
            transport_error: None,
        }
    }

    fn failed(error: &reqwest::Error) -> Self {
        Self {
            success: false,
            http_status: 0,
            transport_error: Some(error.to_string()),
        }
    }

    fn aborted(http_status: u16, error: &reqwest::Error) -> Self {
        Self {
            success: false,
            http_status,
            transport_error: Some(format!("response transfer aborted: {error}")),
        }
    }
}

/// Options the transport honors beyond the target itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportOptions {
    /// Per-request timeout. `None` waits as long as the server does.
    pub timeout: Option<Duration>,
}

/// HTTP client bound to one sink target for the life of the process.
#[derive(Debug)]
pub struct TransportClient {
    client: Client,
    target: SinkTarget,
}

impl TransportClient {
    /// Build the process-wide client.
    ///
    /// Pooling is disabled and the client is pinned to HTTP/1.1, so each
    /// publish opens its own connection and `Connection: close` means what
    /// it says.
    pub fn new(target: SinkTarget, options: TransportOptions) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .user_agent(format!("rfsend/{}", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(0)
            .http1_only()
            .gzip(true);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            target,
        })
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    /// Run one request/response exchange, capturing the body through
    /// `sink`. The body is drained to its end even once the sink is full.
    pub async fn send(&self, payload: &[u8], sink: &mut ResponseSink) -> PublishOutcome {
        sink.reset();

        let mut request = self
            .client
            .request(self.method(), self.target.url.clone())
            .body(payload.to_vec());
        if self.target.kind == SinkKind::Rest {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .header("charsets", "utf-8")
                .header(CONNECTION, "close");
        }

        trace!(
            method = %self.method(),
            url = %self.target.url,
            bytes = payload.len(),
            "sending request"
        );
        let mut response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "request failed before a status line");
                return PublishOutcome::failed(&e);
            }
        };
        let status = response.status().as_u16();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    trace!(bytes = chunk.len(), "receiving");
                    sink.write(&chunk);
                }
                Ok(None) => break,
                Err(e) => return PublishOutcome::aborted(status, &e),
            }
        }

        if status == self.target.kind.expected_status() {
            PublishOutcome::success(status)
        } else {
            PublishOutcome::unexpected_status(status)
        }
    }

    fn method(&self) -> Method {
        match self.target.kind {
            SinkKind::Rest => Method::PUT,
            SinkKind::InfluxLine => Method::POST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(kind: &str) -> SinkTarget {
        SinkTarget::from_config("http://127.0.0.1:9/data", kind).unwrap()
    }

    #[test]
    fn test_method_per_kind() {
        let client = TransportClient::new(target("REST"), TransportOptions::default()).unwrap();
        assert_eq!(client.method(), Method::PUT);
        let client = TransportClient::new(target("InfluxDB"), TransportOptions::default()).unwrap();
        assert_eq!(client.method(), Method::POST);
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = PublishOutcome::success(204);
        assert!(ok.success);
        assert_eq!(ok.http_status, 204);
        assert!(ok.transport_error.is_none());

        let bad = PublishOutcome::unexpected_status(500);
        assert!(!bad.success);
        assert_eq!(bad.http_status, 500);
        assert!(bad.transport_error.is_none());
    }
}
