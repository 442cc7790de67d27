//! JSON-over-HTTP client with bounded, constant-delay retries.
//!
//! Every attempt that fails, whether the transport errors or the status is
//! outside 2xx, is retried until `max_attempts` is reached. Client errors
//! (4xx) are retried like server errors.

use crate::config::{ApiEndpoint, RetryPolicy};
use crate::error::{KioskError, Result};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vend_traits::BoxError;
use vend_traits::clock::{Clock, MonotonicClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request. An `Err` means no response was received.
pub trait Transport: Send + Sync {
    fn execute(&self, req: &HttpRequest) -> std::result::Result<HttpResponse, BoxError>;
}

/// Blocking transport over `ureq`; non-2xx statuses come back as responses.
///
/// One agent is kept for the transport's lifetime so keep-alive connections
/// are reused across attempts and posts.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, req: &HttpRequest) -> std::result::Result<HttpResponse, BoxError> {
        let mut call = self.agent.request(req.method, &req.url).timeout(req.timeout);
        for (name, value) in &req.headers {
            call = call.set(name, value);
        }
        let resp = match call.send_bytes(&req.body) {
            Ok(resp) | Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(t)) => return Err(Box::new(t)),
        };
        let status = resp.status();
        let mut body = Vec::new();
        resp.into_reader().read_to_end(&mut body)?;
        Ok(HttpResponse { status, body })
    }
}

/// Telemetry record accepted by `machines/{id}/record_quality/`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityRecord {
    pub tds_level: f64,
    pub ph_level: f64,
    pub water_level: f64,
}

pub struct ApiClient {
    endpoint: ApiEndpoint,
    policy: RetryPolicy,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiClient {
    pub fn new(endpoint: ApiEndpoint, policy: RetryPolicy) -> Self {
        Self::with_transport(endpoint, policy, Box::new(UreqTransport::new()))
    }

    pub fn with_transport(
        endpoint: ApiEndpoint,
        policy: RetryPolicy,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            endpoint,
            policy,
            transport,
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Replace the clock used for inter-attempt delays.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn machine_id(&self) -> &str {
        &self.endpoint.machine_id
    }

    /// `{base_url}/api/{endpoint}`
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.endpoint.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// POST `payload` as JSON and return the body of the first 2xx response.
    pub fn post<P: Serialize + ?Sized>(&self, endpoint: &str, payload: &P) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| eyre::Report::new(KioskError::Serialize(e.to_string())))?;
        let req = HttpRequest {
            method: "POST",
            url: self.url_for(endpoint),
            headers: vec![
                ("Content-Type", "application/json"),
                ("Accept", "application/json"),
            ],
            body,
            timeout: self.policy.timeout,
        };

        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.transport.execute(&req) {
                Ok(resp) if resp.is_success() => {
                    debug!(url = %req.url, attempt, status = resp.status, "request succeeded");
                    return Ok(resp.body);
                }
                Ok(resp) => {
                    warn!(url = %req.url, attempt, max_attempts, status = resp.status, "request failed");
                }
                Err(e) => {
                    warn!(url = %req.url, attempt, max_attempts, error = %e, "request failed");
                }
            }
            if attempt < max_attempts {
                self.clock.sleep(self.policy.delay);
            }
        }
        Err(eyre::Report::new(KioskError::RequestExhausted {
            attempts: max_attempts,
        }))
    }

    pub fn record_quality(&self, record: &QualityRecord) -> Result<Vec<u8>> {
        let endpoint = format!("machines/{}/record_quality/", self.endpoint.machine_id);
        self.post(&endpoint, record)
    }
}
