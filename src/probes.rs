use crate::models::{CanonicalNumber, ProbeId, ProbeResult, ProbeStatus};
use async_trait::async_trait;
use std::fmt;

/// Why a probe produced no conclusive answer.
///
/// Never leaves the scheduler: every failure is folded into a degraded
/// [`ProbeResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    MissingCredentials,
    Timeout,
    CircuitOpen,
    /// Unexpected HTTP status from the source.
    Http { status: u16 },
    /// The source answered but reported an error in its body.
    Api(String),
    Network(String),
    Decode(String),
}

impl ProbeFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ProbeFailure::MissingCredentials => "missing_credentials",
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::CircuitOpen => "circuit_open",
            ProbeFailure::Http { .. } => "http_error",
            ProbeFailure::Api(_) => "api_error",
            ProbeFailure::Network(_) => "network_error",
            ProbeFailure::Decode(_) => "decode_error",
        }
    }

    /// Missing credentials is `unknown`; everything else is `failed`.
    pub fn into_result(self, probe: ProbeId) -> ProbeResult {
        let status = match self {
            ProbeFailure::MissingCredentials => ProbeStatus::Unknown,
            _ => ProbeStatus::Failed,
        };
        ProbeResult::degraded(probe, status, self.reason())
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::MissingCredentials => write!(f, "no credential configured"),
            ProbeFailure::Timeout => write!(f, "timed out"),
            ProbeFailure::CircuitOpen => write!(f, "circuit open"),
            ProbeFailure::Http { status } => write!(f, "unexpected HTTP status {}", status),
            ProbeFailure::Api(msg) => write!(f, "source error: {}", msg),
            ProbeFailure::Network(msg) => write!(f, "request failed: {}", msg),
            ProbeFailure::Decode(msg) => write!(f, "unreadable response: {}", msg),
        }
    }
}

impl From<reqwest::Error> for ProbeFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeFailure::Timeout
        } else if err.is_decode() {
            ProbeFailure::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ProbeFailure::Http {
                status: status.as_u16(),
            }
        } else {
            // Drop the URL: it may carry an API key.
            ProbeFailure::Network(err.without_url().to_string())
        }
    }
}

/// One external capability queried for a number.
///
/// Implementations are stateless apart from their HTTP client; timeouts are
/// enforced by the caller.
#[async_trait]
pub trait SourceProbe: Send + Sync {
    fn id(&self) -> ProbeId;

    async fn execute(
        &self,
        number: &CanonicalNumber,
        credential: Option<&str>,
    ) -> Result<ProbeResult, ProbeFailure>;
}
