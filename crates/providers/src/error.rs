use std::fmt;

/// Why a provider call failed.
///
/// Every variant except [`ProviderError::Exhausted`] and
/// [`ProviderError::NoProviders`] describes a single provider; the chains
/// advance to the next provider on any of them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("circuit breaker open")]
    CircuitOpen,

    #[error("all providers failed: {}", FailureList(failures))]
    Exhausted { failures: Vec<ProviderFailure> },

    #[error("no providers configured")]
    NoProviders,
}

impl ProviderError {
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unreachable(_) => "unreachable",
            Self::Http { .. } => "http",
            Self::Malformed(_) => "malformed",
            Self::CircuitOpen => "circuit_open",
            Self::Exhausted { .. } => "exhausted",
            Self::NoProviders => "no_providers",
        }
    }

    /// `true` once no provider is left to try.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::NoProviders)
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                after_ms: timeout_ms,
            }
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    /// Map a non-2xx response to a typed error.
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Self::RateLimited { retry_after_secs };
        }
        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > 200 {
            let cut = (0..=200).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
            body.truncate(cut);
        }
        Self::Http {
            status: status.as_u16(),
            body,
        }
    }
}

/// One provider's failure inside an aggregated [`ProviderError::Exhausted`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub error: ProviderError,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.error)
    }
}

struct FailureList<'a>(&'a [ProviderFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
