//! The probe collaborator: one HTTP(S) GET per URL.
//!
//! The engine only depends on the [`Prober`] trait. [`HttpProber`] is the
//! reqwest-backed implementation used by the binary: HTTPS first, plain
//! HTTP fallback, linear retry backoff, and title extraction for accepted
//! responses.

use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{redirect, Client, Response};
use spray_core::HttpSettings;
use std::fmt;
use std::time::{Duration, Instant};

/// Base delay between retries; attempt `n` waits `n * RETRY_DELAY_MS`.
const RETRY_DELAY_MS: u64 = 100;

/// Body bytes read when looking for a title.
const MAX_TITLE_BODY_BYTES: usize = 1024 * 1024;

static TITLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").expect("Title regex is hardcoded and valid")
});

const NAME_RESOLUTION_MARKERS: &[&str] = &[
    "no such host",
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "name resolution",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline exceeded"];

/// Coarse classification of a failed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    /// The host does not resolve; the candidate most likely doesn't exist
    NameResolution,
    /// The attempt ran out of time
    Timeout,
    /// Any other connection, TLS or protocol failure
    Transport,
}

/// A failed probe, classified from its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    /// Classify an error message.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_error(&message),
            message,
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Classify an error message by its content. Timeout wins over name
/// resolution when both appear (e.g. a resolver that timed out).
#[must_use]
pub fn classify_error(message: &str) -> ProbeErrorKind {
    let lower = message.to_lowercase();
    if TIMEOUT_MARKERS.iter().any(|m| lower.contains(m)) {
        ProbeErrorKind::Timeout
    } else if NAME_RESOLUTION_MARKERS.iter().any(|m| lower.contains(m)) {
        ProbeErrorKind::NameResolution
    } else {
        ProbeErrorKind::Transport
    }
}

/// What one probe produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// URL actually requested (may differ from the built URL after fallback)
    pub url: String,
    pub status_code: Option<u16>,
    /// `-1` when unknown
    pub content_length: i64,
    pub response_time_ms: u64,
    pub title: Option<String>,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    /// Outcome for an HTTP response.
    #[must_use]
    pub fn response(url: impl Into<String>, status_code: u16, content_length: i64) -> Self {
        Self {
            url: url.into(),
            status_code: Some(status_code),
            content_length,
            response_time_ms: 0,
            title: None,
            error: None,
        }
    }

    /// Outcome for a failed attempt.
    #[must_use]
    pub fn failure(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status_code: None,
            content_length: -1,
            response_time_ms: 0,
            title: None,
            error: Some(ProbeError::from_message(message)),
        }
    }
}

/// Performs one probe for a fully-formed URL.
///
/// Implementations enforce their own timeout; a call always returns an
/// outcome rather than an error.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Extract and trim the first `<title>` of an HTML document.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Render an error with its whole source chain; reqwest's top-level
/// message alone hides the DNS or timeout cause.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// reqwest-backed prober.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    retries: u32,
    http_fallback: bool,
    title_statuses: Vec<u16>,
}

impl HttpProber {
    /// Build the client from HTTP settings. `title_statuses` are the
    /// status codes whose bodies are read for a title.
    pub fn new(settings: &HttpSettings, title_statuses: Vec<u16>) -> Result<Self> {
        let redirect_policy = if settings.follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };

        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .redirect(redirect_policy)
            .danger_accept_invalid_certs(settings.insecure_tls)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            retries: settings.retries,
            http_fallback: !settings.disable_http_fallback,
            title_statuses,
        })
    }

    /// GET with linear backoff between attempts.
    async fn get_with_retry(&self, url: &str) -> std::result::Result<Response, reqwest::Error> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tracing::debug!(
                        "Request to {} failed (attempt {}/{}), retrying in {:?}: {}",
                        url,
                        attempt,
                        self.retries + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read at most `MAX_TITLE_BODY_BYTES` of the body.
    async fn read_body_prefix(response: &mut Response) -> Option<Vec<u8>> {
        let mut body = Vec::new();
        while body.len() < MAX_TITLE_BODY_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = MAX_TITLE_BODY_BYTES - body.len();
                    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Failed to read body: {}", e);
                    return None;
                }
            }
        }
        Some(body)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// HTTPS form of a URL; bare hosts get a scheme.
fn https_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else if url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();
        let secure_url = https_url(url);

        let mut requested = secure_url.clone();
        let mut result = self.get_with_retry(&secure_url).await;
        if result.is_err() && self.http_fallback {
            let plain_url = secure_url.replacen("https://", "http://", 1);
            if let Ok(response) = self.get_with_retry(&plain_url).await {
                requested = plain_url;
                result = Ok(response);
            }
        }

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                let mut outcome = ProbeOutcome::failure(requested, error_chain(&e));
                if e.is_timeout() {
                    if let Some(error) = outcome.error.as_mut() {
                        error.kind = ProbeErrorKind::Timeout;
                    }
                }
                outcome.response_time_ms = elapsed_ms(start);
                return outcome;
            }
        };

        let status = response.status().as_u16();
        let announced = response
            .content_length()
            .and_then(|len| i64::try_from(len).ok());

        let mut outcome = ProbeOutcome::response(requested, status, announced.unwrap_or(-1));

        if self.title_statuses.contains(&status) {
            if let Some(body) = Self::read_body_prefix(&mut response).await {
                if announced.is_none() && body.len() < MAX_TITLE_BODY_BYTES {
                    outcome.content_length = i64::try_from(body.len()).unwrap_or(-1);
                }
                outcome.title = extract_title(&String::from_utf8_lossy(&body));
            }
        }

        outcome.response_time_ms = elapsed_ms(start);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_name_resolution() {
        assert_eq!(
            classify_error("dial tcp: lookup api.a.test: no such host"),
            ProbeErrorKind::NameResolution
        );
        assert_eq!(
            classify_error("error sending request: dns error: failed to lookup address information"),
            ProbeErrorKind::NameResolution
        );
    }

    #[test]
    fn test_classify_timeout() {
        assert_eq!(
            classify_error("context deadline exceeded"),
            ProbeErrorKind::Timeout
        );
        assert_eq!(
            classify_error("operation timed out"),
            ProbeErrorKind::Timeout
        );
    }

    #[test]
    fn test_classify_timeout_wins_over_name_resolution() {
        assert_eq!(
            classify_error("dns error: failed to lookup address: operation timed out"),
            ProbeErrorKind::Timeout
        );
        assert_eq!(
            classify_error("lookup api.a.test on 10.0.0.1:53: i/o timeout"),
            ProbeErrorKind::Timeout
        );
    }

    #[test]
    fn test_classify_transport() {
        assert_eq!(
            classify_error("tls handshake failure"),
            ProbeErrorKind::Transport
        );
        assert_eq!(
            classify_error("connection refused"),
            ProbeErrorKind::Transport
        );
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE lang=\"en\"> Admin Panel </TITLE></head>"),
            Some("Admin Panel".to_string())
        );
        assert_eq!(extract_title("<html><body>nothing</body></html>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
    }

    #[test]
    fn test_https_url() {
        assert_eq!(https_url("http://a.test/x"), "https://a.test/x");
        assert_eq!(https_url("https://a.test/x"), "https://a.test/x");
        assert_eq!(https_url("a.test/x"), "https://a.test/x");
    }

    #[test]
    fn test_failure_outcome_is_classified() {
        let outcome = ProbeOutcome::failure("https://a.test", "no such host");
        assert_eq!(outcome.status_code, None);
        assert_eq!(outcome.content_length, -1);
        assert_eq!(
            outcome.error.map(|e| e.kind),
            Some(ProbeErrorKind::NameResolution)
        );
    }
}
