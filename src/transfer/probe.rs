//! Header-only existence and size probes

use crate::config::RetryConfig;
use crate::error::{Error, ProbeStatus, TransferError};
use crate::retry::with_retry;
use reqwest::header::CONTENT_LENGTH;

/// Outcome of probing one source URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    /// URL that was probed (after any mirror rewrite)
    pub url: String,
    /// Status of the final attempt, `None` when no response arrived or the URL was empty
    pub status: ProbeStatus,
    /// Reported `Content-Length`
    pub size: Option<u64>,
}

impl Probe {
    fn unanswered(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: ProbeStatus(None),
            size: None,
        }
    }

    /// Status in 200..=399
    pub fn is_ok(&self) -> bool {
        matches!(self.status.0, Some(200..=399))
    }

    /// Usable as a transfer source: answered with an ok status and a known size
    pub fn is_usable(&self) -> bool {
        self.is_ok() && self.size.is_some()
    }
}

/// Probe `url` with a HEAD request
///
/// Connection failures and retryable statuses (408, 429, 5xx) are retried per `retry`.
/// The probe never fails: an unreachable source is reported with status `None`.
pub(crate) async fn probe(http: &reqwest::Client, retry: &RetryConfig, url: &str) -> Probe {
    if url.is_empty() {
        return Probe::unanswered(url);
    }

    let result = with_retry(retry, "probe", || head_once(http, url)).await;

    match result {
        Ok((status, size)) => {
            tracing::debug!(url, status, size, "Probe answered");
            Probe {
                url: url.to_string(),
                status: ProbeStatus(Some(status)),
                size,
            }
        }
        Err(Error::Transfer(TransferError::HttpStatus { status, .. })) => {
            tracing::debug!(url, status, "Probe answered with retryable status");
            Probe {
                url: url.to_string(),
                status: ProbeStatus(Some(status)),
                size: None,
            }
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "Probe received no response");
            Probe::unanswered(url)
        }
    }
}

async fn head_once(http: &reqwest::Client, url: &str) -> crate::Result<(u16, Option<u64>)> {
    let response = http.head(url).send().await?;
    let status = response.status().as_u16();
    if status == 408 || status == 429 || response.status().is_server_error() {
        return Err(TransferError::HttpStatus {
            url: url.to_string(),
            status,
        }
        .into());
    }
    // read the header directly; the body of a HEAD response is always empty
    let size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    Ok((status, size))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn ok_probe_reports_status_and_size() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v.m4s"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]))
            .mount(&server)
            .await;

        let url = format!("{}/v.m4s", server.uri());
        let probe = probe(&reqwest::Client::new(), &fast_retry(), &url).await;

        assert_eq!(probe.status, ProbeStatus(Some(200)));
        assert_eq!(probe.size, Some(2048));
        assert!(probe.is_usable());
    }

    #[tokio::test]
    async fn not_found_is_answered_but_unusable() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/gone.m4s", server.uri());
        let probe = probe(&reqwest::Client::new(), &fast_retry(), &url).await;

        assert_eq!(probe.status, ProbeStatus(Some(404)));
        assert!(!probe.is_ok());
        assert!(!probe.is_usable());
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = format!("{}/busy.m4s", server.uri());
        let probe = probe(&reqwest::Client::new(), &fast_retry(), &url).await;

        assert_eq!(probe.status, ProbeStatus(Some(503)));
        assert!(!probe.is_usable());
    }

    #[tokio::test]
    async fn empty_url_is_not_requested() {
        let probe = probe(&reqwest::Client::new(), &fast_retry(), "").await;
        assert_eq!(probe.status, ProbeStatus(None));
        assert!(!probe.is_usable());
    }

    #[tokio::test]
    async fn unreachable_host_has_no_status() {
        // port 9 (discard) on loopback is closed in test environments
        let probe = probe(&reqwest::Client::new(), &fast_retry(), "http://127.0.0.1:9/v.m4s").await;
        assert_eq!(probe.status, ProbeStatus(None));
    }

    #[test]
    fn redirect_statuses_count_as_ok() {
        let probe = Probe {
            url: "u".into(),
            status: ProbeStatus(Some(302)),
            size: Some(1),
        };
        assert!(probe.is_ok());
        assert!(probe.is_usable());
    }
}
