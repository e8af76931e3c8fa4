//! Bounded retry with exponential backoff around one request-and-parse call.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::data_source::ProviderError;
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::throttling::RateLimiter;

/// Retry-After used when a 429 response carries no usable hint.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

const ERROR_BODY_SNIPPET: usize = 200;

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Spread each delay by +/- 50%.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10_000),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based), i.e. before attempt
    /// `retry + 1`: `min(max_delay, initial_delay * multiplier^retry)`.
    pub fn delay(self, retry: u32) -> Duration {
        let scale = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let seconds = self.initial_delay.as_secs_f64() * scale;
        let capped_seconds = seconds.min(self.max_delay.as_secs_f64());
        let delay = Duration::from_secs_f64(capped_seconds.max(0.0));

        if !self.jitter {
            return delay;
        }

        let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
        let random_offset = fastrand::u64(0..=(jitter_ms * 2));
        let total_ms = delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
        Duration::from_millis(total_ms.max(0) as u64)
    }
}

/// Configuration for [`RetryExecutor`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Per-attempt deadline on the network call.
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            request_timeout: Duration::from_millis(10_000),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Runs a request through the shared rate limiter with per-attempt timeout,
/// error classification and backoff.
#[derive(Clone)]
pub struct RetryExecutor {
    http_client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
        config: RetryConfig,
    ) -> Self {
        Self {
            http_client,
            limiter,
            config,
        }
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Sends `request` and hands every 2xx response to `parse`.
    ///
    /// Rate limits, timeouts, connection failures and 5xx responses are retried
    /// up to `max_retries` times. Credential rejections, other non-2xx statuses,
    /// malformed requests and parse failures end the call at once. On
    /// exhaustion the last classified error is returned.
    pub async fn execute<T, P>(&self, request: HttpRequest, parse: P) -> Result<T, ProviderError>
    where
        P: Fn(&HttpResponse) -> Result<T, ProviderError>,
    {
        let timeout = self.config.request_timeout;
        let request = request.with_timeout_ms(timeout.as_millis().min(u128::from(u64::MAX)) as u64);
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.config.backoff.delay(attempt - 1);
                debug!(url = %request.url, attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            self.limiter.acquire_slot().await;
            debug!(url = %request.url, attempt, "sending upstream request");

            let outcome = match tokio::time::timeout(timeout, self.http_client.execute(request.clone())).await {
                Err(_) => Err(ProviderError::TransientNetwork {
                    status: None,
                    message: format!("request timed out after {}ms", timeout.as_millis()),
                }),
                Ok(Err(error)) => Err(classify_transport_error(error)),
                Ok(Ok(response)) => classify_response(&response).and_then(|()| parse(&response)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if error.retryable() => {
                    warn!(
                        url = %request.url,
                        attempt,
                        remaining = attempts - attempt - 1,
                        code = error.code(),
                        "retryable upstream failure: {error}"
                    );
                    last_error = Some(error);
                }
                Err(error) => {
                    warn!(url = %request.url, attempt, code = error.code(), "terminal upstream failure: {error}");
                    return Err(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::transient("no attempt was made")))
    }
}

/// Maps a non-2xx status to its error class. 2xx passes through.
pub fn classify_response(response: &HttpResponse) -> Result<(), ProviderError> {
    if response.is_success() {
        return Ok(());
    }

    let message = body_snippet(&response.body);
    Err(match response.status {
        429 => ProviderError::RateLimited {
            retry_after: response.retry_after().unwrap_or(DEFAULT_RETRY_AFTER),
            message,
        },
        401 | 403 => ProviderError::Configuration {
            message: format!("status {}: {message}", response.status),
        },
        status if status >= 500 => ProviderError::TransientNetwork {
            status: Some(status),
            message,
        },
        status => ProviderError::Http { status, message },
    })
}

pub fn classify_transport_error(error: HttpError) -> ProviderError {
    let message = error.message().to_owned();
    match error.kind() {
        HttpErrorKind::Timeout | HttpErrorKind::Connect | HttpErrorKind::Other => {
            ProviderError::TransientNetwork {
                status: None,
                message,
            }
        }
        HttpErrorKind::MalformedRequest => ProviderError::InvalidRequest { message },
        HttpErrorKind::AuthenticationFailed => ProviderError::Configuration { message },
    }
}

fn body_snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::from("<empty body>");
    }
    trimmed.chars().take(ERROR_BODY_SNIPPET).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_doubles_from_one_second_and_caps_at_ten() {
        let backoff = Backoff::default();

        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(4), Duration::from_secs(10));
        assert_eq!(backoff.delay(40), Duration::from_secs(10));
    }

    #[test]
    fn jittered_backoff_stays_within_half_either_side() {
        let backoff = Backoff {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for retry in 0..5 {
                let delay_ms = backoff.delay(retry).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(retry as i32)).min(1000.0);
                assert!(delay_ms >= expected * 0.49, "retry={retry}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "retry={retry}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn default_config_allows_three_retries() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff, Backoff::default());
    }

    #[test]
    fn rate_limit_defaults_retry_after_to_sixty_seconds() {
        let error = classify_response(&HttpResponse::new(429, "")).expect_err("429 fails");
        assert_eq!(error.retry_after(), Some(DEFAULT_RETRY_AFTER));

        let hinted = classify_response(&HttpResponse::new(429, "").with_header("retry-after", "5"))
            .expect_err("429 fails");
        assert_eq!(hinted.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn statuses_map_to_error_classes() {
        assert!(classify_response(&HttpResponse::new(204, "")).is_ok());
        assert!(matches!(
            classify_response(&HttpResponse::new(401, "nope")),
            Err(ProviderError::Configuration { .. })
        ));
        assert!(matches!(
            classify_response(&HttpResponse::new(403, "nope")),
            Err(ProviderError::Configuration { .. })
        ));
        assert!(matches!(
            classify_response(&HttpResponse::new(503, "")),
            Err(ProviderError::TransientNetwork {
                status: Some(503),
                ..
            })
        ));
        assert!(matches!(
            classify_response(&HttpResponse::new(404, "missing")),
            Err(ProviderError::Http { status: 404, .. })
        ));
    }

    #[test]
    fn transport_failures_map_by_kind() {
        assert!(classify_transport_error(HttpError::timeout("slow")).retryable());
        assert!(matches!(
            classify_transport_error(HttpError::new(HttpErrorKind::MalformedRequest, "bad url")),
            ProviderError::InvalidRequest { .. }
        ));
        assert!(matches!(
            classify_transport_error(HttpError::new(HttpErrorKind::AuthenticationFailed, "denied")),
            ProviderError::Configuration { .. }
        ));
    }
}
