//! HTTP fetching with policy-driven retry.
//!
//! All source fetchers go through [`fetch_text`] so every request gets
//! the same treatment: a fixed sleep between attempts, retry only on the
//! configured status codes, and a terminal [`SourceError::Fetch`] once
//! attempts are exhausted. The delay is deliberately fixed rather than
//! exponential — these are low-frequency batch pulls.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::SourceError;

/// Default number of attempts per request (first try included).
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default sleep between attempts, in seconds.
const DEFAULT_RETRY_SLEEP_SECS: u64 = 5;

/// Status codes that trigger a retry by default.
const DEFAULT_RETRY_STATUSES: &[u16] = &[503];

/// Process-wide retry configuration, overridable per deployment through
/// the environment:
///
/// - `OBS_SYNC_RETRY_ATTEMPTS` — total attempts per request
/// - `OBS_SYNC_RETRY_SLEEP` — seconds between attempts
/// - `OBS_SYNC_RETRY_STATUS` — comma-separated retryable status codes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, first try included.
    pub max_attempts: u32,
    /// Status codes that trigger a retry.
    pub retry_statuses: BTreeSet<u16>,
    /// Fixed sleep between attempts.
    pub retry_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_statuses: DEFAULT_RETRY_STATUSES.iter().copied().collect(),
            retry_sleep: Duration::from_secs(DEFAULT_RETRY_SLEEP_SECS),
        }
    }
}

impl RetryPolicy {
    /// Builds the policy from environment overrides, falling back to the
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut policy = Self::default();

        if let Some(attempts) = env_parse::<u32>("OBS_SYNC_RETRY_ATTEMPTS") {
            policy.max_attempts = attempts.max(1);
        }
        if let Some(sleep) = env_parse::<u64>("OBS_SYNC_RETRY_SLEEP") {
            policy.retry_sleep = Duration::from_secs(sleep);
        }
        if let Ok(statuses) = std::env::var("OBS_SYNC_RETRY_STATUS") {
            let parsed: BTreeSet<u16> = statuses
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !parsed.is_empty() {
                policy.retry_statuses = parsed;
            }
        }

        policy
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

/// What to do with a response, given its status and how many attempts
/// have been made so far (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 200 — use the body.
    Success,
    /// Retryable status with attempts remaining — sleep and retry.
    Retry,
    /// Non-retryable status, or attempts exhausted — fail the run.
    Fatal,
}

/// Classifies one response within the retry loop.
#[must_use]
pub fn classify(status: u16, attempt: u32, policy: &RetryPolicy) -> Disposition {
    if status == 200 {
        Disposition::Success
    } else if policy.retry_statuses.contains(&status) && attempt < policy.max_attempts {
        Disposition::Retry
    } else {
        Disposition::Fatal
    }
}

/// Issues a GET and returns the response body, retrying per the policy.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] with the URL and last status code on a
/// non-retryable status or once attempts are exhausted, and
/// [`SourceError::Http`] on transport failures (never retried).
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(String, String)],
    policy: &RetryPolicy,
) -> Result<String, SourceError> {
    for attempt in 1..=policy.max_attempts {
        let response = client.get(url).query(query).send().await?;
        let status = response.status().as_u16();

        match classify(status, attempt, policy) {
            Disposition::Success => return Ok(response.text().await?),
            Disposition::Retry => {
                log::warn!(
                    "HTTP {status} from {url}, retry {attempt}/{} in {:?}",
                    policy.max_attempts - 1,
                    policy.retry_sleep,
                );
                tokio::time::sleep(policy.retry_sleep).await;
            }
            Disposition::Fatal => {
                return Err(SourceError::Fetch {
                    url: url.to_string(),
                    status,
                });
            }
        }
    }

    // The loop always returns: the last attempt classifies as Success or
    // Fatal since `attempt < max_attempts` no longer holds.
    unreachable!("retry loop exited without returning")
}
