use crate::config::ProviderConfig;
use crate::provider::ApiClient;
use crate::{QuarryError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Extra seconds slept past the advertised reset time
///
/// The platform's reset clock is coarse; resets observed in practice lag
/// the advertised timestamp by a few seconds.
const RESET_GRACE_SECS: i64 = 30;

/// One credential plus its last observed quota state
#[derive(Debug, Clone)]
pub struct Identity {
    pub token: String,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Pool of independent API identities
///
/// Selection policy: the identity with the largest remaining quota wins.
/// Reset times only matter once every identity is exhausted, at which point
/// the pool sleeps until the soonest reset (capped) and re-probes.
pub struct IdentityPool {
    identities: Vec<Identity>,
    max_wait: Duration,
    attempts: u32,
}

impl IdentityPool {
    pub fn new(tokens: Vec<String>, max_wait: Duration, attempts: u32) -> Self {
        let identities = tokens
            .into_iter()
            .map(|token| Identity {
                token,
                remaining: 0,
                reset_at: Utc::now(),
            })
            .collect();
        Self {
            identities,
            max_wait,
            attempts,
        }
    }

    pub fn from_config(provider: &ProviderConfig) -> Self {
        Self::new(
            provider.tokens.clone(),
            Duration::from_secs(provider.max_wait_minutes * 60),
            provider.acquire_attempts,
        )
    }

    /// Acquires an identity with positive remaining quota
    ///
    /// Probes every identity's quota through the rate-limit endpoint and
    /// returns the one with the most calls left. When all are exhausted,
    /// sleeps until the soonest reset clock (plus grace, capped at the
    /// configured maximum wait) and re-checks, up to the attempt budget.
    ///
    /// # Errors
    ///
    /// `QuarryError::QuotaUnavailable` when no identity regains quota
    /// within the attempt budget. This is fatal for the calling run.
    pub async fn acquire(&mut self, api: &ApiClient) -> Result<Identity> {
        for attempt in 1..=self.attempts {
            self.refresh(api).await;

            if let Some(best) = self.best() {
                tracing::debug!(
                    "Acquired identity with {} API calls remaining",
                    best.remaining
                );
                return Ok(best.clone());
            }

            let wait = self.time_until_soonest_reset();
            tracing::info!(
                "All {} identities exhausted, waiting {} s for quota reset (attempt {}/{})",
                self.identities.len(),
                wait.as_secs(),
                attempt,
                self.attempts
            );
            tokio::time::sleep(wait).await;
        }

        tracing::info!("API calls were not granted");
        Err(QuarryError::QuotaUnavailable {
            attempts: self.attempts,
        })
    }

    /// Re-probes every identity's quota, keeping stale values on probe failure
    async fn refresh(&mut self, api: &ApiClient) {
        for identity in &mut self.identities {
            match api.rate_limit_with_token(&identity.token).await {
                Ok(status) => {
                    identity.remaining = status.remaining;
                    identity.reset_at = status.reset_at;
                }
                Err(e) => {
                    tracing::warn!("Quota probe failed, keeping stale state: {}", e);
                }
            }
        }
    }

    /// The identity with the largest positive remaining quota, if any
    fn best(&self) -> Option<&Identity> {
        self.identities
            .iter()
            .filter(|identity| identity.remaining > 0)
            .max_by_key(|identity| identity.remaining)
    }

    /// Sleep duration until the soonest reset clock, with grace and cap
    fn time_until_soonest_reset(&self) -> Duration {
        let soonest = self
            .identities
            .iter()
            .map(|identity| identity.reset_at)
            .min()
            .unwrap_or_else(Utc::now);
        let seconds = (soonest - Utc::now()).num_seconds().max(0) + RESET_GRACE_SECS;
        Duration::from_secs(seconds as u64).min(self.max_wait)
    }

    #[cfg(test)]
    fn set_observed(&mut self, index: usize, remaining: u32, reset_at: DateTime<Utc>) {
        self.identities[index].remaining = remaining;
        self.identities[index].reset_at = reset_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::build_api_client;
    use chrono::Duration as ChronoDuration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pool_with(tokens: &[&str]) -> IdentityPool {
        IdentityPool::new(
            tokens.iter().map(|t| t.to_string()).collect(),
            Duration::from_secs(3000),
            3,
        )
    }

    #[test]
    fn test_best_prefers_largest_remaining() {
        let mut pool = pool_with(&["a", "b", "c"]);
        let now = Utc::now();
        pool.set_observed(0, 5, now);
        pool.set_observed(1, 90, now);
        pool.set_observed(2, 12, now);

        assert_eq!(pool.best().unwrap().token, "b");
    }

    #[test]
    fn test_best_ignores_exhausted_identities() {
        let mut pool = pool_with(&["a", "b"]);
        pool.set_observed(0, 0, Utc::now());
        pool.set_observed(1, 0, Utc::now());

        assert!(pool.best().is_none());
    }

    #[test]
    fn test_wait_is_capped() {
        let mut pool = IdentityPool::new(
            vec!["a".to_string()],
            Duration::from_secs(60),
            3,
        );
        pool.set_observed(0, 0, Utc::now() + ChronoDuration::hours(5));

        assert_eq!(pool.time_until_soonest_reset(), Duration::from_secs(60));
    }

    fn rate_limit_body(remaining: u32, reset: i64) -> String {
        format!(
            r#"{{"resources": {{"core": {{"remaining": {}, "reset": {}}}}}}}"#,
            remaining, reset
        )
    }

    #[tokio::test]
    async fn test_acquire_returns_identity_with_quota_without_sleeping() {
        let server = MockServer::start().await;
        let reset_soon = (Utc::now() + ChronoDuration::seconds(5)).timestamp();

        // Identity A: quota 0, resets in 5 s. Identity B: quota 10.
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .and(header("authorization", "Bearer token-a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rate_limit_body(0, reset_soon), "application/json"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .and(header("authorization", "Bearer token-b"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rate_limit_body(10, reset_soon), "application/json"),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(
            build_api_client().unwrap(),
            &server.uri(),
            "token-a".to_string(),
        )
        .unwrap();
        let mut pool = pool_with(&["token-a", "token-b"]);

        let started = std::time::Instant::now();
        let identity = pool.acquire(&api).await.unwrap();

        // B must be returned immediately, not after waiting for A's reset.
        assert_eq!(identity.token, "token-b");
        assert_eq!(identity.remaining, 10);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_acquire_fails_after_attempt_budget() {
        let server = MockServer::start().await;
        let reset_now = Utc::now().timestamp();

        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(rate_limit_body(0, reset_now), "application/json"),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(
            build_api_client().unwrap(),
            &server.uri(),
            "token-a".to_string(),
        )
        .unwrap();
        // Zero-second cap so the test does not actually sleep the grace.
        let mut pool = IdentityPool::new(
            vec!["token-a".to_string()],
            Duration::from_secs(0),
            2,
        );

        let result = pool.acquire(&api).await;
        assert!(matches!(
            result,
            Err(QuarryError::QuotaUnavailable { attempts: 2 })
        ));
    }
}
