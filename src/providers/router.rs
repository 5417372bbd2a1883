use super::extract::extract_json;
use super::gemini::GeminiProvider;
use super::groq::GroqProvider;
use super::{Provider, ProviderConfig, ProviderError};
use crate::config::ProviderKeys;
use anyhow::Result;
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

/// Delay before the first rate-limit retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Ceiling on any single backoff sleep.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Attempts against one provider before falling through to the next.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Bounded exponential backoff with jitter for rate-limited providers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff for the given zero-based attempt: base * 2^attempt, capped,
    /// plus up to 25% jitter so parallel CI runs don't retry in lockstep.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)));
        let capped = exp.min(self.max_delay);
        let jitter_ceiling = (capped.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_ceiling);
        capped + Duration::from_millis(jitter)
    }
}

/// What the router does when a provider fails.
#[derive(Debug, Clone)]
pub enum FailoverPolicy {
    /// Retry the same provider on HTTP 429, bounded by the policy; any other
    /// failure falls through immediately.
    RetryOnRateLimit(RetryPolicy),
    /// Move to the next provider on the first failure of any kind.
    FallbackOnly,
}

/// One provider in the ordered failover chain.
pub struct Route {
    pub provider: Box<dyn Provider>,
    pub policy: FailoverPolicy,
}

/// Record of how one provider was exhausted, carried in [`RouterError::Exhausted`].
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    pub provider: String,
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("no providers configured")]
    NoProviders,

    #[error("all providers exhausted")]
    Exhausted { attempts: Vec<ProviderAttempt> },
}

/// Ordered failover chain over LLM providers.
///
/// `call` walks the chain in order and returns the first parsed JSON payload.
/// A provider whose response yields no JSON counts as a provider failure.
/// Errors never escape as panics or raw transport errors; callers always get
/// a `Result`.
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Build the chain from whichever API keys are configured. Gemini leads
    /// with rate-limit retries (its free tier throttles aggressively); Groq
    /// is a fallback-only safety net.
    pub fn from_keys(keys: &ProviderKeys) -> Result<Self> {
        let mut routes = Vec::new();

        if let Some(key) = &keys.gemini {
            routes.push(Route {
                provider: Box::new(GeminiProvider::new(ProviderConfig::with_api_key(key))?),
                policy: FailoverPolicy::RetryOnRateLimit(RetryPolicy::default()),
            });
        }
        if let Some(key) = &keys.groq {
            routes.push(Route {
                provider: Box::new(GroqProvider::new(ProviderConfig::with_api_key(key))?),
                policy: FailoverPolicy::FallbackOnly,
            });
        }

        if routes.is_empty() {
            anyhow::bail!("no provider API keys configured (set GEMINI_API_KEY and/or GROQ_API_KEY)");
        }
        Ok(Self::new(routes))
    }

    pub async fn call(&self, system: &str, user: &str) -> Result<Value, RouterError> {
        if self.routes.is_empty() {
            return Err(RouterError::NoProviders);
        }

        let mut exhausted = Vec::new();

        for route in &self.routes {
            let name = route.provider.name();
            let max_attempts = match &route.policy {
                FailoverPolicy::RetryOnRateLimit(policy) => policy.max_attempts.max(1),
                FailoverPolicy::FallbackOnly => 1,
            };

            let mut attempt = 0;
            let last_error = loop {
                attempt += 1;
                info!(provider = name, attempt, "routing prompt to provider");

                match route.provider.call(system, user).await {
                    Ok(text) => match extract_json(&text) {
                        Some(value) => return Ok(value),
                        None => {
                            warn!(provider = name, "response contained no parseable JSON");
                            break "no parseable JSON in response".to_string();
                        }
                    },
                    Err(ProviderError::RateLimited) if attempt < max_attempts => {
                        if let FailoverPolicy::RetryOnRateLimit(policy) = &route.policy {
                            let delay = policy.delay_for(attempt - 1);
                            warn!(
                                provider = name,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "rate limited, backing off before retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        break ProviderError::RateLimited.to_string();
                    }
                    Err(err) => {
                        warn!(provider = name, error = %err, "provider failed, falling through");
                        break err.to_string();
                    }
                }
            };

            exhausted.push(ProviderAttempt {
                provider: name.to_string(),
                attempts: attempt,
                last_error,
            });
        }

        Err(RouterError::Exhausted {
            attempts: exhausted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays a scripted sequence of outcomes.
    struct ScriptedProvider {
        name: &'static str,
        outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(
            name: &'static str,
            outcomes: Vec<Result<String, ProviderError>>,
        ) -> Box<dyn Provider> {
            Box::new(Self {
                name,
                outcomes: Mutex::new(outcomes.into()),
            })
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn call(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        }
    }

    fn fast_retry(max_attempts: u32) -> FailoverPolicy {
        FailoverPolicy::RetryOnRateLimit(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        })
    }

    #[tokio::test]
    async fn test_success_on_first_provider() {
        let router = Router::new(vec![Route {
            provider: ScriptedProvider::new("a", vec![Ok(r#"{"ok":true}"#.to_string())]),
            policy: FailoverPolicy::FallbackOnly,
        }]);

        let value = router.call("s", "u").await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_rate_limit_then_success_within_bound() {
        let router = Router::new(vec![Route {
            provider: ScriptedProvider::new(
                "a",
                vec![
                    Err(ProviderError::RateLimited),
                    Err(ProviderError::RateLimited),
                    Ok(r#"{"a":1}"#.to_string()),
                ],
            ),
            policy: fast_retry(5),
        }]);

        let value = router.call("s", "u").await.unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_rate_limit_exhaustion_falls_through() {
        let router = Router::new(vec![
            Route {
                provider: ScriptedProvider::new(
                    "a",
                    vec![
                        Err(ProviderError::RateLimited),
                        Err(ProviderError::RateLimited),
                        Err(ProviderError::RateLimited),
                    ],
                ),
                policy: fast_retry(3),
            },
            Route {
                provider: ScriptedProvider::new("b", vec![Ok(r#"{"from":"b"}"#.to_string())]),
                policy: FailoverPolicy::FallbackOnly,
            },
        ]);

        let value = router.call("s", "u").await.unwrap();
        assert_eq!(value, json!({"from": "b"}));
    }

    #[tokio::test]
    async fn test_hard_error_falls_through_without_retry() {
        let router = Router::new(vec![
            Route {
                provider: ScriptedProvider::new(
                    "a",
                    vec![Err(ProviderError::Api {
                        status: 500,
                        body: "boom".to_string(),
                    })],
                ),
                policy: fast_retry(5),
            },
            Route {
                provider: ScriptedProvider::new("b", vec![Ok(r#"{"from":"b"}"#.to_string())]),
                policy: FailoverPolicy::FallbackOnly,
            },
        ]);

        let value = router.call("s", "u").await.unwrap();
        assert_eq!(value, json!({"from": "b"}));
    }

    #[tokio::test]
    async fn test_unparseable_response_falls_through() {
        let router = Router::new(vec![
            Route {
                provider: ScriptedProvider::new("a", vec![Ok("not json at all".to_string())]),
                policy: FailoverPolicy::FallbackOnly,
            },
            Route {
                provider: ScriptedProvider::new("b", vec![Ok(r#"{"from":"b"}"#.to_string())]),
                policy: FailoverPolicy::FallbackOnly,
            },
        ]);

        let value = router.call("s", "u").await.unwrap();
        assert_eq!(value, json!({"from": "b"}));
    }

    #[tokio::test]
    async fn test_all_providers_exhausted() {
        let router = Router::new(vec![
            Route {
                provider: ScriptedProvider::new("a", vec![Err(ProviderError::RateLimited)]),
                policy: fast_retry(1),
            },
            Route {
                provider: ScriptedProvider::new(
                    "b",
                    vec![Err(ProviderError::Api {
                        status: 503,
                        body: "down".to_string(),
                    })],
                ),
                policy: FailoverPolicy::FallbackOnly,
            },
        ]);

        let err = router.call("s", "u").await.unwrap_err();
        match err {
            RouterError::Exhausted { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].provider, "a");
                assert_eq!(attempts[1].provider, "b");
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_reports_no_providers() {
        let router = Router::new(Vec::new());
        assert!(matches!(
            router.call("s", "u").await,
            Err(RouterError::NoProviders)
        ));
    }
}
