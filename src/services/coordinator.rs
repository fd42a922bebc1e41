//! Request coordination over an unreliable backend
//!
//! Reads are deduplicated: concurrent calls with the same [`CacheKey`] inside the dedup window
//! await one shared in-flight future, whose cache entry is dropped as soon as it completes.
//! Every call is bounded by a per-attempt timeout and retried on transient failures with
//! exponential backoff. Mutations are never deduplicated, get at most one extra attempt, and
//! are not retried after a timeout: a transient failure surfacing from a mutation is flagged
//! `may_have_applied` so the caller re-reads state instead of blindly resubmitting.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::{
    config::CoordinatorConfig,
    error::{AppError, AppResult, TransientKind},
};

type SharedValue = Arc<dyn Any + Send + Sync>;
type InflightFuture = Shared<BoxFuture<'static, AppResult<SharedValue>>>;

/// Identity of a read: caller, operation and serialized parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    key: String,
}

impl CacheKey {
    pub fn new<P: Serialize + fmt::Debug + ?Sized>(caller: Option<&str>, operation: &str, params: &P) -> Self {
        // Parameters JSON cannot represent (e.g. non-string map keys) fall back to their Debug form
        let params = serde_json::to_string(params).unwrap_or_else(|_| format!("{:?}", params));
        Self {
            operation: operation.to_string(),
            key: format!("{}|{}|{}", caller.unwrap_or("-"), operation, params),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

struct InflightEntry {
    generation: u64,
    started: Instant,
    future: InflightFuture,
}

/// In-flight read registry owned by one coordinator
pub struct InflightCache {
    window: Duration,
    entries: Mutex<HashMap<CacheKey, InflightEntry>>,
    generations: AtomicU64,
}

impl InflightCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, InflightEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Join the fresh in-flight future for `key`, or register the one built by `make`
    fn join_or_insert<F>(&self, key: &CacheKey, make: F) -> (InflightFuture, bool)
    where
        F: FnOnce(u64) -> InflightFuture,
    {
        let mut entries = self.entries();
        if let Some(entry) = entries.get(key) {
            if entry.started.elapsed() < self.window {
                return (entry.future.clone(), true);
            }
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let future = make(generation);
        entries.insert(
            key.clone(),
            InflightEntry {
                generation,
                started: Instant::now(),
                future: future.clone(),
            },
        );
        (future, false)
    }

    /// Drop the entry registered under `generation`; a newer entry for the key is kept
    fn complete(&self, key: &CacheKey, generation: u64) {
        let mut entries = self.entries();
        if entries.get(key).map(|e| e.generation) == Some(generation) {
            entries.remove(key);
        }
    }

    /// Evict entries older than the dedup window
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.started.elapsed() < self.window);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Attempt bound, backoff and per-attempt timeout for one class of calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay after the failed attempt number `attempt` (1-based): `base × 2^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct RequestCoordinator {
    cache: Arc<InflightCache>,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
    batch_policy: RetryPolicy,
}

impl RequestCoordinator {
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self::with_cache(config, Arc::new(InflightCache::new(config.dedup_window())))
    }

    /// Coordinator using an injected cache
    pub fn with_cache(config: &CoordinatorConfig, cache: Arc<InflightCache>) -> Self {
        let base_delay = Duration::from_millis(config.base_backoff_ms);
        let max_delay = Duration::from_millis(config.max_backoff_ms);
        let write_attempts = config.max_write_attempts.clamp(1, 2);

        Self {
            cache,
            read_policy: RetryPolicy {
                max_attempts: config.max_read_attempts.max(1),
                base_delay,
                max_delay,
                timeout: Duration::from_millis(config.read_timeout_ms),
            },
            write_policy: RetryPolicy {
                max_attempts: write_attempts,
                base_delay,
                max_delay,
                timeout: Duration::from_millis(config.write_timeout_ms),
            },
            batch_policy: RetryPolicy {
                max_attempts: write_attempts,
                base_delay,
                max_delay,
                timeout: Duration::from_millis(config.batch_timeout_ms),
            },
        }
    }

    pub fn cache(&self) -> &InflightCache {
        &self.cache
    }

    /// Deduplicated, retried read
    pub async fn read<T, F, Fut>(&self, key: CacheKey, op: F) -> AppResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let policy = self.read_policy;
        let cache = Arc::clone(&self.cache);
        let entry_key = key.clone();

        let (future, joined) = self.cache.join_or_insert(&key, move |generation| {
            async move {
                let result = run_with_retry(entry_key.operation(), policy, false, op)
                    .await
                    .map(|value| Arc::new(value) as SharedValue);
                cache.complete(&entry_key, generation);
                result
            }
            .boxed()
            .shared()
        });

        if joined {
            tracing::debug!("Joining in-flight request {}", key);
        }

        let value = future.await?;
        value
            .downcast::<T>()
            .map(|v| (*v).clone())
            .map_err(|_| AppError::Internal(format!("In-flight result type mismatch for {}", key)))
    }

    /// Retried read that never joins or registers an in-flight entry.
    ///
    /// Used for the lookups a mutation makes before writing, which must observe fresh state.
    pub async fn fetch<T, F, Fut>(&self, operation: &str, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        run_with_retry(operation, self.read_policy, false, op).await
    }

    /// Non-deduplicated write with at most one extra attempt
    pub async fn mutate<T, F, Fut>(&self, operation: &str, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        run_with_retry(operation, self.write_policy, true, op).await
    }

    /// Mutation under the longer batch timeout
    pub async fn batch<T, F, Fut>(&self, operation: &str, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        run_with_retry(operation, self.batch_policy, true, op).await
    }
}

async fn run_with_retry<T, F, Fut>(
    operation: &str,
    policy: RetryPolicy,
    mutating: bool,
    op: F,
) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::transient(TransientKind::Timeout)),
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}/{}", operation, attempt, policy.max_attempts);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let exhausted = attempt >= policy.max_attempts;
        if !err.is_transient() || exhausted || (mutating && err.is_timeout()) {
            if err.is_transient() {
                tracing::warn!("{} failed after {} attempt(s): {}", operation, attempt, err);
            }
            let err = err.with_attempts(attempt);
            return Err(if mutating { err.into_ambiguous() } else { err });
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            "Attempt {}/{} for {} failed: {}; retrying in {:?}",
            attempt,
            policy.max_attempts,
            operation,
            err,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
