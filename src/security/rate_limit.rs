//! Fixed-window rate limiting per client key.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::config::QuotaConfig;
use crate::http::error::GatewayError;
use crate::observability::metrics;
use crate::security::headers::ClientKey;

/// Request count for one key in its current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// In-memory fixed-window limiter.
///
/// Each key gets `max_requests` per `window`. The window restarts on the
/// first request after it has fully elapsed. Denied requests do not count.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_quota(quota: &QuotaConfig) -> Self {
        Self::new(quota.max_requests, quota.window())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Record a request from `key`; false if it is over quota.
    pub fn allow(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).is_ok()
    }

    /// Record a request from `key` at `now`.
    ///
    /// Returns the time until the window restarts when the request is denied.
    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        // The entry guard holds the shard lock, so concurrent requests for
        // one key are counted one at a time.
        let mut window = self
            .windows
            .entry(key.to_owned())
            .or_insert(Window { count: 0, started: now });

        if now.saturating_duration_since(window.started) >= self.window {
            window.count = 0;
            window.started = now;
        }

        if window.count < self.max_requests {
            window.count += 1;
            Ok(())
        } else {
            Err(self
                .window
                .saturating_sub(now.saturating_duration_since(window.started)))
        }
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Periodically prune expired windows so idle clients do not accumulate.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, scope: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        loop {
            ticker.tick().await;
            let removed = limiter.prune(Instant::now());
            if removed > 0 {
                tracing::debug!(scope, removed, remaining = limiter.tracked_keys(), "Pruned rate limit windows");
            }
        }
    })
}

/// Middleware state: one limiter and the name it is reported under.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub scope: &'static str,
}

/// Reject requests over quota with 429 before they reach the handler.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ClientKey>()
        .cloned()
        .unwrap_or_else(ClientKey::unknown);

    match state.limiter.check_at(key.as_str(), Instant::now()) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(
                client = %key,
                scope = state.scope,
                path = %request.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(state.scope);
            GatewayError::RateLimited { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhausted_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at("1.2.3.4", start + Duration::from_secs(i)).is_ok());
        }
        let denied = limiter.check_at("1.2.3.4", start + Duration::from_secs(10));
        assert_eq!(denied, Err(Duration::from_secs(50)));

        // Other clients are unaffected.
        assert!(limiter.check_at("5.6.7.8", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_window_rollover() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("k", start).is_ok());
        assert!(limiter.check_at("k", start).is_ok());
        assert!(limiter.check_at("k", start + Duration::from_secs(59)).is_err());

        let later = start + Duration::from_secs(60);
        assert!(limiter.check_at("k", later).is_ok());
        assert!(limiter.check_at("k", later).is_ok());
        assert!(limiter.check_at("k", later).is_err());
    }

    #[test]
    fn test_denied_requests_do_not_extend_block() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("k", start).is_ok());
        for s in 1..10 {
            assert!(limiter.check_at("k", start + Duration::from_secs(s)).is_err());
        }
        assert!(limiter.check_at("k", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_allow_uses_wall_clock() {
        let limiter = RateLimiter::from_quota(&QuotaConfig::new(2, 60));
        assert!(limiter.allow("k"));
        assert!(limiter.allow("k"));
        assert!(!limiter.allow("k"));
    }

    #[test]
    fn test_prune_removes_only_expired() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at("old", start).unwrap();
        limiter.check_at("fresh", start + Duration::from_secs(30)).unwrap();

        assert_eq!(limiter.prune(start + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert!(limiter.check_at("fresh", start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_concurrent_requests_are_not_undercounted() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check_at("burst", now).is_ok())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }
}
