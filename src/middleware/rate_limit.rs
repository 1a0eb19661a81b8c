use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Fixed one-second window over the whole router group. Coarse on
/// purpose: it shields the portal during an exam-start stampede, it is
/// not per-client accounting.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_second: u32,
    count: Arc<AtomicU32>,
    window_start: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            count: Arc::new(AtomicU32::new(0)),
            window_start: Arc::new(Mutex::new(Instant::now())),
        }
    }

    fn allow(&self) -> bool {
        {
            let mut start = self.window_start.lock().expect("rate limiter mutex poisoned");
            if start.elapsed() >= Duration::from_secs(1) {
                *start = Instant::now();
                self.count.store(0, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed) < self.max_per_second
    }
}

pub async fn rps_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.allow() {
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(max_per_second: u32) -> RateLimiter {
    RateLimiter::new(max_per_second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_requests_within_one_window() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
