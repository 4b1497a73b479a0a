//! Per-user request rate gate (spec §4.3, §5). A sliding window of request
//! instants rather than a literal refill loop — equivalent to a token
//! bucket with burst = `max_requests_per_minute` and refill spread evenly
//! across the window. Grounded in wintermute's `RateLimiter`
//! (`Mutex<VecDeque<Instant>>`, `check`/`record`), keyed per `user_id` via
//! `dashmap` instead of per-tool.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

const WINDOW: Duration = Duration::from_secs(60);

/// Tracks recent request instants per user. Bucket maps never shrink once a
/// user has made a request — acceptable for a process-lifetime in-memory
/// gate (spec §5: "per-process in-memory structure").
#[derive(Default)]
pub struct RateLimiter {
    buckets: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict timestamps older than the window, then admit the request if
    /// the remaining count is under `max_requests_per_minute`. Returns
    /// `false` when the caller should be rejected with `RateLimited`.
    pub fn check_and_record(&self, user_id: &str, max_requests_per_minute: u32) -> bool {
        let now = Instant::now();
        let entry = self
            .buckets
            .entry(user_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut bucket = entry.lock().unwrap();
        while let Some(&front) = bucket.front() {
            if now.duration_since(front) > WINDOW {
                bucket.pop_front();
            } else {
                break;
            }
        }
        if bucket.len() >= max_requests_per_minute as usize {
            return false;
        }
        bucket.push_back(now);
        true
    }
}
