// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window request limiter for mutating endpoints.
//!
//! Buckets live in a bounded LRU map so a flood of distinct client keys
//! evicts the coldest buckets instead of growing memory.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Window length for settings updates.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
/// Requests allowed per client key inside one window.
pub const DEFAULT_MAX_REQUESTS: u32 = 20;
/// Maximum number of client keys tracked at once.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Decides whether a request identified by `key` may proceed.
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key`. Returns `false` once the limit is exceeded.
    fn check_and_increment(&self, key: &str) -> bool;
}

struct Bucket {
    window_start: Instant,
    count: u32,
}

/// In-process limiter: one `{window_start, count}` bucket per key.
pub struct InMemoryRateLimiter {
    buckets: Mutex<LruCache<String, Bucket>>,
    window: Duration,
    max_requests: u32,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration, max_requests: u32, capacity: usize) -> Self {
        Self {
            buckets: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            window,
            max_requests,
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            tracing::warn!("rate limiter lock poisoned; allowing request");
            return true;
        };

        let bucket = buckets.get_or_insert_mut(key.to_string(), || Bucket {
            window_start: now,
            count: 0,
        });
        if now.duration_since(bucket.window_start) > self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.count = bucket.count.saturating_add(1);
        bucket.count <= self.max_requests
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_REQUESTS, DEFAULT_CAPACITY)
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check_and_increment(&self, key: &str) -> bool {
        let allowed = self.check_at(key, Instant::now());
        if !allowed {
            tracing::info!(key, "rate limit exceeded");
        }
        allowed
    }
}
