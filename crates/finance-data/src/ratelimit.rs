//! Request pacing with `governor`
//!
//! Each source owns a [`RateGate`] sized to its vendor's published limits.
//! Gates can additionally draw from one [`RequestBudget`] shared by every
//! source, which enforces `MAX_REQUESTS_PER_MINUTE` across the whole process.

use crate::config::DataConfig;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

fn non_zero(value: u32, fallback: u32) -> NonZeroU32 {
    NonZeroU32::new(value)
        .or_else(|| NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN)
}

/// Request budget shared across all sources
#[derive(Debug, Clone)]
pub struct RequestBudget {
    limiter: SharedRateLimiter,
}

impl RequestBudget {
    /// A budget of `limit` requests per minute (zero falls back to 60)
    pub fn per_minute(limit: u32) -> Self {
        let quota = Quota::per_minute(non_zero(limit, 60));
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// The shared budget, if rate limiting is enabled
    pub fn from_config(config: &DataConfig) -> Option<Self> {
        config
            .rate_limit_enabled
            .then(|| Self::per_minute(config.max_requests_per_minute))
    }
}

/// Per-source limiter plus the optional shared budget
#[derive(Debug, Clone)]
pub struct RateGate {
    local: SharedRateLimiter,
    budget: Option<RequestBudget>,
}

impl RateGate {
    /// Allow `limit` requests per minute for this source
    pub fn per_minute(limit: u32) -> Self {
        Self::from_quota(Quota::per_minute(non_zero(limit, 60)))
    }

    /// Allow `limit` requests per second for this source
    pub fn per_second(limit: u32) -> Self {
        Self::from_quota(Quota::per_second(non_zero(limit, 1)))
    }

    fn from_quota(quota: Quota) -> Self {
        Self {
            local: Arc::new(RateLimiter::direct(quota)),
            budget: None,
        }
    }

    /// Also draw from a shared budget
    pub fn with_budget(mut self, budget: Option<RequestBudget>) -> Self {
        self.budget = budget;
        self
    }

    /// Wait until both the source limit and the shared budget allow a request
    pub async fn acquire(&self) {
        self.local.until_ready().await;
        if let Some(budget) = &self.budget {
            budget.limiter.until_ready().await;
        }
    }

    /// Take a permit without waiting; `false` if either limiter is exhausted
    pub fn try_acquire(&self) -> bool {
        if self.local.check().is_err() {
            return false;
        }
        self.budget
            .as_ref()
            .is_none_or(|budget| budget.limiter.check().is_ok())
    }
}
