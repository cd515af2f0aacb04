use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::clock::Clock;
use crate::rate_limit::RateLimiter;
use crate::store::Store;

// app's shared state
pub struct AppState {
    pub store: Store,
    pub tokens: TokenKeys,
    pub comment_limiter: Arc<RateLimiter>, // anonymous comments only
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenKeys, comment_limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            tokens,
            comment_limiter,
            clock,
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    // Same clock as the limiter, as a timestamp for stored records
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_else(chrono::Utc::now)
    }
}
