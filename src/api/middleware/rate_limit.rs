//! Process-wide request budget.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::api::error::ApiError;

pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// `None` when the budget is zero, which disables limiting.
pub fn per_minute(requests: u32) -> Option<Arc<GlobalRateLimiter>> {
    NonZeroU32::new(requests).map(|n| Arc::new(RateLimiter::direct(Quota::per_minute(n))))
}

pub async fn rate_limit(
    State(limiter): State<Arc<GlobalRateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.check().is_err() {
        tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", "Too many requests")
            .into_response();
    }
    next.run(req).await
}
