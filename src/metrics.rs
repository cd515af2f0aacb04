use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounter =
        register_int_counter!("blog_requests_total", "Total number of requests").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "blog_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref COMMENTS_CREATED: IntCounterVec = register_int_counter_vec!(
        "blog_comments_created_total",
        "Comments created, by author type",
        &["author"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_DENIED: IntCounterVec = register_int_counter_vec!(
        "blog_rate_limit_denied_total",
        "Anonymous actions denied by the rate limiter",
        &["reason"]
    )
    .unwrap();
    pub static ref RATE_LIMIT_TRACKED_CLIENTS: IntGauge = register_int_gauge!(
        "blog_rate_limit_tracked_clients",
        "Client keys currently held by the rate limiter"
    )
    .unwrap();
    pub static ref RATE_LIMIT_SWEPT: IntCounter = register_int_counter!(
        "blog_rate_limit_swept_total",
        "Idle client keys removed by the sweeper"
    )
    .unwrap();
    pub static ref SLUG_COLLISIONS: IntCounterVec = register_int_counter_vec!(
        "blog_slug_collisions_total",
        "Slug candidates that were already taken",
        &["kind"]
    )
    .unwrap();
}
