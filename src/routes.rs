use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_category, create_comment, create_post, delete_comment, delete_post, featured_posts,
    get_category, get_post, health_handler, list_all_comments, list_categories, list_comments,
    list_posts, metrics_handler, rate_limit_status, update_post, verify_handler,
};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::state::AppState;

async fn track_requests(request: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let response = next.run(request).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    response
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/verify", get(verify_handler))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/featured", get(featured_posts))
        .route("/posts/{slug}", get(get_post).put(update_post).delete(delete_post))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{slug}", get(get_category))
        .route("/comments", get(list_all_comments))
        .route("/comments/rate-limit-status", get(rate_limit_status))
        .route(
            "/comments/post/{post_id}",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{comment_id}", delete(delete_comment));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Listed origins when configured, permissive otherwise
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let origin_list: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!("CORS: restricted to {} origin(s)", origin_list.len());
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origin_list))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            tracing::warn!("CORS: permissive (dev mode). Set CORS_ORIGIN to restrict origins.");
            CorsLayer::permissive()
        }
    }
}
