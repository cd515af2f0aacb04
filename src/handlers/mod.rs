mod auth;
mod categories;
mod comments;
mod health;
mod metrics;
mod posts;

pub use auth::verify_handler;
pub use categories::{create_category, get_category, list_categories};
pub use comments::{
    RateLimitStatusResponse, create_comment, delete_comment, list_all_comments, list_comments,
    rate_limit_status,
};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use posts::{create_post, delete_post, featured_posts, get_post, list_posts, update_post};
