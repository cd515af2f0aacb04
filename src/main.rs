use std::net::SocketAddr;
use std::sync::Arc;

use blog_gate::auth::TokenKeys;
use blog_gate::clock::{Clock, SystemClock};
use blog_gate::config::Args;
use blog_gate::models::{Role, User};
use blog_gate::rate_limit::RateLimiter;
use blog_gate::routes::cors_layer;
use blog_gate::store::Store;
use blog_gate::{AppState, build_router};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

// Create the configured admin account and print a token for it once
fn seed_admin(args: &Args, state: &AppState) -> anyhow::Result<()> {
    let Some(username) = &args.admin_username else {
        return Ok(());
    };

    let admin = state.store.insert_user(User {
        id: Uuid::new_v4(),
        username: username.clone(),
        email: args.admin_email.clone(),
        name: None,
        role: Role::Admin,
        created_at: state.now(),
    });
    let token = state.tokens.issue(admin.id, admin.role, state.now())?;
    tracing::info!(user = %admin.username, "Seeded admin account");
    println!("Admin bearer token for {}: {}", admin.username, token);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();
    let policy = args.rate_limit_policy();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let comment_limiter = Arc::new(RateLimiter::new(policy));
    let state = Arc::new(AppState::new(
        Store::new(),
        TokenKeys::new(args.jwt_secret.as_bytes(), args.token_ttl()),
        Arc::clone(&comment_limiter),
        Arc::clone(&clock),
    ));
    seed_admin(&args, &state)?;

    let sweeper = comment_limiter.start_sweeper(args.sweep_every(), clock);

    let app = build_router(state).layer(cors_layer(args.cors_origin.as_deref()));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Blog API listening on http://{}", addr);
    tracing::info!(
        "Anonymous comments: {} per {}s, at most one per {}s",
        policy.max_in_window,
        args.comment_window,
        args.comment_cooldown
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.stop().await;
    Ok(())
}
