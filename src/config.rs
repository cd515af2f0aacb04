use std::time::Duration;

use clap::Parser;

use crate::rate_limit::RateLimitPolicy;

pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "blog-gate")]
#[command(about = "Blog API with anonymous comment rate limiting")]
pub struct Args {
    // Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "BLOG_HOST")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, default_value_t = 3000, env = "BLOG_PORT")]
    pub port: u16,

    // Secret used to sign and verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    // Bearer token lifetime in days
    #[arg(
        long,
        default_value_t = crate::auth::DEFAULT_TOKEN_TTL_DAYS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_DAYS)
    )]
    pub token_ttl_days: i64,

    // Anonymous comments: lookback window in seconds
    #[arg(long, default_value_t = 600)]
    pub comment_window: u64,

    // Anonymous comments: max per window
    #[arg(long, default_value_t = 10)]
    pub comment_limit: usize,

    // Anonymous comments: min seconds between two comments
    #[arg(long, default_value_t = 60)]
    pub comment_cooldown: u64,

    // Rate limiter sweep interval in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Allowed CORS origin(s), comma-separated; permissive when unset
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    // Seed an admin account with this username at startup; its token is printed to stdout
    #[arg(long, env = "BLOG_ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "BLOG_ADMIN_EMAIL", default_value = "admin@example.com")]
    pub admin_email: String,
}

impl Args {
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            window_ms: secs_to_millis(self.comment_window),
            max_in_window: self.comment_limit,
            cooldown_ms: secs_to_millis(self.comment_cooldown),
        }
    }

    pub fn sweep_every(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.token_ttl_days.clamp(1, MAX_TOKEN_TTL_DAYS))
            .unwrap_or_else(|| chrono::Duration::days(crate::auth::DEFAULT_TOKEN_TTL_DAYS))
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_comment_policy() {
        let args = Args::parse_from(["blog-gate", "--jwt-secret", "s3cret"]);
        assert_eq!(args.rate_limit_policy(), RateLimitPolicy::default());
        assert_eq!(args.sweep_every(), Duration::from_secs(60));
        assert_eq!(args.port, 3000);
        assert!(args.admin_username.is_none());
    }

    #[test]
    fn token_ttl_is_bounded() {
        let args = Args::parse_from(["blog-gate", "--jwt-secret", "s", "--token-ttl-days", "30"]);
        assert_eq!(args.token_ttl(), chrono::Duration::days(30));

        for bad in ["0", "-1", "3651", "9223372036854775807"] {
            let parsed =
                Args::try_parse_from(["blog-gate", "--jwt-secret", "s", "--token-ttl-days", bad]);
            assert!(parsed.is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn policy_follows_flags() {
        let args = Args::parse_from([
            "blog-gate",
            "--jwt-secret",
            "s3cret",
            "--comment-window",
            "120",
            "--comment-limit",
            "3",
            "--comment-cooldown",
            "5",
        ]);
        let policy = args.rate_limit_policy();
        assert_eq!(policy.window_ms, 120_000);
        assert_eq!(policy.max_in_window, 3);
        assert_eq!(policy.cooldown_ms, 5_000);
    }
}
