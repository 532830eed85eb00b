use std::env;
use std::net::SocketAddr;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Default endpoint for the text-generation API.
pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// API key appended to the text-generation URL.
    pub gemini_api_key: Zeroizing<String>,
    /// The text-generation endpoint.
    pub gemini_api_url: String,
    /// Messages granted to a freshly registered user.
    pub default_token_allowance: i32,
    /// Word cap applied to returned responses; 0 disables truncation.
    pub response_word_limit: usize,
    /// `sandbox` or `live`.
    pub paypal_mode: String,
    pub paypal_client_id: Zeroizing<String>,
    pub paypal_client_secret: Zeroizing<String>,
    /// Subscription price per month, in USD.
    pub subscription_price_per_month: u32,
    /// Base URL used to build the payment return/cancel links.
    pub public_base_url: String,
    /// Failed logins allowed per email in one rate-limit window.
    pub login_failures_per_window: i64,
    /// Length of a rate-limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Set the `Secure` attribute on cookies (`APP_ENV=production`).
    pub secure_cookies: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Session lifetime in whole days; must be positive.
fn parse_session_days(raw: &str) -> Result<i64> {
    let days: i64 = raw.trim().parse().context("Invalid SESSION_DURATION_DAYS")?;
    if days <= 0 {
        anyhow::bail!("SESSION_DURATION_DAYS must be greater than zero");
    }
    Ok(days)
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let paypal_mode = var_or("PAYPAL_MODE", "sandbox");
        if paypal_mode != "sandbox" && paypal_mode != "live" {
            anyhow::bail!("PAYPAL_MODE must be either 'sandbox' or 'live'");
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: var_or("REDIS_URL", "redis://127.0.0.1:6379"),
            bind_addr: var_or("BIND_ADDR", "127.0.0.1:5000")
                .parse()
                .context("Invalid BIND_ADDR")?,
            session_duration_days: parse_session_days(&var_or("SESSION_DURATION_DAYS", "7"))?,
            gemini_api_key: Zeroizing::new(
                env::var("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?,
            ),
            gemini_api_url: var_or("GEMINI_API_URL", DEFAULT_GEMINI_API_URL),
            default_token_allowance: var_or("DEFAULT_TOKEN_ALLOWANCE", "5")
                .parse()
                .context("Invalid DEFAULT_TOKEN_ALLOWANCE")?,
            response_word_limit: var_or("RESPONSE_WORD_LIMIT", "0")
                .parse()
                .context("Invalid RESPONSE_WORD_LIMIT")?,
            paypal_mode,
            paypal_client_id: Zeroizing::new(
                env::var("PAYPAL_CLIENT_ID").context("PAYPAL_CLIENT_ID must be set")?,
            ),
            paypal_client_secret: Zeroizing::new(
                env::var("PAYPAL_CLIENT_SECRET").context("PAYPAL_CLIENT_SECRET must be set")?,
            ),
            subscription_price_per_month: var_or("SUBSCRIPTION_PRICE_PER_MONTH", "10")
                .parse()
                .context("Invalid SUBSCRIPTION_PRICE_PER_MONTH")?,
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            login_failures_per_window: var_or("LOGIN_FAILURES_PER_WINDOW", "5")
                .parse()
                .context("Invalid LOGIN_FAILURES_PER_WINDOW")?,
            rate_limit_window_secs: 43200,
            secure_cookies: var_or("APP_ENV", "development") == "production",
        })
    }
}

impl Default for Config {
    /// Local-development values; secrets are empty.
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/chatgate".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            session_duration_days: 7,
            gemini_api_key: Zeroizing::new(String::new()),
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            default_token_allowance: 5,
            response_word_limit: 0,
            paypal_mode: "sandbox".to_string(),
            paypal_client_id: Zeroizing::new(String::new()),
            paypal_client_secret: Zeroizing::new(String::new()),
            subscription_price_per_month: 10,
            public_base_url: "http://localhost:5000".to_string(),
            login_failures_per_window: 5,
            rate_limit_window_secs: 43200,
            secure_cookies: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_days_must_be_positive() {
        assert_eq!(parse_session_days("7").unwrap(), 7);
        assert!(parse_session_days("0").is_err());
        assert!(parse_session_days("-3").is_err());
        assert!(parse_session_days("week").is_err());
    }
}
