use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Deployment environment. Production enables secure cookies and hides error details.
    #[arg(long, env = "VIDAGENT_ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "VIDAGENT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "VIDAGENT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) server
    #[arg(long, env = "VIDAGENT_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Seconds to wait for in-flight work during shutdown
    #[arg(long, env = "VIDAGENT_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "VIDAGENT_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL. Required unless demo mode is enabled.
    #[arg(long, env = "VIDAGENT_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Serve accounts from an in-memory store instead of the database
    #[arg(long, env = "VIDAGENT_DEMO_MODE", default_value_t = false)]
    pub demo_mode: bool,

    #[arg(long, env = "VIDAGENT_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub db_max_connections: u32,

    #[arg(long, env = "VIDAGENT_DB_MIN_CONNECTIONS", default_value_t = 1)]
    pub db_min_connections: u32,

    #[arg(long, env = "VIDAGENT_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub db_acquire_timeout_secs: u64,

    #[arg(long, env = "VIDAGENT_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub db_idle_timeout_secs: u64,

    #[arg(long, env = "VIDAGENT_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub db_max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for signing access tokens
    #[arg(long, env = "VIDAGENT_ACCESS_TOKEN_SECRET")]
    pub access_token_secret: String,

    /// Secret key for signing refresh tokens. Must differ from the access token secret.
    #[arg(long, env = "VIDAGENT_REFRESH_TOKEN_SECRET")]
    pub refresh_token_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "VIDAGENT_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in seconds
    #[arg(long, env = "VIDAGENT_REFRESH_TOKEN_TTL_SECS", default_value_t = 604_800)]
    pub refresh_token_ttl_secs: u64,

    /// Name of the cookie carrying the refresh token
    #[arg(long, env = "VIDAGENT_REFRESH_COOKIE_NAME", default_value = "refreshToken")]
    pub refresh_cookie_name: String,

    /// Minimum accepted password length at registration
    #[arg(long, env = "VIDAGENT_MIN_PASSWORD_LENGTH", default_value_t = 6)]
    pub min_password_length: usize,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "VIDAGENT_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "VIDAGENT_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for credential endpoints (register/login/refresh)
    #[arg(long, env = "VIDAGENT_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for credential endpoints
    #[arg(long, env = "VIDAGENT_AUTH_RATE_LIMIT_BURST", default_value_t = 5)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the user store readiness probe
    #[arg(long, env = "VIDAGENT_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "VIDAGENT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint (gRPC). Export is disabled when unset.
    #[arg(long, env = "VIDAGENT_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// Checks cross-field constraints that clap cannot express.
    ///
    /// # Errors
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth.access_token_secret.is_empty() || self.auth.refresh_token_secret.is_empty() {
            return Err("token secrets must not be empty".into());
        }
        if self.auth.access_token_secret == self.auth.refresh_token_secret {
            return Err("access and refresh token secrets must differ".into());
        }
        if !self.database.demo_mode && self.database.database_url.is_none() {
            return Err("a database URL is required unless demo mode is enabled".into());
        }
        for (name, ttl) in [
            ("access token TTL", self.auth.access_token_ttl_secs),
            ("refresh token TTL", self.auth.refresh_token_ttl_secs),
        ] {
            if ttl == 0 || ttl > MAX_TOKEN_TTL_SECS {
                return Err(format!("{name} must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"));
            }
        }
        let limits = &self.rate_limit;
        for (name, value) in [
            ("rate limit per second", limits.per_second),
            ("rate limit burst", limits.burst),
            ("auth rate limit per second", limits.auth_per_second),
            ("auth rate limit burst", limits.auth_burst),
        ] {
            if value == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["vidagent-server"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--access-token-secret", "a", "--refresh-token-secret", "r", "--demo-mode"]);

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.auth.access_token_ttl_secs, 900);
        assert_eq!(config.auth.refresh_token_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.auth.refresh_cookie_name, "refreshToken");
        assert_eq!(config.auth.min_password_length, 6);
        assert_eq!(config.server.trusted_proxies.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_shared_secret() {
        let config = parse(&["--access-token-secret", "same", "--refresh-token-secret", "same", "--demo-mode"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_requires_database_outside_demo_mode() {
        let config = parse(&["--access-token-secret", "a", "--refresh-token-secret", "r"]);
        assert!(config.validate().is_err());

        let config = parse(&[
            "--access-token-secret",
            "a",
            "--refresh-token-secret",
            "r",
            "--database-url",
            "postgres://localhost/vidagent",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_rate_limits() {
        for flag in ["--per-second", "--burst", "--auth-per-second", "--auth-burst"] {
            let config =
                parse(&["--access-token-secret", "a", "--refresh-token-secret", "r", "--demo-mode", flag, "0"]);
            let err = config.validate().unwrap_err();
            assert!(err.contains("greater than zero"), "{flag}: {err}");
        }
    }

    #[test]
    fn test_rejects_out_of_range_token_ttls() {
        for flag in ["--access-token-ttl-secs", "--refresh-token-ttl-secs"] {
            for value in ["0", "18446744073709551615"] {
                let config =
                    parse(&["--access-token-secret", "a", "--refresh-token-secret", "r", "--demo-mode", flag, value]);
                assert!(config.validate().is_err(), "{flag}={value} should be rejected");
            }
        }

        let max = MAX_TOKEN_TTL_SECS.to_string();
        let config = parse(&[
            "--access-token-secret",
            "a",
            "--refresh-token-secret",
            "r",
            "--demo-mode",
            "--refresh-token-ttl-secs",
            max.as_str(),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_flag() {
        let config = parse(&[
            "--access-token-secret",
            "a",
            "--refresh-token-secret",
            "r",
            "--demo-mode",
            "--environment",
            "production",
        ]);
        assert!(config.environment.is_production());
    }
}
