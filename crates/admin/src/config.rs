//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PORTAL_BASE_URL` - Public URL for the portal
//! - `BAAS_URL` - Project URL of the backend (e.g., `https://xyz.example.co`)
//! - `BAAS_ANON_KEY` - Backend anon (public) API key
//!
//! ## Optional
//! - `PORTAL_HOST` - Bind address (default: 127.0.0.1)
//! - `PORTAL_PORT` - Listen port (default: 3001)
//! - `PORTAL_LOG_JSON` - Emit logs as JSON when set
//! - `BAAS_AVATAR_BUCKET` - Storage bucket for avatars (default: avatars)
//! - `CONSOLE_PAGE_SIZE` - User directory page size, 1 to 100 (default: 10)
//! - `CONSOLE_IDLE_MINUTES` - Minutes before an idle console is discarded, at least 1 (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//!
//! ## Optional (TLS)
//! - `PORTAL_TLS_CERT` - PEM-encoded certificate chain
//! - `PORTAL_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_IDLE_MINUTES: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Portal application configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the portal
    pub base_url: String,
    /// Emit JSON logs
    pub log_json: bool,
    /// Backend connection
    pub baas: BaasConfig,
    /// Console behavior
    pub console: ConsoleConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the anon key.
#[derive(Clone)]
pub struct BaasConfig {
    /// Project URL
    pub url: Url,
    /// Anon API key, sent with every request
    pub anon_key: SecretString,
    /// Storage bucket holding avatars
    pub avatar_bucket: String,
}

impl std::fmt::Debug for BaasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("avatar_bucket", &self.avatar_bucket)
            .finish()
    }
}

impl BaasConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = get_required_env("BAAS_URL")?;
        let url = Url::parse(&url)
            .map_err(|e| ConfigError::InvalidEnvVar("BAAS_URL".to_string(), e.to_string()))?;

        // The anon key is public by design; a weak-looking one is only suspicious.
        let anon_key = get_required_env("BAAS_ANON_KEY")?;
        if let Err(e) = validate_secret_strength(&anon_key, "BAAS_ANON_KEY") {
            tracing::warn!("BAAS_ANON_KEY validation warning: {e}");
        }

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
            avatar_bucket: get_env_or_default("BAAS_AVATAR_BUCKET", "avatars"),
        })
    }
}

/// Console settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Fixed user directory page size
    pub page_size: u32,
    /// How long an unused console instance is kept
    pub idle_timeout: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_MINUTES * 60),
        }
    }
}

impl ConsoleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size = get_env_or_default("CONSOLE_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar("CONSOLE_PAGE_SIZE".to_string(), e.to_string()))
            .and_then(validate_page_size)?;
        let idle_minutes =
            get_env_or_default("CONSOLE_IDLE_MINUTES", &DEFAULT_IDLE_MINUTES.to_string())
                .parse::<u64>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("CONSOLE_IDLE_MINUTES".to_string(), e.to_string())
                })
                .and_then(validate_idle_minutes)?;

        Ok(Self {
            page_size,
            idle_timeout: Duration::from_secs(idle_minutes.saturating_mul(60)),
        })
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("PORTAL_TLS_CERT");
        let key_pem = get_optional_env("PORTAL_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PORTAL_TLS_*".to_string(),
                "Both PORTAL_TLS_CERT and PORTAL_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("PORTAL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORTAL_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORTAL_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORTAL_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("PORTAL_BASE_URL")?;
        Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PORTAL_BASE_URL".to_string(), e.to_string())
        })?;

        let baas = BaasConfig::from_env()?;
        let console = ConsoleConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            log_json: get_optional_env("PORTAL_LOG_JSON").is_some(),
            baas,
            console,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must be marked `Secure`.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn validate_page_size(page_size: u32) -> Result<u32, ConfigError> {
    if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        Ok(page_size)
    } else {
        Err(ConfigError::InvalidEnvVar(
            "CONSOLE_PAGE_SIZE".to_string(),
            format!("must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"),
        ))
    }
}

fn validate_idle_minutes(minutes: u64) -> Result<u64, ConfigError> {
    if minutes == 0 {
        Err(ConfigError::InvalidEnvVar(
            "CONSOLE_IDLE_MINUTES".to_string(),
            "must be at least 1".to_string(),
        ))
    } else {
        Ok(minutes)
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Check that a key is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
