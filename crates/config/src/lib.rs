use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "matchmaker.toml",
    "config/matchmaker.toml",
    "crates/config/matchmaker.toml",
    "../matchmaker.toml",
    "../config/matchmaker.toml",
    "../crates/config/matchmaker.toml",
    "backend/matchmaker.toml",
    "backend/config/matchmaker.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub referrals: ReferralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Base URL used when building links that end up in outgoing messages.
    #[serde(default = "HttpConfig::default_public_base_url")]
    pub public_base_url: String,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`. Enable only behind a proxy that sets them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl HttpConfig {
    fn default_public_base_url() -> String {
        "http://localhost:3000".to_string()
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
            public_base_url: Self::default_public_base_url(),
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://matchmaker.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,
    #[serde(default = "AuthConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
    #[serde(default = "AuthConfig::default_otp_ttl_hours")]
    pub otp_ttl_hours: i64,
}

impl AuthConfig {
    fn default_jwt_secret() -> String {
        "change_me_in_production_matchmaker_secret".to_string()
    }

    fn default_issuer() -> String {
        "matchmaker".to_string()
    }

    fn default_audience() -> String {
        "matchmaker-users".to_string()
    }

    const fn default_token_ttl() -> u64 {
        86_400
    }

    const fn default_otp_ttl_hours() -> i64 {
        1
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Self::default_jwt_secret(),
            issuer: Self::default_issuer(),
            audience: Self::default_audience(),
            token_ttl_seconds: Self::default_token_ttl(),
            otp_ttl_hours: Self::default_otp_ttl_hours(),
        }
    }
}

/// Settings for the generative model used to score candidate matches.
///
/// ```
/// use matchmaker_config::AiConfig;
///
/// let ai = AiConfig::default();
/// assert_eq!(ai.model, "gemini-2.5-flash");
/// assert_eq!(ai.max_candidates_to_analyze, 15);
/// assert!(ai.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "AiConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "AiConfig::default_model")]
    pub model: String,
    #[serde(default = "AiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "AiConfig::default_temperature")]
    pub temperature: f32,
    #[serde(default = "AiConfig::default_max_candidates")]
    pub max_candidates_to_analyze: usize,
}

impl AiConfig {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    fn default_model() -> String {
        "gemini-2.5-flash".to_string()
    }

    const fn default_request_timeout() -> u64 {
        120
    }

    const fn default_temperature() -> f32 {
        0.3
    }

    const fn default_max_candidates() -> usize {
        15
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            request_timeout_seconds: Self::default_request_timeout(),
            temperature: Self::default_temperature(),
            max_candidates_to_analyze: Self::default_max_candidates(),
        }
    }
}

/// Outgoing message delivery. Without a `relay_url` messages are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default)]
    pub relay_token: Option<String>,
    #[serde(default = "NotificationConfig::enabled")]
    pub email_enabled: bool,
    #[serde(default = "NotificationConfig::enabled")]
    pub whatsapp_enabled: bool,
    #[serde(default = "NotificationConfig::default_support_email")]
    pub support_email: String,
    #[serde(default = "NotificationConfig::default_timeout")]
    pub request_timeout_seconds: u64,
}

impl NotificationConfig {
    const fn enabled() -> bool {
        true
    }

    fn default_support_email() -> String {
        "support@matchmaker.local".to_string()
    }

    const fn default_timeout() -> u64 {
        15
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            relay_token: None,
            email_enabled: true,
            whatsapp_enabled: true,
            support_email: Self::default_support_email(),
            request_timeout_seconds: Self::default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "RateLimitConfig::default_registration_per_hour")]
    pub registration_per_hour: u32,
}

impl RateLimitConfig {
    const fn default_registration_per_hour() -> u32 {
        10
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            registration_per_hour: Self::default_registration_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    #[serde(default = "ReferralConfig::default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "ReferralConfig::default_cookie_days")]
    pub cookie_max_age_days: i64,
}

impl ReferralConfig {
    fn default_cookie_name() -> String {
        "nst_ref".to_string()
    }

    const fn default_cookie_days() -> i64 {
        30
    }
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            cookie_max_age_days: Self::default_cookie_days(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use matchmaker_config::load;
///
/// std::env::remove_var("MATCHMAKER_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let token_ttl = i64::try_from(defaults.auth.token_ttl_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("http.public_base_url", defaults.http.public_base_url.clone())?
        .set_default("http.trust_proxy_headers", defaults.http.trust_proxy_headers)?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.audience", defaults.auth.audience.clone())?
        .set_default("auth.token_ttl_seconds", token_ttl)?
        .set_default("auth.otp_ttl_hours", defaults.auth.otp_ttl_hours)?
        .set_default("ai.base_url", defaults.ai.base_url.clone())?
        .set_default("ai.model", defaults.ai.model.clone())?
        .set_default(
            "rate_limit.registration_per_hour",
            i64::from(defaults.rate_limit.registration_per_hour),
        )?
        .set_default("referrals.cookie_name", defaults.referrals.cookie_name.clone())?;

    let environment_overrides = config::Environment::with_prefix("MATCHMAKER").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("MATCHMAKER_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via MATCHMAKER_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.token_ttl_seconds > i64::MAX as u64 {
        config.auth.token_ttl_seconds = i64::MAX as u64;
    }
    if config.ai.max_candidates_to_analyze == 0 {
        config.ai.max_candidates_to_analyze = AiConfig::default_max_candidates();
    }

    debug!(
        http = ?config.http,
        database = %config.database.url,
        ai_model = %config.ai.model,
        "loaded backend configuration"
    );
    Ok(config)
}
