//! Test plan for the `matchmaker-config` crate.
//!
//! Covers default handling, file discovery, environment overrides, and
//! the optional sections that downstream services rely on.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use matchmaker_config::{
    load, AiConfig, AppConfig, AuthConfig, HttpConfig, NotificationConfig, RateLimitConfig,
    ReferralConfig,
};

const ENV_VARS_TO_RESET: &[&str] = &[
    "MATCHMAKER_CONFIG",
    "MATCHMAKER__AI__API_KEY",
    "MATCHMAKER__AI__MODEL",
    "MATCHMAKER__AUTH__JWT_SECRET",
    "MATCHMAKER__AUTH__TOKEN_TTL_SECONDS",
    "MATCHMAKER__DATABASE__MAX_CONNECTIONS",
    "MATCHMAKER__DATABASE__URL",
    "MATCHMAKER__HTTP__ADDRESS",
    "MATCHMAKER__HTTP__PORT",
    "MATCHMAKER__HTTP__TRUST_PROXY_HEADERS",
    "MATCHMAKER__NOTIFICATIONS__RELAY_URL",
    "MATCHMAKER__RATE_LIMIT__REDIS_URL",
    "MATCHMAKER__RATE_LIMIT__REGISTRATION_PER_HOUR",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

fn isolated() -> (TempDir, TestContext) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());
    (temp_dir, ctx)
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let (_temp_dir, _ctx) = isolated();

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert!(!config.http.trust_proxy_headers);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.database.max_connections, defaults.database.max_connections);
    assert_eq!(config.auth.issuer, defaults.auth.issuer);
    assert_eq!(config.auth.token_ttl_seconds, defaults.auth.token_ttl_seconds);
    assert_eq!(config.ai.model, defaults.ai.model);
    assert!(config.ai.api_key.is_none());
    assert!(config.notifications.relay_url.is_none());
    assert_eq!(config.rate_limit.registration_per_hour, 10);
    assert_eq!(config.referrals.cookie_name, "nst_ref");
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "matchmaker.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/matchmaker.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "config/matchmaker.toml",
        r#"
        [database]
        max_connections = 50

        [ai]
        model = "gemini-custom"
        max_candidates_to_analyze = 5
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.database.max_connections, 50);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.ai.model, "gemini-custom");
    assert_eq!(config.ai.max_candidates_to_analyze, 5);
    assert_eq!(config.ai.base_url, defaults.ai.base_url);
    assert_eq!(config.http.port, defaults.http.port);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "matchmaker.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("MATCHMAKER__HTTP__PORT", "8080");
    ctx.set_var("MATCHMAKER__HTTP__TRUST_PROXY_HEADERS", "true");
    ctx.set_var("MATCHMAKER__AI__API_KEY", "gemini-test-key");
    ctx.set_var("MATCHMAKER__NOTIFICATIONS__RELAY_URL", "http://relay.local/send");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert!(config.http.trust_proxy_headers);
    assert_eq!(config.ai.api_key.as_deref(), Some("gemini-test-key"));
    assert_eq!(
        config.notifications.relay_url.as_deref(),
        Some("http://relay.local/send")
    );
}

#[test]
#[serial]
fn load_reads_explicit_config_path() {
    let (temp_dir, mut ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [rate_limit]
        registration_per_hour = 3
        redis_url = "redis://127.0.0.1:6380"
        "#,
    );
    let explicit = temp_dir.path().join("elsewhere/custom.toml");
    ctx.set_var("MATCHMAKER_CONFIG", explicit.display().to_string());

    let config = load().expect("configuration load should read the explicit path");
    assert_eq!(config.rate_limit.registration_per_hour, 3);
    assert_eq!(
        config.rate_limit.redis_url.as_deref(),
        Some("redis://127.0.0.1:6380")
    );
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let (temp_dir, _ctx) = isolated();

    write_config_file(
        temp_dir.path(),
        "matchmaker.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn auth_config_defaults() {
    let defaults = AuthConfig::default();
    assert_eq!(defaults.issuer, "matchmaker");
    assert_eq!(defaults.audience, "matchmaker-users");
    assert_eq!(defaults.otp_ttl_hours, 1);
}

#[test]
fn ai_config_defaults_match_scoring_pipeline() {
    let defaults = AiConfig::default();
    assert!((defaults.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(defaults.request_timeout_seconds, 120);
}

#[test]
fn optional_sections_have_safe_defaults() {
    let notifications = NotificationConfig::default();
    assert!(notifications.email_enabled);
    assert!(notifications.whatsapp_enabled);
    assert!(notifications.relay_token.is_none());

    let rate_limit = RateLimitConfig::default();
    assert!(rate_limit.redis_url.is_none());

    let referrals = ReferralConfig::default();
    assert_eq!(referrals.cookie_max_age_days, 30);
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
}
