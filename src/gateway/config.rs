//! Gateway configuration loading and validation.
//!
//! Reads a YAML file and resolves `${VAR}` / `${VAR:-default}` references
//! against the environment before parsing. This is the only place the crate
//! looks at environment variables; everything else takes values explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::errors::GatewayError;

/// Default schema cache lifetime: one day.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    10
}

/// Everything needed to talk to one gateway and cache its schema.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Full URL of the JSON-RPC endpoint.
    #[serde(default)]
    pub endpoint: String,
    /// Account identity used for Basic auth.
    #[serde(default)]
    pub email: String,
    /// Personal access token used for Basic auth.
    #[serde(default)]
    pub token: String,
    /// Fixed catalog. When set, catalog discovery is skipped entirely.
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Overrides the platform cache location.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    /// Treat unparseable query text as an error instead of "no rows".
    #[serde(default)]
    pub strict_records: bool,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .field("catalog", &self.catalog)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("cache_path", &self.cache_path)
            .field("strict_records", &self.strict_records)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(
        endpoint: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            email: email.into(),
            token: token.into(),
            catalog: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cache_path: None,
            strict_records: false,
        }
    }

    /// Check that every required field is present, naming all that are not.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let mut missing = Vec::new();
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.token.trim().is_empty() {
            missing.push("token");
        }

        if !missing.is_empty() {
            return Err(GatewayError::Config {
                reason: format!("missing required settings: {}", missing.join(", ")),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(GatewayError::Config {
                reason: "request_timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// The fixed catalog, ignoring blank values left by interpolation.
    pub fn fixed_catalog(&self) -> Option<&str> {
        self.catalog
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Load, interpolate, parse and validate a gateway config file.
pub fn load_gateway_config(path: &Path) -> Result<GatewayConfig, GatewayError> {
    let raw = std::fs::read_to_string(path).map_err(|e| GatewayError::Config {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let config = parse_gateway_config(&raw)?;
    tracing::debug!(path = %path.display(), ?config, "loaded gateway config");
    Ok(config)
}

/// Parse and validate config text (after env interpolation).
pub fn parse_gateway_config(raw: &str) -> Result<GatewayConfig, GatewayError> {
    let interpolated = interpolate_env_vars(raw);

    let mut config: GatewayConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| GatewayError::Config {
            reason: format!("failed to parse config: {e}"),
        })?;

    if let Some(path) = &config.cache_path {
        config.cache_path = Some(PathBuf::from(expand_tilde(&path.to_string_lossy())));
    }

    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. An empty variable counts as unset.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
endpoint: "${__CG_TEST_ENDPOINT__:-https://gateway.example.com/mcp}"
email: "${__CG_TEST_EMAIL__}"
token: "${__CG_TEST_TOKEN__}"
catalog: "${__CG_TEST_CATALOG__:-}"
"#;

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__CG_NONEXISTENT_VAR__");
        assert_eq!(
            interpolate_env_vars("${__CG_NONEXISTENT_VAR__:-fallback}"),
            "fallback"
        );
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__CG_INTERP_VAR__", "value");
        assert_eq!(
            interpolate_env_vars("a=${__CG_INTERP_VAR__:-fallback};"),
            "a=value;"
        );
        std::env::remove_var("__CG_INTERP_VAR__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain $text with {braces}";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_parse_config_from_env() {
        std::env::set_var("__CG_TEST_EMAIL__", "analyst@example.com");
        std::env::set_var("__CG_TEST_TOKEN__", "pat-123");
        std::env::remove_var("__CG_TEST_CATALOG__");
        std::env::remove_var("__CG_TEST_ENDPOINT__");

        let config = parse_gateway_config(YAML).unwrap();
        assert_eq!(config.endpoint, "https://gateway.example.com/mcp");
        assert_eq!(config.email, "analyst@example.com");
        assert_eq!(config.token, "pat-123");
        assert_eq!(config.fixed_catalog(), None);
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(!config.strict_records);

        std::env::remove_var("__CG_TEST_EMAIL__");
        std::env::remove_var("__CG_TEST_TOKEN__");
    }

    #[test]
    fn test_missing_credentials_are_all_reported() {
        let err = parse_gateway_config("endpoint: https://gw.example.com/mcp\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("email"), "{msg}");
        assert!(msg.contains("token"), "{msg}");
        assert!(!msg.contains("endpoint"), "{msg}");
    }

    #[test]
    fn test_explicit_fields() {
        let config = parse_gateway_config(
            r#"
endpoint: https://gw.example.com/mcp
email: a@b.c
token: t
catalog: "  NordicEnergy "
cache_ttl_secs: 600
request_timeout_secs: 5
cache_path: ~/schema.json
strict_records: true
"#,
        )
        .unwrap();
        assert_eq!(config.fixed_catalog(), Some("NordicEnergy"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.strict_records);
        let cache_path = config.cache_path.unwrap();
        assert!(!cache_path.to_string_lossy().starts_with('~'));
        assert!(cache_path.ends_with("schema.json"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = GatewayConfig::new("https://gw.example.com/mcp", "a@b.c", "t");
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GatewayConfig::new("https://gw.example.com/mcp", "a@b.c", "very-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_gateway_config(Path::new("/nonexistent/gateway.yaml")).unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }
}
