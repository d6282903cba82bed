use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::credentials::ClientCredentials;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// Where token records are kept
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// Process-local map (not shared between instances)
    #[default]
    Memory,
    /// External Redis, shared by every instance pointing at it
    Redis,
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// OAuth client ID registered with the identity provider
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Redirect URI registered with the provider, defaults to http://localhost:{port}/callback
    #[serde(default)]
    pub redirect_url: Option<String>,

    /// Provider token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Lifetime of a stored token record in seconds
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Sweep interval of the in-memory store in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// Timeout for the provider token exchange in seconds
    #[serde(default = "default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,

    #[serde(default)]
    pub store_backend: StoreBackend,

    /// Redis URL, required when storeBackend is "redis"
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Requests allowed per caller per window (0 = unlimited)
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL for the outbound token exchange (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub proxy_username: Option<String>,

    #[serde(default)]
    pub proxy_password: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_token_ttl_secs() -> u64 {
    crate::relay::TOKEN_TTL_SECS
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_exchange_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_requests() -> u32 {
    60
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: None,
            client_secret: None,
            redirect_url: None,
            token_url: default_token_url(),
            token_ttl_secs: default_token_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            exchange_timeout_secs: default_exchange_timeout_secs(),
            store_backend: StoreBackend::default(),
            redis_url: None,
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            tls_backend: TlsBackend::default(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
        }
    }
}

/// Client identity used for the code-for-token exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Treat blank strings the same as unset
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn fill_if_blank(slot: &mut Option<String>, value: Option<String>) {
    if non_blank(slot).is_none() {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            *slot = Some(v);
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file, falling back to defaults when the file is absent
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Reject settings the stores cannot honor consistently
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_ttl_secs == 0 {
            bail!("tokenTtlSecs must be at least 1");
        }
        Ok(())
    }

    /// Fill empty client fields from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fill_if_blank(&mut self.client_id, lookup("RELAY_CLIENT_ID"));
        fill_if_blank(&mut self.client_secret, lookup("RELAY_CLIENT_SECRET"));
        fill_if_blank(&mut self.redirect_url, lookup("RELAY_REDIRECT_URL"));
        fill_if_blank(&mut self.redis_url, lookup("RELAY_REDIS_URL"));
    }

    /// Fill client ID / secret still empty from a downloaded credentials file
    pub fn apply_client_credentials(&mut self, credentials: ClientCredentials) {
        fill_if_blank(&mut self.client_id, Some(credentials.client_id));
        fill_if_blank(&mut self.client_secret, Some(credentials.client_secret));
    }

    /// Effective redirect URI
    pub fn effective_redirect_url(&self) -> String {
        non_blank(&self.redirect_url)
            .map(str::to_string)
            .unwrap_or_else(|| format!("http://localhost:{}/callback", self.port))
    }

    /// OAuth client for the exchange, `None` when ID or secret is missing
    pub fn oauth_client(&self) -> Option<OAuthClient> {
        let client_id = non_blank(&self.client_id)?;
        let client_secret = non_blank(&self.client_secret)?;
        Some(OAuthClient {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: self.effective_redirect_url(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_ttl_secs, 300);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.token_url, "https://oauth2.googleapis.com/token");
        assert!(config.oauth_client().is_none());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        assert!(Config::default().validate().is_ok());

        let config: Config = serde_json::from_str(r#"{"tokenTtlSecs": 0}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tokenTtlSecs"));
    }

    #[test]
    fn test_parse_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"port": 9000, "clientId": "id", "storeBackend": "redis", "redisUrl": "redis://localhost"}"#,
        )
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.client_id.as_deref(), Some("id"));
        assert_eq!(config.rate_limit_requests, 60);
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let config = Config::load("/nonexistent/oauth-relay-config.json").unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_redirect_url_defaults_to_local_callback() {
        let mut config = Config::default();
        config.port = 8089;
        assert_eq!(config.effective_redirect_url(), "http://localhost:8089/callback");

        config.redirect_url = Some("https://auth.example.com/callback".to_string());
        assert_eq!(config.effective_redirect_url(), "https://auth.example.com/callback");
    }

    #[test]
    fn test_oauth_client_requires_id_and_secret() {
        let mut config = Config::default();
        config.client_id = Some("id".to_string());
        config.client_secret = Some("   ".to_string());
        assert!(config.oauth_client().is_none());

        config.client_secret = Some("secret".to_string());
        let client = config.oauth_client().unwrap();
        assert_eq!(client.client_id, "id");
        assert_eq!(client.client_secret, "secret");
        assert_eq!(client.redirect_uri, "http://localhost:8080/callback");
    }

    #[test]
    fn test_env_fills_only_empty_fields() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RELAY_CLIENT_ID", "env-id"),
            ("RELAY_CLIENT_SECRET", "env-secret"),
        ]);

        let mut config = Config::default();
        config.client_id = Some("file-id".to_string());
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.client_id.as_deref(), Some("file-id"));
        assert_eq!(config.client_secret.as_deref(), Some("env-secret"));
        assert!(config.redirect_url.is_none());
    }

    #[test]
    fn test_credentials_file_fills_remaining_fields() {
        let mut config = Config::default();
        config.client_secret = Some("configured".to_string());
        config.apply_client_credentials(ClientCredentials {
            client_id: "cred-id".to_string(),
            client_secret: "cred-secret".to_string(),
        });

        assert_eq!(config.client_id.as_deref(), Some("cred-id"));
        assert_eq!(config.client_secret.as_deref(), Some("configured"));
    }
}
