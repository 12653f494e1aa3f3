//! Service configuration.
//!
//! Built once from environment variables at startup and injected into Axum
//! handlers via [`axum::extract::State`].  Handlers never read the
//! environment themselves.

use std::fmt;
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

/// Default Discord REST base URL.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api";

/// Default HTTP listen port.
pub const DEFAULT_LISTEN_PORT: u16 = 8787;

/// Default timeout for each outbound Discord call, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Global configuration shared across all handlers.
#[derive(Clone)]
pub struct AppConfig {
    /// OAuth2 application id.
    pub client_id: String,
    /// OAuth2 application secret.
    pub client_secret: String,
    /// Redirect URI registered with Discord.  Kept verbatim: Discord compares
    /// it byte-for-byte with the registered value.
    pub redirect_uri: String,
    /// Bot token used for guild-administrative calls.
    pub bot_token: String,
    /// Base of the Discord REST API (e.g. `https://discord.com/api`).
    pub api_base: Url,
    /// Port to listen on.
    pub listen_port: u16,
    /// Resolve the role's real permission bitmask before granting it.
    pub verify_role_permissions: bool,
    /// Timeout applied to every outbound Discord call.
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// | Variable                    | Default                   | Description                       |
    /// |-----------------------------|---------------------------|-----------------------------------|
    /// | `CLIENT_ID`                 | required                  | OAuth2 application id             |
    /// | `CLIENT_SECRET`             | required                  | OAuth2 application secret         |
    /// | `REDIRECT_URI`              | required                  | Registered OAuth2 redirect URI    |
    /// | `BOT_TOKEN`                 | required                  | Bot credential                    |
    /// | `DISCORD_API_BASE`          | `https://discord.com/api` | REST API base URL                 |
    /// | `LISTEN_PORT`               | `8787`                    | HTTP listen port                  |
    /// | `VERIFY_ROLE_PERMISSIONS`   | `false`                   | Check the role bitmask via the API |
    /// | `DISCORD_HTTP_TIMEOUT_SECS` | `10`                      | Outbound request timeout          |
    ///
    /// Each required variable may also be given with a `DISCORD_` prefix
    /// (e.g. `DISCORD_CLIENT_ID`); the unprefixed name wins.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| {
            get(name)
                .or_else(|| get(&format!("DISCORD_{name}")))
                .ok_or(ConfigError::Missing { name })
        };

        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;
        let redirect_uri = required("REDIRECT_URI")?;
        let bot_token = required("BOT_TOKEN")?;

        parse_http_url("REDIRECT_URI", &redirect_uri)?;

        let api_base = match get("DISCORD_API_BASE") {
            Some(raw) => parse_http_url("DISCORD_API_BASE", &raw)?,
            None => parse_http_url("DISCORD_API_BASE", DEFAULT_API_BASE)?,
        };

        let listen_port = match get("LISTEN_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "LISTEN_PORT",
                value: raw.clone(),
                reason: format!("{e}"),
            })?,
            None => DEFAULT_LISTEN_PORT,
        };

        let verify_role_permissions = match get("VERIFY_ROLE_PERMISSIONS") {
            Some(raw) => parse_flag("VERIFY_ROLE_PERMISSIONS", &raw)?,
            None => false,
        };

        let http_timeout = match get("DISCORD_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "DISCORD_HTTP_TIMEOUT_SECS",
                    value: raw.clone(),
                    reason: "must be a positive number of seconds".into(),
                })?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            bot_token,
            api_base,
            listen_port,
            verify_role_permissions,
            http_timeout,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base.as_str())
            .field("listen_port", &self.listen_port)
            .field("verify_role_permissions", &self.verify_role_permissions)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn parse_http_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(invalid("expected an http(s) URL".into()));
    }
    Ok(url)
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}
