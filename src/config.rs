//! Console configuration parsed from environment variables.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::http::HeaderValue;

use crate::auth::guard::{AdminRedirect, GuardPolicy};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GUARD_WAIT_MS: u64 = 1500;
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {var}")]
    Missing { var: &'static str },

    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Hosted backend endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project URL without a trailing slash.
    pub url: String,
    pub anon_key: String,
    pub timeouts: BackendTimeouts,
}

// The anon key stays out of logs.
impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub backend: BackendConfig,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// The one browser origin allowed cross-origin access; `None` serves
    /// same-origin callers only.
    pub cors_origin: Option<HeaderValue>,
    pub guard: GuardPolicy,
    /// How long a navigation waits for a pending resolution before answering `Wait`.
    pub guard_wait: Duration,
    /// Refresh the session this many seconds before it expires.
    pub refresh_margin_secs: u64,
}

impl ConsoleConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `BIND_ADDR`: default `127.0.0.1`
    /// - `PORT`: default 3000
    /// - `CORS_ALLOW_ORIGIN`: unset by default (no cross-origin access)
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GUARD_LANDING_PATH`: default `/yourlost`
    /// - `GUARD_SIGNIN_PATH`: default `/signin`
    /// - `GUARD_ADMIN_LANDING_PATH`: default `/yourlost`
    /// - `GUARD_ADMIN_REDIRECT`: `in_app` (default) or `full_page`
    /// - `GUARD_WAIT_MS`: default 1500
    /// - `SESSION_REFRESH_MARGIN_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConsoleConfig::from_env`] with an injectable source.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or malformed variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = required(&lookup, "SUPABASE_URL")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "SUPABASE_URL",
                value: url,
                reason: "expected an http(s) URL".into(),
            });
        }
        let backend = BackendConfig {
            url: url.trim_end_matches('/').to_string(),
            anon_key: required(&lookup, "SUPABASE_ANON_KEY")?,
            timeouts: BackendTimeouts {
                request_secs: parse_or(&lookup, "BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                connect_secs: parse_or(&lookup, "BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            },
        };

        let defaults = GuardPolicy::default();
        let guard = GuardPolicy {
            landing_path: path_or(&lookup, "GUARD_LANDING_PATH", defaults.landing_path)?,
            signin_path: path_or(&lookup, "GUARD_SIGNIN_PATH", defaults.signin_path)?,
            admin_landing_path: path_or(&lookup, "GUARD_ADMIN_LANDING_PATH", defaults.admin_landing_path)?,
            admin_redirect: parse_admin_redirect(lookup("GUARD_ADMIN_REDIRECT").as_deref())?,
            ..defaults
        };

        Ok(Self {
            backend,
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR)?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            cors_origin: parse_origin(lookup("CORS_ALLOW_ORIGIN"))?,
            guard,
            guard_wait: Duration::from_millis(parse_or(&lookup, "GUARD_WAIT_MS", DEFAULT_GUARD_WAIT_MS)?),
            refresh_margin_secs: parse_or(&lookup, "SESSION_REFRESH_MARGIN_SECS", DEFAULT_REFRESH_MARGIN_SECS)?,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<String, ConfigError> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { var, value: raw.clone(), reason: e.to_string() }),
    }
}

fn path_or(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: String) -> Result<String, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) if raw.starts_with('/') => Ok(raw),
        Some(raw) => Err(ConfigError::Invalid { var, value: raw, reason: "expected an absolute path".into() }),
    }
}

fn parse_origin(raw: Option<String>) -> Result<Option<HeaderValue>, ConfigError> {
    let Some(raw) = raw.map(|v| v.trim().trim_end_matches('/').to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if raw == "*" || !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            var: "CORS_ALLOW_ORIGIN",
            value: raw,
            reason: "expected a single http(s) origin".into(),
        });
    }
    HeaderValue::from_str(&raw).map(Some).map_err(|e| ConfigError::Invalid {
        var: "CORS_ALLOW_ORIGIN",
        value: raw.clone(),
        reason: e.to_string(),
    })
}

fn parse_admin_redirect(raw: Option<&str>) -> Result<AdminRedirect, ConfigError> {
    match raw.unwrap_or("in_app") {
        "in_app" => Ok(AdminRedirect::InApp),
        "full_page" => Ok(AdminRedirect::FullPage),
        other => Err(ConfigError::Invalid {
            var: "GUARD_ADMIN_REDIRECT",
            value: other.to_string(),
            reason: "expected 'in_app' or 'full_page'".into(),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
