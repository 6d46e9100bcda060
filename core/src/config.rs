//! Base URL configuration and target resolution.
//!
//! The backend location comes from `BACKEND_SERVER`. It is read once per
//! process by `BaseUrl::global`, or explicitly through `Config::from_env` when
//! the caller wants to handle a missing variable.

use std::fmt;
use std::sync::OnceLock;

pub const BACKEND_SERVER_VAR: &str = "BACKEND_SERVER";

/// A normalized base URL with no trailing slash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn new(base: &str) -> Self {
        Self(base.trim().trim_end_matches('/').to_string())
    }

    /// The process-wide base URL, read from `BACKEND_SERVER` on first use.
    /// An unset variable yields an empty base, so relative targets stay
    /// root-relative.
    pub fn global() -> &'static BaseUrl {
        static GLOBAL: OnceLock<BaseUrl> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let base = std::env::var(BACKEND_SERVER_VAR).unwrap_or_default();
            if base.is_empty() {
                tracing::warn!("{BACKEND_SERVER_VAR} is not set; relative targets resolve to '/'");
            }
            BaseUrl::new(&base)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join `target` onto the base URL.
    ///
    /// Absolute targets (anything starting with a URL scheme) are returned
    /// untouched. Otherwise leading slashes on the target are collapsed so
    /// exactly one `/` separates base and path.
    pub fn resolve(&self, target: &str) -> String {
        if has_scheme(target) {
            return target.to_string();
        }
        format!("{}/{}", self.0, target.trim_start_matches('/'))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `scheme ":" "//"` where scheme is ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "environment variable {var} is not set"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: BaseUrl,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(BACKEND_SERVER_VAR) {
            Ok(base) if !base.trim().is_empty() => Ok(Self {
                base_url: BaseUrl::new(&base),
            }),
            _ => Err(ConfigError::Missing(BACKEND_SERVER_VAR)),
        }
    }
}
