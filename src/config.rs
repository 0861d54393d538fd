use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TOKEN_FILE: &str = ".calorio/session.json";
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Which flavour of build the client is running as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Served from the same origin as the API.
    Production { origin: Url },
    /// Local development, optionally pointed at another API.
    Development { api_url: Option<String> },
}

impl BuildMode {
    /// `{scheme}://{host}/api` in production, the override or the local
    /// default otherwise.
    pub fn api_base_url(&self) -> String {
        match self {
            BuildMode::Production { origin } => {
                let host = match (origin.host_str(), origin.port()) {
                    (Some(h), Some(p)) => format!("{}:{}", h, p),
                    (Some(h), None) => h.to_string(),
                    (None, _) => String::new(),
                };
                format!("{}://{}/api", origin.scheme(), host)
            }
            BuildMode::Development { api_url } => api_url
                .as_deref()
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub debounce: Duration,
    pub min_name_chars: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1500),
            min_name_chars: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub mode: BuildMode,
    pub token_file: PathBuf,
    pub login_path: String,
    pub request_timeout: Duration,
    pub lookup: LookupConfig,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let production = match std::env::var("CALORIO_ENV").ok().as_deref() {
            Some("production") | Some("prod") => true,
            Some("development") | Some("dev") => false,
            Some(other) => anyhow::bail!("unknown CALORIO_ENV value: {}", other),
            None => !cfg!(debug_assertions),
        };

        let mode = if production {
            let origin = std::env::var("CALORIO_ORIGIN")
                .context("CALORIO_ORIGIN must be set in production mode")?;
            BuildMode::Production {
                origin: Url::parse(&origin).context("parse CALORIO_ORIGIN")?,
            }
        } else {
            BuildMode::Development {
                api_url: std::env::var("CALORIO_API_URL").ok(),
            }
        };

        let lookup = LookupConfig {
            debounce: Duration::from_millis(
                std::env::var("CALORIO_LOOKUP_DEBOUNCE_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1500),
            ),
            ..LookupConfig::default()
        };

        Ok(Self {
            mode,
            token_file: std::env::var("CALORIO_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_FILE)),
            login_path: std::env::var("CALORIO_LOGIN_PATH")
                .unwrap_or_else(|_| DEFAULT_LOGIN_PATH.into()),
            request_timeout: Duration::from_secs(
                std::env::var("CALORIO_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30),
            ),
            lookup,
        })
    }

    /// Development config aimed at an explicit API root.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            mode: BuildMode::Development {
                api_url: Some(api_url.into()),
            },
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            login_path: DEFAULT_LOGIN_PATH.into(),
            request_timeout: Duration::from_secs(30),
            lookup: LookupConfig::default(),
        }
    }

    pub fn api_base_url(&self) -> String {
        self.mode.api_base_url()
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn production_uses_current_origin() {
        let mode = BuildMode::Production {
            origin: Url::parse("https://calorio.example.com/dashboard").unwrap(),
        };
        assert_eq!(mode.api_base_url(), "https://calorio.example.com/api");
    }

    #[test]
    fn production_keeps_explicit_port() {
        let mode = BuildMode::Production {
            origin: Url::parse("http://10.0.0.5:8080").unwrap(),
        };
        assert_eq!(mode.api_base_url(), "http://10.0.0.5:8080/api");
    }

    #[test]
    fn development_prefers_override() {
        let mode = BuildMode::Development {
            api_url: Some("http://192.168.1.10:9000/api/".into()),
        };
        assert_eq!(mode.api_base_url(), "http://192.168.1.10:9000/api");
    }

    #[test]
    fn development_falls_back_to_localhost() {
        let mode = BuildMode::Development { api_url: None };
        assert_eq!(mode.api_base_url(), DEFAULT_API_URL);
    }

    #[test]
    fn default_lookup_settings() {
        let lookup = LookupConfig::default();
        assert_eq!(lookup.debounce, Duration::from_millis(1500));
        assert_eq!(lookup.min_name_chars, 3);
    }
}
