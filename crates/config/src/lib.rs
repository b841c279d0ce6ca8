//! Configuration loading for wagate.
//!
//! One TOML file covers the HTTP surface, the sidecar link, send policy,
//! and the birthday job. Every field has a default, so an empty (or
//! missing) file yields a working single-host setup.

use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    serde::Deserialize,
    tracing::debug,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub http: HttpConfig,
    pub sidecar: SidecarConfig,
    pub send: SendConfig,
    pub birthdays: BirthdayConfig,
}

/// HTTP listener and CORS policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Socket address to bind.
    pub bind: String,
    /// Origins allowed by CORS. Empty list = allow any origin (the
    /// permissive mode of the early single-tenant deployments).
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4000".into(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Sidecar process link.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SidecarConfig {
    /// WebSocket port of the local sidecar process.
    pub port: u16,
    /// Connect attempts at startup before giving up (the process keeps
    /// serving either way; sessions recover once the sidecar appears).
    pub connect_retries: u32,
    /// Bound on one send/resolve round-trip, in seconds.
    pub request_timeout_secs: u64,
    /// Base directory for per-user auth state, passed through to the
    /// sidecar. `None` leaves the sidecar's own default in place.
    pub auth_base_dir: Option<String>,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            port: 9876,
            connect_retries: 5,
            request_timeout_secs: 30,
            auth_base_dir: None,
        }
    }
}

/// Outbound send policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SendConfig {
    /// Country code prepended to bare 10-digit numbers.
    pub default_country_code: String,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            default_country_code: "91".into(),
        }
    }
}

/// Daily birthday job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BirthdayConfig {
    /// Whether the job runs at all.
    pub enabled: bool,
    /// Path to the `[[birthday]]` TOML file.
    pub path: PathBuf,
    /// Cron expression (seconds-resolution, six fields).
    pub schedule: String,
    /// IANA timezone the schedule is evaluated in.
    pub timezone: chrono_tz::Tz,
    /// Greeting template; `{name}` is replaced per recipient.
    pub template: String,
}

impl Default for BirthdayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("birthdays.toml"),
            schedule: "0 0 9 * * *".into(),
            timezone: chrono_tz::Asia::Kolkata,
            template: "Happy birthday, {name}! 🎉 Wishing you a wonderful year ahead.".into(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// `~/.config/wagate/config.toml` (platform equivalent), falling back to
/// the working directory.
fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "wagate")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
