//! Configuration management for the camera control console.
//!
//! Settings start from compiled-in defaults and are overridden by
//! `CAMERA_CONTROL_*` environment variables. Session timing (liveness
//! threshold, reboot lockout) lives here rather than at call sites because
//! deployments disagree on the values.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::{OurError, OurResult};

/// Idle seconds after which the live stream is withheld.
pub const DEFAULT_LIVENESS_THRESHOLD_SECS: u32 = 60;
/// Seconds that controls and stream stay disabled after a reboot command.
pub const DEFAULT_REBOOT_LOCKOUT_SECS: u64 = 45;
/// Lifetime of a persisted control credential.
pub const DEFAULT_CREDENTIAL_TTL_SECS: i64 = 60 * 60;

const ENV_PREFIX: &str = "CAMERA_CONTROL_";

/// Configuration settings for the camera control console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Bridge server host address
    pub host: String,
    /// Bridge server port
    pub port: u16,
    /// Enable debug logging
    pub debug: bool,
    /// Origin of the control API; relative command URLs resolve against it
    pub api_base_url: String,
    /// Idle seconds before the stream URL is withheld
    pub liveness_threshold_secs: u32,
    /// Reboot lockout window in seconds
    pub reboot_lockout_secs: u64,
    /// How long a stored control key stays usable
    pub credential_ttl_secs: i64,
    /// Timeout for API and camera command requests
    pub request_timeout_secs: u64,
    /// Where the control credential is persisted, defaults under the user config dir
    pub credential_path: Option<PathBuf>,
    /// Operator access token, decoded for capabilities such as camera restart
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            debug: false,
            api_base_url: "http://localhost:8080/".to_string(),
            liveness_threshold_secs: DEFAULT_LIVENESS_THRESHOLD_SECS,
            reboot_lockout_secs: DEFAULT_REBOOT_LOCKOUT_SECS,
            credential_ttl_secs: DEFAULT_CREDENTIAL_TTL_SECS,
            request_timeout_secs: 10,
            credential_path: None,
            access_token: None,
        }
    }
}

/// Timing values handed to one control session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub liveness_threshold: u32,
    pub reboot_lockout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            liveness_threshold: DEFAULT_LIVENESS_THRESHOLD_SECS,
            reboot_lockout: Duration::from_secs(DEFAULT_REBOOT_LOCKOUT_SECS),
        }
    }
}

fn env_override<T>(name: &str) -> OurResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    match env::var(&key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| OurError::Config(format!("{key}={value:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl Settings {
    /// Create a new instance of Settings with environment variable overrides
    pub fn new() -> OurResult<Self> {
        let mut settings = Settings::default();

        if let Some(host) = env_override("HOST")? {
            settings.host = host;
        }
        if let Some(port) = env_override("PORT")? {
            settings.port = port;
        }
        if let Some(debug) = env_override("DEBUG")? {
            settings.debug = debug;
        }
        if let Some(api_base_url) = env_override("API_BASE_URL")? {
            settings.api_base_url = api_base_url;
        }
        if let Some(threshold) = env_override("LIVENESS_THRESHOLD")? {
            settings.liveness_threshold_secs = threshold;
        }
        if let Some(lockout) = env_override("REBOOT_LOCKOUT")? {
            settings.reboot_lockout_secs = lockout;
        }
        if let Some(ttl) = env_override("CREDENTIAL_TTL")? {
            settings.credential_ttl_secs = ttl;
        }
        if let Some(timeout) = env_override("REQUEST_TIMEOUT")? {
            settings.request_timeout_secs = timeout;
        }
        if let Some(path) = env_override::<PathBuf>("CREDENTIAL_PATH")? {
            settings.credential_path = Some(path);
        }
        if let Some(token) = env_override::<String>("ACCESS_TOKEN")? {
            settings.access_token = Some(token);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> OurResult<()> {
        self.api_base_url()?;
        if self.liveness_threshold_secs == 0 {
            return Err(OurError::Config(
                "liveness threshold must be at least one second".to_string(),
            ));
        }
        if self.credential_ttl_secs <= 0 {
            return Err(OurError::Config(
                "credential ttl must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The control API origin, parsed.
    pub fn api_base_url(&self) -> OurResult<Url> {
        Url::parse(&self.api_base_url)
            .map_err(|e| OurError::Config(format!("api base url {:?}: {e}", self.api_base_url)))
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            liveness_threshold: self.liveness_threshold_secs,
            reboot_lockout: Duration::from_secs(self.reboot_lockout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the path of the persisted control credential
    pub fn credential_path(&self) -> PathBuf {
        if let Some(path) = &self.credential_path {
            return path.clone();
        }

        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("camera-control");
        fs::create_dir_all(&config_dir).ok();
        config_dir.join("control-key.json")
    }
}
