//! Settings loading
//!
//! Layers, lowest first: the defaults embedded from `config.toml`, the user's
//! settings file, then environment variables (a `.env` file is loaded into
//! the environment first). The result is validated into a [`SessionConfig`].

use crate::error::AppError;
use crate::transcription::{build_ws_url, SessionConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use zeroize::{Zeroize, Zeroizing};

const DEFAULT_SETTINGS: &str = include_str!("../config.toml");

pub const API_KEY_VAR: &str = "LIVESCRIBE_API_KEY";
pub const ENDPOINT_VAR: &str = "LIVESCRIBE_ENDPOINT";

/// One settings layer; unset fields fall through to the layer below
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub api_endpoint: Option<String>,
    pub api_key: Option<String>,
    pub realtime_model: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub audio_format: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub vad_sensitivity: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
    pub block_size: Option<usize>,
    pub max_audio_duration_secs: Option<u64>,
}

impl Drop for Settings {
    fn drop(&mut self) {
        if let Some(key) = self.api_key.as_mut() {
            key.zeroize();
        }
    }
}

impl Settings {
    pub fn parse(contents: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, mut other: Settings) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.take();
                })*
            };
        }
        overlay!(
            api_endpoint,
            realtime_model,
            model,
            language,
            audio_format,
            sample_rate,
            channels,
            vad_sensitivity,
            prefix_padding_ms,
            silence_duration_ms,
            block_size,
            max_audio_duration_secs
        );
        if other.api_key.is_some() {
            if let Some(old) = self.api_key.as_mut() {
                old.zeroize();
            }
            self.api_key = other.api_key.take();
        }
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_VAR).filter(|k| !k.trim().is_empty()) {
            debug!("API key taken from {}", API_KEY_VAR);
            let mut layer = Settings::default();
            layer.api_key = Some(key.trim().to_string());
            self.merge(layer);
        }
        if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|e| !e.trim().is_empty()) {
            debug!(endpoint = %endpoint, "Endpoint taken from {}", ENDPOINT_VAR);
            self.api_endpoint = Some(endpoint.trim().to_string());
        }
    }

    /// Validate and build the session snapshot
    pub fn into_session_config(mut self) -> Result<SessionConfig, AppError> {
        let defaults = SessionConfig::default();

        let api_key = Zeroizing::new(self.api_key.take().unwrap_or_default());
        if api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "API key missing - set {} or api_key in the settings file",
                API_KEY_VAR
            )));
        }

        let api_endpoint = self.api_endpoint.take().unwrap_or(defaults.api_endpoint);
        build_ws_url(&api_endpoint, "", "").map_err(|e| AppError::Config(e.to_string()))?;

        let sample_rate = self.sample_rate.unwrap_or(defaults.sample_rate);
        if !(8000..=48000).contains(&sample_rate) {
            return Err(AppError::Config(format!(
                "sample_rate must be between 8000 and 48000, got {}",
                sample_rate
            )));
        }

        let channels = self.channels.unwrap_or(defaults.channels);
        if !matches!(channels, 1 | 2) {
            return Err(AppError::Config(format!(
                "channels must be 1 or 2, got {}",
                channels
            )));
        }

        let vad_sensitivity = self.vad_sensitivity.unwrap_or(defaults.vad_sensitivity);
        if !(0.0..=1.0).contains(&vad_sensitivity) {
            return Err(AppError::Config(format!(
                "vad_sensitivity must be between 0.0 and 1.0, got {}",
                vad_sensitivity
            )));
        }

        let block_size = self.block_size.unwrap_or(defaults.block_size);
        if block_size == 0 {
            return Err(AppError::Config("block_size must be positive".to_string()));
        }

        let max_audio_duration = match self.max_audio_duration_secs {
            Some(0) => {
                return Err(AppError::Config(
                    "max_audio_duration_secs must be positive".to_string(),
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let language = self
            .language
            .take()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or(defaults.language);

        Ok(SessionConfig {
            api_endpoint,
            api_key,
            realtime_model: self.realtime_model.take().unwrap_or(defaults.realtime_model),
            model: self.model.take().unwrap_or(defaults.model),
            language,
            audio_format: self.audio_format.take().unwrap_or(defaults.audio_format),
            sample_rate,
            channels,
            vad_sensitivity,
            prefix_padding_ms: self.prefix_padding_ms.unwrap_or(defaults.prefix_padding_ms),
            silence_duration_ms: self
                .silence_duration_ms
                .unwrap_or(defaults.silence_duration_ms),
            block_size,
            max_audio_duration,
        })
    }
}

/// Get the settings file path
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("livescribe").join("config.toml"))
}

/// Load settings from all layers
///
/// An explicit `path` must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<SessionConfig, AppError> {
    match dotenvy::dotenv() {
        Ok(env_file) => debug!("Loaded environment from {:?}", env_file),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(AppError::Config(format!("Invalid .env file: {}", e))),
    }

    let mut settings = Settings::parse(DEFAULT_SETTINGS)?;

    let explicit = path.is_some();
    if let Some(path) = path.map(Path::to_path_buf).or_else(settings_path) {
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            settings.merge(Settings::parse(&contents)?);
            info!("Loaded settings from {:?}", path);
        } else if explicit {
            return Err(AppError::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        } else {
            debug!("No settings file at {:?}, using defaults", path);
        }
    }

    settings.apply_env(|name| std::env::var(name).ok());
    settings.into_session_config()
}
