//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Audio input device name — `None` means the system default.
    pub device: Option<String>,
    /// Preferred sample rate in Hz.  The device's own rate is used when it
    /// cannot provide this one; captured audio is never resampled.
    pub sample_rate: u32,
    /// Preferred channel count (1 = mono).
    pub channels: u16,
    /// Requested hardware buffer length in milliseconds.  Smaller values
    /// deliver chunks more often; the device default is used when the
    /// request is rejected.
    pub chunk_ms: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 44_100,
            channels: 1,
            chunk_ms: 100,
        }
    }
}

impl CaptureConfig {
    /// Requested hardware buffer length in frames at the preferred rate.
    pub fn chunk_frames(&self) -> u32 {
        (self.sample_rate / 1000) * self.chunk_ms
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Settings for reaching the conversion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the conversion API.  Defaults to the local development
    /// server; see [`ApiConfig::base_for_host`] for deployed hosts.
    pub base_url: String,
    /// Maximum seconds to wait for a conversion response before timing out.
    pub timeout_secs: u64,
}

/// Port the development server listens on.
const DEV_PORT: u16 = 8002;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://localhost:{DEV_PORT}"),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Resolves the API base URL for a deployment host.
    ///
    /// `localhost` talks straight to the development server on its own
    /// port; any other host is assumed to sit behind a reverse proxy that
    /// forwards `/api` to the service.
    pub fn base_for_host(host: &str) -> String {
        if host == "localhost" {
            format!("http://localhost:{DEV_PORT}")
        } else {
            format!("https://{host}/api")
        }
    }

    /// Full URL for the conversion endpoint.
    pub fn convert_url(&self) -> String {
        format!("{}/convert", self.base_url.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// ConvertConfig
// ---------------------------------------------------------------------------

/// Settings for the conversion request itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Target bit depth requested from the service (8, 16 or 24).
    pub bit_depth: u8,
    /// Restrict the service to a single output format (e.g. `"wav"`).
    /// `None` lets the service return every format it supports.
    pub format: Option<String>,
    /// Minimum milliseconds the processing state stays visible, so fast
    /// responses do not flicker through it.
    pub min_processing_ms: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            bit_depth: 16,
            format: None,
            min_processing_ms: 400,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Front-end behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Milliseconds an error notice stays on screen before it is dismissed
    /// automatically.
    pub notice_dismiss_ms: u64,
    /// Number of level bars kept by the live input monitor.
    pub monitor_bars: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            notice_dismiss_ms: 1_500,
            monitor_bars: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use audio_digitizer::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Microphone capture settings.
    pub capture: CaptureConfig,
    /// Conversion service endpoint settings.
    pub api: ApiConfig,
    /// Conversion request settings.
    pub convert: ConvertConfig,
    /// Front-end behaviour settings.
    pub ui: UiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            api: ApiConfig::default(),
            convert: ConvertConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // CaptureConfig
        assert_eq!(original.capture.device, loaded.capture.device);
        assert_eq!(original.capture.sample_rate, loaded.capture.sample_rate);
        assert_eq!(original.capture.channels, loaded.capture.channels);
        assert_eq!(original.capture.chunk_ms, loaded.capture.chunk_ms);

        // ApiConfig
        assert_eq!(original.api.base_url, loaded.api.base_url);
        assert_eq!(original.api.timeout_secs, loaded.api.timeout_secs);

        // ConvertConfig
        assert_eq!(original.convert.bit_depth, loaded.convert.bit_depth);
        assert_eq!(original.convert.format, loaded.convert.format);
        assert_eq!(
            original.convert.min_processing_ms,
            loaded.convert.min_processing_ms
        );

        // UiConfig
        assert_eq!(original.ui.notice_dismiss_ms, loaded.ui.notice_dismiss_ms);
        assert_eq!(original.ui.monitor_bars, loaded.ui.monitor_bars);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.capture.sample_rate, default.capture.sample_rate);
        assert_eq!(config.api.base_url, default.api.base_url);
        assert_eq!(config.convert.bit_depth, default.convert.bit_depth);
        assert_eq!(config.ui.notice_dismiss_ms, default.ui.notice_dismiss_ms);
    }

    /// Verify default values match the product behaviour.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.capture.device.is_none());
        assert_eq!(cfg.capture.sample_rate, 44_100);
        assert_eq!(cfg.capture.channels, 1);
        assert_eq!(cfg.capture.chunk_ms, 100);
        assert_eq!(cfg.capture.chunk_frames(), 4_400);
        assert_eq!(cfg.api.base_url, "http://localhost:8002");
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.convert.bit_depth, 16);
        assert!(cfg.convert.format.is_none());
        assert_eq!(cfg.convert.min_processing_ms, 400);
        assert_eq!(cfg.ui.notice_dismiss_ms, 1_500);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.capture.device = Some("USB Microphone".into());
        cfg.capture.sample_rate = 48_000;
        cfg.capture.channels = 2;
        cfg.api.base_url = "https://converter.example.com/api".into();
        cfg.api.timeout_secs = 60;
        cfg.convert.bit_depth = 24;
        cfg.convert.format = Some("mp3".into());
        cfg.ui.notice_dismiss_ms = 3_000;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.capture.device, Some("USB Microphone".into()));
        assert_eq!(loaded.capture.sample_rate, 48_000);
        assert_eq!(loaded.capture.channels, 2);
        assert_eq!(loaded.api.base_url, "https://converter.example.com/api");
        assert_eq!(loaded.api.timeout_secs, 60);
        assert_eq!(loaded.convert.bit_depth, 24);
        assert_eq!(loaded.convert.format, Some("mp3".into()));
        assert_eq!(loaded.ui.notice_dismiss_ms, 3_000);
    }

    /// Deployment hosts resolve to the `/api` prefix; localhost talks to the
    /// development server directly.
    #[test]
    fn base_for_host_resolution() {
        assert_eq!(
            ApiConfig::base_for_host("localhost"),
            "http://localhost:8002"
        );
        assert_eq!(
            ApiConfig::base_for_host("converter.example.com"),
            "https://converter.example.com/api"
        );
    }

    /// `convert_url` joins cleanly whether or not the base has a trailing
    /// slash.
    #[test]
    fn convert_url_join() {
        let mut api = ApiConfig::default();
        assert_eq!(api.convert_url(), "http://localhost:8002/convert");

        api.base_url = "https://converter.example.com/api/".into();
        assert_eq!(
            api.convert_url(),
            "https://converter.example.com/api/convert"
        );
    }
}
