//! Recognition settings, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.  Every field is optional in the file: missing values fall back
//! to their defaults, and an unparsable file is logged and replaced by the
//! full default configuration rather than failing the process.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Hard floor below which a low-confidence on-device result is rejected
/// outright when the backend fallback also fails.  A fixed constant, not
/// part of the configuration surface.
pub const HARD_REJECT_CONFIDENCE: f64 = 0.30;

const DEFAULT_FALLBACK_CONFIDENCE: f64 = 0.45;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Settings for the remote recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Maximum milliseconds to wait for a backend response.
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

// ---------------------------------------------------------------------------
// OnDeviceConfig
// ---------------------------------------------------------------------------

/// Settings for the on-device inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnDeviceConfig {
    /// Maximum milliseconds to wait for one inference pass.
    pub timeout_ms: u64,
    /// Engine tuning preset handed across the native boundary.
    pub preset: String,
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    /// Model file override — `None` lets the engine use its bundled asset.
    pub model_path: Option<String>,
    /// Tokenizer file override.
    pub tokenizer_path: Option<String>,
    /// Label-table file override.
    pub labels_path: Option<String>,
}

impl Default for OnDeviceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 12_000,
            preset: "balanced".into(),
            input_width: 224,
            input_height: 224,
            model_path: None,
            tokenizer_path: None,
            labels_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level recognition configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use ecolens_recognition::config::RecognitionConfig;
///
/// // Load (returns Default when the file is missing or unparsable)
/// let config = RecognitionConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// On-device confidence below which a backend fallback is attempted.
    /// Clamped into `[HARD_REJECT_CONFIDENCE, 1]` on load.
    pub fallback_confidence: f64,
    /// Remote recognition service settings.
    pub backend: BackendConfig,
    /// On-device engine settings.
    pub on_device: OnDeviceConfig,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            fallback_confidence: DEFAULT_FALLBACK_CONFIDENCE,
            backend: BackendConfig::default(),
            on_device: OnDeviceConfig::default(),
        }
    }
}

impl RecognitionConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(RecognitionConfig::default())` when the file does not
    /// exist yet, so callers never need to special-case a first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    ///
    /// An unparsable file is not fatal: it is logged and the defaults are
    /// used instead.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = match toml::from_str::<Self>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "Could not parse {} ({err}), using default settings",
                    path.display()
                );
                Self::default()
            }
        };
        Ok(config.sanitized())
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

    /// Clamp loaded values into their documented ranges.
    fn sanitized(mut self) -> Self {
        if !self.fallback_confidence.is_finite() {
            self.fallback_confidence = DEFAULT_FALLBACK_CONFIDENCE;
        }
        // [0, 1] first, then the floor: fallback ≥ hard reject always holds.
        self.fallback_confidence = self
            .fallback_confidence
            .clamp(0.0, 1.0)
            .max(HARD_REJECT_CONFIDENCE);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
