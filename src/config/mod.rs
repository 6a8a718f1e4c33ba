//! Configuration module for the EcoLens recognition layer.
//!
//! Provides `RecognitionConfig` (top-level settings), sub-configs for each
//! engine, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `RecognitionConfig::load` / `RecognitionConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{BackendConfig, OnDeviceConfig, RecognitionConfig, HARD_REJECT_CONFIDENCE};
