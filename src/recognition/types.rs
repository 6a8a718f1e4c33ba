//! Data model shared by both recognition engines.
//!
//! The provider result payload is deliberately opaque — a
//! [`serde_json::Value`] owned by whichever engine answered.  The dispatch
//! layer only reads a numeric `confidence` and, when it has to construct a
//! fallback payload, a best-guess label.  Everything else flows through to
//! the caller untouched.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// RecognitionRequest
// ---------------------------------------------------------------------------

/// One "identify this item" request.
///
/// Never validated for completeness by the dispatcher — whatever the caller
/// supplies is forwarded as-is.  Unset fields are omitted from the
/// serialized wire body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecognitionRequest {
    /// Pre-detected or user-supplied item label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_label: Option<String>,
    /// Text-encoded image payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    /// Caller's own confidence estimate for `detected_label`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_hint: Option<f64>,
}

// ---------------------------------------------------------------------------
// Engine / EnginePreference
// ---------------------------------------------------------------------------

/// One of the two recognition providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "on-device")]
    OnDevice,
    #[serde(rename = "backend")]
    Backend,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Engine::OnDevice => "on-device",
            Engine::Backend => "backend",
        })
    }
}

/// Caller's engine preference, fixed for the duration of one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnginePreference {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "on-device")]
    OnDevice,
    #[serde(rename = "backend")]
    Backend,
}

impl Default for EnginePreference {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for EnginePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EnginePreference::Auto => "auto",
            EnginePreference::OnDevice => "on-device",
            EnginePreference::Backend => "backend",
        })
    }
}

/// An engine-preference tag that matched none of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized engine preference: {0:?}")]
pub struct ParseEnginePreferenceError(String);

impl FromStr for EnginePreference {
    type Err = ParseEnginePreferenceError;

    /// Strict parse: an unrecognized tag is an error, it never falls
    /// through to `Auto`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EnginePreference::Auto),
            "on-device" => Ok(EnginePreference::OnDevice),
            "backend" => Ok(EnginePreference::Backend),
            _ => Err(ParseEnginePreferenceError(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeMeta
// ---------------------------------------------------------------------------

/// Ephemeral per-call metadata produced alongside every result.
///
/// Describes which engine answered and, when a fallback or degradation
/// occurred, why.  Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeMeta {
    /// Engine that produced `data`.
    pub engine: Engine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<Engine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_device_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_device_fallback_threshold: Option<f64>,
    /// Set when a failed backend fallback left the original on-device
    /// result as the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_to_on_device: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_attempted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

impl RuntimeMeta {
    /// Plain metadata for a result answered directly by `engine`.
    pub fn for_engine(engine: Engine) -> Self {
        Self {
            engine,
            fallback_from: None,
            fallback_reason: None,
            on_device_confidence: None,
            on_device_fallback_threshold: None,
            degraded_to_on_device: None,
            fallback_attempted: None,
            fallback_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// A provider answer: the opaque result payload plus its runtime metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    /// Structured result owned by the answering provider.
    pub data: Value,
    /// How the answer was obtained.
    pub runtime: RuntimeMeta,
}

// ---------------------------------------------------------------------------
// Payload readers
// ---------------------------------------------------------------------------

/// Read the numeric confidence (0..1) from a provider result.
///
/// Accepts a plain number or a numeric string; anything else is unreadable
/// and the confidence gate accepts the result as-is.
pub fn parse_confidence(data: &Value) -> Option<f64> {
    let raw = &data["confidence"];
    if let Some(n) = raw.as_f64() {
        return n.is_finite().then_some(n);
    }
    raw.as_str()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Best-guess label carried inside a provider result: its `detectedLabel`
/// or `label` field, else the head of its ranked `candidates` list (a plain
/// string or a `{label}` object).
pub fn best_label(data: &Value) -> Option<String> {
    for key in ["detectedLabel", "label"] {
        if let Some(text) = data[key].as_str() {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    let head = data["candidates"].get(0)?;
    let text = head.as_str().or_else(|| head["label"].as_str())?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
