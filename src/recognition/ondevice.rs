//! On-device recognition adapter.
//!
//! # Overview
//!
//! [`NativeRecognizer`] is the capability boundary to whatever local
//! inference engine the host application links (an ExecuTorch bridge, an
//! ONNX runtime, …).  The dispatch layer treats that engine as an opaque
//! provider: it probes availability, warms it up once per process, runs the
//! call under the deadline guard and validates the raw result shape.
//!
//! [`OnDeviceAdapter`] adds those concerns on top of any recognizer.
//! [`UnlinkedRecognizer`] is the stand-in for builds without a linked
//! engine — never available, so `Auto` dispatch degenerates to the backend
//! path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::OnDeviceConfig;
use crate::recognition::error::RecognizeError;
use crate::recognition::guard::with_deadline;
use crate::recognition::types::{Engine, Recognition, RecognitionRequest, RuntimeMeta};

// ---------------------------------------------------------------------------
// EngineOptions
// ---------------------------------------------------------------------------

/// Flat option set handed across the native capability boundary.
///
/// Optional path fields are omitted from the serialized form when unset, so
/// engines that auto-discover their bundled assets see no path keys at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Engine tuning preset (e.g. `"balanced"`).
    pub preset: String,
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels_path: Option<String>,
}

impl From<&OnDeviceConfig> for EngineOptions {
    fn from(config: &OnDeviceConfig) -> Self {
        Self {
            preset: config.preset.clone(),
            input_width: config.input_width,
            input_height: config.input_height,
            model_path: config.model_path.clone(),
            tokenizer_path: config.tokenizer_path.clone(),
            labels_path: config.labels_path.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// NativeRecognizer trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe boundary to the local inference engine.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn NativeRecognizer>` and shared across concurrent dispatch calls.
#[async_trait]
pub trait NativeRecognizer: Send + Sync {
    /// Synchronous, side-effect-free capability probe: platform support
    /// plus module linkage.
    fn is_available(&self) -> bool;

    /// Best-effort engine initialisation (model load, tensor arena, …).
    /// Called at most once per process by [`OnDeviceAdapter`].
    async fn warmup(&self, options: &EngineOptions) -> Result<(), RecognizeError>;

    /// Run one inference pass and return the raw structured result.
    async fn recognize(
        &self,
        request: &RecognitionRequest,
        options: &EngineOptions,
    ) -> Result<Value, RecognizeError>;
}

// Compile-time assertion: Box<dyn NativeRecognizer> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn NativeRecognizer>) {}
};

// ---------------------------------------------------------------------------
// UnlinkedRecognizer
// ---------------------------------------------------------------------------

/// Recognizer for builds without a linked native engine.
///
/// `is_available` is always `false`: `Auto` dispatch goes straight to the
/// backend and an explicit `OnDevice` preference fails with
/// [`RecognizeError::CapabilityUnavailable`].
#[derive(Debug, Default)]
pub struct UnlinkedRecognizer;

#[async_trait]
impl NativeRecognizer for UnlinkedRecognizer {
    fn is_available(&self) -> bool {
        false
    }

    async fn warmup(&self, _options: &EngineOptions) -> Result<(), RecognizeError> {
        Ok(())
    }

    async fn recognize(
        &self,
        _request: &RecognitionRequest,
        _options: &EngineOptions,
    ) -> Result<Value, RecognizeError> {
        Err(RecognizeError::CapabilityUnavailable)
    }
}

// ---------------------------------------------------------------------------
// Process-wide warmup flag
// ---------------------------------------------------------------------------

/// The process-wide "warmup performed" cell.  Single-assignment: set at
/// most once, never reset, safe to race on — the first writer wins and
/// everyone after skips warmup.
fn process_warmup_cell() -> Arc<AtomicBool> {
    static CELL: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    CELL.get_or_init(|| Arc::new(AtomicBool::new(false))).clone()
}

// ---------------------------------------------------------------------------
// OnDeviceAdapter
// ---------------------------------------------------------------------------

/// Wraps a [`NativeRecognizer`] with availability gating, one-time warmup,
/// the deadline guard and result validation.
pub struct OnDeviceAdapter {
    recognizer: Arc<dyn NativeRecognizer>,
    options: EngineOptions,
    timeout: Duration,
    warmed: Arc<AtomicBool>,
}

impl OnDeviceAdapter {
    /// Build an adapter sharing the process-wide warmup flag.
    pub fn new(recognizer: Arc<dyn NativeRecognizer>, config: &OnDeviceConfig) -> Self {
        Self::with_warmup_cell(recognizer, config, process_warmup_cell())
    }

    /// Like [`OnDeviceAdapter::new`] but with an injected warmup cell, so
    /// tests can observe warmup-once behaviour in isolation.
    pub fn with_warmup_cell(
        recognizer: Arc<dyn NativeRecognizer>,
        config: &OnDeviceConfig,
        warmed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            recognizer,
            options: EngineOptions::from(config),
            timeout: Duration::from_millis(config.timeout_ms),
            warmed,
        }
    }

    /// Capability probe, forwarded from the native boundary.
    pub fn is_available(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Run one on-device recognition.
    ///
    /// # Errors
    ///
    /// - [`RecognizeError::CapabilityUnavailable`] — engine not linked or
    ///   platform unsupported.
    /// - [`RecognizeError::Timeout`] — inference exceeded the configured
    ///   deadline.
    /// - [`RecognizeError::InvalidResponse`] — the engine returned
    ///   something other than a structured object.
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
    ) -> Result<Recognition, RecognizeError> {
        if !self.recognizer.is_available() {
            return Err(RecognizeError::CapabilityUnavailable);
        }

        // First writer wins; later callers skip even while warmup is still
        // in flight.  A failed warmup is logged and inference proceeds.
        if !self.warmed.swap(true, Ordering::SeqCst) {
            if let Err(err) = self.recognizer.warmup(&self.options).await {
                log::warn!("On-device warmup failed (continuing without it): {err}");
            }
        }

        let data = with_deadline(
            "on-device recognition",
            self.timeout,
            self.recognizer.recognize(request, &self.options),
        )
        .await?;

        if !data.is_object() {
            return Err(RecognizeError::InvalidResponse);
        }

        Ok(Recognition {
            data,
            runtime: RuntimeMeta::for_engine(Engine::OnDevice),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
