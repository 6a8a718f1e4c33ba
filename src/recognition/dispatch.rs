//! Engine selection and the confidence-gated degradation policy.
//!
//! # Dispatch flow
//!
//! ```text
//! caller ──▶ EngineSelector::recognize(request, preference)
//!              │
//!              ├─ Backend ──▶ backend call, failures propagate
//!              │
//!              ├─ OnDevice ─▶ on-device call ──▶ confidence gate
//!              │               (failures propagate, no fallback)
//!              │
//!              └─ Auto ─┬─ not capable ──▶ backend call (as Backend)
//!                       └─ capable ──▶ on-device call
//!                             ├─ Err ──▶ one backend call, annotated
//!                             └─ Ok ───▶ confidence gate
//!
//! confidence gate:
//!   c unreadable or c ≥ threshold ──▶ keep on-device result
//!   c < threshold ──▶ one backend call with a label-only payload
//!        ├─ Ok ──▶ backend result + fallback metadata
//!        └─ Err ─┬─ c ≥ hard floor ──▶ degrade to on-device result
//!                └─ c < hard floor ──▶ RejectedLowConfidence
//! ```
//!
//! Exactly one automatic fallback attempt ever occurs per call; the
//! selector performs no further retries.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{RecognitionConfig, HARD_REJECT_CONFIDENCE};
use crate::recognition::backend::{BackendRecognizer, HttpBackend};
use crate::recognition::error::RecognizeError;
use crate::recognition::ondevice::{NativeRecognizer, OnDeviceAdapter};
use crate::recognition::types::{
    best_label, parse_confidence, Engine, EnginePreference, Recognition, RecognitionRequest,
};

// ---------------------------------------------------------------------------
// EngineSelector
// ---------------------------------------------------------------------------

/// The single public dispatch entry point.
///
/// Composes the on-device adapter, the backend adapter and the confidence
/// gate into one `recognize` operation keyed by an explicit
/// [`EnginePreference`].
pub struct EngineSelector {
    on_device: OnDeviceAdapter,
    backend: Arc<dyn BackendRecognizer>,
    fallback_confidence: f64,
}

impl EngineSelector {
    /// Build a selector from already-constructed adapters.
    ///
    /// `fallback_confidence` is clamped so the `fallback ≥ hard reject`
    /// invariant holds by construction.
    pub fn new(
        on_device: OnDeviceAdapter,
        backend: Arc<dyn BackendRecognizer>,
        fallback_confidence: f64,
    ) -> Self {
        Self {
            on_device,
            backend,
            fallback_confidence: fallback_confidence.clamp(HARD_REJECT_CONFIDENCE, 1.0),
        }
    }

    /// Wire the production HTTP backend from caller parameters + config.
    pub fn from_config(
        recognizer: Arc<dyn NativeRecognizer>,
        base_url: &str,
        auth_token: &str,
        config: &RecognitionConfig,
    ) -> Self {
        let backend = HttpBackend::new(
            base_url,
            auth_token,
            Duration::from_millis(config.backend.timeout_ms),
        );
        Self::new(
            OnDeviceAdapter::new(recognizer, &config.on_device),
            Arc::new(backend),
            config.fallback_confidence,
        )
    }

    /// Dispatch one recognition request.
    ///
    /// Every terminal path yields a [`Recognition`] (result + runtime
    /// metadata) or a typed [`RecognizeError`].
    pub async fn recognize(
        &self,
        request: &RecognitionRequest,
        preference: EnginePreference,
    ) -> Result<Recognition, RecognizeError> {
        match preference {
            EnginePreference::Backend => self.backend.recognize(request).await,

            EnginePreference::OnDevice => {
                let local = self.on_device.recognize(request).await?;
                self.gate_or_fallback(request, local).await
            }

            EnginePreference::Auto => {
                if !self.on_device.is_available() {
                    return self.backend.recognize(request).await;
                }
                match self.on_device.recognize(request).await {
                    Ok(local) => self.gate_or_fallback(request, local).await,
                    Err(on_device_error) => {
                        log::warn!(
                            "On-device path failed, falling back to backend: {on_device_error}"
                        );
                        let mut fallback = self.backend.recognize(request).await?;
                        fallback.runtime.fallback_from = Some(Engine::OnDevice);
                        fallback.runtime.fallback_reason = Some(on_device_error.to_string());
                        Ok(fallback)
                    }
                }
            }
        }
    }

    /// Confidence gate + degradation policy.
    ///
    /// Keeps a trustworthy on-device result; otherwise tries the backend
    /// exactly once, then degrades or rejects depending on the hard floor.
    async fn gate_or_fallback(
        &self,
        request: &RecognitionRequest,
        local: Recognition,
    ) -> Result<Recognition, RecognizeError> {
        let confidence = match parse_confidence(&local.data) {
            Some(c) if c < self.fallback_confidence => c,
            // Unreadable confidence is trusted as-is: the payload shape
            // belongs to the provider.
            _ => return Ok(local),
        };

        log::info!(
            "On-device confidence {confidence:.3} below threshold {:.3}, attempting backend fallback",
            self.fallback_confidence
        );

        match self.backend.recognize(&fallback_request(request, &local)).await {
            Ok(mut fallback) => {
                fallback.runtime.fallback_from = Some(Engine::OnDevice);
                fallback.runtime.fallback_reason = Some(format!(
                    "On-device confidence {confidence:.3} below threshold {:.3}",
                    self.fallback_confidence
                ));
                fallback.runtime.on_device_confidence = Some(confidence);
                fallback.runtime.on_device_fallback_threshold = Some(self.fallback_confidence);
                Ok(fallback)
            }
            Err(backend_error) if confidence >= HARD_REJECT_CONFIDENCE => {
                log::warn!(
                    "Backend fallback failed ({backend_error}), surfacing degraded on-device result"
                );
                let mut degraded = local;
                degraded.runtime.degraded_to_on_device = Some(true);
                degraded.runtime.fallback_attempted = Some(true);
                degraded.runtime.fallback_error = Some(backend_error.to_string());
                Ok(degraded)
            }
            Err(backend_error) => Err(RecognizeError::RejectedLowConfidence {
                confidence,
                fallback_error: backend_error.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback payload
// ---------------------------------------------------------------------------

/// Build the label-only payload for a confidence-triggered fallback.
///
/// The caller's explicit label wins; otherwise the on-device result's own
/// best guess is promoted.  The image is never re-sent: the local engine
/// already consumed it, and the label alone keeps the upload small.
fn fallback_request(original: &RecognitionRequest, local: &Recognition) -> RecognitionRequest {
    let label = original
        .detected_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .or_else(|| best_label(&local.data))
        .unwrap_or_default();

    RecognitionRequest {
        detected_label: Some(label),
        image_data: None,
        confidence_hint: original.confidence_hint,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OnDeviceConfig;
    use crate::recognition::ondevice::EngineOptions;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    struct ScriptedNative {
        available: bool,
        response: Result<Value, RecognizeError>,
        calls: AtomicUsize,
    }

    impl ScriptedNative {
        fn ok(data: Value) -> Self {
            Self {
                available: true,
                response: Ok(data),
                calls: AtomicUsize::new(0),
            }
        }

        fn err(error: RecognizeError) -> Self {
            Self {
                available: true,
                response: Err(error),
                calls: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            let mut scripted = Self::ok(json!({}));
            scripted.available = false;
            scripted
        }
    }

    #[async_trait]
    impl NativeRecognizer for ScriptedNative {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn warmup(&self, _options: &EngineOptions) -> Result<(), RecognizeError> {
            Ok(())
        }

        async fn recognize(
            &self,
            _request: &RecognitionRequest,
            _options: &EngineOptions,
        ) -> Result<Value, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    struct ScriptedBackend {
        response: Result<Value, RecognizeError>,
        calls: AtomicUsize,
        last_request: Mutex<Option<RecognitionRequest>>,
    }

    impl ScriptedBackend {
        fn ok(data: Value) -> Self {
            Self {
                response: Ok(data),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn err(error: RecognizeError) -> Self {
            Self {
                response: Err(error),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl BackendRecognizer for ScriptedBackend {
        async fn recognize(
            &self,
            request: &RecognitionRequest,
        ) -> Result<Recognition, RecognizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            self.response.clone().map(|data| Recognition {
                data,
                runtime: crate::recognition::types::RuntimeMeta::for_engine(Engine::Backend),
            })
        }
    }

    fn selector(native: Arc<ScriptedNative>, backend: Arc<ScriptedBackend>) -> EngineSelector {
        let on_device = OnDeviceAdapter::with_warmup_cell(
            native,
            &OnDeviceConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        EngineSelector::new(on_device, backend, 0.45)
    }

    fn labelled_request(label: &str) -> RecognitionRequest {
        RecognitionRequest {
            detected_label: Some(label.into()),
            image_data: None,
            confidence_hint: Some(0.9),
        }
    }

    // -----------------------------------------------------------------------
    // Confidence gate
    // -----------------------------------------------------------------------

    /// c ≥ threshold: the on-device result is returned unmodified and the
    /// backend is never called.
    #[tokio::test]
    async fn confident_on_device_result_is_kept_without_backend_call() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.50, "label": "can" })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.99 })));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::OnDevice);
        assert!(recognition.runtime.fallback_from.is_none());
        assert!(recognition.runtime.on_device_confidence.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    /// Unreadable confidence is accepted as-is.
    #[tokio::test]
    async fn unreadable_confidence_is_trusted() {
        let native = Arc::new(ScriptedNative::ok(json!({ "label": "mystery item" })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.99 })));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::OnDevice);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    /// c < threshold with a successful backend fallback: backend result
    /// returned with the full fallback metadata.
    #[tokio::test]
    async fn low_confidence_falls_back_to_backend() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.40 })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.95, "label": "bottle" })));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&labelled_request("plastic bottle"), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::Backend);
        assert_eq!(recognition.runtime.fallback_from, Some(Engine::OnDevice));
        assert_eq!(recognition.runtime.on_device_confidence, Some(0.40));
        assert_eq!(recognition.runtime.on_device_fallback_threshold, Some(0.45));
        let reason = recognition.runtime.fallback_reason.unwrap();
        assert!(reason.contains("0.400"), "reason: {reason}");
        assert!(reason.contains("0.450"), "reason: {reason}");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// The fallback payload keeps the caller's label, drops the image and
    /// preserves the confidence hint.
    #[tokio::test]
    async fn fallback_payload_is_label_only() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.40 })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.95 })));
        let s = selector(native, backend.clone());

        let request = RecognitionRequest {
            detected_label: Some("plastic bottle".into()),
            image_data: Some("aGVsbG8=".into()),
            confidence_hint: Some(0.9),
        };
        s.recognize(&request, EnginePreference::Auto).await.unwrap();

        let sent = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.detected_label.as_deref(), Some("plastic bottle"));
        assert!(sent.image_data.is_none());
        assert_eq!(sent.confidence_hint, Some(0.9));
    }

    /// Without a caller label, the on-device result's own best guess is
    /// promoted into the fallback payload.
    #[tokio::test]
    async fn fallback_payload_derives_label_from_on_device_result() {
        let native = Arc::new(ScriptedNative::ok(json!({
            "confidence": 0.40,
            "candidates": [{ "label": "glass jar", "score": 0.4 }, "tin"]
        })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.95 })));
        let s = selector(native, backend.clone());

        let request = RecognitionRequest {
            detected_label: None,
            image_data: Some("aGVsbG8=".into()),
            confidence_hint: None,
        };
        s.recognize(&request, EnginePreference::Auto).await.unwrap();

        let sent = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.detected_label.as_deref(), Some("glass jar"));
        assert!(sent.image_data.is_none());
    }

    /// Hard floor ≤ c < threshold with a failing backend: degrade to the
    /// original on-device result instead of failing the call.
    #[tokio::test]
    async fn degrades_to_on_device_result_when_fallback_fails_above_floor() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.35, "label": "cup" })));
        let backend = Arc::new(ScriptedBackend::err(RecognizeError::Http {
            status: 502,
            message: "Request failed (502)".into(),
        }));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::OnDevice);
        assert_eq!(recognition.data["label"], json!("cup"));
        assert_eq!(recognition.runtime.degraded_to_on_device, Some(true));
        assert_eq!(recognition.runtime.fallback_attempted, Some(true));
        assert_eq!(
            recognition.runtime.fallback_error.as_deref(),
            Some("Request failed (502)")
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// c < hard floor with a failing backend: the call is rejected, naming
    /// both the confidence and the backend failure.
    #[tokio::test]
    async fn rejects_below_hard_floor_when_fallback_fails() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.20 })));
        let backend = Arc::new(ScriptedBackend::err(RecognizeError::Http {
            status: 502,
            message: "Request failed (502)".into(),
        }));
        let s = selector(native, backend);

        let err = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap_err();

        match &err {
            RecognizeError::RejectedLowConfidence { confidence, fallback_error } => {
                assert_eq!(*confidence, 0.20);
                assert!(fallback_error.contains("502"));
            }
            other => panic!("expected RejectedLowConfidence, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("0.200"), "message: {msg}");
        assert!(msg.contains("Request failed (502)"), "message: {msg}");
    }

    // -----------------------------------------------------------------------
    // Preference state machine
    // -----------------------------------------------------------------------

    /// Preference `Backend` never touches the on-device engine.
    #[tokio::test]
    async fn backend_preference_never_invokes_on_device() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.99 })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.9 })));
        let s = selector(native.clone(), backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Backend)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::Backend);
        assert_eq!(native.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// Preference `Backend` propagates failures unchanged.
    #[tokio::test]
    async fn backend_preference_propagates_failures() {
        let native = Arc::new(ScriptedNative::ok(json!({})));
        let backend = Arc::new(ScriptedBackend::err(RecognizeError::Transport(
            "error sending request: connection refused".into(),
        )));
        let s = selector(native, backend);

        let err = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Backend)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognizeError::Transport(_)));
    }

    /// Preference `OnDevice`: an adapter failure propagates with no
    /// backend fallback.
    #[tokio::test]
    async fn on_device_preference_fails_without_fallback() {
        let native = Arc::new(ScriptedNative::err(RecognizeError::CapabilityUnavailable));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.9 })));
        let s = selector(native, backend.clone());

        let err = s
            .recognize(&RecognitionRequest::default(), EnginePreference::OnDevice)
            .await
            .unwrap_err();

        assert!(matches!(err, RecognizeError::CapabilityUnavailable));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    /// Preference `OnDevice` still runs the confidence gate on success,
    /// so a low-confidence result may legitimately reach the backend.
    #[tokio::test]
    async fn on_device_preference_still_gates_confidence() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.10, "label": "cup" })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.88 })));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::OnDevice)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::Backend);
        assert_eq!(recognition.runtime.fallback_from, Some(Engine::OnDevice));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// `Auto` on a non-capable platform behaves identically to `Backend`.
    #[tokio::test]
    async fn auto_without_capability_goes_straight_to_backend() {
        let native = Arc::new(ScriptedNative::unavailable());
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.9 })));
        let s = selector(native.clone(), backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::Backend);
        assert!(recognition.runtime.fallback_from.is_none());
        assert_eq!(native.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// `Auto` + a throwing on-device path: exactly one backend call,
    /// annotated with the on-device failure as the fallback reason.
    #[tokio::test]
    async fn auto_falls_back_once_when_on_device_throws() {
        let native = Arc::new(ScriptedNative::err(RecognizeError::CapabilityUnavailable));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.9 })));
        let s = selector(native, backend.clone());

        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();

        assert_eq!(recognition.runtime.engine, Engine::Backend);
        assert_eq!(recognition.runtime.fallback_from, Some(Engine::OnDevice));
        assert_eq!(
            recognition.runtime.fallback_reason.as_deref(),
            Some("On-device recognition is not available in this build")
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    /// `Auto` + both engines failing: the backend failure propagates and
    /// no further attempts are made.
    #[tokio::test]
    async fn auto_propagates_backend_failure_after_on_device_failure() {
        let native = Arc::new(ScriptedNative::err(RecognizeError::InvalidResponse));
        let backend = Arc::new(ScriptedBackend::err(RecognizeError::Http {
            status: 500,
            message: "Request failed (500)".into(),
        }));
        let s = selector(native.clone(), backend.clone());

        let err = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap_err();

        assert!(matches!(err, RecognizeError::Http { status: 500, .. }));
        assert_eq!(native.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// The threshold is clamped so it can never undercut the hard floor.
    #[tokio::test]
    async fn threshold_is_clamped_to_hard_floor() {
        let native = Arc::new(ScriptedNative::ok(json!({ "confidence": 0.25 })));
        let backend = Arc::new(ScriptedBackend::ok(json!({ "confidence": 0.9 })));
        let on_device = OnDeviceAdapter::with_warmup_cell(
            native,
            &OnDeviceConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        // 0.1 would sit below the 0.30 floor; construction raises it.
        let s = EngineSelector::new(on_device, backend.clone(), 0.1);

        // 0.25 < 0.30, so the gate must fire a fallback.
        let recognition = s
            .recognize(&RecognitionRequest::default(), EnginePreference::Auto)
            .await
            .unwrap();
        assert_eq!(recognition.runtime.on_device_fallback_threshold, Some(HARD_REJECT_CONFIDENCE));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
