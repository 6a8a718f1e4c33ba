//! Recognition dispatch module for EcoLens.
//!
//! This module provides:
//! * [`EngineSelector`] — the single public dispatch entry point.
//! * [`NativeRecognizer`] / [`OnDeviceAdapter`] — the local inference
//!   capability boundary and its adapter (availability, warmup, deadline,
//!   validation).
//! * [`BackendRecognizer`] / [`HttpBackend`] — the remote recognition
//!   service adapter.
//! * [`with_deadline`] — the timeout guard shared by both adapters.
//! * [`RecognitionRequest`] / [`Recognition`] / [`RuntimeMeta`] — the data
//!   model flowing through a dispatch call.
//! * [`RecognizeError`] — the error taxonomy surfaced to callers.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ecolens_recognition::config::RecognitionConfig;
//! use ecolens_recognition::recognition::{
//!     EnginePreference, EngineSelector, RecognitionRequest, UnlinkedRecognizer,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RecognitionConfig::default();
//!     let selector = EngineSelector::from_config(
//!         Arc::new(UnlinkedRecognizer),
//!         "http://localhost:3000",
//!         "",
//!         &config,
//!     );
//!
//!     let request = RecognitionRequest {
//!         detected_label: Some("plastic bottle".into()),
//!         ..Default::default()
//!     };
//!
//!     match selector.recognize(&request, EnginePreference::Auto).await {
//!         Ok(recognition) => println!("{}", recognition.data),
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! ```

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod ondevice;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{build_api_url, BackendRecognizer, HttpBackend};
pub use dispatch::EngineSelector;
pub use error::{ErrorCode, RecognizeError};
pub use guard::with_deadline;
pub use ondevice::{EngineOptions, NativeRecognizer, OnDeviceAdapter, UnlinkedRecognizer};
pub use types::{
    best_label, parse_confidence, Engine, EnginePreference, ParseEnginePreferenceError,
    Recognition, RecognitionRequest, RuntimeMeta,
};
