//! EcoLens recognition dispatch layer.
//!
//! Routes an "identify this item" request to one of two heterogeneous
//! recognition providers — a resource-constrained on-device inference
//! engine, or the remote recognition service — decides whether a locally
//! produced answer is trustworthy enough to keep, and falls back across
//! providers while preserving availability under partial failure.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      EngineSelector                        │
//! │                                                            │
//! │  ┌────────────────┐          ┌────────────────┐            │
//! │  │ OnDeviceAdapter │          │  HttpBackend   │            │
//! │  │ - availability  │          │ - POST         │            │
//! │  │ - warmup (once) │          │   /api/recognize│           │
//! │  │ - validation    │          │ - bearer auth  │            │
//! │  └───────┬────────┘          └───────┬────────┘            │
//! │          │        with_deadline      │                     │
//! │          └───────────┬───────────────┘                     │
//! │                      ▼                                     │
//! │        confidence gate + degradation policy                │
//! └───────────────┬────────────────────────────────────────────┘
//!                 ▼
//!   { data, runtime } or RecognizeError
//!                 │
//!                 ▼ (caller, connectivity failures only)
//!           OfflineQueue
//! ```
//!
//! Screens, camera capture, identity exchange and history persistence are
//! collaborators of this crate, not part of it.

pub mod config;
pub mod queue;
pub mod recognition;
