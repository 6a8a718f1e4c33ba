//! Caller-side offline retry queue.
//!
//! A dispatch failure is treated as "likely offline" only when it carries
//! no explicit error code **and** its message matches one of a small fixed
//! set of transport-failure phrases.  Classified failures are queued
//! (payload + preferred engine + timestamp) up to a fixed cap; entries
//! beyond the cap are dropped silently, newest kept.  Retry is manual and
//! FIFO: the true oldest entry is re-dispatched first, removed on success
//! and left queued on failure.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::recognition::dispatch::EngineSelector;
use crate::recognition::error::RecognizeError;
use crate::recognition::types::{EnginePreference, Recognition, RecognitionRequest};

/// Maximum number of queued requests kept at once.
pub const MAX_QUEUED_REQUESTS: usize = 20;

/// Transport-failure phrases used for the "likely offline" classification.
/// Substring matching is a known reliability gap; the phrases follow
/// reqwest's transport error vocabulary.
const TRANSPORT_FAILURE_PHRASES: [&str; 5] = [
    "error sending request",
    "connection refused",
    "connection reset",
    "dns error",
    "network unreachable",
];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Whether a dispatch failure looks like lost connectivity rather than a
/// definite answer from either engine.
pub fn is_likely_offline(error: &RecognizeError) -> bool {
    if error.code().is_some() {
        return false;
    }
    let message = error.to_string();
    TRANSPORT_FAILURE_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}

// ---------------------------------------------------------------------------
// QueuedRequest
// ---------------------------------------------------------------------------

/// One captured scan request awaiting a manual retry.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    /// Monotonic queue id, unique within the process.
    pub id: u64,
    /// The original payload, re-dispatched as-is on retry.
    pub payload: RecognitionRequest,
    /// Engine preference active when the failure occurred.
    pub preferred_engine: EnginePreference,
    /// Capture time.
    pub created_at: SystemTime,
}

fn next_queue_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// OfflineQueue
// ---------------------------------------------------------------------------

/// Bounded FIFO of connectivity-classified dispatch failures.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    entries: VecDeque<QueuedRequest>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry that will be retried next.
    pub fn oldest(&self) -> Option<&QueuedRequest> {
        self.entries.front()
    }

    /// Capture a dispatch failure.
    ///
    /// Returns `true` when the failure was connectivity-classified and the
    /// request queued; non-offline failures are left to the caller's error
    /// presentation and never queued.
    pub fn capture(
        &mut self,
        error: &RecognizeError,
        payload: RecognitionRequest,
        preferred_engine: EnginePreference,
    ) -> bool {
        if !is_likely_offline(error) {
            return false;
        }
        self.entries.push_back(QueuedRequest {
            id: next_queue_id(),
            payload,
            preferred_engine,
            created_at: SystemTime::now(),
        });
        while self.entries.len() > MAX_QUEUED_REQUESTS {
            // Oldest dropped silently, newest kept.
            self.entries.pop_front();
        }
        log::info!("Queued offline scan request ({} pending)", self.entries.len());
        true
    }

    /// Manually retry the oldest queued request through the selector.
    ///
    /// Success removes the entry; failure re-queues it at the front for a
    /// later manual attempt.  Returns `None` when the queue is empty.
    pub async fn retry_oldest(
        &mut self,
        selector: &EngineSelector,
    ) -> Option<Result<Recognition, RecognizeError>> {
        let next = self.entries.pop_front()?;
        match selector.recognize(&next.payload, next.preferred_engine).await {
            Ok(recognition) => {
                log::info!("Queued scan {} processed successfully", next.id);
                Some(Ok(recognition))
            }
            Err(error) => {
                log::warn!("Retry of queued scan {} failed: {error}", next.id);
                self.entries.push_front(next);
                Some(Err(error))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
