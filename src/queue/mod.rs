//! Offline retry queue for connectivity-classified dispatch failures.
//!
//! The queue is a caller-side collaborator: the dispatch layer never
//! enqueues anything itself.  Callers hand failed requests to
//! [`OfflineQueue::capture`] and later drive [`OfflineQueue::retry_oldest`]
//! on user demand.

pub mod offline;

pub use offline::{is_likely_offline, OfflineQueue, QueuedRequest, MAX_QUEUED_REQUESTS};
