//! Integration test crate for the Kestrel trust overlay.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise the routing table end to end through its public API:
//! registration and splits, liveness aging, closest-peer queries, and
//! concurrent access.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p kestrel-integration-tests
//! ```
