//! # Incremental Unit Test Suite
//!
//! Scenarios that need more than one buffer: several components sharing one
//! `InMemoryTransport`, each with an output and
//! an input buffer.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # components, event log, wait_until
//!     ├── e2e_sync.rs     # owner to proxy propagation and back
//!     ├── concurrency.rs  # stale writes, local/remote races
//!     ├── lifecycle.rs    # commit, retraction, resend, self-echo, close
//!     └── messages.rs     # fire-and-forget IUs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iu-tests
//! IU_LOG_LEVEL=debug cargo test -p iu-tests -- --nocapture
//! ```

#[cfg(test)]
mod integration;
