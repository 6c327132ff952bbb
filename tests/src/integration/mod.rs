//! Cross-buffer scenarios.

mod harness;

mod concurrency;
mod e2e_sync;
mod lifecycle;
mod messages;
