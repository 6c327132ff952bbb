//! Event handler registration and dispatch.

pub mod registry;

pub use registry::{CategoryFilter, EventHandlerRegistry, HandlerId, IuEvent, IuEventHandler};
