//! # Domain Layer - Incremental Units
//!
//! ## Components
//!
//! - `iu`: the `Iu` interface shared by every variant
//! - `local`: `LocalIu`, the authoritative copy held by the owner
//! - `remote`: `RemoteIu`, the proxy held by input buffers
//! - `edits`: `PayloadEdit`, `LinkEdit` and their resolved changes
//! - `state`: precondition and apply rules under the IU lock
//! - `errors`: `IuError`

pub mod edits;
pub mod errors;
pub mod iu;
pub mod local;
pub mod remote;
pub(crate) mod state;

pub use edits::{LinkEdit, PayloadEdit};
pub use errors::IuError;
pub use iu::{Iu, IuRef};
pub use local::LocalIu;
pub use remote::RemoteIu;
