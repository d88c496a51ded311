//! # Quarry Common
//!
//! Common types shared by the Quarry plugin API crates:
//! - ID types (EntityId, ModifierId, ListenerId)
//! - Error types for event misuse and configuration
//! - Schema versions for serialized reports and configs
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
