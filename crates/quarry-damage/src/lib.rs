//! # Quarry Damage
//!
//! Damage calculation event chain for the Quarry plugin API.
//!
//! This crate provides:
//! - Damage modifiers, modifier types and damage steps
//! - Per-event modifier registry with ordered insertion and staged steps
//! - Reducer folding the base damage through the modifiers
//! - Pre/Post damage events with a checked lifecycle
//! - Ordered listener dispatch and the pipeline driver
//! - Notices, reports and pipeline configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod event;
pub mod listener;
pub mod modifier;
pub mod notice;
pub mod order;
pub mod pipeline;
pub mod reducer;
pub mod registry;
pub mod report;
pub mod source;
pub mod step;
pub mod target;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::listener::*;
    pub use crate::modifier::*;
    pub use crate::notice::*;
    pub use crate::order::*;
    pub use crate::pipeline::*;
    pub use crate::reducer::*;
    pub use crate::registry::*;
    pub use crate::report::*;
    pub use crate::source::*;
    pub use crate::step::*;
    pub use crate::target::*;
}

pub use prelude::*;
