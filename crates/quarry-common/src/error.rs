//! Error types for Quarry.

use thiserror::Error;

/// Top-level error type for Quarry operations.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// Damage event misuse
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by damage events and their modifier registries.
///
/// These only signal programmer misuse; nothing in the event chain performs
/// I/O, so there is no transient failure to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Operation is not valid in the event's current phase.
    #[error("`{operation}` is not allowed while the event is {phase}")]
    IllegalState {
        /// Operation that was attempted
        operation: &'static str,
        /// Phase the event was in
        phase: &'static str,
    },

    /// Lifecycle transition that the state machine does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: &'static str,
        /// Attempted phase
        to: &'static str,
    },

    /// Modifier is not part of the relevant modifier set.
    #[error("The provided damage modifier is not applicable: {0}")]
    ModifierNotApplicable(String),

    /// Modifier identity is already registered on this event.
    #[error("Cannot add a duplicate modifier: {0}")]
    DuplicateModifier(String),

    /// Key does not name an entry of a closed registry.
    #[error("Unknown {registry} key: {key}")]
    UnknownKey {
        /// Registry that was queried
        registry: &'static str,
        /// Key that failed to resolve
        key: String,
    },

    /// Builder was finished without a required field.
    #[error("{builder} requires `{field}` to be set")]
    MissingField {
        /// Builder type
        builder: &'static str,
        /// Missing field
        field: &'static str,
    },
}

impl EventError {
    /// Whether this error reports a wrong lifecycle phase.
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(
            self,
            Self::IllegalState { .. } | Self::InvalidTransition { .. } | Self::MissingField { .. }
        )
    }

    /// Whether this error reports a bad argument.
    #[must_use]
    pub const fn is_illegal_argument(&self) -> bool {
        !self.is_illegal_state()
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config text could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Quarry operations.
pub type QuarryResult<T> = Result<T, QuarryError>;

/// Result type alias for damage event operations.
pub type EventResult<T> = Result<T, EventError>;
