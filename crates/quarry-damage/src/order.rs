//! Listener priority.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority bucket a listener runs in. Earlier variants run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    /// Runs before everything else; for listeners that only observe or cancel.
    Pre,
    /// Right after `Pre`.
    AfterPre,
    /// First of the regular buckets.
    First,
    /// Early.
    Early,
    /// Default bucket.
    #[default]
    Default,
    /// Late.
    Late,
    /// Last of the regular buckets.
    Last,
    /// Right before `Post`.
    BeforePost,
    /// Runs after everything else; for listeners that only observe.
    Post,
}

impl Order {
    /// Every order in execution order.
    pub const ALL: [Self; 9] = [
        Self::Pre,
        Self::AfterPre,
        Self::First,
        Self::Early,
        Self::Default,
        Self::Late,
        Self::Last,
        Self::BeforePost,
        Self::Post,
    ];

    /// Name of the order.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::AfterPre => "after_pre",
            Self::First => "first",
            Self::Early => "early",
            Self::Default => "default",
            Self::Late => "late",
            Self::Last => "last",
            Self::BeforePost => "before_post",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
