//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging a
//! [`DocumentId`] with a [`ConversationId`] even though both are `u64` under
//! the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (store-assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — store-assigned integers
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a conversation: the owner of messages and documents.
    ConversationId
}

u64_id! {
    /// Identifies a logical document whose content evolves as a version chain.
    DocumentId
}

u64_id! {
    /// Identifies one message recorded within a conversation.
    MessageId
}

// ---------------------------------------------------------------------------
// Version numbers
// ---------------------------------------------------------------------------

/// Position of a [`crate::DocumentVersion`] within its document's chain.
///
/// Always `>= 1`. For one document, version numbers form the gapless sequence
/// `1, 2, …, current_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VersionNumber(u32);

impl VersionNumber {
    /// The first version of every document.
    pub const FIRST: Self = Self(1);

    /// Creates a version number, returning `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the version immediately after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl TryFrom<u32> for VersionNumber {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "version numbers start at 1".to_string())
    }
}

impl From<VersionNumber> for u32 {
    fn from(value: VersionNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single dispatch (one inbound request through the engine).
///
/// Generated fresh for every request; propagated through spans and result
/// metadata so all activity from one request can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new random request identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RequestId`] from an existing UUID (e.g. from an inbound header).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a specialist handler (e.g. `"generalist"`, `"code_assistant"`).
    ///
    /// Labels are the keys of the specialist registry and the values produced
    /// by the classifier's rule table.
    HandlerLabel
}

impl HandlerLabel {
    /// Label of the generalist handler that receives unclassified requests.
    pub const GENERALIST: &'static str = "generalist";

    /// Returns the generalist label.
    pub fn generalist() -> Self {
        Self(Self::GENERALIST.to_string())
    }

    /// Returns `true` if this is the generalist label.
    pub fn is_generalist(&self) -> bool {
        self.0 == Self::GENERALIST
    }
}

string_id! {
    /// A model identifier understood by one backend kind
    /// (e.g. `"gpt-4o-mini"`, `"qwen3:8b"`).
    ModelId
}

impl ModelId {
    /// Wraps a known non-blank literal such as a kind's default model.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }
}
