//! Identifier types used across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Instrument key (ISIN, CUSIP, ticker or feed-specific security string).
    InstrumentKey
);

string_id!(
    /// Curve group identifier. One group per currency in the default setup.
    GroupId
);

string_id!(
    /// Key of a single feed item inside a group (one curve pillar).
    ConstituentKey
);

impl GroupId {
    /// Group identifier for a currency code, normalized to trimmed upper case.
    pub fn currency(code: &str) -> Self {
        Self(code.trim().to_uppercase())
    }
}
