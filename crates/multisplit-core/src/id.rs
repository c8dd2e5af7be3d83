#![forbid(unsafe_code)]

//! Opaque string-backed identifiers.
//!
//! [`PaneId`], [`NodeId`] and [`WidgetId`] all wrap a `String`, but they are
//! distinct types so a split node id can never be passed where a pane id is
//! expected. All three serialize transparently as plain JSON strings.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw identifier string.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return the raw string.
            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }

            /// `true` when the raw identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identity of a pane (a leaf of the split tree).
    ///
    /// Survives moves, resizes, and serialization round-trips.
    PaneId
);

string_id!(
    /// Identity of a split node.
    NodeId
);

string_id!(
    /// Content hint handed to the host's widget factory.
    ///
    /// By convention the raw string has the shape `type_hint:identifier`,
    /// e.g. `editor:main.py`. Any string is accepted; the two halves are
    /// derived on demand.
    WidgetId
);

impl WidgetId {
    /// Separator between the type hint and the identifier.
    pub const SEPARATOR: char = ':';

    /// Build a widget id from its two parts.
    #[must_use]
    pub fn from_parts(type_hint: &str, identifier: &str) -> Self {
        Self(format!("{type_hint}{}{identifier}", Self::SEPARATOR))
    }

    /// The text before the first `:`, or the whole id when there is none.
    #[must_use]
    pub fn type_hint(&self) -> &str {
        match self.0.split_once(Self::SEPARATOR) {
            Some((hint, _)) => hint,
            None => &self.0,
        }
    }

    /// The text after the first `:`, or `""` when there is none.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self.0.split_once(Self::SEPARATOR) {
            Some((_, ident)) => ident,
            None => "",
        }
    }
}
