//! Newtype wrappers for domain identifiers.
//!
//! Both identifiers are opaque strings: job ids may be supplied by callers,
//! and user ids arrive already resolved from the upstream auth gateway.
//! Distinct types prevent accidentally passing a `UserId` where a `JobId`
//! is expected.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `String`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the identifier is empty or only whitespace.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a job.
    JobId
);

define_id!(
    /// Identity of the user that owns a job or a live connection.
    UserId
);

impl JobId {
    /// Maximum length accepted for caller-supplied job ids.
    pub const MAX_LEN: usize = 128;

    /// Generate a fresh id of the form `job_<unix-nanos>_<8 hex>`.
    ///
    /// The random suffix keeps ids unique when two submissions land on the
    /// same clock tick.
    pub fn generate() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("job_{nanos}_{}", &suffix[..8]))
    }
}
