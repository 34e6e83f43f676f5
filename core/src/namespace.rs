//! Namespace and scope code types.
//!
//! A [`Namespace`] names one independent allocation stream and doubles as the key of
//! the persisted counter document. A [`ScopeCode`] is the owning code (for example an
//! operator code) that partitions scoped streams from one another.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a scope code, in bytes.
pub const MAX_SCOPE_CODE_LEN: usize = 64;

/// Key of one allocation stream and of its counter document.
///
/// Examples: `"bookingId_OP001"`, `"driverId_OP001"`, `"adminId"`, `"passengerId"`.
///
/// # Validation
///
/// - `FromStr::from_str()`: rejects empty strings (use for external input)
/// - `new()` and `From`: no validation (for namespaces derived by this crate)
///
/// # Examples
///
/// ```
/// use seqalloc_core::namespace::Namespace;
///
/// let ns = Namespace::new("adminId");
/// assert_eq!(ns.as_str(), "adminId");
///
/// assert!("".parse::<Namespace>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace from a string without validation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Namespace {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for Namespace {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Namespace {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated owning code of a scoped allocation stream (usually an operator code).
///
/// Surrounding whitespace is trimmed. The remaining text must be 1 to
/// [`MAX_SCOPE_CODE_LEN`] ASCII alphanumerics, `-` or `_`. In particular `/` is
/// rejected: it separates the scope code from the sequence in formatted identifiers.
///
/// # Examples
///
/// ```
/// use seqalloc_core::namespace::ScopeCode;
///
/// let scope: ScopeCode = " OP001 ".parse().unwrap();
/// assert_eq!(scope.as_str(), "OP001");
///
/// assert!("OP/001".parse::<ScopeCode>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeCode(String);

impl ScopeCode {
    /// Get the scope code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScopeCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let malformed = |reason: &'static str| ValidationError::MalformedScope {
            value: s.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(malformed("must not be empty"));
        }
        if trimmed.len() > MAX_SCOPE_CODE_LEN {
            return Err(malformed("must be at most 64 characters"));
        }
        if !trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(malformed(
                "may only contain ASCII letters, digits, '-' and '_'",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for ScopeCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
