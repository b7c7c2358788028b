//! Recipient identity newtypes
//!
//! Wraps channel identities so they cannot be confused with display names,
//! media handles, or other plain strings. Identities are opaque to the
//! dispatch engine; only the transport knows how to interpret them.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing a [`RecipientId`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipientIdError {
    #[error("recipient identity is empty")]
    Empty,

    #[error("recipient identity contains whitespace: {0:?}")]
    ContainsWhitespace(String),
}

/// A channel identity string wrapper for type safety
///
/// The engine never parses or normalises identities beyond rejecting the
/// degenerate cases here. The `#[repr(transparent)]` attribute ensures this
/// is a zero-cost abstraction at runtime.
///
/// # Examples
///
/// ```
/// use herald_common::RecipientId;
///
/// let id = RecipientId::new("27115550100")?;
/// assert_eq!(id.as_str(), "27115550100");
/// # Ok::<(), herald_common::RecipientIdError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RecipientId(Arc<str>);

impl RecipientId {
    /// Create a new `RecipientId`, rejecting blank or whitespace-bearing
    /// identities.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`RecipientIdError::Empty`] if the identity is empty after
    /// trimming, and [`RecipientIdError::ContainsWhitespace`] if whitespace
    /// remains inside the identity.
    pub fn new(id: impl AsRef<str>) -> Result<Self, RecipientIdError> {
        let trimmed = id.as_ref().trim();

        if trimmed.is_empty() {
            return Err(RecipientIdError::Empty);
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(RecipientIdError::ContainsWhitespace(trimmed.to_string()));
        }

        Ok(Self(Arc::from(trimmed)))
    }

    /// Get the identity as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the identity into the inner `Arc<str>`
    #[must_use]
    pub fn into_inner(self) -> Arc<str> {
        self.0
    }
}

impl Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RecipientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for RecipientId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&str> for RecipientId {
    type Error = RecipientIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for RecipientId {
    type Error = RecipientIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecipientId> for Arc<str> {
    fn from(id: RecipientId) -> Self {
        id.0
    }
}

/// A message recipient: a channel identity plus an optional human-readable
/// name used in reports and logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub display_name: Option<Arc<str>>,
}

impl Recipient {
    #[must_use]
    pub const fn new(id: RecipientId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    #[must_use]
    pub fn named(id: RecipientId, display_name: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            display_name: Some(display_name.into()),
        }
    }

    /// The display name when present, otherwise the raw identity.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(self.id.as_str())
    }
}

impl Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{name} <{}>", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}
