//! Message payload model
//!
//! The engine treats payloads as opaque content to hand to the transport.
//! Media is referenced by handle; bytes never pass through the dispatcher.

use std::{
    fmt::{self, Display},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// An opaque handle to already-uploaded media
///
/// The value is whatever the provider issued at upload time. The engine
/// only carries it along; resolution happens inside the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MediaRef(Arc<str>);

impl MediaRef {
    #[must_use]
    pub fn new(handle: impl Into<Arc<str>>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaRef {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for MediaRef {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// Content of a single outbound message.
///
/// One payload is shared across every job of a dispatch; senders hold it
/// behind an `Arc` and never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePayload {
    Text {
        body: Arc<str>,
    },
    Image {
        media: MediaRef,
        caption: Option<Arc<str>>,
    },
    Document {
        media: MediaRef,
        file_name: Arc<str>,
    },
}

impl MessagePayload {
    #[must_use]
    pub fn text(body: impl Into<Arc<str>>) -> Self {
        Self::Text { body: body.into() }
    }

    #[must_use]
    pub fn image(media: MediaRef, caption: Option<Arc<str>>) -> Self {
        Self::Image { media, caption }
    }

    #[must_use]
    pub fn document(media: MediaRef, file_name: impl Into<Arc<str>>) -> Self {
        Self::Document {
            media,
            file_name: file_name.into(),
        }
    }

    /// Payload kind as a static label, for logs and failure reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
        }
    }

    /// Whether the payload carries no deliverable content.
    ///
    /// A text message with a blank body, or a media message whose handle is
    /// blank, can never be delivered and is rejected before any batch is
    /// scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { body } => body.trim().is_empty(),
            Self::Image { media, .. } | Self::Document { media, .. } => {
                media.as_str().trim().is_empty()
            }
        }
    }
}
