//! Boundary with the messaging transport collaborator.
//!
//! The crate never talks to a concrete messaging service. Inbound traffic
//! arrives as [`InboundEvent`]s, outbound traffic leaves through the
//! [`Transport`] trait, and selection buttons round-trip an opaque
//! `crop:<position|custom>:<submission id>` token.

use std::path::Path;

use crate::error_code::ErrorCode;

pub use crate::crop::CropPosition;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to the remote media object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRef(String);

impl AssetRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifies one submission across selection round-trips. Minted from the
/// event id of the upload that created it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&EventId> for SubmissionId {
    fn from(id: &EventId) -> Self {
        Self(id.0.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Reset,
}

#[derive(Clone, Debug)]
pub struct MediaUpload {
    pub asset: AssetRef,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
}

#[derive(Clone, Debug)]
pub enum InboundEvent {
    Command {
        id: EventId,
        owner: OwnerId,
        command: Command,
    },
    MediaUpload {
        id: EventId,
        owner: OwnerId,
        upload: MediaUpload,
    },
    Text {
        id: EventId,
        owner: OwnerId,
        text: String,
    },
    Selection {
        id: EventId,
        owner: OwnerId,
        token: String,
    },
}

impl InboundEvent {
    pub(crate) fn id(&self) -> &EventId {
        match self {
            Self::Command { id, .. }
            | Self::MediaUpload { id, .. }
            | Self::Text { id, .. }
            | Self::Selection { id, .. } => id,
        }
    }
}

/// One labeled action in the inline selection prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionButton {
    pub label: String,
    pub token: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedAsset {
    pub url: url::Url,
    pub byte_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Upstream declined to serve the asset")]
    AssetUnavailable(#[source] Option<Box<dyn std::error::Error + Send + Sync>>),

    #[error("Failed to deliver a reply")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::AssetUnavailable(_) => ErrorCode::ASSET_UNAVAILABLE,
            Self::Delivery(_) => ErrorCode::REPLY_DELIVERY_ERROR,
        }
    }
}

/// Outbound half of the messaging collaborator.
#[async_trait::async_trait(?Send)]
pub trait Transport {
    /// Resolve an opaque media reference to a downloadable location and
    /// its declared size.
    async fn resolve_asset(&self, asset: &AssetRef) -> Result<ResolvedAsset, TransportError>;

    async fn send_text(&self, to: &OwnerId, text: &str) -> Result<(), TransportError>;

    async fn send_selection_prompt(
        &self,
        to: &OwnerId,
        text: &str,
        buttons: &[SelectionButton],
    ) -> Result<(), TransportError>;

    async fn send_photo(&self, to: &OwnerId, photo: &Path) -> Result<(), TransportError>;

    async fn send_video_note(&self, to: &OwnerId, video: &Path) -> Result<(), TransportError>;

    /// Show the "uploading a video note" status indicator.
    async fn indicate_upload(&self, to: &OwnerId) -> Result<(), TransportError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SelectionKind {
    Preset(CropPosition),
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SelectionToken {
    pub(crate) kind: SelectionKind,
    pub(crate) submission: SubmissionId,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum TokenError {
    #[error("Selection token has {0} fields, expected 3")]
    FieldCount(usize),

    #[error("Unknown selection action {0:?}")]
    UnknownAction(String),

    #[error("Unknown crop position {0:?}")]
    UnknownPosition(String),
}

impl TokenError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        ErrorCode::MALFORMED_SELECTION_TOKEN
    }
}

impl SelectionToken {
    pub(crate) fn preset(position: CropPosition, submission: SubmissionId) -> Self {
        Self {
            kind: SelectionKind::Preset(position),
            submission,
        }
    }

    pub(crate) fn custom(submission: SubmissionId) -> Self {
        Self {
            kind: SelectionKind::Custom,
            submission,
        }
    }

    pub(crate) fn encode(&self) -> String {
        let action = match &self.kind {
            SelectionKind::Preset(position) => position.as_token(),
            SelectionKind::Custom => "custom",
        };

        format!("crop:{action}:{}", self.submission.as_str())
    }

    pub(crate) fn parse(raw: &str) -> Result<Self, TokenError> {
        let fields: Vec<&str> = raw.split(':').collect();

        let [prefix, action, submission] = fields[..] else {
            return Err(TokenError::FieldCount(fields.len()));
        };

        if prefix != "crop" {
            return Err(TokenError::UnknownAction(prefix.to_string()));
        }

        let kind = if action == "custom" {
            SelectionKind::Custom
        } else {
            CropPosition::from_token(action)
                .map(SelectionKind::Preset)
                .ok_or_else(|| TokenError::UnknownPosition(action.to_string()))?
        };

        Ok(Self {
            kind,
            submission: SubmissionId::new(submission),
        })
    }
}
