use color_eyre::Report;

use crate::{
    crop::CropError,
    error_code::ErrorCode,
    fetch::FetchError,
    ffmpeg::TransformError,
    transport::{TokenError, TransportError},
};

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&ProcessingError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    ProcessingError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(ProcessingError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProcessingError {
    #[error("Error at the transport boundary")]
    Transport(#[from] TransportError),

    #[error("Error fetching asset")]
    Fetch(#[from] FetchError),

    #[error("Error in media toolchain")]
    Transform(#[from] TransformError),

    #[error("Invalid crop selection")]
    Crop(#[from] CropError),

    #[error("Corrupt selection token")]
    Token(#[from] TokenError),

    #[error("Error interacting with filesystem")]
    Io(#[from] std::io::Error),
}

impl ProcessingError {
    pub(crate) fn error_code(&self) -> ErrorCode {
        match self {
            Self::Transport(e) => e.error_code(),
            Self::Fetch(e) => e.error_code(),
            Self::Transform(e) => e.error_code(),
            Self::Crop(e) => e.error_code(),
            Self::Token(e) => e.error_code(),
            Self::Io(_) => ErrorCode::IO_ERROR,
        }
    }

    /// The single user-facing reply for a failed step. Toolchain internals
    /// never leak through here.
    pub(crate) fn user_notice(&self) -> String {
        match self {
            Self::Transport(TransportError::AssetUnavailable(_)) => String::from(
                "The upstream service would not let me download this video.\n\
                 \n\
                 Likely causes:\n\
                 - very high quality (for example 1080p at a high bitrate)\n\
                 - the video was attached as a file rather than as a video\n\
                 - some desktop clients produce mp4s the service refuses to serve\n\
                 \n\
                 What usually helps:\n\
                 1. resend the video from your phone\n\
                 2. or forward it to your saved messages first, then here\n\
                 3. or run it through an online compressor and resend",
            ),
            Self::Fetch(FetchError::TooLarge { .. }) => String::from(
                "That video is larger than 49 MiB. Please trim or compress it and send it again.",
            ),
            Self::Crop(CropError::OutOfBounds {
                side,
                width,
                height,
                ..
            }) => format!(
                "A {side}x{side} window at those coordinates does not fit inside the \
                 {width}x{height} frame. Send another x:y pair.",
            ),
            Self::Crop(CropError::PositionMismatch { .. }) => {
                String::from("That crop position does not apply to this video. Pick another option.")
            }
            Self::Token(e) => format!("That selection is malformed ({e}). Send the video again."),
            _ => String::from("Something went wrong while processing your video. Please try again."),
        }
    }
}
