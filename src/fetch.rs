use std::path::PathBuf;

use reqwest_middleware::ClientWithMiddleware;
use tokio::io::AsyncWriteExt;

use crate::{error_code::ErrorCode, tmp_file::ScratchDir, transport::ResolvedAsset};

#[derive(Debug)]
pub(crate) struct FetchedAsset {
    pub(crate) path: PathBuf,
    pub(crate) byte_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FetchError {
    #[error("Asset is {size} bytes, over the {} byte ceiling", crate::MAX_ASSET_BYTES)]
    TooLarge { size: u64 },

    #[error("Error making download request")]
    Request(#[from] reqwest_middleware::Error),

    #[error("Download request failed")]
    Response(#[source] reqwest::Error),

    #[error("Error writing fetched asset")]
    Io(#[source] std::io::Error),
}

impl FetchError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::TooLarge { .. } => ErrorCode::ASSET_TOO_LARGE,
            Self::Request(_) => ErrorCode::HTTP_CLIENT_ERROR,
            Self::Response(_) => ErrorCode::DOWNLOAD_FILE_ERROR,
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
        }
    }
}

/// Downloads a resolved asset into a submission's scratch directory.
#[async_trait::async_trait(?Send)]
pub(crate) trait Fetch {
    async fn fetch(
        &self,
        resolved: &ResolvedAsset,
        scratch: &ScratchDir,
    ) -> Result<FetchedAsset, FetchError>;
}

pub(crate) struct HttpFetcher {
    client: ClientWithMiddleware,
}

impl HttpFetcher {
    pub(crate) fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait(?Send)]
impl Fetch for HttpFetcher {
    #[tracing::instrument(skip(self, scratch))]
    async fn fetch(
        &self,
        resolved: &ResolvedAsset,
        scratch: &ScratchDir,
    ) -> Result<FetchedAsset, FetchError> {
        // The declared size is checked again here so a caller can't forget
        // the pre-download gate; nothing touches the filesystem above it.
        if resolved.byte_size > crate::MAX_ASSET_BYTES {
            return Err(FetchError::TooLarge {
                size: resolved.byte_size,
            });
        }

        let res = self
            .client
            .get(resolved.url.clone())
            .send()
            .await?
            .error_for_status()
            .map_err(FetchError::Response)?;

        let path = scratch.file(Some(".mp4"));

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(FetchError::Io)?;

        let stream = res.bytes_stream();
        let mut stream = std::pin::pin!(stream);

        let mut written = 0u64;

        // An upstream that lied about the size gets cut off at the ceiling.
        while let Some(res) =
            std::future::poll_fn(|cx| futures_core::Stream::poll_next(stream.as_mut(), cx)).await
        {
            let bytes = res.map_err(FetchError::Response)?;

            written += bytes.len() as u64;
            if written > crate::MAX_ASSET_BYTES {
                return Err(FetchError::TooLarge { size: written });
            }

            file.write_all(&bytes).await.map_err(FetchError::Io)?;
        }

        file.flush().await.map_err(FetchError::Io)?;

        tracing::debug!("Fetched {written} bytes");

        Ok(FetchedAsset {
            path,
            byte_size: written,
        })
    }
}
