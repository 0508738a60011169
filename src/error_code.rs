#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code)
    }
}

impl ErrorCode {
    pub(crate) const ASSET_UNAVAILABLE: ErrorCode = ErrorCode {
        code: "asset-unavailable",
    };
    pub(crate) const ASSET_TOO_LARGE: ErrorCode = ErrorCode {
        code: "asset-too-large",
    };
    pub(crate) const PROBE_FAILED: ErrorCode = ErrorCode {
        code: "probe-failed",
    };
    pub(crate) const TRANSCODE_FAILED: ErrorCode = ErrorCode {
        code: "transcode-failed",
    };
    pub(crate) const INVALID_CROP_REGION: ErrorCode = ErrorCode {
        code: "invalid-crop-region",
    };
    pub(crate) const MALFORMED_SELECTION_TOKEN: ErrorCode = ErrorCode {
        code: "malformed-selection-token",
    };
    pub(crate) const COMMAND_NOT_FOUND: ErrorCode = ErrorCode {
        code: "command-not-found",
    };
    pub(crate) const COMMAND_PERMISSION_DENIED: ErrorCode = ErrorCode {
        code: "command-permission-denied",
    };
    pub(crate) const COMMAND_TIMEOUT: ErrorCode = ErrorCode {
        code: "command-timeout",
    };
    pub(crate) const COMMAND_ERROR: ErrorCode = ErrorCode {
        code: "command-error",
    };
    pub(crate) const COMMAND_FAILURE: ErrorCode = ErrorCode {
        code: "command-failure",
    };
    pub(crate) const PROCESS_SEMAPHORE_CLOSED: ErrorCode = ErrorCode {
        code: "process-semaphore-closed",
    };
    pub(crate) const HTTP_CLIENT_ERROR: ErrorCode = ErrorCode {
        code: "http-client-error",
    };
    pub(crate) const DOWNLOAD_FILE_ERROR: ErrorCode = ErrorCode {
        code: "download-file-error",
    };
    pub(crate) const FILE_IO_ERROR: ErrorCode = ErrorCode {
        code: "file-io-error",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const REPLY_DELIVERY_ERROR: ErrorCode = ErrorCode {
        code: "reply-delivery-error",
    };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
