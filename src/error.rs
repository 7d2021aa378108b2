use crate::store::StoreError;

/// How a failed attempt may be retried, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transport-level or throttling faults. Retried with exponential backoff.
    Transient,
    /// No known transient cause, but a small flat retry budget absorbs brief
    /// hiccups.
    Unclassified,
    /// Retrying cannot change the outcome.
    Fatal,
}

/// Every failure the transfer pipeline can surface.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("source does not support ranged fetches")]
    RangesUnsupported,

    #[error("source did not report a content length")]
    SizeUnknown,

    #[error("{0}")]
    Validation(String),

    #[error("{op} multipart session failed: {source}")]
    Session {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("source request failed: {0}")]
    SourceRequest(#[from] reqwest::Error),

    #[error("ranged fetch returned status {status}, expected 206 Partial Content")]
    UnexpectedStatus { status: u16 },

    #[error("range start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("failed to stage part bytes: {0}")]
    Staging(#[from] std::io::Error),

    #[error("part upload failed: {0}")]
    PartUpload(#[source] StoreError),
}

impl TransferError {
    /// Stable identifier reported in the machine-readable outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::RangesUnsupported => "capability",
            TransferError::SizeUnknown => "size_unknown",
            TransferError::Validation(_) => "validation",
            TransferError::Session { .. } => "session",
            TransferError::SourceRequest(_) => "transient",
            TransferError::UnexpectedStatus { .. } => "fetch",
            TransferError::InvalidRange { .. } => "invalid_range",
            TransferError::Staging(_) => "staging",
            TransferError::PartUpload(_) => "upload",
        }
    }

    /// Maps a failure onto the retry policy table.
    pub fn class(&self) -> FailureClass {
        match self {
            TransferError::SourceRequest(_) => FailureClass::Transient,
            TransferError::PartUpload(err) if err.is_transient() => FailureClass::Transient,
            TransferError::PartUpload(_) => FailureClass::Unclassified,
            TransferError::Staging(_) => FailureClass::Unclassified,
            TransferError::UnexpectedStatus { .. }
            | TransferError::InvalidRange { .. }
            | TransferError::RangesUnsupported
            | TransferError::SizeUnknown
            | TransferError::Validation(_)
            | TransferError::Session { .. } => FailureClass::Fatal,
        }
    }
}
