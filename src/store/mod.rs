mod http;

pub use http::HttpStore;

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Where the assembled object ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub container: String,
    pub key: String,
}

/// Proof that one part was durably uploaded.
///
/// Finalization requires the complete set, ordered ascending by part number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartReceipt {
    pub part_number: u32,
    pub integrity_tag: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store responded with status {0}")]
    Status(u16),

    #[error("malformed store response: {0}")]
    Response(String),
}

impl StoreError {
    /// Throttling and server-side faults are worth retrying; everything else
    /// is a rejection of the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(err) => err.is_connect() || err.is_timeout(),
            StoreError::Status(status) => *status == 429 || *status >= 500,
            StoreError::Response(_) => false,
        }
    }
}

/// Multipart-upload capability of the destination object store.
///
/// One session spans create → upload parts → complete, with abort as the
/// compensating action. Each part number is used exactly once per session.
pub trait ObjectStore: Send + Sync + 'static {
    fn create_session(
        &self,
        dest: &Destination,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    fn upload_part(
        &self,
        dest: &Destination,
        session_id: &str,
        part_number: u32,
        body: tokio::fs::File,
        content_length: u64,
    ) -> impl Future<Output = Result<PartReceipt, StoreError>> + Send;

    fn complete_session(
        &self,
        dest: &Destination,
        session_id: &str,
        parts: &[PartReceipt],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn abort_session(
        &self,
        dest: &Destination,
        session_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
