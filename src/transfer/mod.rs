mod orchestrator;
mod worker;

pub use orchestrator::{
    Orchestrator, TransferConfig, TransferRequest, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_TASKS,
};

use serde::Serialize;

use crate::error::TransferError;
use crate::store::ObjectStore;

/// The single terminal outcome reported to callers. Internal retries and
/// partial per-part successes are never surfaced.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed { error: FailureInfo },
}

#[derive(Debug, Serialize)]
pub struct FailureInfo {
    pub kind: &'static str,
    pub message: String,
}

impl From<Result<(), TransferError>> for Outcome {
    fn from(result: Result<(), TransferError>) -> Self {
        match result {
            Ok(()) => Outcome::Succeeded,
            Err(err) => Outcome::Failed {
                error: FailureInfo {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            },
        }
    }
}

pub async fn transfer<S: ObjectStore>(
    request: TransferRequest,
    store: S,
    config: TransferConfig,
) -> Result<(), TransferError> {
    Orchestrator::new(store, config).run(request).await
}
