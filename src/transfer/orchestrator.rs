use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TransferError;
use crate::partition::{partition, task_count, Range};
use crate::probe;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::store::{Destination, ObjectStore, PartReceipt};
use crate::transfer::worker::{transfer_part, PartTask};
use crate::utils::bounded::BoundedSpawner;

pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;
pub const DEFAULT_CONCURRENCY: usize = 100;
pub const DEFAULT_MAX_TASKS: usize = 10000;

/// What to transfer and where to put it.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_url: String,
    pub container: String,
    /// Defaults to the basename of the source URL path.
    pub key: Option<String>,
}

impl TransferRequest {
    fn destination(&self) -> Result<Destination, TransferError> {
        let key = match &self.key {
            Some(key) => key.clone(),
            None => {
                let url = reqwest::Url::parse(&self.source_url).map_err(|err| {
                    TransferError::Validation(format!("invalid source url: {}", err))
                })?;
                url.path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        TransferError::Validation(
                            "cannot derive a destination key from the source url".to_string(),
                        )
                    })?
            }
        };
        Ok(Destination {
            container: self.container.clone(),
            key,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub chunk_size: u64,
    pub concurrency: usize,
    pub max_tasks: usize,
    pub retry: RetryPolicy,
    pub staging_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            max_tasks: DEFAULT_MAX_TASKS,
            retry: RetryPolicy::default(),
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// Drives one transfer through partitioning, validation, session initiation,
/// bounded fan-out, and completion, with a compensating abort on any failure
/// after the session exists.
///
/// The orchestrator is the sole owner of the session id and the receipt list;
/// workers only ever read the session id.
pub struct Orchestrator<S> {
    store: Arc<S>,
    client: reqwest::Client,
    config: TransferConfig,
}

impl<S: ObjectStore> Orchestrator<S> {
    pub fn new(store: S, config: TransferConfig) -> Self {
        Self {
            store: Arc::new(store),
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn run(&self, request: TransferRequest) -> Result<(), TransferError> {
        if self.config.chunk_size == 0 {
            return Err(TransferError::Validation(
                "chunk size must be positive".to_string(),
            ));
        }
        let dest = request.destination()?;

        // Partitioning. Failures here are terminal: no session exists yet.
        let probed = probe::probe(&self.client, &request.source_url).await?;

        // Validating. Degenerate or pathological fan-outs are rejected on the
        // computed count, before any store call and before the range plan is
        // even allocated; the reported length is not ours to trust.
        let count = task_count(probed.total_length, self.config.chunk_size);
        if count == 0 {
            return Err(TransferError::Validation(
                "nothing to transfer: source resource is empty".to_string(),
            ));
        }
        if count > self.config.max_tasks as u64 {
            return Err(TransferError::Validation(format!(
                "{} tasks exceed the ceiling of {}",
                count, self.config.max_tasks
            )));
        }

        let ranges = partition(probed.total_length, self.config.chunk_size);

        // Initiating. A failure here is terminal too: there is nothing to
        // compensate until the store hands out a session id.
        let session_id = self
            .store
            .create_session(&dest)
            .await
            .map_err(|source| TransferError::Session {
                op: "create",
                source,
            })?;
        tracing::info!(
            %session_id,
            parts = ranges.len(),
            total_length = probed.total_length,
            "multipart session created"
        );

        // Dispatching, then Completing; both compensate on failure.
        let result = match self
            .dispatch(&request.source_url, &dest, &session_id, ranges)
            .await
        {
            Ok(receipts) => self
                .store
                .complete_session(&dest, &session_id, &receipts)
                .await
                .map_err(|source| TransferError::Session {
                    op: "complete",
                    source,
                }),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                tracing::info!(%session_id, "transfer succeeded");
                Ok(())
            }
            Err(err) => {
                self.abort(&dest, &session_id).await;
                Err(err)
            }
        }
    }

    /// Fans one worker out per range under the concurrency ceiling.
    ///
    /// The first worker to exhaust its retry budget flips the abort flag:
    /// no further workers are dispatched, in-flight workers drain, and their
    /// results are discarded along with every receipt gathered so far.
    async fn dispatch(
        &self,
        source_url: &str,
        dest: &Destination,
        session_id: &str,
        ranges: Vec<Range>,
    ) -> Result<Vec<PartReceipt>, TransferError> {
        let spawner = BoundedSpawner::new(self.config.concurrency);
        let aborted = Arc::new(AtomicBool::new(false));
        let expected = ranges.len();
        tracing::debug!(
            parts = expected,
            ceiling = spawner.capacity(),
            "dispatching part workers"
        );

        let mut handles = Vec::with_capacity(expected);
        for range in ranges {
            if aborted.load(Ordering::SeqCst) {
                break;
            }

            let task = PartTask {
                source_url: source_url.to_string(),
                range,
                session_id: session_id.to_string(),
                destination: dest.clone(),
            };
            let client = self.client.clone();
            let store = Arc::clone(&self.store);
            let policy = self.config.retry.clone();
            let staging_dir = self.config.staging_dir.clone();
            let aborted = Arc::clone(&aborted);

            let handle = spawner
                .dispatch(async move {
                    if aborted.load(Ordering::SeqCst) {
                        return None;
                    }
                    let result = run_with_retry(&policy, || {
                        transfer_part(&client, store.as_ref(), &task, &staging_dir)
                    })
                    .await;
                    if let Err(err) = &result {
                        tracing::warn!(part = task.range.index, error = %err, "part failed");
                        aborted.store(true, Ordering::SeqCst);
                    }
                    Some(result)
                })
                .await
                .map_err(|err| TransferError::Staging(io::Error::other(err)))?;
            handles.push(handle);
        }

        let mut receipts = Vec::with_capacity(expected);
        let mut failure: Option<TransferError> = None;
        for handle in handles {
            match handle.await {
                Ok(Some(Ok(receipt))) => receipts.push(receipt),
                Ok(Some(Err(err))) => {
                    failure.get_or_insert(err);
                }
                // Skipped after the abort flag flipped.
                Ok(None) => {}
                Err(join_err) => {
                    failure.get_or_insert(TransferError::Staging(io::Error::other(join_err)));
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        // Workers complete in any order; finalize requires ascending,
        // contiguous part numbers.
        receipts.sort_by_key(|receipt| receipt.part_number);
        Ok(receipts)
    }

    /// Compensating action. Its own failure is a secondary diagnostic, never
    /// a reason to keep the transfer alive.
    async fn abort(&self, dest: &Destination, session_id: &str) {
        tracing::info!(session_id, "aborting multipart session");
        if let Err(err) = self.store.abort_session(dest, session_id).await {
            tracing::warn!(session_id, error = %err, "failed to abort multipart session");
        }
    }
}
