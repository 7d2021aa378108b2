use std::future::Future;
use std::sync::Arc;

use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

/// Spawns tasks onto the runtime while holding total in-flight work at or
/// below a fixed ceiling.
///
/// `dispatch` suspends until a permit frees up, so a caller looping over a
/// large task set never launches more than `capacity` tasks at once. The
/// permit travels into the spawned task and is released when the task
/// finishes, panics included.
pub struct BoundedSpawner {
    capacity: usize,
    permits: Arc<Semaphore>,
}

impl BoundedSpawner {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Errors only if the semaphore has been closed, which this type never
    /// does itself.
    pub async fn dispatch<F>(&self, task: F) -> Result<JoinHandle<F::Output>, AcquireError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        Ok(tokio::spawn(async move {
            let _permit = permit;
            task.await
        }))
    }
}
