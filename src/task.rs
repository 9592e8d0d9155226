use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use tokio::task::JoinHandle;

/// Piece of background work which can be cancelled.
#[derive(Debug)]
pub struct Task {
    shutdown: AbortHandle,
    handle: JoinHandle<()>,
}

impl Task {
    /// Spawns the future onto the runtime immediately.
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, abort_registration) = AbortHandle::new_pair();
        let future = Abortable::new(task, abort_registration);
        let handle = tokio::task::spawn(async move {
            let _ = future.await;
        });

        Self { shutdown, handle }
    }

    /// Cancels the task and joins it.
    pub async fn cancel(self) {
        self.shutdown.abort();
        let _ = self.handle.await;
    }
}
