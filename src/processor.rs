use crate::action::QueuedAction;
use crate::executor::{ActionExecutor, ExecuteError};
use crate::queue::ActionQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Attempts per action before it is discarded.
pub const MAX_ATTEMPTS: u32 = 3;
/// Default sleep between polls and before retries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default bound for the synchronous `process_one_now` diagnostic.
pub const PROCESS_NOW_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("the action queue is empty")]
    Empty,
    #[error("executor did not finish within the timeout")]
    Timeout,
    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

/// Snapshot for the dashboard's status endpoint.
#[derive(Debug, Clone)]
pub struct ProcessorStatus {
    pub running: bool,
    pub queue_depth: usize,
    /// Bounded sample of the queue head.
    pub head: Vec<String>,
}

/// The background task draining the action queue.
///
/// Actions run in strict arrival order; a failing head is retried in place
/// (blocking later actions) until its attempts are exhausted. Stopping is
/// cooperative: the flag is checked at the top of each iteration and an
/// in-flight execute is allowed to finish.
#[derive(Clone)]
pub struct Processor {
    inner: Arc<Inner>,
}

struct Inner {
    queue: ActionQueue,
    executor: Arc<dyn ActionExecutor>,
    poll_interval: Duration,
    running: AtomicBool,
    stop_requested: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    pub fn new(
        queue: ActionQueue,
        executor: Arc<dyn ActionExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                executor,
                poll_interval,
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Starts the drain loop. A start while already running is a no-op;
    /// returns whether this call started it.
    pub async fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.stop_requested.store(false, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            inner.drain().await;
            inner.running.store(false, Ordering::SeqCst);
        });
        *self.inner.handle.lock().await = Some(handle);
        log::info!("Queue processor started.");
        true
    }

    /// Requests a stop and waits for the loop to wind down.
    pub async fn stop(&self) {
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.handle.lock().await.take() {
            let _ = handle.await;
            log::info!("Queue processor stopped.");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> ProcessorStatus {
        ProcessorStatus {
            running: self.is_running(),
            queue_depth: self.inner.queue.depth(),
            head: self.inner.queue.preview(3),
        }
    }

    /// Synchronously executes the head action with a bounded timeout and
    /// returns the remaining queue depth. A timeout or failure counts as an
    /// attempt, with the usual retry bookkeeping.
    pub async fn process_one_now(&self, timeout: Duration) -> Result<usize, ProcessorError> {
        let queued = self.inner.queue.dequeue().ok_or(ProcessorError::Empty)?;

        match tokio::time::timeout(timeout, self.inner.executor.execute(&queued)).await {
            Ok(Ok(())) => Ok(self.inner.queue.depth()),
            Ok(Err(e)) => {
                self.inner.note_failure(queued, &e);
                Err(e.into())
            }
            Err(_) => {
                self.inner
                    .note_failure(queued, &ExecuteError::Transient("timed out".into()));
                Err(ProcessorError::Timeout)
            }
        }
    }
}

impl Inner {
    async fn drain(&self) {
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                return;
            }
            match self.queue.dequeue() {
                Some(queued) => {
                    let retrying = self.attempt(queued).await;
                    if retrying {
                        // Yield before the retry to avoid a tight failure loop.
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    /// Runs one action. Returns whether it was requeued for a retry.
    async fn attempt(&self, queued: QueuedAction) -> bool {
        match self.executor.execute(&queued).await {
            Ok(()) => {
                log::info!(
                    "Executed {} action submitted by '{}'.",
                    queued.action.kind(),
                    queued.submitted_by
                );
                false
            }
            Err(e) => self.note_failure(queued, &e),
        }
    }

    /// Retry bookkeeping shared by the drain loop and `process_one_now`.
    /// Returns whether the action was requeued.
    fn note_failure(&self, mut queued: QueuedAction, error: &ExecuteError) -> bool {
        queued.attempts += 1;
        if queued.attempts < MAX_ATTEMPTS {
            log::warn!(
                "{} action failed (attempt {}/{}), retrying: {}",
                queued.action.kind(),
                queued.attempts,
                MAX_ATTEMPTS,
                error
            );
            self.queue.requeue_front(queued);
            true
        } else {
            log::error!(
                "{} action submitted by '{}' permanently failed after {} attempts: {}",
                queued.action.kind(),
                queued.submitted_by,
                MAX_ATTEMPTS,
                error
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Executor scripted with per-call results, recording every invocation.
    struct StubExecutor {
        script: StdMutex<VecDeque<Result<(), ExecuteError>>>,
        invocations: StdMutex<Vec<u64>>,
        delay: Duration,
    }

    impl StubExecutor {
        fn new(script: Vec<Result<(), ExecuteError>>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                invocations: StdMutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(VecDeque::new()),
                invocations: StdMutex::new(Vec::new()),
                delay,
            })
        }

        fn invocations(&self) -> Vec<u64> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionExecutor for StubExecutor {
        async fn execute(&self, queued: &QueuedAction) -> Result<(), ExecuteError> {
            if let Action::WarnMember(request) = &queued.action {
                self.invocations.lock().unwrap().push(request.member_id);
            }
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    fn warn(member_id: u64) -> QueuedAction {
        QueuedAction::new(Action::warn_member(member_id, "test").unwrap(), "tester")
    }

    fn fail() -> Result<(), ExecuteError> {
        Err(ExecuteError::NotFound("missing".into()))
    }

    const TICK: Duration = Duration::from_millis(5);

    async fn settle(queue: &ActionQueue) {
        for _ in 0..200 {
            if queue.is_empty() {
                break;
            }
            tokio::time::sleep(TICK).await;
        }
        // One more poll so the last dequeued action finishes.
        tokio::time::sleep(TICK * 4).await;
    }

    #[tokio::test]
    async fn persistent_failure_is_tried_three_times_then_discarded() {
        let executor = StubExecutor::new(vec![fail(), fail(), fail()]);
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        processor.start().await;
        settle(&queue).await;
        processor.stop().await;

        assert_eq!(executor.invocations(), vec![1, 1, 1]);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn failure_then_success_executes_twice() {
        let executor = StubExecutor::new(vec![fail(), Ok(())]);
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        processor.start().await;
        settle(&queue).await;
        processor.stop().await;

        assert_eq!(executor.invocations(), vec![1, 1]);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn failing_head_blocks_later_actions_until_exhausted() {
        let executor = StubExecutor::new(vec![fail(), fail(), fail(), Ok(())]);
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));
        queue.enqueue(warn(2));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        processor.start().await;
        settle(&queue).await;
        processor.stop().await;

        // All three attempts at action 1 happen before action 2 runs.
        assert_eq!(executor.invocations(), vec![1, 1, 1, 2]);
    }

    #[tokio::test]
    async fn actions_run_in_arrival_order() {
        let executor = StubExecutor::new(Vec::new());
        let queue = ActionQueue::new();
        for id in 1..=5 {
            queue.enqueue(warn(id));
        }

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        processor.start().await;
        settle(&queue).await;
        processor.stop().await;

        assert_eq!(executor.invocations(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let executor = StubExecutor::new(Vec::new());
        let queue = ActionQueue::new();
        let processor = Processor::new(queue, executor, TICK);

        assert!(processor.start().await);
        assert!(!processor.start().await);
        assert!(processor.is_running());

        processor.stop().await;
        assert!(!processor.is_running());

        // And it can be started again after a stop.
        assert!(processor.start().await);
        processor.stop().await;
    }

    #[tokio::test]
    async fn stop_lets_in_flight_action_finish() {
        let executor = StubExecutor::slow(Duration::from_millis(50));
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        processor.start().await;
        // Give the loop time to dequeue and enter the executor.
        tokio::time::sleep(Duration::from_millis(10)).await;
        processor.stop().await;

        assert_eq!(executor.invocations(), vec![1]);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn process_one_now_reports_remaining_depth() {
        let executor = StubExecutor::new(Vec::new());
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));
        queue.enqueue(warn(2));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        let depth = processor
            .process_one_now(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(depth, 1);
        assert_eq!(executor.invocations(), vec![1]);
    }

    #[tokio::test]
    async fn process_one_now_on_empty_queue() {
        let executor = StubExecutor::new(Vec::new());
        let processor = Processor::new(ActionQueue::new(), executor, TICK);
        assert!(matches!(
            processor.process_one_now(Duration::from_secs(1)).await,
            Err(ProcessorError::Empty)
        ));
    }

    #[tokio::test]
    async fn process_one_now_times_out_and_counts_the_attempt() {
        let executor = StubExecutor::slow(Duration::from_secs(5));
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));

        let processor = Processor::new(queue.clone(), executor, TICK);
        let result = processor
            .process_one_now(Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ProcessorError::Timeout)));

        // Requeued at the head with one attempt recorded.
        let head = queue.peek().unwrap();
        assert_eq!(head.attempts, 1);
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn process_one_now_failure_discards_after_attempts_exhausted() {
        let executor = StubExecutor::new(vec![fail(), fail(), fail()]);
        let queue = ActionQueue::new();
        queue.enqueue(warn(1));

        let processor = Processor::new(queue.clone(), executor.clone(), TICK);
        for _ in 0..3 {
            let _ = processor.process_one_now(Duration::from_secs(1)).await;
        }
        assert_eq!(executor.invocations(), vec![1, 1, 1]);
        assert_eq!(queue.depth(), 0);
    }
}
