//! Cooperative task queue shared by the driver and the orchestrator.
//!
//! Every externally-visible operation (open, the check family, close, element
//! actions) is one queued unit of work. Units run in FIFO order on a single
//! worker thread, so a checkpoint can never race the page actions enqueued
//! before it. Sub-operations inside one unit (element size/location queries,
//! script execution, the engine round-trip) are ordinary sequential calls
//! within the job, which keeps each checkpoint atomic with respect to the
//! rest of the queue.
//!
//! There is no cancellation: once enqueued, a unit runs to completion or
//! failure. If the queue shuts down before a unit is delivered, waiting on
//! its handle yields [`FlowInterrupted`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Error returned when a queued unit of work will never complete because the
/// queue's worker is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowInterrupted;

impl std::fmt::Display for FlowInterrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task queue shut down before the unit of work completed")
    }
}

impl std::error::Error for FlowInterrupted {}

/// A joinable unit of work scheduled on a [`ControlFlow`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the unit of work completes and return its output.
    pub fn wait(self) -> Result<T, FlowInterrupted> {
        self.rx.recv().map_err(|_| FlowInterrupted)
    }

    /// An already-completed unit of work.
    ///
    /// Used for operations that short-circuit (a disabled orchestrator, or a
    /// call rejected before it can be enqueued) but still hand the caller a
    /// uniform handle.
    pub fn ready(value: T) -> Self
    where
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(value);
        Self { rx }
    }

    /// A unit of work that will never complete; waiting on it yields
    /// [`FlowInterrupted`].
    pub(crate) fn interrupted() -> Self {
        let (_, rx) = mpsc::channel();
        Self { rx }
    }
}

impl<T, E> TaskHandle<Result<T, E>>
where
    E: From<FlowInterrupted>,
{
    /// Block until the unit of work completes, flattening queue shutdown
    /// into the task's own error type.
    pub fn join(self) -> Result<T, E> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(E::from(FlowInterrupted)),
        }
    }
}

/// Single FIFO task queue owned by an automation driver.
///
/// One worker thread drains the queue; jobs enqueued by the caller (page
/// actions) and by the orchestrator (checkpoints, lifecycle transitions)
/// interleave in exactly the order they were submitted.
#[derive(Debug)]
pub struct ControlFlow {
    tx: Sender<Job>,
    worker: Option<JoinHandle<()>>,
}

impl ControlFlow {
    /// Create a queue and start its worker thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                job();
            }
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Enqueue a unit of work and return a handle to join it later.
    ///
    /// The handle can be ignored for fire-and-forget page actions; ordering
    /// is guaranteed by the queue, not by waiting.
    pub fn execute<T, F>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            // The receiver may be gone if the caller dropped the handle.
            let _ = tx.send(task());
        });
        if self.tx.send(job).is_err() {
            return TaskHandle::interrupted();
        }
        TaskHandle { rx }
    }
}

impl Default for ControlFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ControlFlow {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain remaining jobs and exit.
        let (closed_tx, _) = mpsc::channel();
        self.tx = closed_tx;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_execute_returns_task_output() {
        let flow = ControlFlow::new();
        let handle = flow.execute(|| 2 + 2);
        assert_eq!(handle.wait(), Ok(4));
    }

    #[test]
    fn test_fifo_ordering_across_ignored_handles() {
        let flow = ControlFlow::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            // Fire-and-forget: handles dropped immediately.
            let _ = flow.execute(move || log.lock().unwrap().push(i));
        }
        let log_clone = Arc::clone(&log);
        let last = flow.execute(move || log_clone.lock().unwrap().len());

        assert_eq!(last.wait(), Ok(5));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ready_handle_completes_without_queue() {
        let handle = TaskHandle::ready(42);
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn test_drained_before_drop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let flow = ControlFlow::new();
            for i in 0..3 {
                let log = Arc::clone(&log);
                let _ = flow.execute(move || log.lock().unwrap().push(i));
            }
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[derive(Debug, PartialEq)]
    struct TestError;

    impl From<FlowInterrupted> for TestError {
        fn from(_: FlowInterrupted) -> Self {
            TestError
        }
    }

    #[test]
    fn test_join_flattens_task_result() {
        let flow = ControlFlow::new();
        let ok = flow.execute(|| Ok::<_, TestError>("fine"));
        assert_eq!(ok.join(), Ok("fine"));

        let err = flow.execute(|| Err::<(), _>(TestError));
        assert_eq!(err.join(), Err(TestError));
    }
}
