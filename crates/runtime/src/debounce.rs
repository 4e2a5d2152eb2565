use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cancel::{CancelSource, CancelToken};

/// Cancellable timer: runs the most recently scheduled action once the delay
/// has elapsed without another `schedule` call.
///
/// Scheduling or cancelling aborts the previous task, including any request it
/// has already started, and invalidates its [`CancelToken`]. The action gets
/// its own token so it can check staleness after its own await points.
///
/// Must be used from inside a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    cancel: CancelSource,
    handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            cancel: CancelSource::new(),
            handle: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule<F, Fut>(&mut self, action: F) -> CancelToken
    where
        F: FnOnce(CancelToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.abort_task();
        let token = self.cancel.issue();
        let task_token = token.clone();
        let delay = self.delay;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_token.is_cancelled() {
                return;
            }
            action(task_token).await;
        }));
        token
    }

    /// Drop pending work. Returns `true` if a task was still running.
    pub fn cancel(&mut self) -> bool {
        self.cancel.cancel_all();
        self.abort_task()
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn abort_task(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
