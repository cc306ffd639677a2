use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use anyerror::AnyError;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tracing::Instrument;
use tracing::Level;
use tracing::Span;

use crate::error::ClientError;
use crate::network::Transport;
use crate::watch::WatchHandler;
use crate::Client;

/// State shared by an [`Observer`] and its background task.
#[derive(Debug)]
struct Shared {
    running: AtomicBool,

    /// Index of the last change delivered to the handler.
    last_index: Mutex<Option<u64>>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

enum TaskState {
    Running(JoinHandle<Result<(), ClientError>>),
    Done(Result<(), ClientError>),
}

/// The background task of an [`Observer`].
struct Observe<T, H>
where
    T: Transport,
    H: WatchHandler,
{
    client: Client<T>,
    prefix: String,
    start_index: Option<u64>,
    handler: H,
    shared: Arc<Shared>,
}

impl<T, H> Observe<T, H>
where
    T: Transport,
    H: WatchHandler + Send + 'static,
{
    async fn observe_loop(mut self) -> Result<(), ClientError> {
        let mut next_index = self.start_index;

        loop {
            if !self.shared.is_running() {
                tracing::debug!("observer is cancelled");
                return Ok(());
            }

            let res = self.client.poll_watch(&self.prefix, next_index).await;

            if !self.shared.is_running() {
                tracing::debug!("observer is cancelled, discard the last watch response");
                return Ok(());
            }

            let info = match res {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!(error = display(&e), prefix = display(&self.prefix), "watch failed, observer quits");
                    self.shared.running.store(false, Ordering::Release);
                    return Err(e);
                }
            };

            let last = *self.shared.last_index.lock().unwrap();

            if let Some(last) = last {
                if info.index <= last {
                    tracing::debug!(index = info.index, last_index = last, "skip already delivered change");
                    next_index = Some(last + 1);
                    continue;
                }
            }

            *self.shared.last_index.lock().unwrap() = Some(info.index);

            tracing::debug!(key = display(&info.key), index = info.index, "deliver change");
            self.handler.on_change(info.value.as_deref(), &info.key, &info);

            next_index = Some(info.index + 1);
        }
    }
}

/// A continuous watch running in a background task.
///
/// It delivers every change under its prefix to the handler exactly once, in increasing index
/// order, by re-issuing the watch right after the last delivered change.
///
/// [`cancel`](Self::cancel) stops it after the current long poll returns. Dropping the
/// `Observer` stops the task at once.
#[must_use = "dropping an Observer stops it"]
pub struct Observer {
    prefix: String,
    shared: Arc<Shared>,
    task: tokio::sync::Mutex<TaskState>,
}

impl Observer {
    pub(crate) fn spawn<T, H>(client: Client<T>, prefix: &str, index: Option<u64>, handler: H) -> Self
    where
        T: Transport,
        H: WatchHandler + Send + 'static,
    {
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            last_index: Mutex::new(None),
        });

        let this = Observe {
            client,
            prefix: prefix.to_string(),
            start_index: index,
            handler,
            shared: shared.clone(),
        };

        let span = tracing::span!(parent: &Span::current(), Level::DEBUG, "observer", prefix = display(prefix));
        let join_handle = tokio::spawn(this.observe_loop().instrument(span));

        tracing::info!(prefix = display(prefix), index = debug(index), "observer started");

        Self {
            prefix: prefix.to_string(),
            shared,
            task: tokio::sync::Mutex::new(TaskState::Running(join_handle)),
        }
    }

    /// Ask the observer to stop. Calling it more than once has no further effect.
    ///
    /// A long poll already in flight is not interrupted: its response is discarded and the task
    /// exits without invoking the handler again.
    pub fn cancel(&self) {
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        if was_running {
            tracing::info!(prefix = display(&self.prefix), "observer cancelled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Index of the last change delivered to the handler.
    pub fn last_index(&self) -> Option<u64> {
        *self.shared.last_index.lock().unwrap()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wait for the background task to exit and return how it ended.
    ///
    /// It may be called more than once; every call returns the same outcome.
    pub async fn join(&self) -> Result<(), ClientError> {
        let mut task = self.task.lock().await;

        let res = match &mut *task {
            TaskState::Running(handle) => join_result(handle.await),
            TaskState::Done(res) => return res.clone(),
        };

        *task = TaskState::Done(res.clone());
        res
    }
}

fn join_result(res: Result<Result<(), ClientError>, JoinError>) -> Result<(), ClientError> {
    match res {
        Ok(r) => r,
        Err(e) => Err(ClientError::Aborted {
            source: AnyError::new(&e),
        }),
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);

        if let Ok(task) = self.task.try_lock() {
            if let TaskState::Running(handle) = &*task {
                handle.abort();
            }
        }
    }
}
