//! Batch publisher engine
//!
//! This module contains the asynchronous batching publisher responsible for:
//! - accepting messages for a single topic and grouping them into batches
//!   bounded by message count and request size
//! - flushing a partial batch once it has waited `flush_interval`
//! - publishing every batch on a bounded pool of concurrent workers and
//!   reporting each message's outcome through its completion callback
//!
//! Concurrency and usage notes:
//! - The current batch and the stopped flag live behind one mutex. It is held
//!   only to inspect or replace the batch, never across an `.await` or an RPC.
//! - A single background task per publisher owns the timed flush. `publish`,
//!   `flush` and `stop` wake it so it can recompute its deadline.
//! - Batches are queued to a single dispatcher task in the order they were
//!   created, and it hands out worker permits in that same order. Several
//!   batches may publish at once, so callbacks of different batches can fire
//!   out of order. Within a batch callbacks fire in submission order.
//! - RPC failures never surface here; they are delivered to the callbacks of
//!   the affected batch and logged.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::PublishClient;
use crate::config::{FlowControlSettings, PublisherSettings, Settings};
use crate::publisher::batch::{Batch, Callback, PendingItem};
use crate::publisher::flow_control::FlowController;
use crate::publisher::message::Message;
use crate::publisher::result::PublishResult;
use crate::utils::error::{BatchPublishError, ClientError, PublisherError};

#[derive(Debug, Default)]
struct State {
    batch: Option<Batch>,
    stopped: bool,
}

struct Inner {
    topic: String,
    settings: PublisherSettings,
    client: Arc<dyn PublishClient>,
    flow: FlowController,
    state: Mutex<State>,
    wake: Notify,
    dispatched: mpsc::UnboundedSender<(Batch, InFlightGuard)>,
    workers: Arc<Semaphore>,
    in_flight: watch::Sender<usize>,
    runtime: Handle,
}

/// Publishes messages to one topic in batches.
///
/// Dropping the publisher stops it; batches already dispatched keep running
/// and still invoke their callbacks.
pub struct BatchPublisher {
    inner: Arc<Inner>,
}

impl BatchPublisher {
    /// Creates a publisher with flow control scaled to `settings` (and ignored).
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime, which the background
    /// scheduler and the flush workers are spawned onto.
    pub fn new(
        topic: impl Into<String>,
        client: Arc<dyn PublishClient>,
        settings: PublisherSettings,
    ) -> Self {
        let flow_control = FlowControlSettings::for_publisher(&settings);
        Self::with_flow_control(topic, client, settings, flow_control)
    }

    pub fn from_settings(
        topic: impl Into<String>,
        client: Arc<dyn PublishClient>,
        settings: &Settings,
    ) -> Self {
        Self::with_flow_control(
            topic,
            client,
            settings.publisher.clone(),
            settings.flow_control.clone(),
        )
    }

    pub fn with_flow_control(
        topic: impl Into<String>,
        client: Arc<dyn PublishClient>,
        mut settings: PublisherSettings,
        flow_control: FlowControlSettings,
    ) -> Self {
        settings.worker_count = settings
            .worker_count
            .max(PublisherSettings::MIN_WORKER_COUNT);

        let (in_flight, _) = watch::channel(0);
        let (dispatched, queue) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            topic: topic.into(),
            dispatched,
            workers: Arc::new(Semaphore::new(settings.worker_count)),
            settings,
            client,
            flow: FlowController::new(&flow_control),
            state: Mutex::new(State::default()),
            wake: Notify::new(),
            in_flight,
            runtime: Handle::current(),
        });

        info!(
            topic = %inner.topic,
            max_messages = inner.settings.max_messages,
            max_bytes = inner.settings.max_bytes,
            flush_interval_ms = inner.settings.flush_interval_ms,
            worker_count = inner.settings.worker_count,
            "starting batch publisher"
        );
        inner
            .runtime
            .spawn(run_dispatcher(queue, Arc::clone(&inner.workers)));
        inner.runtime.spawn(run_scheduler(Arc::clone(&inner)));

        Self { inner }
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.inner.settings
    }

    pub fn flow_controller(&self) -> &FlowController {
        &self.inner.flow
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock_state().stopped
    }

    /// Messages waiting in the current, not yet dispatched, batch.
    pub fn pending(&self) -> usize {
        self.inner
            .lock_state()
            .batch
            .as_ref()
            .map_or(0, Batch::len)
    }

    /// Batches dispatched whose publish has not completed yet.
    pub fn in_flight(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// Submits a message without asking to be told how it went.
    pub async fn publish(&self, message: impl Into<Message>) -> Result<(), PublisherError> {
        self.submit(message.into(), None).await
    }

    /// Submits a message; `callback` receives its id or its batch's error.
    pub async fn publish_with_callback<F>(
        &self,
        message: impl Into<Message>,
        callback: F,
    ) -> Result<(), PublisherError>
    where
        F: FnOnce(PublishResult) + Send + 'static,
    {
        self.submit(message.into(), Some(Box::new(callback))).await
    }

    /// Submits a message and returns a receiver for its result.
    pub async fn publish_with_receipt(
        &self,
        message: impl Into<Message>,
    ) -> Result<oneshot::Receiver<PublishResult>, PublisherError> {
        let (tx, rx) = oneshot::channel();
        let callback: Callback = Box::new(move |result| {
            let _ = tx.send(result);
        });
        self.submit(message.into(), Some(callback)).await?;
        Ok(rx)
    }

    async fn submit(
        &self,
        message: Message,
        callback: Option<Callback>,
    ) -> Result<(), PublisherError> {
        let inner = &self.inner;
        if inner.lock_state().stopped {
            return Err(PublisherError::Stopped);
        }
        if inner.settings.max_messages == 0 {
            return Err(PublisherError::NoBatchCapacity);
        }

        let item = PendingItem::new(message, callback);
        let request_bytes = item.request_bytes();
        let size = Batch::request_overhead(&inner.topic) + request_bytes;
        if size > inner.settings.max_bytes {
            return Err(PublisherError::MessageTooLarge {
                size,
                limit: inner.settings.max_bytes,
            });
        }

        inner.flow.acquire(request_bytes).await?;

        {
            let mut state = inner.lock_state();
            if state.stopped {
                drop(state);
                if let Err(e) = inner.flow.release(1, request_bytes) {
                    warn!(topic = %inner.topic, error = %e, "flow control accounting out of sync");
                }
                return Err(PublisherError::Stopped);
            }

            let rejected = match state.batch.as_mut() {
                Some(batch) => batch.try_add(item).err(),
                None => Some(item),
            };

            if let Some(item) = rejected {
                if let Some(full) = state.batch.take() {
                    inner.dispatch(full);
                }
                let mut batch = inner.new_batch();
                if batch.try_add(item).is_err() {
                    unreachable!("an empty batch accepts any message that passed the size check");
                }
                state.batch = Some(batch);
            }
        }

        inner.wake.notify_one();
        Ok(())
    }

    /// Dispatches the current partial batch now instead of waiting for the interval.
    pub fn flush(&self) {
        {
            let mut state = self.inner.lock_state();
            if let Some(batch) = state.batch.take() {
                self.inner.dispatch(batch);
            }
        }
        self.inner.wake.notify_one();
    }

    /// Stops accepting messages and dispatches whatever is pending.
    ///
    /// Does not wait for the dispatched batches; see [`BatchPublisher::wait`].
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.stopped {
                return;
            }
            state.stopped = true;
            if let Some(batch) = state.batch.take() {
                self.inner.dispatch(batch);
            }
        }
        info!(topic = %self.inner.topic, "batch publisher stopped");
        self.inner.wake.notify_one();
    }

    /// Waits until every dispatched batch has completed.
    ///
    /// Returns `false` if `timeout` elapsed first; the outstanding batches keep
    /// publishing in the background.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut in_flight = self.inner.in_flight.subscribe();
        let drained = async move { in_flight.wait_for(|count| *count == 0).await.is_ok() };
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, drained)
                .await
                .unwrap_or(false),
            None => drained.await,
        }
    }

    /// `stop` followed by `wait`.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> bool {
        self.stop();
        self.wait(timeout).await
    }
}

impl Drop for BatchPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for BatchPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchPublisher")
            .field("topic", &self.inner.topic)
            .field("settings", &self.inner.settings)
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn new_batch(&self) -> Batch {
        Batch::new(
            &self.topic,
            self.settings.max_messages,
            self.settings.max_bytes,
        )
    }

    /// Queues `batch` for a flush worker. Never blocks.
    ///
    /// Callers hold the state lock, so batches enter the queue in creation order.
    fn dispatch(self: &Arc<Self>, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        debug!(
            topic = %self.topic,
            messages = batch.len(),
            bytes = batch.total_bytes(),
            "dispatching batch"
        );
        let guard = InFlightGuard::enter(Arc::clone(self));
        if let Err(mpsc::error::SendError((batch, _))) = self.dispatched.send((batch, guard)) {
            warn!(
                topic = %self.topic,
                messages = batch.len(),
                "dispatcher is gone, dropping batch"
            );
        }
    }

    async fn publish_batch(&self, batch: Batch, permit: OwnedSemaphorePermit) {
        let batch_size = batch.len();
        let items = batch.into_items();
        let request_bytes: usize = items.iter().map(PendingItem::request_bytes).sum();
        let (messages, callbacks): (Vec<Message>, Vec<Option<Callback>>) = items
            .into_iter()
            .map(|item| (item.message, item.callback))
            .unzip();

        let outcome = match self.client.publish_batch(&self.topic, &messages).await {
            Ok(ids) if ids.len() == batch_size => Ok(ids),
            Ok(ids) => Err(ClientError::IdCountMismatch {
                expected: batch_size,
                received: ids.len(),
            }),
            Err(e) => Err(e),
        };
        drop(permit);

        if let Err(e) = self.flow.release(batch_size, request_bytes) {
            warn!(topic = %self.topic, error = %e, "flow control accounting out of sync");
        }

        match outcome {
            Ok(ids) => {
                debug!(topic = %self.topic, messages = batch_size, "batch published");
                for ((message, callback), id) in messages.into_iter().zip(callbacks).zip(ids) {
                    if let Some(callback) = callback {
                        self.invoke(callback, PublishResult::success(message, id));
                    }
                }
            }
            Err(source) => {
                let error = BatchPublishError {
                    topic: self.topic.clone(),
                    batch_size,
                    source,
                };
                warn!(error = %error, "batch publish failed");
                for (message, callback) in messages.into_iter().zip(callbacks) {
                    if let Some(callback) = callback {
                        self.invoke(callback, PublishResult::failure(message, error.clone()));
                    }
                }
            }
        }
    }

    fn invoke(&self, callback: Callback, result: PublishResult) {
        if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
            warn!(topic = %self.topic, "publish callback panicked");
        }
    }
}

/// Counts a dispatched batch as in flight until dropped, even if its task is
/// cancelled or never scheduled.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl InFlightGuard {
    fn enter(inner: Arc<Inner>) -> Self {
        inner.in_flight.send_modify(|count| *count += 1);
        Self { inner }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Takes queued batches in order, waits for a free worker for each and
/// publishes it on its own task.
///
/// Exits once every `Inner`, and with it the queue sender, is gone.
async fn run_dispatcher(
    mut queue: mpsc::UnboundedReceiver<(Batch, InFlightGuard)>,
    workers: Arc<Semaphore>,
) {
    while let Some((batch, guard)) = queue.recv().await {
        // The semaphore is never closed
        let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
            break;
        };
        tokio::spawn(async move {
            guard.inner.publish_batch(batch, permit).await;
            drop(guard);
        });
    }
}

/// Flushes the current batch once it is `flush_interval` old.
async fn run_scheduler(inner: Arc<Inner>) {
    let interval = inner.settings.flush_interval();

    loop {
        let deadline = {
            let mut state = inner.lock_state();
            match state.batch.as_ref().map(Batch::created_at) {
                None if state.stopped => break,
                None => None,
                Some(created_at) => {
                    let deadline = created_at + interval;
                    if Instant::now() >= deadline {
                        if let Some(batch) = state.batch.take() {
                            inner.dispatch(batch);
                        }
                        continue;
                    }
                    Some(deadline)
                }
            }
        };

        match deadline {
            Some(deadline) => {
                let _ = tokio::time::timeout_at(deadline, inner.wake.notified()).await;
            }
            None => inner.wake.notified().await,
        }
    }

    debug!(topic = %inner.topic, "scheduler exited");
}
