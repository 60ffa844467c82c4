//! Queue worker that claims messages and dispatches them to a handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use rocketnotes_core::{defaults, Error, MessageQueue, PipelineConfig, ReceivedMessage, Result};

use crate::handler::{HandlerResult, MessageContext, MessageHandler};

/// Broadcast capacity for worker events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for one queue worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue to consume.
    pub queue: String,
    /// Where rejected and exhausted messages go.
    pub dead_letter_queue: String,
    /// How long a claimed message stays hidden. Also bounds handler run time.
    pub visibility_timeout: Duration,
    /// Deliveries allowed before a message is dead-lettered unhandled.
    pub max_receive_count: u32,
    /// Polling interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
    /// Whether to run at all.
    pub enabled: bool,
}

impl WorkerConfig {
    pub fn new(queue: impl Into<String>, dead_letter_queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            dead_letter_queue: dead_letter_queue.into(),
            visibility_timeout: Duration::from_secs(defaults::WRITE_VISIBILITY_TIMEOUT_SECS),
            max_receive_count: defaults::MAX_RECEIVE_COUNT,
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            enabled: true,
        }
    }

    /// Save Worker settings on the Write Queue.
    pub fn write_queue(config: &PipelineConfig) -> Self {
        Self::new(&config.write_queue, &config.dead_letter_queue)
            .with_visibility_timeout(Duration::from_secs(defaults::WRITE_VISIBILITY_TIMEOUT_SECS))
            .with_pipeline(config)
    }

    /// Embedding Worker settings on the Reindex Queue.
    pub fn reindex_queue(config: &PipelineConfig) -> Self {
        Self::new(&config.reindex_queue, &config.dead_letter_queue)
            .with_visibility_timeout(Duration::from_secs(
                defaults::REINDEX_VISIBILITY_TIMEOUT_SECS,
            ))
            .with_pipeline(config)
    }

    fn with_pipeline(self, config: &PipelineConfig) -> Self {
        self.with_max_receive_count(config.max_receive_count)
            .with_poll_interval(config.worker_poll_interval_ms)
            .with_enabled(config.worker_enabled)
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_max_receive_count(mut self, max: u32) -> Self {
        self.max_receive_count = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by a queue worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Worker started.
    WorkerStarted { queue: String },
    /// A message was handled and acknowledged.
    MessageCompleted { message_id: String },
    /// A message was left on the queue for redelivery.
    MessageRetrying { message_id: String, reason: String },
    /// A message was moved to the dead-letter queue.
    MessageDeadLettered { message_id: String, reason: String },
    /// Worker stopped.
    WorkerStopped { queue: String },
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the in-flight message to finish.
    pub async fn stop(self) -> Result<()> {
        // The loop may already have exited, which closes the channel.
        let _ = self.shutdown_tx.send(()).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {}", e)))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Consumes one queue, one message at a time.
pub struct QueueWorker {
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn MessageHandler>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn MessageHandler>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queue,
            handler,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            task,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker", queue = %self.config.queue, handler = self.handler.name()))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Queue worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            visibility_timeout_secs = self.config.visibility_timeout.as_secs(),
            max_receive_count = self.config.max_receive_count,
            "Queue worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted {
            queue: self.config.queue.clone(),
        });

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Queue worker received shutdown signal");
                break;
            }

            let claimed = match self.process_one().await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(error = %e, "Failed to poll queue");
                    false
                }
            };

            if !claimed {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Queue worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped {
            queue: self.config.queue.clone(),
        });
        info!("Queue worker stopped");
    }

    /// Claim and handle at most one message.
    ///
    /// Returns `false` when the queue had nothing visible.
    pub async fn process_one(&self) -> Result<bool> {
        let Some(message) = self
            .queue
            .receive(&self.config.queue, self.config.visibility_timeout)
            .await?
        else {
            return Ok(false);
        };

        if message.receive_count > self.config.max_receive_count {
            let reason = format!(
                "exceeded max receive count of {}",
                self.config.max_receive_count
            );
            warn!(
                message_id = %message.message_id,
                receive_count = message.receive_count,
                "Message redelivered too often"
            );
            self.dead_letter(&message, reason).await?;
            return Ok(true);
        }

        let start = Instant::now();
        let message_id = message.message_id.clone();
        debug!(
            message_id = %message_id,
            receive_count = message.receive_count,
            "Processing message"
        );

        let timeout = self.config.visibility_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.handler.handle(MessageContext::new(message.clone())),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                HandlerResult::Retry(format!("Handler exceeded timeout of {}s", timeout.as_secs()))
            }
        };

        match result {
            HandlerResult::Success => {
                // A failed ack means the message comes back; handlers are idempotent.
                if let Err(e) = self.queue.delete(&message).await {
                    warn!(message_id = %message_id, error = %e, "Failed to acknowledge message");
                    return Ok(true);
                }
                info!(
                    message_id = %message_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Message handled"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::MessageCompleted { message_id });
            }
            HandlerResult::Retry(reason) => {
                warn!(
                    message_id = %message_id,
                    receive_count = message.receive_count,
                    error = %reason,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Message failed, leaving for redelivery"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::MessageRetrying { message_id, reason });
            }
            HandlerResult::Reject(reason) => {
                self.dead_letter(&message, reason).await?;
            }
        }

        Ok(true)
    }

    async fn dead_letter(&self, message: &ReceivedMessage, reason: String) -> Result<()> {
        self.queue
            .dead_letter(message, &self.config.dead_letter_queue, &reason)
            .await?;
        warn!(
            message_id = %message.message_id,
            dead_letter_queue = %self.config.dead_letter_queue,
            error = %reason,
            "Message dead-lettered"
        );
        let _ = self.event_tx.send(WorkerEvent::MessageDeadLettered {
            message_id: message.message_id.clone(),
            reason,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rocketnotes_db::MemoryMessageQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedHandler {
        result: HandlerResult,
        calls: AtomicUsize,
    }

    impl ScriptedHandler {
        fn new(result: HandlerResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn handle(&self, _ctx: MessageContext) -> HandlerResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig::new("q", "dlq").with_visibility_timeout(Duration::from_secs(30))
    }

    #[test]
    fn test_worker_config_from_pipeline() {
        let pipeline = PipelineConfig::default();
        let write = WorkerConfig::write_queue(&pipeline);
        assert_eq!(write.queue, "write-queue");
        assert_eq!(write.visibility_timeout, Duration::from_secs(30));
        let reindex = WorkerConfig::reindex_queue(&pipeline);
        assert_eq!(reindex.queue, "reindex-queue");
        assert_eq!(reindex.visibility_timeout, Duration::from_secs(900));
        assert_eq!(reindex.dead_letter_queue, "dead-letter-queue");
        assert_eq!(reindex.max_receive_count, 5);
    }

    #[test]
    fn test_worker_config_takes_worker_settings_from_pipeline() {
        let pipeline = PipelineConfig {
            worker_enabled: false,
            worker_poll_interval_ms: 25,
            max_receive_count: 2,
            ..PipelineConfig::default()
        };
        let config = WorkerConfig::write_queue(&pipeline);
        assert!(!config.enabled);
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.max_receive_count, 2);

        let defaults = WorkerConfig::reindex_queue(&PipelineConfig::default());
        assert!(defaults.enabled);
        assert_eq!(defaults.poll_interval_ms, 1000);
    }

    #[tokio::test]
    async fn test_process_one_empty_queue() {
        let queue = Arc::new(MemoryMessageQueue::new());
        let handler = ScriptedHandler::new(HandlerResult::Success);
        let worker = QueueWorker::new(queue, handler.clone(), config());
        assert!(!worker.process_one().await.unwrap());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_acknowledges() {
        let queue = Arc::new(MemoryMessageQueue::new());
        queue.send("q", "{}").await.unwrap();
        let worker = QueueWorker::new(
            queue.clone(),
            ScriptedHandler::new(HandlerResult::Success),
            config(),
        );
        let mut events = worker.events();

        assert!(worker.process_one().await.unwrap());
        assert_eq!(queue.depth("q").await.unwrap(), 0);
        assert!(matches!(
            events.recv().await.unwrap(),
            WorkerEvent::MessageCompleted { .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_leaves_message_in_flight() {
        let queue = Arc::new(MemoryMessageQueue::new());
        queue.send("q", "{}").await.unwrap();
        let worker = QueueWorker::new(
            queue.clone(),
            ScriptedHandler::new(HandlerResult::Retry("store down".into())),
            config(),
        );

        assert!(worker.process_one().await.unwrap());
        assert_eq!(queue.depth("q").await.unwrap(), 1);
        // Hidden until the visibility timeout passes.
        assert!(!worker.process_one().await.unwrap());
    }

    #[tokio::test]
    async fn test_reject_dead_letters() {
        let queue = Arc::new(MemoryMessageQueue::new());
        queue.send("q", "not json").await.unwrap();
        let worker = QueueWorker::new(
            queue.clone(),
            ScriptedHandler::new(HandlerResult::Reject("malformed".into())),
            config(),
        );

        worker.process_one().await.unwrap();
        assert_eq!(queue.depth("q").await.unwrap(), 0);
        let dead = queue.messages("dlq").await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].body, "not json");
        assert_eq!(dead[0].dead_letter_reason.as_deref(), Some("malformed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_message_skips_handler() {
        let queue = Arc::new(MemoryMessageQueue::new());
        queue.send("q", "{}").await.unwrap();
        let handler = ScriptedHandler::new(HandlerResult::Retry("still down".into()));
        let worker = QueueWorker::new(
            queue.clone(),
            handler.clone(),
            config()
                .with_visibility_timeout(Duration::from_secs(1))
                .with_max_receive_count(2),
        );

        for _ in 0..3 {
            assert!(worker.process_one().await.unwrap());
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        let dead = queue.messages("dlq").await;
        assert_eq!(dead.len(), 1);
        assert!(dead[0]
            .dead_letter_reason
            .as_deref()
            .unwrap()
            .contains("max receive count"));
    }

    #[tokio::test]
    async fn test_disabled_worker_exits() {
        let queue = Arc::new(MemoryMessageQueue::new());
        let worker = QueueWorker::new(
            queue,
            ScriptedHandler::new(HandlerResult::Success),
            config().with_enabled(false),
        );
        let handle = worker.start();
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_started_worker_drains_and_stops() {
        let queue = Arc::new(MemoryMessageQueue::new());
        queue.send("q", "{}").await.unwrap();
        queue.send("q", "{}").await.unwrap();
        let worker = QueueWorker::new(
            queue.clone(),
            ScriptedHandler::new(HandlerResult::Success),
            config().with_poll_interval(10),
        );
        let mut events = worker.events();
        let handle = worker.start();

        let mut completed = 0;
        while completed < 2 {
            if let WorkerEvent::MessageCompleted { .. } = events.recv().await.unwrap() {
                completed += 1;
            }
        }
        handle.stop().await.unwrap();
        assert_eq!(queue.depth("q").await.unwrap(), 0);
    }
}
