/// The per-replica worker loop: dequeue, execute, persist, repeat.
///
/// Strictly sequential. One item is fully processed and its result written
/// before the next dequeue. No single item can end the loop; only the
/// caller's `keep_going` predicate does.
use crate::config::types::{InvocationId, InvocationResult};
use crate::config::worker::{queue_key_for, result_key_for};
use crate::dispatch::broker::{JobQueue, ResultStore};
use crate::dispatch::request::{parse_item, ParsedItem};
use crate::exec::executor::SandboxExecutor;
use crate::judge::RuntimeAdapter;
use crate::observability::metrics::WorkerMetrics;
use crate::utils::diagnostics::{panic_message, panic_trace};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// What one poll did
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The dequeue wait elapsed with nothing to do
    Idle,
    /// A result record was produced (and persisted unless the store failed)
    Processed(InvocationResult),
    /// The item was discarded without a result
    Dropped,
    /// The queue itself failed; the loop backed off
    QueueError,
}

pub struct Worker<B> {
    broker: B,
    executor: SandboxExecutor,
    adapter: Box<dyn RuntimeAdapter>,
    queue_key: String,
    poll_timeout: Duration,
    result_ttl: Duration,
    reconnect_backoff: Duration,
    metrics: WorkerMetrics,
}

impl<B: JobQueue + ResultStore> Worker<B> {
    /// The queue is derived from the adapter's canonical language id
    pub fn new(broker: B, executor: SandboxExecutor, adapter: Box<dyn RuntimeAdapter>) -> Self {
        let queue_key = queue_key_for(adapter.language());
        Self {
            broker,
            executor,
            adapter,
            queue_key,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            result_ttl: DEFAULT_RESULT_TTL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            metrics: WorkerMetrics::new(),
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    /// Poll until `keep_going` returns false, then log the metrics summary
    pub fn run_while<F: FnMut() -> bool>(&mut self, mut keep_going: F) {
        log::info!(
            "Worker for {} listening on {}",
            self.adapter.language(),
            self.queue_key
        );
        while keep_going() {
            self.poll_once();
        }
        log::info!("Worker stopping: {}", self.metrics.summary());
    }

    /// One bounded dequeue and, if an item arrived, its full processing
    pub fn poll_once(&mut self) -> PollOutcome {
        match self.broker.pop(&self.queue_key, self.poll_timeout) {
            Ok(None) => PollOutcome::Idle,
            Ok(Some(raw)) => {
                self.metrics.dequeued.inc();
                match self.handle_item(&raw) {
                    Some(result) => PollOutcome::Processed(result),
                    None => PollOutcome::Dropped,
                }
            }
            Err(e) => {
                self.metrics.queue_errors.inc();
                log::error!(
                    "Failed to dequeue from {}: {}; retrying in {:?}",
                    self.queue_key,
                    e,
                    self.reconnect_backoff
                );
                thread::sleep(self.reconnect_backoff);
                PollOutcome::QueueError
            }
        }
    }

    /// Process one raw queue item. Returns the result record, if any.
    pub fn handle_item(&mut self, raw: &str) -> Option<InvocationResult> {
        let request = match parse_item(raw) {
            ParsedItem::Request(request) => request,
            ParsedItem::MissingField {
                invocation_id,
                field,
            } => {
                log::warn!("Invocation {} is missing '{}'", invocation_id, field);
                let result = InvocationResult::synthetic_error(
                    invocation_id,
                    ParsedItem::missing_field_message(field),
                    "",
                );
                self.metrics.failed.inc();
                self.persist(&result);
                return Some(result);
            }
            ParsedItem::NoId { field } => {
                log::warn!("Dropping queue item without a usable '{}'", field);
                self.metrics.dropped.inc();
                return None;
            }
            ParsedItem::Malformed(reason) => {
                log::warn!("Dropping malformed queue item: {}", reason);
                self.metrics.dropped.inc();
                return None;
            }
        };

        let invocation_id = request.invocation_id.clone();
        log::info!("Processing invocation: {}", invocation_id);

        let executor = &self.executor;
        let adapter = self.adapter.as_ref();
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            executor.execute(adapter, &request.code, &request.input)
        }));

        let result = match attempt {
            Ok(outcome) => {
                self.metrics
                    .record_outcome(outcome.status, Duration::from_millis(outcome.duration_ms));
                InvocationResult::from_outcome(invocation_id.clone(), &outcome)
            }
            Err(payload) => {
                self.metrics.failed.inc();
                internal_fault(invocation_id.clone(), payload.as_ref())
            }
        };

        log::info!("Finished invocation: {} - {}", invocation_id, result.status);
        self.persist(&result);
        Some(result)
    }

    fn persist(&mut self, result: &InvocationResult) {
        let key = result_key_for(&result.invocation_id);
        let body = match serde_json::to_string(result) {
            Ok(body) => body,
            Err(e) => {
                self.metrics.persist_failures.inc();
                log::error!("Failed to serialize result for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.broker.put(&key, &body, self.result_ttl) {
            self.metrics.persist_failures.inc();
            log::error!("Failed to store {}: {}", key, e);
        }
    }
}

fn internal_fault(invocation_id: InvocationId, payload: &(dyn std::any::Any + Send)) -> InvocationResult {
    log::error!("Invocation {} hit an internal fault", invocation_id);
    InvocationResult::synthetic_error(
        invocation_id,
        format!("Internal error: {}", panic_message(payload)),
        panic_trace(payload),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{ExecutionStatus, Result};
    use crate::dispatch::broker::MemoryBroker;
    use crate::judge::RuntimeKind;
    use crate::kernel::rlimit::ResourceLimits;
    use crate::safety::workspace::{Workspace, WorkspaceManager};
    use tempfile::TempDir;

    /// Echo adapter: `cat` returns the event unchanged
    struct EchoAdapter;

    impl RuntimeAdapter for EchoAdapter {
        fn language(&self) -> &'static str {
            "echo"
        }

        fn kind(&self) -> RuntimeKind {
            RuntimeKind::Interpreted
        }

        fn stage(&self, _code: &str, _workspace: &Workspace) -> Result<()> {
            Ok(())
        }

        fn compile_command(&self, _workspace: &Workspace) -> Option<Vec<String>> {
            None
        }

        fn run_command(&self, _workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
            vec!["/bin/cat".to_string()]
        }
    }

    /// Panics while staging
    struct PanickingAdapter;

    impl RuntimeAdapter for PanickingAdapter {
        fn language(&self) -> &'static str {
            "echo"
        }

        fn kind(&self) -> RuntimeKind {
            RuntimeKind::Interpreted
        }

        fn stage(&self, _code: &str, _workspace: &Workspace) -> Result<()> {
            panic!("adapter exploded")
        }

        fn compile_command(&self, _workspace: &Workspace) -> Option<Vec<String>> {
            None
        }

        fn run_command(&self, _workspace: &Workspace, _limits: &ResourceLimits) -> Vec<String> {
            Vec::new()
        }
    }

    fn worker(root: &TempDir, adapter: Box<dyn RuntimeAdapter>) -> Worker<MemoryBroker> {
        let manager = WorkspaceManager::new(root.path().join("sandbox")).unwrap();
        let executor = SandboxExecutor::new(manager, ResourceLimits::default());
        Worker::new(MemoryBroker::new(), executor, adapter)
            .with_reconnect_backoff(Duration::from_millis(1))
    }

    #[test]
    fn test_queue_key_from_adapter() {
        let root = TempDir::new().unwrap();
        let worker = worker(&root, Box::new(EchoAdapter));
        assert_eq!(worker.queue_key(), "execution_queue:echo");
    }

    #[test]
    fn test_idle_poll() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(EchoAdapter));
        assert_eq!(worker.poll_once(), PollOutcome::Idle);
    }

    #[test]
    fn test_processes_and_persists() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(EchoAdapter));
        worker.broker_mut().push(
            "execution_queue:echo",
            r#"{"invocationId": 42, "code": "", "input": {"ok": true}}"#,
        );

        match worker.poll_once() {
            PollOutcome::Processed(result) => {
                assert_eq!(result.status, ExecutionStatus::Success);
                assert_eq!(result.output, Some(serde_json::json!({"ok": true})));
            }
            other => panic!("unexpected {:?}", other),
        }

        let stored = worker.broker().result("result:42").unwrap();
        assert_eq!(stored.ttl, DEFAULT_RESULT_TTL);
        let record: serde_json::Value = serde_json::from_str(&stored.value).unwrap();
        assert_eq!(record["invocationId"], 42);
        assert_eq!(record["status"], "SUCCESS");
        assert_eq!(worker.metrics().succeeded.get(), 1);
    }

    #[test]
    fn test_missing_code_persists_error() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(EchoAdapter));
        let result = worker.handle_item(r#"{"invocationId": "job-1"}"#).unwrap();
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.error_message.contains("'code'"));
        assert!(worker.broker().result("result:job-1").is_some());
    }

    #[test]
    fn test_unattributable_items_dropped() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(EchoAdapter));
        worker.broker_mut().push("execution_queue:echo", "{garbage");
        worker.broker_mut().push("execution_queue:echo", r#"{"code": "x"}"#);

        assert_eq!(worker.poll_once(), PollOutcome::Dropped);
        assert_eq!(worker.poll_once(), PollOutcome::Dropped);
        assert!(worker.broker().result_keys().is_empty());
        assert_eq!(worker.metrics().dropped.get(), 2);
    }

    #[test]
    fn test_adapter_panic_becomes_error_result() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(PanickingAdapter));
        let result = worker
            .handle_item(r#"{"invocationId": 5, "code": "x"}"#)
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Error);
        assert!(result.logs.contains("adapter exploded"));
        assert!(worker.broker().result("result:5").is_some());
    }

    #[test]
    fn test_run_while_stops_on_predicate() {
        let root = TempDir::new().unwrap();
        let mut worker = worker(&root, Box::new(EchoAdapter));
        worker.broker_mut().push(
            "execution_queue:echo",
            r#"{"invocationId": 1, "code": "", "input": 1}"#,
        );
        worker.broker_mut().push(
            "execution_queue:echo",
            r#"{"invocationId": 2, "code": "", "input": 2}"#,
        );

        let mut polls = 0;
        worker.run_while(|| {
            polls += 1;
            polls <= 3
        });
        assert_eq!(worker.metrics().dequeued.get(), 2);
        assert_eq!(
            worker.broker().result_keys(),
            vec!["result:1".to_string(), "result:2".to_string()]
        );
    }
}
