/// Queue and result-store seams.
///
/// The worker loop only talks to these traits. `RedisBroker` is the
/// production implementation; `MemoryBroker` backs tests and the local `run`
/// command.
use crate::config::types::Result;
use redis::Commands;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Source of queue items
pub trait JobQueue {
    /// Block for up to `wait` for the next item on `key`
    fn pop(&mut self, key: &str, wait: Duration) -> Result<Option<String>>;
}

/// Destination for result records
pub trait ResultStore {
    /// Store `value` at `key`, expiring after `ttl`
    fn put(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

/// Redis-backed queue and store sharing one connection.
///
/// A failed command drops the connection; the next call reconnects.
pub struct RedisBroker {
    client: redis::Client,
    connection: Option<redis::Connection>,
}

impl RedisBroker {
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: None,
        })
    }

    /// Establish the connection eagerly so startup fails loudly
    pub fn connect(&mut self) -> Result<()> {
        self.connection()?;
        Ok(())
    }

    fn connection(&mut self) -> Result<&mut redis::Connection> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let connection = self.client.get_connection()?;
                log::info!("Connected to Redis at {}", self.client.get_connection_info().addr);
                connection
            }
        };
        Ok(self.connection.insert(connection))
    }

    fn reset_on_error<T>(&mut self, result: redis::RedisResult<T>) -> Result<T> {
        result.map_err(|e| {
            if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
                log::warn!("Redis connection lost: {}", e);
                self.connection = None;
            }
            e.into()
        })
    }
}

impl JobQueue for RedisBroker {
    fn pop(&mut self, key: &str, wait: Duration) -> Result<Option<String>> {
        let connection = self.connection()?;
        let popped: redis::RedisResult<Option<(String, String)>> =
            connection.brpop(key, wait.as_secs_f64());
        let popped = self.reset_on_error(popped)?;
        Ok(popped.map(|(_, item)| item))
    }
}

impl ResultStore for RedisBroker {
    fn put(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let connection = self.connection()?;
        let stored: redis::RedisResult<()> = connection.set_ex(key, value, ttl.as_secs().max(1));
        self.reset_on_error(stored)
    }
}

/// A stored value and the TTL it was written with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub ttl: Duration,
}

/// In-process queue and store
#[derive(Debug, Default)]
pub struct MemoryBroker {
    queues: HashMap<String, VecDeque<String>>,
    results: HashMap<String, StoredValue>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// LPUSH counterpart: items are popped from the other end
    pub fn push(&mut self, key: &str, item: impl Into<String>) {
        self.queues
            .entry(key.to_string())
            .or_default()
            .push_front(item.into());
    }

    pub fn pending(&self, key: &str) -> usize {
        self.queues.get(key).map_or(0, VecDeque::len)
    }

    pub fn result(&self, key: &str) -> Option<&StoredValue> {
        self.results.get(key)
    }

    pub fn result_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.results.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl JobQueue for MemoryBroker {
    fn pop(&mut self, key: &str, _wait: Duration) -> Result<Option<String>> {
        Ok(self.queues.get_mut(key).and_then(VecDeque::pop_back))
    }
}

impl ResultStore for MemoryBroker {
    fn put(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.results.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_queue_is_fifo() {
        let mut broker = MemoryBroker::new();
        broker.push("execution_queue:python", "first");
        broker.push("execution_queue:python", "second");
        assert_eq!(broker.pending("execution_queue:python"), 2);

        let wait = Duration::from_secs(5);
        assert_eq!(
            broker.pop("execution_queue:python", wait).unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            broker.pop("execution_queue:python", wait).unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(broker.pop("execution_queue:python", wait).unwrap(), None);
        assert_eq!(broker.pop("execution_queue:ruby", wait).unwrap(), None);
    }

    #[test]
    fn test_memory_store_keeps_ttl() {
        let mut broker = MemoryBroker::new();
        broker
            .put("result:1", "{}", Duration::from_secs(600))
            .unwrap();
        let stored = broker.result("result:1").unwrap();
        assert_eq!(stored.value, "{}");
        assert_eq!(stored.ttl, Duration::from_secs(600));
        assert_eq!(broker.result_keys(), vec!["result:1".to_string()]);
    }

    #[test]
    fn test_redis_broker_rejects_bad_url() {
        assert!(RedisBroker::open("not a url").is_err());
    }
}
