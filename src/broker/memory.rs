//! In-process broker with named FIFO queues.
//!
//! Used by tests and for running agents inside one process without a
//! RabbitMQ server. Receives block until a message arrives or the receive
//! timeout elapses.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{BrokerChannel, ChannelError, ChannelFactory, ChannelOutcome, ChannelRequest, ChannelResult};
use crate::config::{ConnectionConfig, DEFAULT_RECEIVE_TIMEOUT_SECS};
use crate::protocol::Action;

struct MemoryQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    depth: AtomicUsize,
}

impl MemoryQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            depth: AtomicUsize::new(0),
        }
    }
}

struct Inner {
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
    available: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    receive_timeout: Duration,
}

impl Inner {
    /// Declare-if-missing, like a broker queue declare.
    fn queue(&self, name: &str) -> Arc<MemoryQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryQueue::new()))
            .clone()
    }
}

/// Shared handle to an in-process broker. Clones see the same queues.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_RECEIVE_TIMEOUT_SECS))
    }
}

impl MemoryBroker {
    pub fn new(receive_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(HashMap::new()),
                available: AtomicBool::new(true),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                receive_timeout,
            }),
        }
    }

    /// Simulate the broker going down (or coming back).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Messages currently waiting on a queue.
    pub fn depth(&self, queue_name: &str) -> usize {
        let queues = self.inner.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .get(queue_name)
            .map_or(0, |queue| queue.depth.load(Ordering::SeqCst))
    }

    /// Number of declared queues.
    pub fn queue_count(&self) -> usize {
        self.inner.queues.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Push a raw wire string, bypassing the dispatcher.
    pub fn inject(&self, queue_name: &str, wire: impl Into<String>) {
        let queue = self.inner.queue(queue_name);
        if queue.tx.send(wire.into()).is_ok() {
            queue.depth.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn opened_channels(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn closed_channels(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl ChannelFactory for MemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(
        &self,
        _config: &ConnectionConfig,
        request: ChannelRequest,
    ) -> ChannelResult<Box<dyn BrokerChannel>> {
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryChannel {
            broker: self.inner.clone(),
            request,
            closed: false,
        }))
    }
}

struct MemoryChannel {
    broker: Arc<Inner>,
    request: ChannelRequest,
    closed: bool,
}

#[async_trait]
impl BrokerChannel for MemoryChannel {
    async fn run(&mut self) -> ChannelResult<ChannelOutcome> {
        if self.closed {
            return Err(ChannelError::ChannelClosed("channel already closed".to_string()));
        }
        if !self.broker.available.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionRefused("memory broker offline".to_string()));
        }

        let queue = self.broker.queue(&self.request.queue_name);
        match self.request.action {
            Action::Send => {
                let payload = self.request.payload.clone().unwrap_or_default();
                queue
                    .tx
                    .send(payload)
                    .map_err(|_| ChannelError::ChannelClosed("queue dropped".to_string()))?;
                queue.depth.fetch_add(1, Ordering::SeqCst);
                Ok(ChannelOutcome::Published)
            }
            Action::Receive => {
                let timeout = self.broker.receive_timeout;
                let fetch = async {
                    let mut rx = queue.rx.lock().await;
                    rx.recv().await
                };
                match tokio::time::timeout(timeout, fetch).await {
                    Ok(Some(wire)) => {
                        queue.depth.fetch_sub(1, Ordering::SeqCst);
                        Ok(ChannelOutcome::Delivered(wire.into_bytes()))
                    }
                    Ok(None) => Err(ChannelError::ChannelClosed("queue dropped".to_string())),
                    Err(_) => Err(ChannelError::Timeout(timeout)),
                }
            }
        }
    }

    async fn close(&mut self) -> ChannelResult<()> {
        if !self.closed {
            self.closed = true;
            self.broker.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: Action, queue: &str, payload: Option<&str>) -> ChannelRequest {
        ChannelRequest {
            action,
            queue_name: queue.to_string(),
            payload: payload.map(str::to_string),
            persistent: false,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn test_publish_then_fetch_fifo() {
        let broker = MemoryBroker::new(Duration::from_millis(200));
        let config = ConnectionConfig::default();

        for body in ["one", "two"] {
            let mut ch = broker
                .open(&config, request(Action::Send, "q", Some(body)))
                .unwrap();
            assert_eq!(ch.run().await.unwrap(), ChannelOutcome::Published);
            ch.close().await.unwrap();
        }
        assert_eq!(broker.depth("q"), 2);

        let mut ch = broker.open(&config, request(Action::Receive, "q", None)).unwrap();
        assert_eq!(
            ch.run().await.unwrap(),
            ChannelOutcome::Delivered(b"one".to_vec())
        );
        ch.close().await.unwrap();
        assert_eq!(broker.depth("q"), 1);
        assert_eq!(broker.opened_channels(), 3);
        assert_eq!(broker.closed_channels(), 3);
    }

    #[test]
    fn test_depth_does_not_declare() {
        let broker = MemoryBroker::default();
        assert_eq!(broker.depth("never-declared"), 0);
        assert_eq!(broker.queue_count(), 0);

        broker.inject("q", "x");
        assert_eq!(broker.depth("q"), 1);
        assert_eq!(broker.queue_count(), 1);
    }

    #[tokio::test]
    async fn test_receive_times_out_on_empty_queue() {
        let broker = MemoryBroker::new(Duration::from_millis(20));
        let mut ch = broker
            .open(&ConnectionConfig::default(), request(Action::Receive, "empty", None))
            .unwrap();
        assert!(matches!(ch.run().await, Err(ChannelError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_receive_waits_for_late_publish() {
        let broker = MemoryBroker::new(Duration::from_secs(2));
        let config = ConnectionConfig::default();
        let mut rx = broker.open(&config, request(Action::Receive, "late", None)).unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.inject("late", "arrived");
        });

        assert_eq!(
            rx.run().await.unwrap(),
            ChannelOutcome::Delivered(b"arrived".to_vec())
        );
    }

    #[tokio::test]
    async fn test_offline_broker_refuses() {
        let broker = MemoryBroker::default();
        broker.set_available(false);
        let mut ch = broker
            .open(&ConnectionConfig::default(), request(Action::Send, "q", Some("x")))
            .unwrap();
        assert!(matches!(ch.run().await, Err(ChannelError::ConnectionRefused(_))));
        ch.close().await.unwrap();
        ch.close().await.unwrap();
        assert_eq!(broker.closed_channels(), 1);
    }
}
