//! Bounded FIFO message queue
//!
//! Producers never wait: `try_enqueue` on a full queue drops the message and
//! returns `false`. This is the unit's only backpressure mechanism and keeps a
//! message flood from growing memory or starving the scheduler. The single
//! consumer suspends in `dequeue` until an item is available.

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use super::message::Message;

#[derive(Debug)]
pub struct MessageQueue {
    name: &'static str,
    capacity: usize,
    sender: mpsc::Sender<Message>,
    receiver: Mutex<mpsc::Receiver<Message>>,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages. A capacity of zero is
    /// raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            name,
            capacity,
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.sender.capacity() == 0
    }

    /// Append `message` unless the queue is full. Never blocks.
    ///
    /// Returns whether the message was queued; a dropped message is not an error.
    pub fn try_enqueue(&self, message: Message) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(
                    queue = self.name,
                    topic = %message.topic,
                    "queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(queue = self.name, topic = %message.topic, "queue closed");
                false
            }
        }
    }

    /// Take the oldest message, suspending until one is available.
    pub async fn dequeue(&self) -> Message {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(message) => message,
            // `self.sender` lives as long as the queue, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Take the oldest message if one is queued.
    pub fn try_dequeue(&self) -> Option<Message> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }
}
