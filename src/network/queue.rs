use crate::messages::Message;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// Unbounded FIFO of messages shared between the handler task and callers.
///
/// The lock is held only for the duration of a single push or pop and is
/// never held across an `.await`. Every push wakes the tasks waiting in
/// [`MessageQueue::notified`].
#[derive(Debug, Default)]
pub struct MessageQueue {
    items: Mutex<VecDeque<Message>>,
    pushed: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned queue still holds valid messages
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message and wake any waiters
    pub fn push(&self, message: Message) {
        self.lock().push_back(message);
        self.pushed.notify_waiters();
        // Covers a waiter that checked the queue but has not started waiting yet
        self.pushed.notify_one();
    }

    /// Clone of the front message, leaving it queued
    pub fn front(&self) -> Option<Message> {
        self.lock().front().cloned()
    }

    /// Remove and return the front message; `None` when empty
    pub fn pop(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every queued message, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut items = self.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Remove and return every queued message in order
    pub fn drain(&self) -> Vec<Message> {
        self.lock().drain(..).collect()
    }

    /// Resolves after the next push.
    ///
    /// Callers check the queue after creating this future so a push between
    /// the check and the await is not missed.
    pub async fn notified(&self) {
        self.pushed.notified().await
    }

    /// Wait until the queue is non-empty and return a clone of the front
    pub async fn wait_front(&self) -> Message {
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.front() {
                return message;
            }
            notified.await;
        }
    }

    /// Wait until the queue is non-empty and pop the front
    pub async fn wait_pop(&self) -> Message {
        loop {
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.pop() {
                return message;
            }
            notified.await;
        }
    }
}
