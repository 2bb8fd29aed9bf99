//! Deduplicating keyed batch queue.
//!
//! # Responsibilities
//! - Collect items per key until a worker takes them
//! - Hand out all pending items of one key at once
//! - Keep a key away from other workers while its batch is in flight
//!
//! # Design Decisions
//! - Repeated adds before a get coalesce into one ready entry
//! - Adds during flight are parked and re-queued on `done`
//! - Ready keys are served in the order they became ready

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Contract between the ingestion pump, the workers and the queue.
#[async_trait]
pub trait BatchQueue<T: Send + 'static>: Send + Sync + 'static {
    /// Append an item to the key's pending batch and mark the key ready.
    fn add(&self, key: String, item: T);

    /// Wait for a ready key and take all its pending items. The key is
    /// in flight until [`BatchQueue::done`]. Returns `None` once shut down
    /// with nothing ready.
    async fn get(&self) -> Option<(String, Vec<T>)>;

    /// Release a key taken by [`BatchQueue::get`].
    fn done(&self, key: &str);

    /// Wake all waiters; later gets return `None` when nothing is ready.
    fn shut_down(&self);
}

#[derive(Debug)]
struct QueueState<T> {
    pending: HashMap<String, Vec<T>>,
    ready: VecDeque<String>,
    queued: HashSet<String>,
    in_flight: HashSet<String>,
    shutting_down: bool,
}

impl<T> QueueState<T> {
    fn mark_ready(&mut self, key: &str) -> bool {
        if self.in_flight.contains(key) || self.queued.contains(key) {
            return false;
        }
        self.queued.insert(key.to_string());
        self.ready.push_back(key.to_string());
        true
    }
}

/// In-process [`BatchQueue`] guarded by a mutex and a notifier.
#[derive(Debug)]
pub struct KeyedBatchQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

impl<T> KeyedBatchQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: HashMap::new(),
                ready: VecDeque::new(),
                queued: HashSet::new(),
                in_flight: HashSet::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Keys waiting to be picked up.
    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    /// Keys currently held by a worker.
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn try_take(&self) -> Option<Option<(String, Vec<T>)>> {
        let mut state = self.lock();
        if let Some(key) = state.ready.pop_front() {
            state.queued.remove(&key);
            let items = state.pending.remove(&key).unwrap_or_default();
            state.in_flight.insert(key.clone());
            let more = !state.ready.is_empty();
            drop(state);
            if more {
                // Pass the wakeup on so another idle worker takes the next key.
                self.notify.notify_one();
            }
            return Some(Some((key, items)));
        }
        if state.shutting_down {
            return Some(None);
        }
        None
    }
}

impl<T> Default for KeyedBatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> BatchQueue<T> for KeyedBatchQueue<T> {
    fn add(&self, key: String, item: T) {
        let mut state = self.lock();
        if state.shutting_down {
            return;
        }
        let became_ready = state.mark_ready(&key);
        state.pending.entry(key).or_default().push(item);
        drop(state);
        if became_ready {
            self.notify.notify_one();
        }
    }

    async fn get(&self) -> Option<(String, Vec<T>)> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(next) = self.try_take() {
                return next;
            }
            notified.await;
        }
    }

    fn done(&self, key: &str) {
        let mut state = self.lock();
        if !state.in_flight.remove(key) {
            return;
        }
        let has_pending = state.pending.get(key).is_some_and(|items| !items.is_empty());
        let became_ready = has_pending && state.mark_ready(key);
        drop(state);
        if became_ready {
            self.notify.notify_one();
        }
    }

    fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }
}
