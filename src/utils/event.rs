// src/utils/event.rs
//! Synchronous multi-subscriber notification point

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by [`Event::subscribe`], used to unsubscribe later
pub type SubscriptionId = u64;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of callbacks invoked on the notifying thread.
///
/// The subscriber list is copied out before callbacks run, so a callback may
/// subscribe, unsubscribe or re-enter whatever fired the event.
pub struct Event<T> {
    callbacks: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Invoke every callback with `value`
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_every_subscriber() {
        let event = Event::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let total = Arc::clone(&total);
            event.subscribe(move |value| {
                total.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        event.notify(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_unsubscribe() {
        let event = Event::<u32>::new();
        let id = event.subscribe(|_| {});

        assert_eq!(event.subscriber_count(), 1);
        assert!(event.unsubscribe(id));
        assert!(!event.unsubscribe(id));
        assert_eq!(event.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_reenter_event() {
        let event = Arc::new(Event::<u32>::new());
        let inner = Arc::clone(&event);

        event.subscribe(move |_| {
            // Would deadlock if the subscriber lock were held during notify
            inner.subscribe(|_| {});
        });

        event.notify(&1);
        assert_eq!(event.subscriber_count(), 2);
    }
}
