//! Typed publish/subscribe channels.
//!
//! Each kind of event gets its own [`Channel<T>`]. Subscribing returns a
//! [`Subscription`] whose `unsubscribe` can be called any number of times.
//! Dropping a subscription does not unsubscribe; the observer stays registered
//! until `unsubscribe` is called or the channel is cleared.
//!
//! ```ignore
//! let channel = Channel::<u32>::new();
//! let mut subscription = channel.subscribe(|value| log::info!("got {}", value));
//! channel.notify(&42);
//! subscription.unsubscribe();
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// An observer callback.
pub type Observer<T> = Rc<dyn Fn(&T)>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

/// A set of observers for values of type `T`.
pub struct Channel<T> {
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register an observer.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.insert(Rc::new(observer))
    }

    /// Register an observer and call it right away with `current`.
    pub fn subscribe_with_replay<F>(&self, current: &T, observer: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let observer: Observer<T> = Rc::new(observer);
        observer(current);
        self.insert(observer)
    }

    fn insert(&self, observer: Observer<T>) -> Subscription {
        let id = {
            let mut subscribers = self.subscribers.borrow_mut();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.push((id, observer));
            id
        };

        let weak: Weak<RefCell<Subscribers<T>>> = Rc::downgrade(&self.subscribers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(subscribers) = weak.upgrade() {
                    subscribers.borrow_mut().entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Call every registered observer with `value`.
    ///
    /// Observers may subscribe or unsubscribe while being notified; such
    /// changes take effect from the next notification on.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .subscribers
            .borrow()
            .entries
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }

    /// Remove all observers.
    pub fn clear(&self) {
        self.subscribers.borrow_mut().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscribers.borrow().entries.len())
            .finish()
    }
}

/// Handle returned from [`Channel::subscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// A subscription that is not attached to any channel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Remove the observer from its channel. Further calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_notify_reaches_all_observers() {
        let channel = Channel::<u32>::new();
        let sum = Rc::new(Cell::new(0));
        let a = Rc::clone(&sum);
        let b = Rc::clone(&sum);
        let _first = channel.subscribe(move |v| a.set(a.get() + v));
        let _second = channel.subscribe(move |v| b.set(b.get() + v * 10));
        channel.notify(&2);
        assert_eq!(sum.get(), 22);
        assert_eq!(channel.len(), 2);
    }

    #[test]
    fn test_replay_on_subscribe() {
        let channel = Channel::<&'static str>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _subscription = channel.subscribe_with_replay(&"current", move |v| sink.borrow_mut().push(*v));
        channel.notify(&"next");
        assert_eq!(*seen.borrow(), vec!["current", "next"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let channel = Channel::<u32>::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut subscription = channel.subscribe(move |_| counter.set(counter.get() + 1));
        let _other = channel.subscribe(|_| {});

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(channel.len(), 1);

        channel.notify(&1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_unsubscribe_after_channel_dropped() {
        let channel = Channel::<u32>::new();
        let mut subscription = channel.subscribe(|_| {});
        drop(channel);
        subscription.unsubscribe();
    }

    #[test]
    fn test_observer_may_subscribe_during_notify() {
        let channel = Rc::new(Channel::<u32>::new());
        let inner = Rc::clone(&channel);
        let _subscription = channel.subscribe(move |_| {
            let _late = inner.subscribe(|_| {});
        });
        channel.notify(&0);
        assert_eq!(channel.len(), 2);
    }
}
