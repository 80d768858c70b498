//! Ordered observer registry shared by the allocation managers.

use std::fmt;

use tracing::trace;

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer<E> = Box<dyn FnMut(&E)>;

/// Delivers change events to observers in registration order.
///
/// Delivery can be suppressed for the duration of a programmatic refresh so
/// that re-clamping does not echo back to the host as user edits.
pub struct ChangeNotifier<E> {
    observers: Vec<(ObserverId, Observer<E>)>,
    next_id: u64,
    suppressed: bool,
}

impl<E: fmt::Debug> ChangeNotifier<E> {
    /// Notifier with no observers.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
            suppressed: false,
        }
    }

    /// Register `observer`; it runs after the observers registered before it.
    pub fn subscribe(&mut self, observer: impl FnMut(&E) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns whether the observer was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Whether events are currently dropped.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Stop delivering events, returning the previous state for [`Self::resume`].
    pub fn suppress(&mut self) -> bool {
        std::mem::replace(&mut self.suppressed, true)
    }

    /// Restore the suppression state returned by `suppress`.
    pub fn resume(&mut self, previous: bool) {
        self.suppressed = previous;
    }

    /// Deliver `event` to every observer unless suppressed.
    pub fn notify(&mut self, event: E) {
        if self.suppressed {
            trace!(?event, "notification suppressed");
            return;
        }
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }
}

impl<E: fmt::Debug> Default for ChangeNotifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ChangeNotifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observers.len())
            .field("suppressed", &self.suppressed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    fn delivers_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut notifier = ChangeNotifier::new();
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            notifier.subscribe(move |event: &u32| seen.borrow_mut().push((tag, *event)));
        }
        notifier.notify(7);
        assert_eq!(*seen.borrow(), [("first", 7), ("second", 7)]);
    }

    #[test]
    fn suppression_and_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut notifier = ChangeNotifier::new();
        let counter = Rc::clone(&count);
        let id = notifier.subscribe(move |_: &&str| *counter.borrow_mut() += 1);

        let previous = notifier.suppress();
        notifier.notify("hidden");
        notifier.resume(previous);
        assert!(!notifier.is_suppressed());
        notifier.notify("shown");
        assert_eq!(*count.borrow(), 1);

        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify("gone");
        assert_eq!(*count.borrow(), 1);
    }
}
