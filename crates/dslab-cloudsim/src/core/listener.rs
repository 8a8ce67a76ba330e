//! Registry of notification callbacks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`Listeners::add`], used to remove the listener later.
pub type ListenerId = u64;

/// List of callbacks notified with a value of type `T`.
///
/// Notification iterates over a snapshot of the list, so a callback may add or remove listeners
/// (including itself) while being notified. Changes take effect from the next notification.
pub struct Listeners<T> {
    next_id: Cell<ListenerId>,
    items: RefCell<Vec<(ListenerId, Rc<dyn Fn(&T)>)>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            items: RefCell::new(Vec::new()),
        }
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Fn(&T) + 'static>(&self, listener: F) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.items.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes the listener, returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut items = self.items.borrow_mut();
        let len = items.len();
        items.retain(|(listener_id, _)| *listener_id != id);
        items.len() != len
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Rc<dyn Fn(&T)>> = self.items.borrow().iter().map(|(_, f)| f.clone()).collect();
        for listener in snapshot {
            listener(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_can_remove_itself() {
        let listeners: Rc<Listeners<u32>> = Rc::new(Listeners::new());
        let calls = Rc::new(Cell::new(0));
        let own_id = Rc::new(Cell::new(None));

        let weak = Rc::downgrade(&listeners);
        let (calls_clone, own_id_clone) = (calls.clone(), own_id.clone());
        let id = listeners.add(move |_| {
            calls_clone.set(calls_clone.get() + 1);
            if let (Some(listeners), Some(id)) = (weak.upgrade(), own_id_clone.get()) {
                listeners.remove(id);
            }
        });
        own_id.set(Some(id));
        let other_calls = Rc::new(Cell::new(0));
        let other_calls_clone = other_calls.clone();
        listeners.add(move |v| other_calls_clone.set(other_calls_clone.get() + v));

        listeners.notify(&1);
        listeners.notify(&2);
        assert_eq!(calls.get(), 1);
        assert_eq!(other_calls.get(), 3);
        assert_eq!(listeners.len(), 1);
        assert!(!listeners.remove(id));
    }
}
