use std::sync::Arc;
use tokio::sync::watch;

/// An event that is delivered until someone consumes it.
///
/// Unlike a plain value holder, a consumed event is gone: later `peek` calls
/// and fresh subscriptions see nothing until the next `emit`. This keeps a
/// redrawn or re-entered screen from acting on the same navigation twice.
#[derive(Debug)]
pub struct OneShot<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OneShot<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn emit(&self, value: T) {
        self.tx.send_replace(Some(value));
    }

    /// The pending event, if any, without consuming it.
    pub fn peek(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    /// Marks the pending event as handled.
    pub fn consume(&self) {
        self.tx.send_if_modified(|pending| pending.take().is_some());
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}
