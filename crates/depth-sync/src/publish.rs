//! Atomically published book views and their update subscribers.

use std::sync::Arc;

use orderbook::BookView;
use parking_lot::{Mutex, RwLock};

use crate::reconciler::SyncState;

/// Callback invoked with each freshly published view.
pub type ViewCallback = Arc<dyn Fn(&BookView) + Send + Sync>;

struct Published {
    view: RwLock<Arc<BookView>>,
    status: RwLock<SyncState>,
    subscribers: Mutex<Vec<ViewCallback>>,
}

/// Shared slot holding the latest [`BookView`].
///
/// The writer replaces the `Arc` wholesale; readers clone it and never
/// observe a partially updated book.
#[derive(Clone)]
pub struct ViewPublisher {
    inner: Arc<Published>,
}

impl ViewPublisher {
    pub fn new(symbol: &str) -> Self {
        Self {
            inner: Arc::new(Published {
                view: RwLock::new(Arc::new(BookView::empty(symbol))),
                status: RwLock::new(SyncState::AwaitingSnapshot),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn current_view(&self) -> Arc<BookView> {
        self.inner.view.read().clone()
    }

    pub fn status(&self) -> SyncState {
        *self.inner.status.read()
    }

    pub fn subscribe(&self, callback: ViewCallback) {
        self.inner.subscribers.lock().push(callback);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub(crate) fn set_status(&self, status: SyncState) {
        *self.inner.status.write() = status;
    }

    /// Swap in a new view, then notify subscribers in registration order.
    ///
    /// Callbacks run outside the subscriber lock so they may register
    /// further callbacks.
    pub(crate) fn publish(&self, view: BookView) {
        let view = Arc::new(view);
        *self.inner.view.write() = Arc::clone(&view);

        let subscribers = self.inner.subscribers.lock().clone();
        for callback in &subscribers {
            callback(&view);
        }
    }
}

impl std::fmt::Debug for ViewPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewPublisher")
            .field("status", &self.status())
            .field("last_sequence", &self.current_view().last_sequence)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
