use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::session::state::{reduce, Action, AppState, ViewState};

struct StoreInner {
    state: AppState,
    last_view: ViewState,
    subscribers: Vec<Sender<ViewState>>,
}

/// Shared application state with unidirectional updates.
///
/// Cloning the store clones the handle, not the state. Subscribers receive
/// the derived [`ViewState`] whenever it changes.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
}

impl Store {
    pub fn new(state: AppState) -> Self {
        let last_view = state.view();
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                state,
                last_view,
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panicking writer leaves the previous state in place.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn dispatch(&self, action: Action) -> ViewState {
        let mut inner = self.lock();
        let current = std::mem::take(&mut inner.state);
        inner.state = reduce(current, action);

        let view = inner.state.view();
        if view != inner.last_view {
            inner.last_view = view;
            inner.subscribers.retain(|tx| tx.send(view).is_ok());
        }
        view
    }

    /// Clone of the full state, taken under the lock.
    pub fn snapshot(&self) -> AppState {
        self.lock().state.clone()
    }

    /// Reads part of the state without cloning the rest.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.lock().state)
    }

    pub fn view(&self) -> ViewState {
        self.lock().last_view
    }

    /// Returns a channel that receives the current view, then every change.
    pub fn subscribe(&self) -> Receiver<ViewState> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut inner = self.lock();
        let _ = tx.send(inner.last_view);
        inner.subscribers.push(tx);
        rx
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
