use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Admits at most one detection at a time.
///
/// [`InFlightGuard::try_enter`] returns a token while nothing else is in
/// flight; the slot frees when the token drops.
#[derive(Clone, Default)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

pub struct InFlightToken {
    busy: Arc<AtomicBool>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_enter(&self) -> Option<InFlightToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightToken {
                busy: self.busy.clone(),
            })
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
