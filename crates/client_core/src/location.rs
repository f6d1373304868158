//! Mirror of the active poll id into a shareable location string, so a
//! reloaded or shared session can restore itself. Modeled as an injected
//! side-effect seam rather than ambient global state.

use std::sync::Mutex;

use shared::domain::PollId;

pub trait LocationMirror: Send + Sync {
    fn current(&self) -> Option<PollId>;
    fn set(&self, id: &PollId);
    fn clear(&self);
}

/// For embedders without a location concept.
pub struct NoopLocationMirror;

impl LocationMirror for NoopLocationMirror {
    fn current(&self) -> Option<PollId> {
        None
    }

    fn set(&self, _id: &PollId) {}

    fn clear(&self) {}
}

/// Process-local mirror used by the CLI and by tests.
#[derive(Default)]
pub struct InMemoryLocation {
    fragment: Mutex<Option<PollId>>,
}

impl InMemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(id: PollId) -> Self {
        Self {
            fragment: Mutex::new(Some(id)),
        }
    }
}

impl LocationMirror for InMemoryLocation {
    fn current(&self) -> Option<PollId> {
        self.fragment.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, id: &PollId) {
        if let Ok(mut guard) = self.fragment.lock() {
            *guard = Some(id.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.fragment.lock() {
            *guard = None;
        }
    }
}
