use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use dioxus::prelude::*;
use serde_json::Value;

use crate::platform::desktop::blocking::run_blocking;
use crate::usecase::engine::runtime::GridSession;

/// Shared handle between Dioxus event handlers and one grid session.
/// `version` is bumped after every call so readers re-render.
#[derive(Clone)]
pub struct GridHandle {
    session: Rc<RefCell<GridSession<Value>>>,
    version: Signal<u64>,
}

impl PartialEq for GridHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.session, &other.session) && self.version == other.version
    }
}

impl GridHandle {
    pub fn new(session: GridSession<Value>, version: Signal<u64>) -> Self {
        Self {
            session: Rc::new(RefCell::new(session)),
            version,
        }
    }

    /// Subscribes the caller to changes and returns the current version.
    pub fn version(&self) -> u64 {
        (self.version)()
    }

    pub fn read<R>(&self, f: impl FnOnce(&GridSession<Value>) -> R) -> R {
        f(&self.session.borrow())
    }

    pub fn apply(&self, label: &str, f: impl FnOnce(&mut GridSession<Value>)) {
        run_blocking(label, || f(&mut self.session.borrow_mut()));
        let mut version = self.version;
        *version.write() += 1;
        self.schedule_wake();
    }

    /// Sleeps until the next debounce deadline, then ticks the session.
    fn schedule_wake(&self) {
        let Some(at) = self.session.borrow_mut().take_wake() else {
            return;
        };
        let handle = self.clone();
        spawn(async move {
            tokio::time::sleep(at.saturating_duration_since(Instant::now())).await;
            handle.apply("tick", |session| session.tick(Instant::now()));
        });
    }
}
