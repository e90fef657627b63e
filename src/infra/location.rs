use parking_lot::RwLock;

use crate::usecase::ports::source::LocationStore;

/// In-process stand-in for the browser location. Writes replace the current
/// entry in place.
#[derive(Debug, Default)]
pub struct MemoryLocation {
    inner: RwLock<LocationState>,
}

#[derive(Debug, Default)]
struct LocationState {
    query: String,
    replacements: usize,
}

impl MemoryLocation {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(LocationState {
                query: query.into(),
                replacements: 0,
            }),
        }
    }

    /// Number of in-place replacements so far.
    pub fn replacements(&self) -> usize {
        self.inner.read().replacements
    }
}

impl LocationStore for MemoryLocation {
    fn query_string(&self) -> String {
        self.inner.read().query.clone()
    }

    fn replace_query_string(&self, query: &str) {
        let mut state = self.inner.write();
        state.query = query.trim_start_matches('?').to_string();
        state.replacements += 1;
    }
}
