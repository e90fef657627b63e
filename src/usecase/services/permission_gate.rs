use std::collections::HashMap;

use crate::usecase::config::screen::{ActionDef, ColumnDef};
use crate::usecase::ports::source::PermissionChecker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Pending,
    Granted,
    Denied,
}

/// Synchronous visibility lookups over asynchronously resolved permissions.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    cache: HashMap<String, Grant>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the cache for a new column/action set and returns the distinct
    /// permission keys that need checking. Each key is checked once.
    pub fn precompute<T>(&mut self, columns: &[ColumnDef], actions: &[ActionDef<T>]) -> Vec<String> {
        self.cache.clear();
        let mut keys = Vec::new();
        let permissions = columns
            .iter()
            .filter_map(|column| column.permission.as_deref())
            .chain(actions.iter().filter_map(|action| action.permission.as_deref()));
        for permission in permissions {
            if !self.cache.contains_key(permission) {
                self.cache.insert(permission.to_string(), Grant::Pending);
                keys.push(permission.to_string());
            }
        }
        keys
    }

    /// Records a check result. Results for keys that are no longer tracked
    /// (the configuration changed meanwhile) are ignored.
    pub fn resolve(&mut self, permission: &str, granted: bool) {
        if let Some(slot) = self.cache.get_mut(permission) {
            *slot = if granted { Grant::Granted } else { Grant::Denied };
        }
    }

    pub fn grant(&self, permission: &str) -> Option<Grant> {
        self.cache.get(permission).copied()
    }

    /// No permission means visible; pending, denied or unknown means hidden.
    pub fn is_granted(&self, permission: Option<&str>) -> bool {
        match permission {
            None => true,
            Some(key) => self.cache.get(key) == Some(&Grant::Granted),
        }
    }

    pub fn is_column_visible(&self, column: &ColumnDef) -> bool {
        self.is_granted(column.permission.as_deref())
    }

    /// The row predicate only runs once the permission has passed.
    pub fn is_action_visible<T>(&self, action: &ActionDef<T>, row: Option<&T>) -> bool {
        if !self.is_granted(action.permission.as_deref()) {
            return false;
        }
        match (&action.visible, row) {
            (Some(predicate), Some(row)) => predicate(row),
            _ => true,
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Checks each key on its own. A failing check counts as denied.
pub fn check_permissions(checker: &dyn PermissionChecker, keys: &[String]) -> Vec<(String, bool)> {
    keys.iter()
        .map(|key| {
            let granted = match checker.check(std::slice::from_ref(key)) {
                Ok(granted) => granted,
                Err(err) => {
                    tracing::warn!(permission = %key, error = %err, "permission check failed; treating as denied");
                    false
                }
            };
            (key.clone(), granted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::usecase::ports::source::SourceError;

    #[test]
    fn unresolved_permission_fails_closed() {
        let mut gate = PermissionGate::new();
        let columns = vec![
            ColumnDef::new("name", "Name"),
            ColumnDef::new("salary", "Salary").with_permission("users.salary"),
        ];
        let keys = gate.precompute::<()>(&columns, &[]);

        assert_eq!(keys, vec!["users.salary".to_string()]);
        assert!(gate.is_column_visible(&columns[0]));
        assert!(!gate.is_column_visible(&columns[1]));
        assert_eq!(gate.grant("users.salary"), Some(Grant::Pending));

        gate.resolve("users.salary", true);
        assert_eq!(gate.grant("users.salary"), Some(Grant::Granted));
        assert!(gate.is_column_visible(&columns[1]));
    }

    #[test]
    fn denied_permission_never_runs_row_predicate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let action = ActionDef::<i32>::new("delete", "Delete")
            .with_permission("users.delete")
            .visible_when(move |row| {
                counter.fetch_add(1, Ordering::SeqCst);
                *row > 0
            });

        let mut gate = PermissionGate::new();
        gate.precompute(&[], std::slice::from_ref(&action));
        gate.resolve("users.delete", false);

        assert!(!gate.is_action_visible(&action, Some(&5)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        gate.resolve("users.delete", true);
        assert!(gate.is_action_visible(&action, Some(&5)));
        assert!(!gate.is_action_visible(&action, Some(&-1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn checker_errors_count_as_denied() {
        let checker = |_keys: &[String]| -> Result<bool, SourceError> {
            Err(SourceError::message("offline"))
        };
        let results = check_permissions(&checker, &["users.edit".to_string()]);
        assert_eq!(results, vec![("users.edit".to_string(), false)]);
    }
}
