//! Parent → child wiring for cascading select fields.

use std::collections::BTreeMap;

use crate::domain::entities::option::find_by_value;
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::FilterDescriptor;
use crate::usecase::services::option_resolver::{
    OptionKey, OptionRequest, OptionResolver, Resolution,
};

/// Every field that transitively depends on `parent`, nearest first.
pub fn dependents_of<'a>(filters: &'a [FilterDescriptor], parent: &str) -> Vec<&'a FilterDescriptor> {
    let mut found: Vec<&FilterDescriptor> = Vec::new();
    let mut frontier = vec![parent.to_string()];
    while let Some(current) = frontier.pop() {
        for child in filters
            .iter()
            .filter(|filter| filter.parent_name() == Some(current.as_str()))
        {
            if found.iter().any(|seen| seen.name == child.name) || child.name == parent {
                continue;
            }
            frontier.push(child.name.clone());
            found.push(child);
        }
    }
    found
}

/// Applies a parent value change to `values` and the option cache.
///
/// Every dependent field loses its value and cached options before any new
/// request is planned. Direct children of a non-empty parent are then
/// re-planned with the new value; grandchildren stay empty until their own
/// parent is chosen. Each child is planned independently.
pub fn on_parent_changed(
    filters: &[FilterDescriptor],
    parent: &str,
    new_value: Option<&Scalar>,
    values: &mut BTreeMap<String, Scalar>,
    resolver: &mut OptionResolver,
) -> Vec<OptionRequest> {
    let dependents = dependents_of(filters, parent);
    for child in &dependents {
        values.remove(&child.name);
        resolver.clear_field(&child.name);
    }

    let Some(value) = new_value.filter(|value| !value.is_empty()) else {
        return Vec::new();
    };

    dependents
        .into_iter()
        .filter(|child| child.parent_name() == Some(parent))
        .filter_map(|child| match resolver.plan(child, Some(value)) {
            Resolution::Request(request) => Some(request),
            Resolution::Ready | Resolution::Skipped => None,
        })
        .collect()
}

/// Drops dependent values a submitted set cannot support.
///
/// A child is dropped when its parent has no value, or when the complete
/// option list cached for the parent's value does not contain it. Values
/// whose options are unknown or still loading are kept.
pub fn prune_dependents(
    filters: &[FilterDescriptor],
    values: &mut BTreeMap<String, Scalar>,
    resolver: &OptionResolver,
) {
    loop {
        let orphans: Vec<String> = filters
            .iter()
            .filter_map(|child| {
                let parent = child.parent_name()?;
                let value = values.get(&child.name)?;
                let keep = values
                    .get(parent)
                    .is_some_and(|parent| !rejects(resolver, &child.name, parent, value));
                (!keep).then(|| child.name.clone())
            })
            .collect();
        if orphans.is_empty() {
            return;
        }
        for name in orphans {
            values.remove(&name);
        }
    }
}

fn rejects(resolver: &OptionResolver, field: &str, parent: &Scalar, value: &Scalar) -> bool {
    resolver
        .entry(&OptionKey::new(field, Some(parent)))
        .is_some_and(|entry| {
            let complete = !entry.loading
                && entry.error.is_none()
                && !entry.has_more
                && entry.search_text.is_empty();
            complete && find_by_value(&entry.options, value).is_none()
        })
}

/// A cascading field is disabled while its parent has no value.
pub fn is_enabled(descriptor: &FilterDescriptor, values: &BTreeMap<String, Scalar>) -> bool {
    match descriptor.parent_name() {
        Some(parent) => values.get(parent).is_some_and(|value| !value.is_empty()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::domain::entities::option::SelectOption;
    use crate::usecase::config::screen::OptionSource;
    use crate::usecase::ports::source::SourceError;

    fn filters(calls: Arc<AtomicUsize>) -> Vec<FilterDescriptor> {
        let wards = move |parent: &Scalar| -> Result<Vec<SelectOption>, SourceError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SelectOption::new(format!("Ward of {parent}"), 10)])
        };
        vec![
            FilterDescriptor::select(
                "province",
                "Province",
                OptionSource::Static(vec![SelectOption::new("Hanoi", 1)]),
            ),
            FilterDescriptor::select("ward", "Ward", OptionSource::Dependent(Arc::new(wards)))
                .with_parent("province"),
            FilterDescriptor::text("street", "Street").with_parent("ward"),
        ]
    }

    #[test]
    fn parent_change_clears_children_then_plans_direct_child() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filters = filters(calls);
        let mut resolver = OptionResolver::new(20);
        let mut values = BTreeMap::new();
        values.insert("ward".to_string(), Scalar::Int(9));
        values.insert("street".to_string(), Scalar::text("Main"));

        let requests = on_parent_changed(
            &filters,
            "province",
            Some(&Scalar::Int(1)),
            &mut values,
            &mut resolver,
        );

        assert!(!values.contains_key("ward"));
        assert!(!values.contains_key("street"));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key.field, "ward");
        assert_eq!(requests[0].key.parent.as_deref(), Some("1"));
    }

    #[test]
    fn submitted_child_survives_while_its_parent_is_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filters = filters(calls);
        let mut resolver = OptionResolver::new(20);
        let mut values = BTreeMap::new();
        values.insert("province".to_string(), Scalar::Int(1));
        values.insert("ward".to_string(), Scalar::Int(10));
        values.insert("street".to_string(), Scalar::text("Main"));

        prune_dependents(&filters, &mut values, &resolver);
        assert_eq!(values.len(), 3);

        resolver.resolve(&filters[1], Some(&Scalar::Int(1)));
        values.insert("ward".to_string(), Scalar::Int(99));
        prune_dependents(&filters, &mut values, &resolver);
        assert_eq!(values.get("province"), Some(&Scalar::Int(1)));
        assert!(!values.contains_key("ward"));
        assert!(!values.contains_key("street"));
    }

    #[test]
    fn child_without_parent_is_pruned() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filters = filters(calls);
        let resolver = OptionResolver::new(20);
        let mut values = BTreeMap::new();
        values.insert("ward".to_string(), Scalar::Int(10));

        prune_dependents(&filters, &mut values, &resolver);
        assert!(values.is_empty());
    }

    #[test]
    fn empty_parent_clears_without_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filters = filters(calls.clone());
        let mut resolver = OptionResolver::new(20);
        let mut values = BTreeMap::new();
        values.insert("ward".to_string(), Scalar::Int(9));

        let requests = on_parent_changed(&filters, "province", None, &mut values, &mut resolver);

        assert!(requests.is_empty());
        assert!(values.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!is_enabled(&filters[1], &values));
    }
}
