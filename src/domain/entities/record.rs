use serde_json::Value;

use crate::domain::entities::value::Scalar;

/// Field access used by the in-memory filter/sort pipeline.
pub trait Record {
    /// Value at a dotted path such as `province.name` or `tags.0`.
    fn field(&self, path: &str) -> Option<Scalar>;

    /// Top-level scalar values, used by the free-text search.
    fn scalar_fields(&self) -> Vec<Scalar>;
}

impl Record for Value {
    fn field(&self, path: &str) -> Option<Scalar> {
        resolve_path(self, path).and_then(Scalar::from_json)
    }

    fn scalar_fields(&self) -> Vec<Scalar> {
        match self {
            Value::Object(map) => map
                .values()
                .filter(|value| !value.is_object() && !value.is_array())
                .filter_map(Scalar::from_json)
                .collect(),
            other => Scalar::from_json(other).into_iter().collect(),
        }
    }
}

pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|idx| items.get(idx)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_resolves_nested_paths() {
        let row = json!({"id": 1, "province": {"name": "Hanoi"}, "tags": ["a", "b"]});
        assert_eq!(row.field("id"), Some(Scalar::Int(1)));
        assert_eq!(row.field("province.name"), Some(Scalar::text("Hanoi")));
        assert_eq!(row.field("tags.1"), Some(Scalar::text("b")));
        assert_eq!(row.field("province.code"), None);
        assert_eq!(row.field("id.value"), None);
    }

    #[test]
    fn scalar_fields_skip_nested_values() {
        let row = json!({"id": 1, "name": "x", "meta": {"k": "v"}, "missing": null});
        let fields = row.scalar_fields();
        assert_eq!(fields.len(), 2);
    }
}
