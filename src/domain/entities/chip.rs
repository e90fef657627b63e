use crate::domain::entities::value::Scalar;

/// Identifies what removing a chip clears.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChipKey {
    Search,
    Filter(String),
}

/// Human-readable projection of one applied query parameter. Derived, never
/// stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFilter {
    pub key: ChipKey,
    pub label: String,
    pub raw_value: Scalar,
    pub display_value: String,
}
