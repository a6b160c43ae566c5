//! Field module: typed descriptors of filterable entity attributes.
//!
//! A `FilterableField` names one attribute a filter may constrain. Two fields
//! are the same field exactly when their ids are equal, no matter what display
//! name or value state they carry.

use crate::value::FieldValue;
use crate::LookupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identity of a filterable field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        FieldId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        FieldId::new(id)
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        FieldId::new(id)
    }
}

/// What kind of attribute a field describes, which picks the compilation rules
/// that apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    /// `large` marks free-form text where equality is reinterpreted as fuzzy
    /// (substring) matching.
    Text {
        large: bool,
    },
    Date,
    Email,
    Enumerated,
    /// Reference to a related entity.
    Entity,
    /// Boolean-shaped field whose true/false values mean "related sub-entity
    /// present/absent" rather than a stored boolean.
    Compound,
}

/// Descriptor of one filterable attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterableField {
    id: FieldId,
    display_name: Option<String>,
    kind: FieldKind,
}

impl FilterableField {
    pub fn new(id: impl Into<FieldId>, kind: FieldKind) -> Self {
        FilterableField {
            id: id.into(),
            display_name: None,
            kind,
        }
    }

    /// Supplies the display name. Must happen before the field is shared
    /// across concurrently compiled trees.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The display name, falling back to the lowercased tail of the id.
    pub fn name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.default_name(),
        }
    }

    fn default_name(&self) -> String {
        let tail = self.id.as_str().rsplit('.').next().unwrap_or_default();
        tail.to_lowercase()
    }
}

impl PartialEq for FilterableField {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FilterableField {}

impl Hash for FilterableField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for FilterableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A field over a finite, ordered set of legal values.
///
/// Each value has a stable lowercase token, independent of any display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumeratedField {
    field: FilterableField,
    labels: Vec<String>,
}

impl EnumeratedField {
    pub fn new<L, S>(id: impl Into<FieldId>, labels: L) -> Self
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnumeratedField {
            field: FilterableField::new(id, FieldKind::Enumerated),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.field = self.field.with_name(name);
        self
    }

    pub fn field(&self) -> &FilterableField {
        &self.field
    }

    pub fn id(&self) -> &FieldId {
        self.field.id()
    }

    /// The legal values, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = FieldValue> + '_ {
        self.labels.iter().map(|l| FieldValue::Text(l.clone()))
    }

    pub fn value_count(&self) -> usize {
        self.labels.len()
    }

    /// The stable lowercase tokens of all values, in declaration order.
    pub fn value_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.to_lowercase()).collect()
    }

    /// The stable lowercase token for a value.
    pub fn name_for(&self, value: &FieldValue) -> String {
        value.to_string().to_lowercase()
    }

    /// Inverse of [`name_for`](Self::name_for): looks up the value carrying
    /// the given token, ignoring case.
    pub fn value_for(&self, name: &str) -> Result<FieldValue, LookupError> {
        self.labels
            .iter()
            .find(|l| l.to_lowercase() == name.to_lowercase())
            .map(|l| FieldValue::Text(l.clone()))
            .ok_or_else(|| LookupError::UnknownEnumValue {
                field: self.field.id().clone(),
                name: name.to_string(),
            })
    }
}

impl PartialEq for EnumeratedField {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field
    }
}

impl Eq for EnumeratedField {}

impl Hash for EnumeratedField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id_only() {
        let a = FilterableField::new("person.firstName", FieldKind::Text { large: false });
        let b = FilterableField::new("person.firstName", FieldKind::Date).with_name("First name");
        let c = FilterableField::new("person.lastName", FieldKind::Text { large: false });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_name_defaults_to_lowercased_id_tail() {
        let field = FilterableField::new("person.participantProfile.DateOfBirth", FieldKind::Date);
        assert_eq!(field.name(), "dateofbirth");
        let named = field.with_name("Date of birth");
        assert_eq!(named.name(), "Date of birth");
    }

    #[test]
    fn test_enumerated_values_in_order() {
        let gender = EnumeratedField::new("person.gender", ["Female", "Male", "Other"]);
        assert_eq!(gender.value_count(), 3);
        let values: Vec<_> = gender.values().collect();
        assert_eq!(values[0], FieldValue::from("Female"));
        assert_eq!(values[2], FieldValue::from("Other"));
        assert_eq!(gender.value_names(), vec!["female", "male", "other"]);
    }

    #[test]
    fn test_enumerated_name_roundtrip() {
        let gender = EnumeratedField::new("person.gender", ["Female", "Male"]);
        let value = gender.value_for("FEMALE").unwrap();
        assert_eq!(value, FieldValue::from("Female"));
        assert_eq!(gender.name_for(&value), "female");
    }

    #[test]
    fn test_enumerated_unknown_value() {
        let gender = EnumeratedField::new("person.gender", ["Female", "Male"]);
        let err = gender.value_for("alien").unwrap_err();
        assert_eq!(
            err,
            LookupError::UnknownEnumValue {
                field: FieldId::new("person.gender"),
                name: "alien".to_string(),
            }
        );
    }

    #[test]
    fn test_serialization_deserialization() {
        let field =
            FilterableField::new("person.remarks", FieldKind::Text { large: true }).with_name("Remarks");
        let json = serde_json::to_string(&field).unwrap();
        let deser: FilterableField = serde_json::from_str(&json).unwrap();
        assert_eq!(field, deser);
        assert_eq!(deser.name(), "Remarks");
        assert_eq!(deser.kind(), FieldKind::Text { large: true });
    }
}
