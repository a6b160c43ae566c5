//! Predicate module: the compiled, backend-facing boolean conditions.
//!
//! The compiler emits these as plain data; executing them against stored rows
//! is the storage layer's job.

use crate::resolve::{EntityDescriptor, JoinSpec, StoragePath};
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CompareOp {
    Lt,
    Eq,
    Gt,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Lt => "<",
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
        };
        write!(f, "{}", symbol)
    }
}

/// One compiled boolean condition over storage paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Typed comparison against a literal value.
    Compare {
        path: StoragePath,
        op: CompareOp,
        value: FieldValue,
    },
    /// Case-insensitive string equality.
    EqIgnoreCase { path: StoragePath, value: String },
    /// Case-insensitive substring containment.
    ContainsIgnoreCase { path: StoragePath, value: String },
    /// The related sub-entity at `path` exists.
    IsPresent { path: StoragePath },
    /// The related sub-entity at `path` is missing.
    IsAbsent { path: StoragePath },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    /// `path` is contained in the rows selected by an independent subquery.
    InSubquery {
        path: StoragePath,
        query: Box<EntityQuery>,
    },
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { path, op, value } => write!(f, "{} {} {}", path, op, value),
            Predicate::EqIgnoreCase { path, value } => write!(f, "{} =ic {}", path, value),
            Predicate::ContainsIgnoreCase { path, value } => {
                write!(f, "{} contains-ic {}", path, value)
            }
            Predicate::IsPresent { path } => write!(f, "{} is present", path),
            Predicate::IsAbsent { path } => write!(f, "{} is absent", path),
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::And(a, b) => write!(f, "({}) AND ({})", a, b),
            Predicate::Or(a, b) => write!(f, "({}) OR ({})", a, b),
            Predicate::InSubquery { path, query } => write!(f, "{} IN ({})", path, query),
        }
    }
}

/// A full compiled query: base entity scan, required joins, one combined
/// condition, distinct rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuery {
    pub root: EntityDescriptor,
    pub joins: Vec<JoinSpec>,
    pub predicate: Predicate,
    pub distinct: bool,
}

impl fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FROM {}", self.root)?;
        for join in &self.joins {
            write!(f, " JOIN {}", join)?;
        }
        write!(f, " WHERE {}", self.predicate)?;
        if self.distinct {
            write!(f, " DISTINCT")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn age_predicate() -> Predicate {
        Predicate::Compare {
            path: StoragePath::new("person.age"),
            op: CompareOp::Gt,
            value: FieldValue::Int(25),
        }
    }

    #[test]
    fn test_combinators() {
        let diet = Predicate::ContainsIgnoreCase {
            path: StoragePath::new("person.diet"),
            value: "vegan".to_string(),
        };
        let combined = age_predicate().and(diet);
        assert!(matches!(combined, Predicate::And(_, _)));
        let negated = combined.negate();
        assert_eq!(negated.to_string(), "NOT ((person.age > 25) AND (person.diet contains-ic vegan))");
    }

    #[test]
    fn test_query_display() {
        let query = EntityQuery {
            root: EntityDescriptor::new("person"),
            joins: vec![JoinSpec::new("person.qualifications", "qualification")],
            predicate: age_predicate(),
            distinct: true,
        };
        assert_eq!(
            query.to_string(),
            "FROM person JOIN person.qualifications -> qualification WHERE person.age > 25 DISTINCT"
        );
    }

    #[test]
    fn test_serialization_deserialization() {
        let query = EntityQuery {
            root: EntityDescriptor::new("person"),
            joins: vec![],
            predicate: age_predicate().negate(),
            distinct: true,
        };
        let json = serde_json::to_string(&query).unwrap();
        let deser: EntityQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(query, deser);
    }
}
