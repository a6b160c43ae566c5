//! Sievetree: a composable filter-criteria tree compiled into query predicates.
//!
//! This crate provides the filter core of an entity-management application: callers
//! describe criteria over abstract fields as a tree, and a compiler turns that tree
//! into predicates (plus the joins they require) for the storage layer to execute.
//!
//! # Architecture
//! - Field model (typed descriptors of filterable attributes)
//! - Filter tree (comparison, containment, inversion, AND/OR, list quantifiers)
//! - Field resolver (abstract field -> storage path, with join decisions)
//! - Predicate compiler (post-order walk with an explicit predicate stack)
//! - Application driver (flat sets of independent filters over sequences)

mod compile;
mod driver;
mod field;
mod predicate;
mod resolve;
mod tree;
mod value;

pub use compile::*;
pub use driver::*;
pub use field::*;
pub use predicate::*;
pub use resolve::*;
pub use tree::*;
pub use value::*;

use thiserror::Error;

/// Unified error type for sievetree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Compilation(#[from] CompilationStateError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// A filter tree was mutated in a way its structure does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("cannot detach the root of a filter tree")]
    NoParent,
    #[error("joining filter operates upon different fields")]
    NoCommonField,
    #[error("an equality filter may only use equality as comparison operation")]
    UnsupportedComparisonChange,
    #[error("node is not part of this filter tree")]
    UnknownNode,
}

/// A field could not be mapped onto the storage model during compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no storage mapping for field `{field}`")]
    UnmappedField { field: FieldId },
    #[error("no compilation rule for {comparison} on field `{field}`")]
    UnknownFilterKind {
        field: FieldId,
        comparison: Comparison,
    },
}

/// The compiler's predicate stack ended up in a state it cannot proceed from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilationStateError {
    #[error("need a predicate to invert")]
    EmptyStack,
    #[error("filter tree produced no predicate")]
    EmptyResult,
    #[error("no value provided for field `{field}`")]
    MissingValue { field: FieldId },
}

/// A lookup against an enumerated field failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("`{name}` is not a value of enumerated field `{field}`")]
    UnknownEnumValue { field: FieldId, name: String },
}

/// A filter could not be registered with the application driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("a filter of kind `{kind}` is already registered")]
    ConflictingFilterCriteria { kind: &'static str },
    #[error("a logical connective has already been specified")]
    ConnectiveAlreadyChosen,
}
