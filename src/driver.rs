//! Driver module: applies flat sets of independent filters to sequences.
//!
//! Used when criteria are not combined into one tree but collected as
//! independent filters over an in-memory or streamed collection. Filters are
//! applied in no guaranteed order, so each filter's predicate must not depend
//! on another filter having run first.

use crate::RegistrationError;
use std::any::{type_name, TypeId};
use std::collections::HashSet;
use std::hash::Hash;
use tracing::debug;

/// A boxed lazy sequence of elements.
pub type Sequence<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

/// One independent filter over a sequence of elements.
///
/// Implementors are expected to be commutative with every other registered
/// filter: the outcome may not depend on application order.
pub trait SequenceFilter<T> {
    /// Receives elements, filters them, gives elements again.
    fn apply<'a>(&'a self, input: Sequence<'a, T>) -> Sequence<'a, T>;
}

/// A mutable set of independent filters, at most one per concrete filter kind.
#[derive(Default)]
pub struct FilterSet<T> {
    filters: Vec<(TypeId, Box<dyn SequenceFilter<T>>)>,
}

impl<T> FilterSet<T> {
    pub fn new() -> Self {
        FilterSet {
            filters: Vec::new(),
        }
    }

    /// Registers a filter for execution. Registering a second filter of the
    /// same concrete type is rejected.
    pub fn add<F>(&mut self, filter: F) -> Result<&mut Self, RegistrationError>
    where
        F: SequenceFilter<T> + 'static,
    {
        let kind = TypeId::of::<F>();
        if self.filters.iter().any(|(existing, _)| *existing == kind) {
            return Err(RegistrationError::ConflictingFilterCriteria {
                kind: type_name::<F>(),
            });
        }
        debug!(kind = type_name::<F>(), "registering sequence filter");
        self.filters.push((kind, Box::new(filter)));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Folds every registered filter over the input, lazily. Application
    /// order between filters is unspecified.
    pub fn run<'a>(&'a self, input: impl Iterator<Item = T> + 'a) -> Sequence<'a, T> {
        let mut sequence: Sequence<'a, T> = Box::new(input);
        for (_, filter) in &self.filters {
            sequence = filter.apply(sequence);
        }
        sequence
    }

    /// Like [`run`](Self::run) but materializes the result.
    pub fn run_collect(&self, input: impl IntoIterator<Item = T>) -> Vec<T>
    where
        T: 'static,
    {
        let input: Vec<T> = input.into_iter().collect();
        self.run(input.into_iter()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectiveKind {
    And,
    Or,
}

/// Combines exactly two sequence filters logically.
///
/// `and` keeps elements matched by both filters, `or` keeps elements matched
/// by either (an order-preserving union).
pub struct Connected<T> {
    first: Box<dyn SequenceFilter<T>>,
    second: Option<(ConnectiveKind, Box<dyn SequenceFilter<T>>)>,
}

impl<T> Connected<T> {
    pub fn for_filter(first: impl SequenceFilter<T> + 'static) -> Self {
        Connected {
            first: Box::new(first),
            second: None,
        }
    }

    pub fn and(
        mut self,
        second: impl SequenceFilter<T> + 'static,
    ) -> Result<Self, RegistrationError> {
        self.connect(ConnectiveKind::And, Box::new(second))?;
        Ok(self)
    }

    pub fn or(
        mut self,
        second: impl SequenceFilter<T> + 'static,
    ) -> Result<Self, RegistrationError> {
        self.connect(ConnectiveKind::Or, Box::new(second))?;
        Ok(self)
    }

    fn connect(
        &mut self,
        kind: ConnectiveKind,
        second: Box<dyn SequenceFilter<T>>,
    ) -> Result<(), RegistrationError> {
        if self.second.is_some() {
            return Err(RegistrationError::ConnectiveAlreadyChosen);
        }
        self.second = Some((kind, second));
        Ok(())
    }
}

impl<T> SequenceFilter<T> for Connected<T>
where
    T: Clone + Eq + Hash + 'static,
{
    fn apply<'a>(&'a self, input: Sequence<'a, T>) -> Sequence<'a, T> {
        match &self.second {
            // no connective chosen: behave as the sole filter
            None => self.first.apply(input),
            Some((ConnectiveKind::And, second)) => second.apply(self.first.apply(input)),
            Some((ConnectiveKind::Or, second)) => {
                let elements: Vec<T> = input.collect();
                let matched_first: Vec<T> =
                    self.first.apply(Box::new(elements.clone().into_iter())).collect();
                let matched_second: Vec<T> =
                    second.apply(Box::new(elements.into_iter())).collect();
                let mut seen: HashSet<T> = matched_first.iter().cloned().collect();
                let union = matched_first.into_iter().chain(
                    matched_second
                        .into_iter()
                        .filter(move |element| seen.insert(element.clone())),
                );
                Box::new(union)
            }
        }
    }
}
