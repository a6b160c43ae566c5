//! Compile module: walks a filter tree and emits backend predicates.
//!
//! The compiler visits the tree in post-order, keeping an explicit predicate
//! stack, and collects the joins needed to reach fields on related entities.
//! Element filters of a list node are compiled by fresh compiler instances
//! rooted at the joined entity, so no state is shared across recursion.

use crate::field::FieldKind;
use crate::predicate::{CompareOp, EntityQuery, Predicate};
use crate::resolve::{EntityDescriptor, FieldResolver, JoinSpec};
use crate::tree::{Comparison, Connective, FilterNode, FilterTree, FilterVisitor, NodeId, Quantifier};
use crate::value::FieldValue;
use crate::{CompilationStateError, FilterError, ResolutionError};
use crate::{FilterableField, StoragePath};
use tracing::{debug, trace};

/// Compiles one filter tree into an [`EntityQuery`] for a given entity domain.
pub struct PredicateCompiler<'r> {
    resolver: &'r dyn FieldResolver,
    root: EntityDescriptor,
    joins: Vec<JoinSpec>,
    stack: Vec<Predicate>,
}

impl<'r> PredicateCompiler<'r> {
    pub fn new(resolver: &'r dyn FieldResolver, root: impl Into<EntityDescriptor>) -> Self {
        PredicateCompiler {
            resolver,
            root: root.into(),
            joins: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// One-shot compilation of the subtree at `node`.
    pub fn compile(
        resolver: &'r dyn FieldResolver,
        root: impl Into<EntityDescriptor>,
        tree: &FilterTree,
        node: NodeId,
    ) -> Result<EntityQuery, FilterError> {
        let mut compiler = PredicateCompiler::new(resolver, root);
        tree.accept(node, &mut compiler)?;
        compiler.into_query()
    }

    /// The combined condition so far, i.e. the top of the predicate stack.
    pub fn condition(&self) -> Option<&Predicate> {
        self.stack.last()
    }

    /// The joins required by everything visited so far, in first-seen order.
    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Finishes the compilation: base entity scan, accumulated joins, the top
    /// predicate, distinct rows.
    pub fn into_query(mut self) -> Result<EntityQuery, FilterError> {
        let predicate = self
            .stack
            .pop()
            .ok_or(CompilationStateError::EmptyResult)?;
        debug!(root = %self.root, joins = self.joins.len(), "compiled filter tree");
        Ok(EntityQuery {
            root: self.root,
            joins: self.joins,
            predicate,
            distinct: true,
        })
    }

    fn add_join(&mut self, join: JoinSpec) {
        if !self.joins.contains(&join) {
            trace!(join = %join, "registering join");
            self.joins.push(join);
        }
    }

    fn push(&mut self, predicate: Predicate) {
        trace!(predicate = %predicate, "pushing predicate");
        self.stack.push(predicate);
    }

    fn take_value(
        field: &FilterableField,
        value: Option<&FieldValue>,
    ) -> Result<FieldValue, FilterError> {
        value.cloned().ok_or_else(|| {
            CompilationStateError::MissingValue {
                field: field.id().clone(),
            }
            .into()
        })
    }

    fn compile_comparing(
        &mut self,
        field: &FilterableField,
        comparison: Comparison,
        value: Option<&FieldValue>,
    ) -> Result<(), FilterError> {
        let path = self.resolver.path_for(field)?;
        let value = Self::take_value(field, value)?;
        let predicate = match comparison {
            Comparison::Equal => equality_predicate(field, path, value),
            Comparison::LessThan => ordering_predicate(field, comparison, path, value, CompareOp::Lt)?,
            Comparison::GreaterThan => {
                ordering_predicate(field, comparison, path, value, CompareOp::Gt)?
            }
        };
        self.push(predicate);
        Ok(())
    }

    fn compile_containment(
        &mut self,
        field: &FilterableField,
        value: Option<&FieldValue>,
    ) -> Result<(), FilterError> {
        let path = self.resolver.path_for(field)?;
        let value = Self::take_value(field, value)?;
        self.push(Predicate::ContainsIgnoreCase {
            path,
            value: value.to_string(),
        });
        Ok(())
    }

    fn compile_invertible(&mut self, invert: bool) -> Result<(), FilterError> {
        if self.stack.is_empty() {
            return Err(CompilationStateError::EmptyStack.into());
        }
        if invert {
            let predicate = self
                .stack
                .pop()
                .ok_or(CompilationStateError::EmptyStack)?;
            self.push(predicate.negate());
        }
        Ok(())
    }

    fn compile_joining(
        &mut self,
        first: Option<NodeId>,
        second: Option<NodeId>,
        connective: Connective,
    ) -> Result<(), FilterError> {
        // a half-empty joining node has nothing to combine; its remaining
        // child's predicate is already on the stack
        if first.is_none() || second.is_none() {
            return Ok(());
        }
        if self.stack.len() < 2 {
            return Ok(());
        }
        let (Some(second_predicate), Some(first_predicate)) = (self.stack.pop(), self.stack.pop())
        else {
            return Ok(());
        };
        let combined = match connective {
            Connective::And => first_predicate.and(second_predicate),
            Connective::Or => first_predicate.or(second_predicate),
        };
        self.push(combined);
        Ok(())
    }

    fn compile_list(
        &mut self,
        tree: &FilterTree,
        template: &FilterableField,
        quantifier: Quantifier,
        elements: &[NodeId],
    ) -> Result<(), FilterError> {
        let mut combined: Option<Predicate> = None;
        for &element in elements {
            let element_field = tree.filtered_field(element)?.clone();
            let sub_root = self.resolver.entity_for(&element_field)?;
            let mut sub = PredicateCompiler::new(self.resolver, sub_root);
            tree.accept(element, &mut sub)?;
            if sub.condition().is_none() {
                // a fully pruned element constrains nothing
                continue;
            }

            if self.resolver.needs_join_for(&element_field) {
                debug!(field = %element_field.id(), "compiling list element through a join");
                self.add_join(self.resolver.join_for(&element_field)?);
                // only the sub-compilation's condition and joins matter; each
                // join clause already scopes to one related row, so element
                // predicates are conjoined regardless of the quantifier
                for join in sub.joins.drain(..) {
                    self.add_join(join);
                }
                let Some(condition) = sub.stack.pop() else {
                    continue;
                };
                combined = Some(match combined {
                    None => condition,
                    Some(acc) => acc.and(condition),
                });
            } else {
                debug!(field = %element_field.id(), "compiling list element as a subquery");
                let outer = self.resolver.path_for(template)?;
                let query = sub.into_query()?;
                let predicate = Predicate::InSubquery {
                    path: outer,
                    query: Box::new(query),
                };
                combined = Some(match (combined, quantifier) {
                    (None, _) => predicate,
                    (Some(acc), Quantifier::AllMatch) => acc.and(predicate),
                    (Some(acc), Quantifier::AnyMatches) => acc.or(predicate),
                });
            }
        }
        if let Some(predicate) = combined {
            self.push(predicate);
        }
        Ok(())
    }
}

impl FilterVisitor for PredicateCompiler<'_> {
    fn visit(&mut self, tree: &FilterTree, id: NodeId) -> Result<(), FilterError> {
        match tree.node(id)? {
            FilterNode::Comparing {
                field,
                comparison,
                value,
                ..
            } => self.compile_comparing(field, *comparison, value.as_ref()),
            FilterNode::Containment { field, value } => {
                self.compile_containment(field, value.as_ref())
            }
            FilterNode::Invertible { invert, .. } => self.compile_invertible(*invert),
            FilterNode::Joining {
                first,
                second,
                connective,
            } => self.compile_joining(*first, *second, *connective),
            FilterNode::List {
                template,
                quantifier,
                elements,
            } => self.compile_list(tree, template, *quantifier, elements),
        }
    }
}

fn equality_predicate(field: &FilterableField, path: StoragePath, value: FieldValue) -> Predicate {
    match field.kind() {
        // equality on large text means fuzzy matching
        FieldKind::Text { large: true } => Predicate::ContainsIgnoreCase {
            path,
            value: value.to_string(),
        },
        FieldKind::Text { large: false } | FieldKind::Email => Predicate::EqIgnoreCase {
            path,
            value: value.to_string(),
        },
        FieldKind::Compound => {
            if value.is_true() {
                Predicate::IsPresent { path }
            } else {
                Predicate::IsAbsent { path }
            }
        }
        _ => Predicate::Compare {
            path,
            op: CompareOp::Eq,
            value,
        },
    }
}

fn ordering_predicate(
    field: &FilterableField,
    comparison: Comparison,
    path: StoragePath,
    value: FieldValue,
    op: CompareOp,
) -> Result<Predicate, FilterError> {
    match field.kind() {
        FieldKind::Bool | FieldKind::Entity | FieldKind::Compound => {
            Err(ResolutionError::UnknownFilterKind {
                field: field.id().clone(),
                comparison,
            }
            .into())
        }
        _ => Ok(Predicate::Compare { path, op, value }),
    }
}
