//! Tree module: the composable filter AST and its structural operations.
//!
//! Nodes live in an arena owned by [`FilterTree`] and are addressed by
//! [`NodeId`]; parent links are kept in a parallel table instead of mutable
//! back-edges. Nodes are only created through the factory methods.

use crate::field::FilterableField;
use crate::value::FieldValue;
use crate::{FilterError, StructuralError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to one node of a [`FilterTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// Comparison operation of a comparing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    LessThan,
    Equal,
    GreaterThan,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Comparison::LessThan => "less-than",
            Comparison::Equal => "equality",
            Comparison::GreaterThan => "greater-than",
        };
        write!(f, "{}", name)
    }
}

/// How a joining filter combines its two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connective {
    And,
    Or,
}

/// How a list filter combines its per-element predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantifier {
    AllMatch,
    AnyMatches,
}

/// One node of the filter AST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterNode {
    Comparing {
        field: FilterableField,
        comparison: Comparison,
        value: Option<FieldValue>,
        /// Locked to equality; `set_comparison` is rejected.
        equality_only: bool,
    },
    Containment {
        field: FilterableField,
        value: Option<FieldValue>,
    },
    Invertible {
        child: NodeId,
        invert: bool,
        /// When false, `invert` is frozen and toggles are silently ignored.
        mutable: bool,
    },
    Joining {
        first: Option<NodeId>,
        second: Option<NodeId>,
        connective: Connective,
    },
    List {
        /// Validates which field each element filter constrains.
        template: FilterableField,
        quantifier: Quantifier,
        elements: Vec<NodeId>,
    },
}

/// Visitor over filter nodes, driven by [`FilterTree::accept`] in post-order.
pub trait FilterVisitor {
    fn visit(&mut self, tree: &FilterTree, id: NodeId) -> Result<(), FilterError>;
}

/// Arena of filter nodes forming one or more criteria trees.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FilterTree {
    nodes: Vec<Option<FilterNode>>,
    parents: Vec<Option<NodeId>>,
}

impl FilterTree {
    pub fn new() -> Self {
        FilterTree::default()
    }

    fn alloc(&mut self, node: FilterNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        self.parents.push(None);
        id
    }

    pub fn node(&self, id: NodeId) -> Result<&FilterNode, StructuralError> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(StructuralError::UnknownNode)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut FilterNode, StructuralError> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(StructuralError::UnknownNode)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.0).copied().flatten()
    }

    // --- Factories ---

    /// A comparing filter, initially testing equality with no value.
    pub fn comparing(&mut self, field: FilterableField) -> NodeId {
        self.alloc(FilterNode::Comparing {
            field,
            comparison: Comparison::Equal,
            value: None,
            equality_only: false,
        })
    }

    /// A comparing filter locked to equality.
    pub fn equality(&mut self, field: FilterableField) -> NodeId {
        self.alloc(FilterNode::Comparing {
            field,
            comparison: Comparison::Equal,
            value: None,
            equality_only: true,
        })
    }

    pub fn containment(&mut self, field: FilterableField) -> NodeId {
        self.alloc(FilterNode::Containment { field, value: None })
    }

    /// Wraps an existing filter so its result can be inverted.
    pub fn invertible(&mut self, child: NodeId) -> Result<NodeId, StructuralError> {
        self.invertible_node(child, true)
    }

    /// An invertible wrapper around a fresh equality filter for `field`.
    pub fn invertible_for(&mut self, field: FilterableField) -> NodeId {
        let child = self.equality(field);
        let id = self.alloc(FilterNode::Invertible {
            child,
            invert: false,
            mutable: true,
        });
        self.parents[child.0] = Some(id);
        id
    }

    /// Like [`invertible`](Self::invertible) but with `invert` frozen.
    pub fn frozen_invertible(&mut self, child: NodeId) -> Result<NodeId, StructuralError> {
        self.invertible_node(child, false)
    }

    fn invertible_node(&mut self, child: NodeId, mutable: bool) -> Result<NodeId, StructuralError> {
        self.node(child)?;
        let id = self.alloc(FilterNode::Invertible {
            child,
            invert: false,
            mutable,
        });
        self.parents[child.0] = Some(id);
        Ok(id)
    }

    pub fn and(&mut self, first: NodeId, second: NodeId) -> Result<NodeId, StructuralError> {
        self.joining(first, second, Connective::And)
    }

    pub fn or(&mut self, first: NodeId, second: NodeId) -> Result<NodeId, StructuralError> {
        self.joining(first, second, Connective::Or)
    }

    fn joining(
        &mut self,
        first: NodeId,
        second: NodeId,
        connective: Connective,
    ) -> Result<NodeId, StructuralError> {
        self.node(first)?;
        self.node(second)?;
        let id = self.alloc(FilterNode::Joining {
            first: Some(first),
            second: Some(second),
            connective,
        });
        self.parents[first.0] = Some(id);
        self.parents[second.0] = Some(id);
        Ok(id)
    }

    /// A list filter matching rows for which every element filter holds.
    pub fn all_match(&mut self, template: FilterableField) -> NodeId {
        self.alloc(FilterNode::List {
            template,
            quantifier: Quantifier::AllMatch,
            elements: Vec::new(),
        })
    }

    /// A list filter matching rows for which at least one element filter holds.
    pub fn any_matches(&mut self, template: FilterableField) -> NodeId {
        self.alloc(FilterNode::List {
            template,
            quantifier: Quantifier::AnyMatches,
            elements: Vec::new(),
        })
    }

    /// Appends an element filter to a list node and reparents it. Returns
    /// false when `list` is not a list filter or `element` is stale.
    pub fn add_element(&mut self, list: NodeId, element: NodeId) -> bool {
        if self.node(element).is_err() {
            return false;
        }
        match self.node_mut(list) {
            Ok(FilterNode::List { elements, .. }) => {
                elements.push(element);
                self.parents[element.0] = Some(list);
                true
            }
            _ => false,
        }
    }

    // --- Shared node contract ---

    /// Dispatches `visitor` over the subtree at `id` in strict post-order.
    ///
    /// A joining node whose slots are not both occupied dispatches to the
    /// remaining child but is itself skipped.
    pub fn accept<V: FilterVisitor>(&self, id: NodeId, visitor: &mut V) -> Result<(), FilterError> {
        match self.node(id)? {
            FilterNode::Comparing { .. } | FilterNode::Containment { .. } | FilterNode::List { .. } => {
                visitor.visit(self, id)
            }
            FilterNode::Invertible { child, .. } => {
                let child = *child;
                self.accept(child, visitor)?;
                visitor.visit(self, id)
            }
            FilterNode::Joining { first, second, .. } => {
                let (first, second) = (*first, *second);
                if let Some(first) = first {
                    self.accept(first, visitor)?;
                }
                if let Some(second) = second {
                    self.accept(second, visitor)?;
                }
                if first.is_some() && second.is_some() {
                    visitor.visit(self, id)?;
                }
                Ok(())
            }
        }
    }

    /// Whether this node or any descendant filters `field`. List elements are
    /// not inspected; a list constrains its own template field's entity.
    pub fn contains_criteria_for(&self, id: NodeId, field: &FilterableField) -> bool {
        match self.node(id) {
            Err(_) => false,
            Ok(FilterNode::Comparing { field: own, .. })
            | Ok(FilterNode::Containment { field: own, .. }) => own == field,
            Ok(FilterNode::Invertible { child, .. }) => self.contains_criteria_for(*child, field),
            Ok(FilterNode::Joining { first, second, .. }) => {
                first.is_some_and(|c| self.contains_criteria_for(c, field))
                    || second.is_some_and(|c| self.contains_criteria_for(c, field))
            }
            Ok(FilterNode::List { .. }) => false,
        }
    }

    pub fn is_terminal(&self, id: NodeId) -> bool {
        match self.node(id) {
            Err(_) => false,
            Ok(FilterNode::Comparing { .. })
            | Ok(FilterNode::Containment { .. })
            | Ok(FilterNode::List { .. }) => true,
            Ok(FilterNode::Invertible { child, .. }) => self.is_terminal(*child),
            Ok(FilterNode::Joining { .. }) => false,
        }
    }

    /// The field this subtree filters. For a joining node both children must
    /// agree on the field.
    pub fn filtered_field(&self, id: NodeId) -> Result<&FilterableField, FilterError> {
        match self.node(id)? {
            FilterNode::Comparing { field, .. } | FilterNode::Containment { field, .. } => Ok(field),
            FilterNode::List { template, .. } => Ok(template),
            FilterNode::Invertible { child, .. } => self.filtered_field(*child),
            FilterNode::Joining { first, second, .. } => match (first, second) {
                (Some(first), Some(second)) => {
                    let first = self.filtered_field(*first)?;
                    let second = self.filtered_field(*second)?;
                    if first == second {
                        Ok(first)
                    } else {
                        Err(StructuralError::NoCommonField.into())
                    }
                }
                (Some(child), None) | (None, Some(child)) => self.filtered_field(*child),
                (None, None) => Err(StructuralError::NoCommonField.into()),
            },
        }
    }

    /// Replaces the filtered field throughout this subtree.
    pub fn replace_filtered_field(
        &mut self,
        id: NodeId,
        new_field: FilterableField,
    ) -> Result<(), FilterError> {
        match self.node_mut(id)? {
            FilterNode::Comparing { field, .. } | FilterNode::Containment { field, .. } => {
                *field = new_field;
                Ok(())
            }
            FilterNode::List { template, .. } => {
                *template = new_field;
                Ok(())
            }
            FilterNode::Invertible { child, .. } => {
                let child = *child;
                self.replace_filtered_field(child, new_field)
            }
            FilterNode::Joining { first, second, .. } => {
                let (first, second) = (*first, *second);
                if let (Some(first), Some(second)) = (first, second) {
                    if self.filtered_field(first)? != self.filtered_field(second)? {
                        return Err(StructuralError::NoCommonField.into());
                    }
                }
                if let Some(first) = first {
                    self.replace_filtered_field(first, new_field.clone())?;
                }
                if let Some(second) = second {
                    self.replace_filtered_field(second, new_field)?;
                }
                Ok(())
            }
        }
    }

    /// Sets the comparison/containment value. Returns false for node kinds
    /// that do not carry a single value.
    pub fn provide_value(&mut self, id: NodeId, value: FieldValue) -> bool {
        match self.node_mut(id) {
            Ok(FilterNode::Comparing { value: slot, .. })
            | Ok(FilterNode::Containment { value: slot, .. }) => {
                *slot = Some(value);
                true
            }
            Ok(FilterNode::Invertible { child, .. }) => {
                let child = *child;
                self.provide_value(child, value)
            }
            _ => false,
        }
    }

    /// Changes the comparison operation of a comparing filter. Returns
    /// `Ok(false)` for node kinds without a comparison; fails on a filter
    /// locked to equality.
    pub fn set_comparison(
        &mut self,
        id: NodeId,
        comparison: Comparison,
    ) -> Result<bool, StructuralError> {
        match self.node_mut(id)? {
            FilterNode::Comparing {
                equality_only: true,
                ..
            } => Err(StructuralError::UnsupportedComparisonChange),
            FilterNode::Comparing {
                comparison: slot, ..
            } => {
                *slot = comparison;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Returns false when the node is not a mutable invertible wrapper.
    pub fn set_invert(&mut self, id: NodeId, invert: bool) -> bool {
        match self.node_mut(id) {
            Ok(FilterNode::Invertible {
                invert: slot,
                mutable: true,
                ..
            }) => {
                *slot = invert;
                true
            }
            _ => false,
        }
    }

    pub fn toggle_invert(&mut self, id: NodeId) -> bool {
        match self.node_mut(id) {
            Ok(FilterNode::Invertible {
                invert,
                mutable: true,
                ..
            }) => {
                *invert = !*invert;
                true
            }
            _ => false,
        }
    }

    pub fn is_inverted(&self, id: NodeId) -> bool {
        matches!(self.node(id), Ok(FilterNode::Invertible { invert: true, .. }))
    }

    pub fn comparison(&self, id: NodeId) -> Option<Comparison> {
        match self.node(id) {
            Ok(FilterNode::Comparing { comparison, .. }) => Some(*comparison),
            _ => None,
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&FieldValue> {
        match self.node(id) {
            Ok(FilterNode::Comparing { value, .. }) | Ok(FilterNode::Containment { value, .. }) => {
                value.as_ref()
            }
            _ => None,
        }
    }

    /// Detaches the node from its parent and frees its subtree. A root node
    /// cannot be detached.
    pub fn detach(&mut self, id: NodeId) -> Result<(), StructuralError> {
        self.node(id)?;
        let parent = self.parent(id).ok_or(StructuralError::NoParent)?;
        self.remove_child(parent, id)
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructuralError> {
        enum Slot {
            First,
            Second,
            Element,
            Cascade,
            NotAChild,
        }

        let slot = match self.node(parent)? {
            FilterNode::Joining { first, second, .. } => {
                if *first == Some(child) {
                    Slot::First
                } else if *second == Some(child) {
                    Slot::Second
                } else {
                    // not actually our child: leave the tree untouched
                    Slot::NotAChild
                }
            }
            FilterNode::List { elements, .. } => {
                if elements.contains(&child) {
                    Slot::Element
                } else {
                    Slot::NotAChild
                }
            }
            // a leaf or single-child wrapper cannot lose its child without
            // vanishing itself
            _ => Slot::Cascade,
        };

        match slot {
            Slot::First => {
                if let Ok(FilterNode::Joining { first, .. }) = self.node_mut(parent) {
                    *first = None;
                }
                self.free_subtree(child);
            }
            Slot::Second => {
                if let Ok(FilterNode::Joining { second, .. }) = self.node_mut(parent) {
                    *second = None;
                }
                self.free_subtree(child);
            }
            Slot::Element => {
                if let Ok(FilterNode::List { elements, .. }) = self.node_mut(parent) {
                    elements.retain(|e| *e != child);
                }
                self.free_subtree(child);
            }
            Slot::Cascade => return self.detach(parent),
            Slot::NotAChild => {}
        }
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.nodes.get(id.0).and_then(|slot| slot.as_ref()) {
            None => return,
            Some(FilterNode::Comparing { .. }) | Some(FilterNode::Containment { .. }) => Vec::new(),
            Some(FilterNode::Invertible { child, .. }) => vec![*child],
            Some(FilterNode::Joining { first, second, .. }) => {
                first.iter().chain(second.iter()).copied().collect()
            }
            Some(FilterNode::List { elements, .. }) => elements.clone(),
        };
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.0] = None;
        self.parents[id.0] = None;
    }

    /// Renders the subtree at `id` for diagnostics.
    pub fn display(&self, id: NodeId) -> TreeDisplay<'_> {
        TreeDisplay { tree: self, id }
    }
}

pub struct TreeDisplay<'a> {
    tree: &'a FilterTree,
    id: NodeId,
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_node(self.tree, self.id, f)
    }
}

fn fmt_node(tree: &FilterTree, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let node = match tree.node(id) {
        Ok(node) => node,
        Err(_) => return write!(f, "<detached>"),
    };
    match node {
        FilterNode::Comparing {
            field,
            comparison,
            value,
            ..
        } => {
            let symbol = match comparison {
                Comparison::LessThan => "<",
                Comparison::Equal => "=",
                Comparison::GreaterThan => ">",
            };
            match value {
                Some(value) => write!(f, "{} {} {}", field, symbol, value),
                None => write!(f, "{} {} NULL", field, symbol),
            }
        }
        FilterNode::Containment { field, value } => match value {
            Some(value) => write!(f, "{} IN {}", value, field),
            None => write!(f, "?? IN {}", field),
        },
        FilterNode::Invertible { child, invert, .. } => {
            if *invert {
                write!(f, "NOT (")?;
                fmt_node(tree, *child, f)?;
                write!(f, ")")
            } else {
                fmt_node(tree, *child, f)
            }
        }
        FilterNode::Joining {
            first,
            second,
            connective,
        } => match (first, second) {
            (None, None) => write!(f, "EMPTY"),
            (Some(child), None) | (None, Some(child)) => fmt_node(tree, *child, f),
            (Some(first), Some(second)) => {
                write!(f, "(")?;
                fmt_node(tree, *first, f)?;
                let word = match connective {
                    Connective::And => "AND",
                    Connective::Or => "OR",
                };
                write!(f, ") {} (", word)?;
                fmt_node(tree, *second, f)?;
                write!(f, ")")
            }
        },
        FilterNode::List {
            template,
            quantifier,
            elements,
        } => {
            let word = match quantifier {
                Quantifier::AllMatch => "ALL",
                Quantifier::AnyMatches => "ANY",
            };
            write!(f, "{} OF (", word)?;
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_node(tree, *element, f)?;
            }
            write!(f, ") ON {}", template)
        }
    }
}
