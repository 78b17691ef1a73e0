// patternloop-rules/src/traits.rs
// ============================================================================
// Module: Requirement Traits
// Description: Evaluation contracts connecting the universal requirement
//              tree to a domain-specific evaluation context.
// Purpose: Let curation rules and DNA invariants plug their own leaf
//          predicate types into the same Boolean/tri-state algebra.
// Dependencies: crate::tristate
// ============================================================================

//! ## Overview
//! A [`PredicateEval`] implementation is the single seam where domain
//! semantics enter the algebra: everything above it (And/Or/Not/
//! `RequireGroup`) is domain-agnostic. [`TriStatePredicateEval`] is the
//! same seam for evaluation that can report `Unknown` when the
//! evaluation context lacks the evidence a predicate needs.

use crate::tristate::TriState;

/// Evaluates a domain-specific leaf predicate against a boolean context.
pub trait PredicateEval {
    /// The domain-specific context a predicate is evaluated against
    /// (a feature map, a coaching-session snapshot, ...).
    type Context<'a>;

    /// Evaluates this predicate against `context`.
    fn eval(&self, context: &Self::Context<'_>) -> bool;
}

/// Evaluates a domain-specific leaf predicate with tri-state semantics.
pub trait TriStatePredicateEval {
    /// The domain-specific context a predicate is evaluated against.
    type Context<'a>;

    /// Evaluates this predicate against `context`, returning
    /// [`TriState::Unknown`] when the context lacks the evidence needed.
    fn eval_tristate(&self, context: &Self::Context<'_>) -> TriState;
}

/// Adapter lifting a boolean [`PredicateEval`] into tri-state evaluation.
#[derive(Debug, Clone, Copy)]
pub struct BoolAsTri<P>(pub P);

impl<P> BoolAsTri<P> {
    /// Wraps a boolean predicate for tri-state evaluation.
    pub const fn new(predicate: P) -> Self {
        Self(predicate)
    }
}

impl<P: PredicateEval> TriStatePredicateEval for BoolAsTri<P> {
    type Context<'a> = P::Context<'a>;

    fn eval_tristate(&self, context: &Self::Context<'_>) -> TriState {
        self.0.eval(context).into()
    }
}
