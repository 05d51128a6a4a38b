//! Hierarchical state machines (statig) for interactive affordances.

pub mod link_sm;
