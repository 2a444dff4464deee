//! Priority-ordered rule evaluation.
//!
//! A [`RuleEngine`] holds an ordered set of condition/consequence pairs and
//! evaluates them against a mutable [`EventContext`]. Rules can only narrow
//! acceptance: the context starts accepted, and the first consequence that
//! requests [`Flow::Stop`] ends the scan with whatever result is current.
//! Broken rules never abort a scan — failures are collected on the returned
//! [`Evaluation`] and the scan continues.

pub mod context;
pub mod engine;
pub mod error;
pub mod rule;

pub use {
    context::EventContext,
    engine::{Evaluation, RuleEngine, RuleFailure},
    error::{Error, Result},
    rule::{Flow, Rule},
};
