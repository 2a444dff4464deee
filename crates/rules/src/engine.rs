use tracing::{debug, warn};

use crate::{
    context::EventContext,
    error::Error,
    rule::{Flow, Rule},
};

/// Outcome of one rule scan.
///
/// `result` is the context's final acceptance flag. `failures` carries every
/// rule whose condition or consequence errored during the scan — those rules
/// are skipped, not fatal, and tests can assert on them directly instead of
/// scraping logs.
#[derive(Debug)]
pub struct Evaluation {
    pub result: bool,
    pub failures: Vec<RuleFailure>,
}

/// One suppressed rule failure.
#[derive(Debug)]
pub struct RuleFailure {
    pub rule: String,
    pub error: Error,
}

/// Priority-ordered rule scanner.
///
/// Built once per extension from its declared rule list and never shared.
/// Rules are sorted by ascending priority at construction; the sort is
/// stable, so rules with equal priority keep their declaration order.
pub struct RuleEngine<T> {
    rules: Vec<Rule<T>>,
}

impl<T> RuleEngine<T> {
    #[must_use]
    pub fn new(mut rules: Vec<Rule<T>>) -> Self {
        rules.sort_by_key(Rule::priority);
        Self { rules }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Scan the rules against `ctx`.
    ///
    /// For each rule whose condition holds, the consequence runs; the first
    /// consequence returning [`Flow::Stop`] ends the scan with the current
    /// result. With no matching rule the default acceptance stands — a rule
    /// set can only narrow acceptance, never widen it.
    ///
    /// This never fails: a rule that errors is recorded on the returned
    /// [`Evaluation`] and the scan moves on.
    pub fn evaluate(&self, ctx: &mut EventContext<T>) -> Evaluation {
        let mut failures = Vec::new();

        for rule in &self.rules {
            let matched = match rule.matches(ctx) {
                Ok(matched) => matched,
                Err(error) => {
                    warn!(rule = rule.name(), %error, "rule condition failed");
                    failures.push(RuleFailure {
                        rule: rule.name().to_string(),
                        error,
                    });
                    continue;
                },
            };
            if !matched {
                continue;
            }

            match rule.apply(ctx) {
                Ok(Flow::Stop) => {
                    debug!(rule = rule.name(), result = ctx.result, "rule stopped scan");
                    break;
                },
                Ok(Flow::Continue) => {},
                Err(error) => {
                    warn!(rule = rule.name(), %error, "rule consequence failed");
                    failures.push(RuleFailure {
                        rule: rule.name().to_string(),
                        error,
                    });
                },
            }
        }

        Evaluation {
            result: ctx.result,
            failures,
        }
    }
}

impl<T> std::fmt::Debug for RuleEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rules.len())
            .finish()
    }
}
