use crate::context::EventContext;

/// What a consequence tells the engine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep scanning the remaining rules.
    #[default]
    Continue,
    /// End the scan immediately; the current result is final.
    Stop,
}

type Condition<T> = dyn Fn(&EventContext<T>) -> crate::Result<bool> + Send + Sync;
type Consequence<T> = dyn Fn(&mut EventContext<T>) -> crate::Result<Flow> + Send + Sync;

/// A prioritized condition/consequence pair.
///
/// The condition is a predicate over the context; the consequence runs only
/// when the condition holds, may mutate the context's `result`, and decides
/// whether the scan continues. Both take the context explicitly — rules must
/// not capture shared mutable state.
pub struct Rule<T> {
    priority: i32,
    name: String,
    condition: Box<Condition<T>>,
    consequence: Box<Consequence<T>>,
}

impl<T> Rule<T> {
    pub fn new<C, Q>(priority: i32, name: impl Into<String>, condition: C, consequence: Q) -> Self
    where
        C: Fn(&EventContext<T>) -> crate::Result<bool> + Send + Sync + 'static,
        Q: Fn(&mut EventContext<T>) -> crate::Result<Flow> + Send + Sync + 'static,
    {
        Self {
            priority,
            name: name.into(),
            condition: Box::new(condition),
            consequence: Box::new(consequence),
        }
    }

    /// The common reject-and-stop shape: when `predicate` holds, set
    /// `result = false` and end the scan.
    pub fn reject_when<P>(priority: i32, name: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&EventContext<T>) -> bool + Send + Sync + 'static,
    {
        Self::new(
            priority,
            name,
            move |ctx| Ok(predicate(ctx)),
            |ctx| {
                ctx.result = false;
                Ok(Flow::Stop)
            },
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn matches(&self, ctx: &EventContext<T>) -> crate::Result<bool> {
        (self.condition)(ctx)
    }

    pub(crate) fn apply(&self, ctx: &mut EventContext<T>) -> crate::Result<Flow> {
        (self.consequence)(ctx)
    }
}

impl<T> std::fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("priority", &self.priority)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
