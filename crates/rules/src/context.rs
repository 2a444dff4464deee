/// Mutable per-evaluation bag passed through a rule scan.
///
/// Holds the caller's payload (raw event, derived fields, whatever the rule
/// set needs) and the acceptance flag consequences mutate. One context is
/// created per evaluated event and discarded afterwards.
#[derive(Debug)]
pub struct EventContext<T> {
    pub data: T,
    /// Acceptance flag. Starts `true`; rules can only argue it down.
    pub result: bool,
}

impl<T> EventContext<T> {
    pub fn new(data: T) -> Self {
        Self { data, result: true }
    }

    /// Consume the context, handing the payload back to the caller.
    pub fn into_data(self) -> T {
        self.data
    }
}
