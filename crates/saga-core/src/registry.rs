use std::fmt;

use chrono::{DateTime, Utc};

/// Reverse action registered by a completed step.
pub type CompensationAction<'a, Ctx, Err> = Box<dyn FnOnce(&Ctx) -> Result<(), Err> + 'a>;

/// One reverse action on the compensation stack.
pub struct CompensationEntry<'a, Ctx, Err> {
    record: usize,
    step: String,
    description: String,
    registered_at: DateTime<Utc>,
    action: CompensationAction<'a, Ctx, Err>,
}

impl<'a, Ctx, Err> CompensationEntry<'a, Ctx, Err> {
    /// Index of the instance record this entry undoes.
    #[must_use]
    pub fn record(&self) -> usize {
        self.record
    }

    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Run the reverse action, consuming the entry.
    ///
    /// # Errors
    ///
    /// Returns whatever error the reverse action produced.
    pub fn run(self, ctx: &Ctx) -> Result<(), Err> {
        (self.action)(ctx)
    }
}

impl<Ctx, Err> fmt::Debug for CompensationEntry<'_, Ctx, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationEntry")
            .field("record", &self.record)
            .field("step", &self.step)
            .field("description", &self.description)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

/// LIFO stack of reverse actions for a single saga run.
///
/// A registry is created when a run starts and dropped when it ends; it is
/// never shared between runs. Actions are plain `FnOnce` closures without a
/// `Send` bound, so the registry stays on the thread that owns the run.
pub struct CompensationRegistry<'a, Ctx, Err> {
    entries: Vec<CompensationEntry<'a, Ctx, Err>>,
}

impl<'a, Ctx, Err> CompensationRegistry<'a, Ctx, Err> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Push a reverse action for `step`, recorded at index `record` of the
    /// instance log, onto the stack.
    pub fn register<F>(
        &mut self,
        record: usize,
        step: impl Into<String>,
        description: impl Into<String>,
        action: F,
    ) where
        F: FnOnce(&Ctx) -> Result<(), Err> + 'a,
    {
        self.entries.push(CompensationEntry {
            record,
            step: step.into(),
            description: description.into(),
            registered_at: Utc::now(),
            action: Box::new(action),
        });
    }

    /// Pop the most recently registered entry.
    pub fn pop(&mut self) -> Option<CompensationEntry<'a, Ctx, Err>> {
        self.entries.pop()
    }

    /// Remove every entry, most recent first.
    pub fn drain(&mut self) -> Vec<CompensationEntry<'a, Ctx, Err>> {
        self.entries.drain(..).rev().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step names in registration order.
    #[must_use]
    pub fn steps(&self) -> Vec<&str> {
        self.entries.iter().map(CompensationEntry::step).collect()
    }
}

impl<Ctx, Err> Default for CompensationRegistry<'_, Ctx, Err> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx, Err> fmt::Debug for CompensationRegistry<'_, Ctx, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    type Log = RefCell<Vec<String>>;

    fn push(log: &Log, line: &str) -> Result<(), String> {
        log.borrow_mut().push(line.to_string());
        Ok(())
    }

    #[test]
    fn new_registry_is_empty() {
        let registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();

        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn drain_returns_entries_in_lifo_order_and_empties_stack() {
        let mut registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();
        registry.register(0, "lock_funds", "unlock funds", |log: &Log| push(log, "unlock"));
        registry.register(1, "create_order", "cancel order", |log: &Log| push(log, "cancel"));
        registry.register(2, "execute_order", "reverse execution", |log: &Log| {
            push(log, "reverse")
        });

        let entries = registry.drain();

        assert!(registry.is_empty());
        let names: Vec<&str> = entries.iter().map(CompensationEntry::step).collect();
        assert_eq!(names, vec!["execute_order", "create_order", "lock_funds"]);
    }

    #[test]
    fn pop_runs_most_recent_action_first() {
        let log = Log::default();
        let mut registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();
        registry.register(0, "a", "undo a", |log: &Log| push(log, "undo a"));
        registry.register(1, "b", "undo b", |log: &Log| push(log, "undo b"));

        while let Some(entry) = registry.pop() {
            entry.run(&log).expect("compensation succeeds");
        }

        assert_eq!(*log.borrow(), vec!["undo b", "undo a"]);
    }

    #[test]
    fn entries_keep_step_metadata() {
        let mut registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();
        registry.register(0, "lock_collateral", "release collateral", |_: &Log| Ok(()));

        let entry = registry.pop().expect("one entry");

        assert_eq!(entry.record(), 0);
        assert_eq!(entry.step(), "lock_collateral");
        assert_eq!(entry.description(), "release collateral");
        assert!(entry.registered_at() <= Utc::now());
    }

    #[test]
    fn steps_lists_registration_order() {
        let mut registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();
        registry.register(0, "first", "undo", |_: &Log| Ok(()));
        registry.register(1, "second", "undo", |_: &Log| Ok(()));

        assert_eq!(registry.steps(), vec!["first", "second"]);
    }

    #[test]
    fn failing_action_returns_its_error() {
        let mut registry: CompensationRegistry<'_, Log, String> = CompensationRegistry::new();
        registry.register(0, "burn", "burn minted coins", |_: &Log| {
            Err("custodian unavailable".to_string())
        });

        let entry = registry.pop().expect("one entry");

        assert_eq!(entry.run(&Log::default()), Err("custodian unavailable".to_string()));
    }
}
