use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use crate::Result;
use crate::error::FlowError;

/// Operations the in-memory providers should fail, plus a journal of every
/// operation they were asked to perform.
///
/// Shared between providers so a single plan drives a whole scenario.
#[derive(Debug, Default)]
pub struct FaultPlan {
    failing: Mutex<HashSet<String>>,
    journal: Mutex<Vec<String>>,
}

impl FaultPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: Mutex::new(operations.into_iter().map(Into::into).collect()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the plan's state is poisoned.
    pub fn fail(&self, operation: impl Into<String>) -> Result<()> {
        self.failing
            .lock()
            .map_err(|_| FlowError::Poisoned("fault plan"))?
            .insert(operation.into());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the plan's state is poisoned.
    pub fn heal(&self, operation: &str) -> Result<()> {
        self.failing
            .lock()
            .map_err(|_| FlowError::Poisoned("fault plan"))?
            .remove(operation);
        Ok(())
    }

    /// Journals `operation` and fails it if the plan says so.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InjectedFault`] for a failing operation.
    pub fn check(&self, operation: &str) -> Result<()> {
        self.journal
            .lock()
            .map_err(|_| FlowError::Poisoned("fault plan"))?
            .push(operation.to_string());

        let failing = self
            .failing
            .lock()
            .map_err(|_| FlowError::Poisoned("fault plan"))?
            .contains(operation);

        if failing {
            debug!(operation, "injecting fault");
            return Err(FlowError::InjectedFault(operation.to_string()));
        }
        Ok(())
    }

    /// Operations attempted so far, oldest first.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }
}
