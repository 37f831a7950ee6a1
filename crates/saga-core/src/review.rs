use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::instance::SagaId;

/// A failed compensation that needs a human to reconcile it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub saga_id: SagaId,
    pub saga: String,
    pub step: String,
    pub description: String,
    pub error: String,
    pub raised_at: DateTime<Utc>,
}

/// Sink for compensations that could not be completed automatically.
pub trait ReviewQueue: Send + Sync {
    /// Enqueue an item for manual review.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot accept the item.
    fn enqueue(&self, item: ReviewItem) -> Result<(), ReportError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReviewQueue {
    items: Mutex<Vec<ReviewItem>>,
}

impl InMemoryReviewQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> Vec<ReviewItem> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic elsewhere must not hide items that were already escalated.
    fn lock(&self) -> MutexGuard<'_, Vec<ReviewItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReviewQueue for InMemoryReviewQueue {
    fn enqueue(&self, item: ReviewItem) -> Result<(), ReportError> {
        self.lock().push(item);
        Ok(())
    }
}
