mod json;
mod plain;

pub(crate) use json::json;
pub(crate) use plain::plain;
use saga_core::{DecisionRecord, ReviewItem};
use saga_flows::ScenarioOutcome;

/// Everything a finished `saga run` prints.
pub(crate) struct RunReport<'a> {
    pub outcome: &'a ScenarioOutcome,
    pub decisions: Vec<DecisionRecord>,
    pub review_items: Vec<ReviewItem>,
}
