//! Integration tests for the saga instance log.

use saga_core::{SagaBuilder, SagaStatus, SagaStep, StepStatus};
use serde::Serialize;
use serde_json::json;

struct NoContext;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct TestError(String);

#[derive(Debug, Clone, Serialize)]
struct Quote {
    symbol: String,
    price: u64,
}

struct FetchQuote;

impl SagaStep for FetchQuote {
    type Input = String;
    type Output = Quote;
    type Context = NoContext;
    type Error = TestError;

    fn name(&self) -> &'static str {
        "fetch_quote"
    }

    fn execute(&self, _ctx: &NoContext, symbol: String) -> Result<Quote, TestError> {
        Ok(Quote { symbol, price: 100 })
    }

    fn has_compensation(&self) -> bool {
        false
    }
}

struct ReserveQuote;

impl SagaStep for ReserveQuote {
    type Input = Quote;
    type Output = Quote;
    type Context = NoContext;
    type Error = TestError;

    fn name(&self) -> &'static str {
        "reserve_quote"
    }

    fn execute(&self, _ctx: &NoContext, quote: Quote) -> Result<Quote, TestError> {
        Ok(quote)
    }

    fn compensation_description(&self) -> String {
        "release reserved quote".to_string()
    }
}

struct RejectQuote;

impl SagaStep for RejectQuote {
    type Input = Quote;
    type Output = Quote;
    type Context = NoContext;
    type Error = TestError;

    fn name(&self) -> &'static str {
        "reject_quote"
    }

    fn execute(&self, _ctx: &NoContext, quote: Quote) -> Result<Quote, TestError> {
        Err(TestError(format!("{} price stale", quote.symbol)))
    }
}

#[test]
fn successful_run_records_every_step_with_results() -> anyhow::Result<()> {
    let saga = SagaBuilder::new("quote")
        .first_step(FetchQuote)
        .then(ReserveQuote)
        .build();

    let (result, instance) = saga.execute_with_audit(&NoContext, "BTC/USD".to_string());

    assert_eq!(result?.price, 100);
    assert_eq!(instance.saga(), "quote");
    assert_eq!(instance.status(), SagaStatus::Completed);
    assert!(instance.is_terminal());

    let records = instance.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "fetch_quote");
    assert_eq!(records[0].status, StepStatus::Completed);
    assert_eq!(
        records[0].result,
        Some(json!({ "symbol": "BTC/USD", "price": 100 }))
    );
    assert!(records[0].compensation_description.is_none());
    assert_eq!(
        records[1].compensation_description.as_deref(),
        Some("release reserved quote")
    );
    Ok(())
}

#[test]
fn failed_run_records_error_on_failing_step() {
    let saga = SagaBuilder::new("quote")
        .first_step(FetchQuote)
        .then(ReserveQuote)
        .then(RejectQuote)
        .build();

    let (_, instance) = saga.execute_with_audit(&NoContext, "ETH/USD".to_string());

    let records = instance.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].status, StepStatus::Completed);
    assert_eq!(records[1].status, StepStatus::Compensated);
    assert!(records[1].compensated_at.is_some());
    assert_eq!(records[2].status, StepStatus::Failed);
    assert_eq!(records[2].error.as_deref(), Some("ETH/USD price stale"));
    assert!(records[2].result.is_none());
    assert_eq!(instance.error(), Some("ETH/USD price stale"));
    assert_eq!(instance.failed_step(), Some("reject_quote"));
    assert_eq!(instance.status(), SagaStatus::Compensated);
}

#[test]
fn timestamps_are_ordered() {
    let saga = SagaBuilder::new("quote").first_step(FetchQuote).build();

    let (_, instance) = saga.execute_with_audit(&NoContext, "SOL/USD".to_string());

    let record = &instance.records()[0];
    let completed_at = record.completed_at.expect("should have completed_at");
    assert!(completed_at >= record.started_at);
    assert!(record.started_at >= instance.started_at());
    assert!(instance.finished_at().expect("finished") >= completed_at);
}

#[test]
fn summary_lists_steps_with_indicators() {
    let saga = SagaBuilder::new("quote")
        .first_step(FetchQuote)
        .then(ReserveQuote)
        .then(RejectQuote)
        .build();

    let (_, instance) = saga.execute_with_audit(&NoContext, "BTC/USD".to_string());
    let summary = instance.summary();

    assert!(summary.contains("quote"));
    assert!(summary.contains("[compensated]"));
    assert!(summary.contains("✓ fetch_quote"));
    assert!(summary.contains("↩ reserve_quote"));
    assert!(summary.contains("✗ reject_quote"));
}

#[test]
fn instance_round_trips_through_json() -> anyhow::Result<()> {
    let saga = SagaBuilder::new("quote")
        .first_step(FetchQuote)
        .then(RejectQuote)
        .build();

    let (_, instance) = saga.execute_with_audit(&NoContext, "BTC/USD".to_string());

    let encoded = serde_json::to_string(&instance)?;
    let decoded: saga_core::SagaInstance = serde_json::from_str(&encoded)?;

    assert_eq!(decoded.id(), instance.id());
    assert_eq!(decoded.status(), instance.status());
    assert_eq!(decoded.records().len(), 2);
    assert_eq!(decoded.failed_step(), Some("reject_quote"));
    Ok(())
}
