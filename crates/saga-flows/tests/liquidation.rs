//! End-to-end runs of the collateral liquidation saga.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saga_core::{
    DecisionLogReporter, InMemoryDecisionLog, InMemoryReviewQueue, RunOptions, SagaError,
    SagaStatus,
};
use saga_flows::FlowError;
use saga_flows::providers::{FaultPlan, InMemoryIssuer, InMemoryLedger};
use saga_flows::sagas::liquidation::{LiquidationContext, LiquidationData, liquidation_saga};
use saga_flows::traits::{IssuerService, LedgerService, PositionStatus};
use saga_flows::types::{LiquidationRequest, LockId, PositionId};

struct Market {
    faults: Arc<FaultPlan>,
    ledger: Arc<InMemoryLedger>,
    issuer: Arc<InMemoryIssuer>,
    position: PositionId,
    lock: LockId,
}

impl Market {
    /// Bob's 10 ETH backs `debt` FUSD at 2000 per ETH.
    fn with_debt(debt: Decimal) -> Self {
        let faults = Arc::new(FaultPlan::new());
        let ledger = Arc::new(InMemoryLedger::with_faults(Arc::clone(&faults)));
        let issuer = Arc::new(InMemoryIssuer::with_faults(Arc::clone(&faults)));

        for account in ["bob", "keeper", "treasury"] {
            ledger.open_account(account, true).expect("open account");
        }
        ledger.credit("bob", "ETH", dec!(10)).expect("fund ETH");
        ledger.credit("keeper", "FUSD", dec!(20000)).expect("fund FUSD");
        issuer
            .set_collateral_price("ETH", dec!(2000))
            .expect("price");

        let lock = ledger.lock_funds("bob", "ETH", dec!(10)).expect("lock");
        let position = issuer
            .seed_position("bob", "FUSD", "ETH", dec!(10), debt)
            .expect("seed position");

        Self {
            faults,
            ledger,
            issuer,
            position,
            lock,
        }
    }

    fn context(&self) -> LiquidationContext<InMemoryLedger, InMemoryIssuer> {
        LiquidationContext::new(Arc::clone(&self.ledger), Arc::clone(&self.issuer))
    }

    fn request(&self) -> LiquidationData {
        LiquidationData::new(LiquidationRequest {
            position: self.position.clone(),
            collateral_lock: self.lock.clone(),
            liquidator: "keeper".to_string(),
            treasury: "treasury".to_string(),
        })
    }
}

#[test]
fn liquidation_moves_collateral_and_retires_debt() -> anyhow::Result<()> {
    let market = Market::with_debt(dec!(15000));

    let output = liquidation_saga().execute(&market.context(), market.request())?;

    let assessment = output.assessment.expect("assessment");
    assert_eq!(assessment.collateral_ratio, dec!(1.3333));
    assert_eq!(assessment.penalty, dec!(1950));
    assert_eq!(assessment.amount_due, dec!(16950));
    assert!(output.settled);

    assert_eq!(market.ledger.balance("keeper", "FUSD")?.total, dec!(3050));
    assert_eq!(market.ledger.balance("keeper", "ETH")?.total, dec!(10));
    assert_eq!(market.ledger.balance("treasury", "FUSD")?.total, dec!(1950));
    assert_eq!(market.ledger.balance("bob", "ETH")?.total, dec!(0));

    let position = market.issuer.position(&market.position)?;
    assert_eq!(position.status, PositionStatus::Liquidated);
    assert_eq!(position.minted, dec!(0));
    Ok(())
}

#[test]
fn failed_settlement_returns_collateral_and_unfreezes() -> anyhow::Result<()> {
    let market = Market::with_debt(dec!(15000));
    market.faults.fail("settle_liquidation")?;

    let (result, instance) =
        liquidation_saga().execute_with_audit(&market.context(), market.request());

    let err = result.expect_err("settlement should fail");
    assert_eq!(err.failed_step(), "settle_debt");
    assert_eq!(instance.status(), SagaStatus::Compensated);
    assert_eq!(
        instance.compensated_steps(),
        vec![
            "pay_penalty",
            "seize_collateral",
            "collect_payment",
            "freeze_position",
        ]
    );

    let bob = market.ledger.balance("bob", "ETH")?;
    assert_eq!(bob.total, dec!(10));
    assert_eq!(bob.locked, dec!(10));
    assert_eq!(market.ledger.balance("keeper", "ETH")?.total, dec!(0));
    assert_eq!(market.ledger.balance("keeper", "FUSD")?.total, dec!(20000));
    assert_eq!(market.ledger.balance("treasury", "FUSD")?.total, dec!(0));

    let position = market.issuer.position(&market.position)?;
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.minted, dec!(15000));
    Ok(())
}

#[test]
fn healthy_position_is_left_alone() {
    let market = Market::with_debt(dec!(10000));

    let (result, instance) =
        liquidation_saga().execute_with_audit(&market.context(), market.request());

    assert!(matches!(
        result,
        Err(SagaError::StepFailed {
            source: FlowError::PositionHealthy { ratio, .. },
            ..
        }) if ratio == dec!(2)
    ));
    assert_eq!(instance.status(), SagaStatus::Compensated);
    assert!(instance.compensated_steps().is_empty());
    assert_eq!(
        market.issuer.position(&market.position).expect("position").status,
        PositionStatus::Open
    );
}

#[test]
fn short_liquidator_unfreezes_the_position() -> anyhow::Result<()> {
    let market = Market::with_debt(dec!(19000));

    let (result, instance) =
        liquidation_saga().execute_with_audit(&market.context(), market.request());

    assert!(matches!(
        result,
        Err(SagaError::StepFailed {
            source: FlowError::InsufficientFunds { .. },
            ..
        })
    ));
    assert_eq!(instance.compensated_steps(), vec!["freeze_position"]);
    assert_eq!(
        market.issuer.position(&market.position)?.status,
        PositionStatus::Open
    );
    Ok(())
}

#[test]
fn stuck_unfreeze_is_escalated_for_review() {
    let market = Market::with_debt(dec!(15000));
    market.faults.fail("settle_liquidation").expect("arm fault");
    market.faults.fail("unfreeze_position").expect("arm fault");
    let log = InMemoryDecisionLog::new();
    let reporter = DecisionLogReporter::new(&log);
    let review = InMemoryReviewQueue::new();

    let (result, instance) = liquidation_saga()
        .run(
            &market.context(),
            market.request(),
            RunOptions::new()
                .with_reporter(&reporter)
                .with_review_queue(&review),
        )
        .into_parts();

    assert!(matches!(result, Err(SagaError::CompensationFailed { .. })));
    assert_eq!(instance.status(), SagaStatus::Failed);
    assert_eq!(review.len(), 1);
    assert_eq!(review.items()[0].step, "freeze_position");
    assert_eq!(
        market.ledger.balance("keeper", "FUSD").expect("balance").total,
        dec!(20000)
    );
    assert_eq!(
        market.issuer.position(&market.position).expect("position").status,
        PositionStatus::Frozen
    );
    assert_eq!(log.records()[0].decision, "saga_failed");
}

#[test]
fn success_logs_liquidation_decision() {
    let market = Market::with_debt(dec!(15000));
    let log = InMemoryDecisionLog::new();
    let reporter = DecisionLogReporter::new(&log);

    let (result, _) = liquidation_saga()
        .run(
            &market.context(),
            market.request(),
            RunOptions::new().with_reporter(&reporter),
        )
        .into_parts();

    assert!(result.is_ok());
    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, "collateral_liquidated");
    assert_eq!(records[0].reasoning["assessment"]["penalty"], "1950");
}
