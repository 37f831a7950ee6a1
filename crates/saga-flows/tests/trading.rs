//! End-to-end runs of the trading execution saga against in-memory providers.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use saga_core::{
    DecisionLogReporter, InMemoryDecisionLog, InMemoryReviewQueue, RunOptions, SagaError,
    SagaStatus, StepStatus,
};
use saga_flows::FlowError;
use saga_flows::providers::{FaultPlan, InMemoryExchange, InMemoryLedger};
use saga_flows::sagas::trading::{TradeData, TradingContext, trading_saga};
use saga_flows::traits::{Balance, ExchangeService, LedgerService, LockStatus, OrderStatus};
use saga_flows::types::{RiskParameters, Side, TradeRequest};

struct Market {
    faults: Arc<FaultPlan>,
    ledger: Arc<InMemoryLedger>,
    exchange: Arc<InMemoryExchange>,
}

impl Market {
    fn new() -> Self {
        let faults = Arc::new(FaultPlan::new());
        let ledger = Arc::new(InMemoryLedger::with_faults(Arc::clone(&faults)));
        let exchange = Arc::new(InMemoryExchange::with_faults(Arc::clone(&faults)));

        ledger.open_account("alice", true).expect("open alice");
        ledger
            .credit("alice", "USD", dec!(100000))
            .expect("fund USD");
        ledger.credit("alice", "BTC", dec!(2)).expect("fund BTC");
        ledger.open_account("bob", false).expect("open bob");
        exchange.set_price("BTC/USD", dec!(50000)).expect("price");

        Self {
            faults,
            ledger,
            exchange,
        }
    }

    fn context(&self) -> TradingContext<InMemoryLedger, InMemoryExchange> {
        TradingContext::new(Arc::clone(&self.ledger), Arc::clone(&self.exchange))
    }

    fn balance(&self, asset: &str) -> Balance {
        self.ledger.balance("alice", asset).expect("balance")
    }
}

fn buy(amount: Decimal) -> TradeData {
    TradeData::new(TradeRequest {
        account: "alice".to_string(),
        symbol: "BTC/USD".to_string(),
        side: Side::Buy,
        amount,
        risk: RiskParameters {
            stop_loss: dec!(45000),
            take_profit: dec!(60000),
        },
    })
}

fn sell(amount: Decimal) -> TradeData {
    let mut data = buy(amount);
    data.request.side = Side::Sell;
    data.request.risk = RiskParameters {
        stop_loss: dec!(55000),
        take_profit: dec!(40000),
    };
    data
}

#[test]
fn buy_settles_into_portfolio() -> anyhow::Result<()> {
    let market = Market::new();

    let output = trading_saga().execute(&market.context(), buy(dec!(10000)))?;

    assert!(output.risk_orders_attached);
    assert_eq!(
        market.balance("USD"),
        Balance {
            total: dec!(90000),
            locked: dec!(0)
        }
    );
    // 10000 USD less the 0.2% fee, at 50000 USD per BTC.
    assert_eq!(market.balance("BTC").total, dec!(2.1996));

    let order = output.order.expect("order id");
    assert_eq!(market.exchange.order(&order)?.status, OrderStatus::Executed);
    Ok(())
}

#[test]
fn sell_locks_base_asset_and_credits_quote() -> anyhow::Result<()> {
    let market = Market::new();

    let output = trading_saga().execute(&market.context(), sell(dec!(25000)))?;

    let lock = output.lock.expect("lock");
    assert_eq!(lock.asset, "BTC");
    assert_eq!(lock.amount, dec!(0.5));
    assert_eq!(market.balance("BTC").total, dec!(1.5));
    assert_eq!(market.balance("USD").total, dec!(124950));
    Ok(())
}

#[test]
fn failed_execution_cancels_order_then_unlocks_funds() {
    let market = Market::new();
    market.faults.fail("execute_order").expect("arm fault");
    let log = InMemoryDecisionLog::new();
    let reporter = DecisionLogReporter::new(&log);

    let run = trading_saga().run(
        &market.context(),
        buy(dec!(10000)),
        RunOptions::new().with_reporter(&reporter),
    );

    let err = run.result.expect_err("execution should fail");
    assert_eq!(err.failed_step(), "execute_order");
    assert!(matches!(err.step_error(), FlowError::InjectedFault(op) if op == "execute_order"));

    assert_eq!(
        market.faults.journal(),
        vec![
            "credit",
            "credit",
            "lock_funds",
            "create_order",
            "execute_order",
            "cancel_order",
            "unlock_funds",
        ]
    );
    assert_eq!(
        market.balance("USD"),
        Balance {
            total: dec!(100000),
            locked: dec!(0)
        }
    );
    assert_eq!(run.instance.status(), SagaStatus::Compensated);

    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, "saga_failed");
    assert!(
        records[0].reasoning["error"]
            .as_str()
            .expect("error text")
            .contains("injected fault in 'execute_order'")
    );
}

#[test]
fn invalid_risk_parameters_unwind_the_whole_trade() -> anyhow::Result<()> {
    let market = Market::new();
    let mut trade = buy(dec!(10000));
    trade.request.risk.take_profit = dec!(49000);

    let (result, instance) = trading_saga().execute_with_audit(&market.context(), trade);

    let err = result.expect_err("risk check should fail");
    assert!(matches!(
        err.step_error(),
        FlowError::InvalidRiskParameters(_)
    ));
    assert_eq!(
        instance.compensated_steps(),
        vec![
            "update_portfolio",
            "execute_order",
            "create_order",
            "lock_funds"
        ]
    );
    assert_eq!(market.balance("USD").total, dec!(100000));
    assert_eq!(market.balance("USD").locked, dec!(0));
    assert_eq!(market.balance("BTC").total, dec!(2));

    let order_id = instance
        .records()
        .iter()
        .find(|r| r.name == "create_order")
        .and_then(|r| r.result.as_ref())
        .and_then(|v| v["order"].as_str())
        .map(str::to_string)
        .expect("order id in step result");
    let order = market
        .exchange
        .order(&saga_flows::types::OrderId::new(order_id))?;
    assert_eq!(order.status, OrderStatus::Reversed);
    Ok(())
}

#[test]
fn unverified_account_fails_without_compensation() {
    let market = Market::new();
    let mut trade = buy(dec!(100));
    trade.request.account = "bob".to_string();

    let (result, instance) = trading_saga().execute_with_audit(&market.context(), trade);

    assert!(matches!(
        result,
        Err(SagaError::StepFailed {
            source: FlowError::AccountNotVerified(_),
            ..
        })
    ));
    assert!(instance.compensated_steps().is_empty());
    assert_eq!(instance.status(), SagaStatus::Compensated);
    assert!(market.faults.journal().iter().all(|op| op == "credit"));
}

#[test]
fn insufficient_funds_stop_before_any_order() {
    let market = Market::new();

    let (result, instance) =
        trading_saga().execute_with_audit(&market.context(), buy(dec!(100001)));

    assert!(matches!(
        result,
        Err(SagaError::StepFailed {
            source: FlowError::InsufficientFunds { .. },
            ..
        })
    ));
    assert_eq!(instance.failed_step(), Some("lock_funds"));
    assert!(!market.faults.journal().contains(&"create_order".to_string()));
}

#[test]
fn failed_unlock_is_escalated_for_review() {
    let market = Market::new();
    market.faults.fail("create_order").expect("arm fault");
    market.faults.fail("unlock_funds").expect("arm fault");
    let review = InMemoryReviewQueue::new();

    let run = trading_saga().run(
        &market.context(),
        buy(dec!(500)),
        RunOptions::new().with_review_queue(&review),
    );

    assert!(matches!(
        run.result,
        Err(SagaError::CompensationFailed { .. })
    ));
    assert_eq!(run.instance.status(), SagaStatus::Failed);
    assert_eq!(run.instance.failed_compensations(), vec!["lock_funds"]);

    let items = review.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].step, "lock_funds");
    assert_eq!(items[0].description, "release the funds locked for the trade");

    // The funds stay held until someone releases them by hand.
    assert_eq!(market.balance("USD").locked, dec!(500));
    let lock = run
        .instance
        .records()
        .iter()
        .find(|r| r.name == "lock_funds")
        .map(|r| r.status);
    assert_eq!(lock, Some(StepStatus::CompensationFailed));
}

#[test]
fn compensated_lock_ends_released() -> anyhow::Result<()> {
    let market = Market::new();
    market.faults.fail("create_order")?;

    let (_, instance) = trading_saga().execute_with_audit(&market.context(), buy(dec!(10)));

    let lock_id = instance.records()[1].result.as_ref().expect("lock result")["lock"]["id"]
        .as_str()
        .map(saga_flows::types::LockId::new)
        .expect("lock id");
    assert_eq!(market.ledger.lock_status(&lock_id)?, LockStatus::Released);
    Ok(())
}

#[test]
fn success_decision_describes_the_trade() {
    let market = Market::new();
    let log = InMemoryDecisionLog::new();
    let reporter = DecisionLogReporter::new(&log);

    let run = trading_saga().run(
        &market.context(),
        buy(dec!(10000)),
        RunOptions::new().with_reporter(&reporter),
    );

    assert!(run.result.is_ok());
    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, "trade_executed");
    assert_eq!(records[0].reasoning["symbol"], "BTC/USD");
    assert_eq!(records[0].reasoning["side"], "buy");
    assert_eq!(records[0].reasoning["settlement"]["asset"], "BTC");
    assert!((records[0].confidence - 1.0).abs() < f64::EPSILON);
}
