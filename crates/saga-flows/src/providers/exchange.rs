use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::debug;

use super::FaultPlan;
use crate::Result;
use crate::checked;
use crate::error::FlowError;
use crate::traits::{ExchangeService, Execution, NewOrder, OrderSnapshot, OrderStatus};
use crate::types::{ExecutionId, Market, OrderId, RiskParameters, Side};

/// 0.2% of the notional.
pub const DEFAULT_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 3);

#[derive(Debug)]
struct OrderEntry {
    order: NewOrder,
    status: OrderStatus,
    execution: Option<ExecutionId>,
    risk: Option<RiskParameters>,
}

#[derive(Debug, Default)]
struct ExchangeState {
    prices: IndexMap<String, Decimal>,
    orders: IndexMap<OrderId, OrderEntry>,
    executions: IndexMap<ExecutionId, Execution>,
    next_order: u64,
    next_execution: u64,
}

impl ExchangeState {
    fn price(&self, symbol: &str) -> Result<Decimal> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| FlowError::UnknownMarket(symbol.to_string()))
    }

    fn order_mut(&mut self, order: &OrderId) -> Result<&mut OrderEntry> {
        self.orders
            .get_mut(order)
            .ok_or_else(|| FlowError::UnknownOrder(order.clone()))
    }
}

/// Exchange that fills every order immediately at the configured price.
#[derive(Debug)]
pub struct InMemoryExchange {
    state: Mutex<ExchangeState>,
    fee_rate: Decimal,
    faults: Arc<FaultPlan>,
}

impl Default for InMemoryExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(Arc::default())
    }

    #[must_use]
    pub fn with_faults(faults: Arc<FaultPlan>) -> Self {
        Self {
            state: Mutex::default(),
            fee_rate: DEFAULT_FEE_RATE,
            faults,
        }
    }

    #[must_use]
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Lists or reprices a market.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is malformed or the price is not
    /// positive.
    pub fn set_price(&self, symbol: &str, price: Decimal) -> Result<()> {
        let market: Market = symbol.parse()?;
        if price <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(price));
        }
        self.state()?.prices.insert(market.symbol(), price);
        Ok(())
    }

    fn state(&self) -> Result<MutexGuard<'_, ExchangeState>> {
        self.state.lock().map_err(|_| FlowError::Poisoned("exchange"))
    }
}

fn order_state_error(order: &OrderId, status: OrderStatus, action: &'static str) -> FlowError {
    FlowError::OrderState {
        order: order.clone(),
        state: status.as_str(),
        action,
    }
}

fn check_bracket(side: Side, price: Decimal, risk: &RiskParameters) -> Result<()> {
    let (below, above, below_name, above_name) = match side {
        Side::Buy => (risk.stop_loss, risk.take_profit, "stop loss", "take profit"),
        Side::Sell => (risk.take_profit, risk.stop_loss, "take profit", "stop loss"),
    };

    if below >= price {
        return Err(FlowError::InvalidRiskParameters(format!(
            "{below_name} {below} must be below the fill price {price} for a {side} order"
        )));
    }
    if above <= price {
        return Err(FlowError::InvalidRiskParameters(format!(
            "{above_name} {above} must be above the fill price {price} for a {side} order"
        )));
    }
    Ok(())
}

impl ExchangeService for InMemoryExchange {
    fn price(&self, symbol: &str) -> Result<Decimal> {
        self.state()?.price(symbol)
    }

    fn create_order(&self, order: NewOrder) -> Result<OrderId> {
        self.faults.check("create_order")?;
        if order.notional <= Decimal::ZERO {
            return Err(FlowError::InvalidAmount(order.notional));
        }
        let mut state = self.state()?;
        state.price(&order.symbol)?;

        state.next_order += 1;
        let id = OrderId::sequential(state.next_order);
        debug!(order = %id, symbol = %order.symbol, side = %order.side, notional = %order.notional, "order created");
        state.orders.insert(
            id.clone(),
            OrderEntry {
                order,
                status: OrderStatus::Pending,
                execution: None,
                risk: None,
            },
        );
        Ok(id)
    }

    fn cancel_order(&self, order: &OrderId) -> Result<()> {
        self.faults.check("cancel_order")?;
        let mut state = self.state()?;
        let entry = state.order_mut(order)?;

        match entry.status {
            OrderStatus::Pending => {
                entry.status = OrderStatus::Cancelled;
                debug!(%order, "order cancelled");
                Ok(())
            }
            OrderStatus::Cancelled | OrderStatus::Reversed => Ok(()),
            OrderStatus::Executed => Err(order_state_error(order, entry.status, "cancel")),
        }
    }

    fn execute_order(&self, order: &OrderId) -> Result<Execution> {
        self.faults.check("execute_order")?;
        let mut state = self.state()?;

        let (symbol, side, notional) = {
            let entry = state.order_mut(order)?;
            if entry.status != OrderStatus::Pending {
                return Err(order_state_error(order, entry.status, "execute"));
            }
            (entry.order.symbol.clone(), entry.order.side, entry.order.notional)
        };
        let price = state.price(&symbol)?;
        let quantity = checked::div(notional, price, "fill quantity")?.round_dp(8);
        let fee = checked::mul(notional, self.fee_rate, "trading fee")?.round_dp(8);

        state.next_execution += 1;
        let execution = Execution {
            id: ExecutionId::sequential(state.next_execution),
            order: order.clone(),
            symbol,
            side,
            price,
            quantity,
            notional,
            fee,
        };

        let entry = state.order_mut(order)?;
        entry.status = OrderStatus::Executed;
        entry.execution = Some(execution.id.clone());
        state
            .executions
            .insert(execution.id.clone(), execution.clone());

        debug!(%order, execution = %execution.id, %price, quantity = %execution.quantity, "order executed");
        Ok(execution)
    }

    fn reverse_execution(&self, execution: &ExecutionId) -> Result<()> {
        self.faults.check("reverse_execution")?;
        let mut state = self.state()?;
        let order = state
            .executions
            .get(execution)
            .map(|e| e.order.clone())
            .ok_or_else(|| FlowError::UnknownExecution(execution.clone()))?;

        let entry = state.order_mut(&order)?;
        match entry.status {
            OrderStatus::Executed => {
                entry.status = OrderStatus::Reversed;
                entry.risk = None;
                debug!(%execution, %order, "execution reversed");
                Ok(())
            }
            OrderStatus::Reversed => Ok(()),
            status => Err(order_state_error(&order, status, "reverse")),
        }
    }

    fn attach_risk_orders(&self, execution: &ExecutionId, risk: &RiskParameters) -> Result<()> {
        self.faults.check("attach_risk_orders")?;
        let mut state = self.state()?;
        let (order, side, price) = state
            .executions
            .get(execution)
            .map(|e| (e.order.clone(), e.side, e.price))
            .ok_or_else(|| FlowError::UnknownExecution(execution.clone()))?;

        check_bracket(side, price, risk)?;

        let entry = state.order_mut(&order)?;
        if entry.status != OrderStatus::Executed {
            return Err(order_state_error(&order, entry.status, "attach risk orders"));
        }
        entry.risk = Some(risk.clone());
        debug!(%execution, stop_loss = %risk.stop_loss, take_profit = %risk.take_profit, "risk orders attached");
        Ok(())
    }

    fn order(&self, order: &OrderId) -> Result<OrderSnapshot> {
        let state = self.state()?;
        let entry = state
            .orders
            .get(order)
            .ok_or_else(|| FlowError::UnknownOrder(order.clone()))?;
        Ok(OrderSnapshot {
            id: order.clone(),
            order: entry.order.clone(),
            status: entry.status,
            execution: entry.execution.clone(),
            risk: entry.risk.clone(),
        })
    }
}
