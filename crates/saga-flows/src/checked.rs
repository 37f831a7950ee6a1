//! Checked `Decimal` arithmetic. The plain operators panic when a result
//! leaves the 96-bit range, which scenario input can easily reach.

use rust_decimal::Decimal;

use crate::Result;
use crate::error::FlowError;

pub(crate) fn add(lhs: Decimal, rhs: Decimal, what: &'static str) -> Result<Decimal> {
    lhs.checked_add(rhs).ok_or(FlowError::Overflow(what))
}

pub(crate) fn mul(lhs: Decimal, rhs: Decimal, what: &'static str) -> Result<Decimal> {
    lhs.checked_mul(rhs).ok_or(FlowError::Overflow(what))
}

/// Also fails on a zero divisor.
pub(crate) fn div(lhs: Decimal, rhs: Decimal, what: &'static str) -> Result<Decimal> {
    lhs.checked_div(rhs).ok_or(FlowError::Overflow(what))
}
