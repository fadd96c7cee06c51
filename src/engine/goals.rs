//! Savings goals and debt payoff arithmetic.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use super::allocation::{ensure_positive, round_cents, HUNDRED, MAX_AMOUNT, MAX_BALANCE};
use crate::database::models::{Debt, SavingsGoal};
use crate::error::{FinanceError, Result};

/// Longest payoff horizon we simulate (50 years).
pub const MAX_PAYOFF_MONTHS: u32 = 600;

/// Highest accepted annual interest rate, in percent.
pub const MAX_ANNUAL_RATE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

impl SavingsGoal {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FinanceError::InvalidInput("goal name cannot be empty".into()));
        }
        ensure_positive(self.target)?;
        if self.current < Decimal::ZERO || self.current > MAX_BALANCE {
            return Err(FinanceError::InvalidAmount(self.current));
        }
        Ok(())
    }

    pub fn contribute(&mut self, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;
        self.current = self
            .current
            .checked_add(round_cents(amount))
            .filter(|next| *next <= MAX_BALANCE)
            .ok_or(FinanceError::InvalidAmount(amount))?;
        Ok(())
    }

    pub fn remaining(&self) -> Decimal {
        (self.target - self.current).max(Decimal::ZERO)
    }

    pub fn is_reached(&self) -> bool {
        self.current >= self.target
    }

    /// Whole percent, capped at 100.
    pub fn progress_percent(&self) -> u8 {
        if self.target <= Decimal::ZERO {
            return 100;
        }
        if self.current >= self.target {
            return 100;
        }
        self.current
            .checked_mul(HUNDRED)
            .and_then(|scaled| scaled.checked_div(self.target))
            .map(|pct| pct.floor().min(HUNDRED))
            .and_then(|pct| pct.to_u8())
            .unwrap_or(100)
    }

    /// Amount to put aside each month to hit the target by the deadline.
    /// Past or current-month deadlines count as one month.
    pub fn monthly_required(&self, today: NaiveDate) -> Option<Decimal> {
        let deadline = self.deadline?;
        let months = months_between(today, deadline).max(1);
        Some(round_cents(self.remaining() / Decimal::from(months)))
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let months = i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month());
    if to.day() < from.day() {
        months - 1
    } else {
        months
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffPlan {
    pub months: u32,
    pub total_interest: Decimal,
}

impl Debt {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FinanceError::InvalidInput("debt name cannot be empty".into()));
        }
        ensure_positive(self.principal)?;
        if self.remaining < Decimal::ZERO || self.remaining > self.principal {
            return Err(FinanceError::InvalidInput(format!(
                "remaining {} must be within 0..={}",
                self.remaining, self.principal
            )));
        }
        if self.annual_rate < Decimal::ZERO || self.annual_rate > MAX_ANNUAL_RATE {
            return Err(FinanceError::InvalidInput(format!(
                "annual rate {} outside 0..={MAX_ANNUAL_RATE}",
                self.annual_rate
            )));
        }
        if self.minimum_payment < Decimal::ZERO || self.minimum_payment > MAX_AMOUNT {
            return Err(FinanceError::InvalidAmount(self.minimum_payment));
        }
        Ok(())
    }

    /// Applies a payment and returns the part actually used; the remaining
    /// balance never goes below zero.
    pub fn pay(&mut self, amount: Decimal) -> Result<Decimal> {
        ensure_positive(amount)?;
        let applied = round_cents(amount).min(self.remaining);
        self.remaining -= applied;
        Ok(applied)
    }

    pub fn is_paid_off(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn monthly_interest(&self) -> Decimal {
        round_cents(self.remaining * self.annual_rate / HUNDRED / Decimal::from(12))
    }

    /// Month-by-month simulation with a fixed payment. `None` when the
    /// payment never outruns the interest or the horizon is exceeded.
    pub fn payoff_plan(&self, payment: Decimal) -> Option<PayoffPlan> {
        if self.remaining.is_zero() {
            return Some(PayoffPlan {
                months: 0,
                total_interest: Decimal::ZERO,
            });
        }
        if payment <= Decimal::ZERO {
            return None;
        }

        let monthly_rate = self.annual_rate / HUNDRED / Decimal::from(12);
        let mut balance = self.remaining;
        let mut total_interest = Decimal::ZERO;
        for month in 1..=MAX_PAYOFF_MONTHS {
            let interest = round_cents(balance * monthly_rate);
            if month == 1 && payment <= interest {
                return None;
            }
            total_interest += interest;
            balance = balance + interest - payment;
            if balance <= Decimal::ZERO {
                return Some(PayoffPlan { months: month, total_interest });
            }
        }
        None
    }

    pub fn payoff_months(&self, payment: Decimal) -> Option<u32> {
        self.payoff_plan(payment).map(|p| p.months)
    }
}
