//! Surplus redistribution: income above the configured base is routed to the
//! equipment / business / savings buckets instead of the regular envelopes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::allocation::{distribute_income, ensure_positive, round_cents, HUNDRED, MAX_AMOUNT};
use crate::database::models::{Allocation, BudgetConfig, SurplusRule};
use crate::error::{FinanceError, Result};

pub const EQUIPMENT_BUCKET: &str = "equipment";
pub const BUSINESS_BUCKET: &str = "business";
pub const SAVINGS_BUCKET: &str = "savings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusSplit {
    pub equipment: Decimal,
    pub business: Decimal,
    pub savings: Decimal,
}

impl SurplusSplit {
    pub fn total(&self) -> Decimal {
        self.equipment
            .saturating_add(self.business)
            .saturating_add(self.savings)
    }

    pub fn allocations(&self) -> Vec<Allocation> {
        [
            (EQUIPMENT_BUCKET, self.equipment),
            (BUSINESS_BUCKET, self.business),
            (SAVINGS_BUCKET, self.savings),
        ]
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(key, amount)| Allocation {
            category: key.to_string(),
            amount,
        })
        .collect()
    }
}

impl SurplusRule {
    pub fn validate(&self) -> Result<()> {
        if self.base < Decimal::ZERO || self.base > MAX_AMOUNT {
            return Err(FinanceError::InvalidInput(format!("surplus base {} outside 0..={MAX_AMOUNT}", self.base)));
        }
        for (name, pct) in [("equipment", self.equipment), ("business", self.business), ("savings", self.savings)] {
            if pct < Decimal::ZERO || pct > HUNDRED {
                return Err(FinanceError::InvalidInput(format!("surplus {name} share {pct} outside 0..=100")));
            }
        }
        let total = self.equipment + self.business + self.savings;
        if total != HUNDRED {
            return Err(FinanceError::InvalidInput(format!("surplus shares sum to {total}, expected 100")));
        }
        Ok(())
    }

    /// Portion of `income` above the base, if the rule is on.
    pub fn surplus_of(&self, income: Decimal) -> Option<Decimal> {
        if !self.enabled || income <= self.base {
            return None;
        }
        Some(income - self.base)
    }
}

/// Savings absorbs the rounding remainder, so the parts always add up to `surplus`.
pub fn split_surplus(rule: &SurplusRule, surplus: Decimal) -> Result<SurplusSplit> {
    rule.validate()?;
    ensure_positive(surplus)?;

    let equipment = round_cents(surplus * rule.equipment / HUNDRED);
    let business = round_cents(surplus * rule.business / HUNDRED);
    Ok(SurplusSplit {
        equipment,
        business,
        savings: surplus - equipment - business,
    })
}

/// Income routed through the regular envelopes and, when the surplus rule
/// applies, the three surplus buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomePlan {
    pub allocations: Vec<Allocation>,
    pub surplus: Option<SurplusSplit>,
}

pub fn plan_income(config: &BudgetConfig, amount: Decimal) -> Result<IncomePlan> {
    ensure_positive(amount)?;

    let Some(surplus) = config.surplus_rule.surplus_of(amount) else {
        return Ok(IncomePlan {
            allocations: distribute_income(&config.categories, amount)?,
            surplus: None,
        });
    };

    let split = split_surplus(&config.surplus_rule, surplus)?;
    let mut allocations = if config.surplus_rule.base.is_zero() {
        Vec::new()
    } else {
        distribute_income(&config.categories, config.surplus_rule.base)?
    };
    allocations.extend(split.allocations());

    Ok(IncomePlan {
        allocations,
        surplus: Some(split),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rule(base: &str, e: i64, b: i64, s: i64) -> SurplusRule {
        SurplusRule {
            enabled: true,
            base: d(base),
            equipment: Decimal::from(e),
            business: Decimal::from(b),
            savings: Decimal::from(s),
        }
    }

    #[test]
    fn split_sums_exactly_to_surplus() {
        let r = rule("0", 33, 33, 34);
        for s in ["0.01", "0.02", "1", "10.01", "333.33", "1000.07"] {
            let split = split_surplus(&r, d(s)).unwrap();
            assert_eq!(split.total(), d(s), "surplus {s}");
        }
    }

    #[test]
    fn rejects_shares_not_summing_to_100() {
        let err = split_surplus(&rule("0", 50, 30, 10), d("10")).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidInput(_)));
    }

    #[test]
    fn surplus_only_above_base_and_when_enabled() {
        let mut r = rule("2000", 30, 30, 40);
        assert_eq!(r.surplus_of(d("1500")), None);
        assert_eq!(r.surplus_of(d("2000")), None);
        assert_eq!(r.surplus_of(d("2500")), Some(d("500")));
        r.enabled = false;
        assert_eq!(r.surplus_of(d("2500")), None);
    }

    #[test]
    fn plan_routes_base_to_envelopes_and_rest_to_buckets() {
        let mut config = BudgetConfig::default();
        config.surplus_rule = rule("1000", 30, 30, 40);

        let plan = plan_income(&config, d("1500")).unwrap();
        let split = plan.surplus.clone().unwrap();
        assert_eq!(split.equipment, d("150"));
        assert_eq!(split.business, d("150"));
        assert_eq!(split.savings, d("200"));

        let total: Decimal = plan.allocations.iter().map(|a| a.amount).sum();
        assert_eq!(total, d("1500"));
    }

    #[test]
    fn plan_without_surplus_uses_full_amount() {
        let config = BudgetConfig::default();
        let plan = plan_income(&config, d("100")).unwrap();
        assert!(plan.surplus.is_none());
        assert_eq!(plan.allocations.len(), config.categories.len());
    }

    #[test]
    fn oversized_bases_and_surpluses_are_rejected() {
        let r = rule("9999999999999999999999999999", 30, 30, 40);
        assert!(matches!(r.validate(), Err(FinanceError::InvalidInput(_))));

        let r = rule("0", 30, 30, 40);
        assert!(matches!(
            split_surplus(&r, d("9999999999999999999999999999")),
            Err(FinanceError::InvalidAmount(_))
        ));
    }
}
