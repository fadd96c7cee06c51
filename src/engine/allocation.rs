//! Envelope allocation: splitting income across weighted categories,
//! debiting expenses, and keeping per-category balances.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::surplus::{BUSINESS_BUCKET, EQUIPMENT_BUCKET, SAVINGS_BUCKET};
use crate::database::models::{Allocation, Category, Transaction, TransactionKind};
use crate::error::{FinanceError, Result};

pub const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Largest single amount accepted anywhere (one trillion).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Largest stored balance or goal progress (one quadrillion).
pub const MAX_BALANCE: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Rounds to cents, halves away from zero.
pub fn round_cents(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO || amount > MAX_AMOUNT {
        return Err(FinanceError::InvalidAmount(amount));
    }
    Ok(())
}

/// Rounds a user-entered amount to cents and checks it is still usable.
/// `0.004` rounds to nothing and is rejected.
pub fn normalize_amount(amount: Decimal) -> Result<Decimal> {
    ensure_positive(amount)?;
    let rounded = round_cents(amount);
    ensure_positive(rounded).map_err(|_| FinanceError::InvalidAmount(amount))?;
    Ok(rounded)
}

/// Checks keys are unique, each weight is within 0..=100 and the total is 100.
pub fn validate_categories(categories: &[Category]) -> Result<()> {
    if categories.is_empty() {
        return Err(FinanceError::InvalidCategories("at least one category is required".into()));
    }

    let mut seen = HashSet::new();
    for c in categories {
        if c.key.trim().is_empty() {
            return Err(FinanceError::InvalidCategories("category key cannot be empty".into()));
        }
        if !seen.insert(c.key.as_str()) {
            return Err(FinanceError::InvalidCategories(format!("duplicate key {}", c.key)));
        }
        if c.percent < Decimal::ZERO || c.percent > HUNDRED {
            return Err(FinanceError::InvalidCategories(format!(
                "{} has weight {} outside 0..=100",
                c.key, c.percent
            )));
        }
    }

    let total: Decimal = categories.iter().map(|c| c.percent).sum();
    if total != HUNDRED {
        return Err(FinanceError::InvalidCategories(format!("weights sum to {total}, expected 100")));
    }
    Ok(())
}

/// Splits `amount` by category weight. Each share is rounded on its own,
/// so the total can drift from `amount` by at most half a cent per category.
pub fn distribute_income(categories: &[Category], amount: Decimal) -> Result<Vec<Allocation>> {
    ensure_positive(amount)?;
    validate_categories(categories)?;

    Ok(categories
        .iter()
        .map(|c| Allocation {
            category: c.key.clone(),
            amount: round_cents(amount * c.percent / HUNDRED),
        })
        .collect())
}

pub fn debit_expense(categories: &[Category], category: &str, amount: Decimal) -> Result<Allocation> {
    ensure_positive(amount)?;
    if !categories.iter().any(|c| c.key == category) {
        return Err(FinanceError::UnknownCategory(category.to_string()));
    }
    Ok(Allocation {
        category: category.to_string(),
        amount: -round_cents(amount),
    })
}

/// Sets `key` to `new_percent` and spreads the difference over the other
/// unlocked categories in proportion to their weight, keeping the total at 100.
pub fn rebalance(categories: &[Category], key: &str, new_percent: Decimal) -> Result<Vec<Category>> {
    let target = categories
        .iter()
        .position(|c| c.key == key)
        .ok_or_else(|| FinanceError::UnknownCategory(key.to_string()))?;
    if categories[target].locked {
        return Err(FinanceError::LockedCategory(key.to_string()));
    }
    if new_percent < Decimal::ZERO || new_percent > HUNDRED {
        return Err(FinanceError::InvalidCategories(format!("weight {new_percent} outside 0..=100")));
    }

    let locked_total: Decimal = categories.iter().filter(|c| c.locked).map(|c| c.percent).sum();
    let others: Vec<usize> = (0..categories.len())
        .filter(|&i| i != target && !categories[i].locked)
        .collect();

    // What the other unlocked categories must add up to afterwards.
    let room = HUNDRED - locked_total - new_percent;
    if room < Decimal::ZERO {
        return Err(FinanceError::InvalidCategories(format!(
            "{new_percent}% does not fit next to {locked_total}% of locked categories"
        )));
    }
    if others.is_empty() && room != Decimal::ZERO {
        return Err(FinanceError::InvalidCategories(
            "no unlocked category left to absorb the difference".into(),
        ));
    }

    let mut out = categories.to_vec();
    out[target].percent = new_percent;

    let others_total: Decimal = others.iter().map(|&i| categories[i].percent).sum();
    for (i, share) in split_room(categories, &others, others_total, room) {
        out[i].percent = share;
    }

    validate_categories(&out)?;
    Ok(out)
}

/// Largest remainder split of `room` over `others`. Every share is cut to
/// whole cents, then the leftover cents go to the largest remainders first.
/// Shares never go below zero and always add up to `room` exactly.
fn split_room(categories: &[Category], others: &[usize], others_total: Decimal, room: Decimal) -> Vec<(usize, Decimal)> {
    if others.is_empty() {
        return Vec::new();
    }
    let exact: Vec<Decimal> = others
        .iter()
        .map(|&i| {
            if others_total.is_zero() {
                room / Decimal::from(others.len())
            } else {
                room * categories[i].percent / others_total
            }
        })
        .collect();
    let mut shares: Vec<Decimal> = exact
        .iter()
        .map(|q| q.round_dp_with_strategy(2, RoundingStrategy::ToZero))
        .collect();

    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| (exact[b] - shares[b]).cmp(&(exact[a] - shares[a])));

    let mut leftover = room - shares.iter().copied().sum::<Decimal>();
    for &n in &order {
        if leftover < CENT {
            break;
        }
        shares[n] += CENT;
        leftover -= CENT;
    }
    // sub-cent residue (room itself had more than two decimals)
    if !leftover.is_zero() {
        let largest = (0..shares.len()).fold(0, |best, n| if shares[n] > shares[best] { n } else { best });
        shares[largest] += leftover;
    }

    others.iter().copied().zip(shares).collect()
}

/// Checks a transaction built elsewhere before it touches the balances:
/// the amount is in range, an expense debits exactly its own category by
/// its rounded amount, and an income only credits known envelopes or
/// surplus buckets with parts adding up to the amount.
pub fn check_transaction(categories: &[Category], tx: &Transaction) -> Result<()> {
    ensure_positive(tx.amount)?;
    let invalid = |msg: String| Err(FinanceError::InvalidInput(format!("transaction {}: {msg}", tx.id)));

    match tx.kind {
        TransactionKind::Expense => {
            let Some(category) = tx.category.as_deref() else {
                return invalid("expense without a category".into());
            };
            if !categories.iter().any(|c| c.key == category) {
                return Err(FinanceError::UnknownCategory(category.to_string()));
            }
            match tx.allocations.as_slice() {
                [a] if a.category == category && a.amount == -round_cents(tx.amount) => Ok(()),
                _ => invalid(format!("expense must debit {category} by {}", round_cents(tx.amount))),
            }
        }
        TransactionKind::Income => {
            if tx.allocations.is_empty() {
                return invalid("income without allocations".into());
            }
            let mut sum = Decimal::ZERO;
            for a in &tx.allocations {
                let known = categories.iter().any(|c| c.key == a.category)
                    || [EQUIPMENT_BUCKET, BUSINESS_BUCKET, SAVINGS_BUCKET].contains(&a.category.as_str());
                if !known {
                    return Err(FinanceError::UnknownCategory(a.category.clone()));
                }
                if a.amount < Decimal::ZERO || a.amount > tx.amount {
                    return invalid(format!("allocation {} to {} out of range", a.amount, a.category));
                }
                sum += a.amount;
            }
            let tolerance = Decimal::new(5, 3) * Decimal::from(tx.allocations.len());
            if (sum - tx.amount).abs() > tolerance {
                return invalid(format!("allocations sum to {sum}, amount is {}", tx.amount));
            }
            Ok(())
        }
    }
}

/// Current balance of every envelope, keyed by category key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(pub BTreeMap<String, Decimal>);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Decimal {
        self.0.get(key).copied().unwrap_or(Decimal::ZERO)
    }

    /// Adds `amount` to one envelope. Fails instead of overflowing.
    pub fn credit(&mut self, key: &str, amount: Decimal) -> Result<()> {
        let current = self.get(key);
        let next = current.checked_add(amount).ok_or(FinanceError::InvalidAmount(amount))?;
        self.0.insert(key.to_string(), next);
        Ok(())
    }

    pub fn apply(&mut self, tx: &Transaction) -> Result<()> {
        self.post(tx, false)
    }

    pub fn reverse(&mut self, tx: &Transaction) -> Result<()> {
        self.post(tx, true)
    }

    // all or nothing: the map is only touched once every sum is known
    fn post(&mut self, tx: &Transaction, negate: bool) -> Result<()> {
        let mut next = self.clone();
        for a in &tx.allocations {
            next.credit(&a.category, if negate { -a.amount } else { a.amount })?;
        }
        *self = next;
        Ok(())
    }

    /// Sum over every envelope, saturating at the Decimal range.
    pub fn total(&self) -> Decimal {
        self.0.values().fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{BudgetConfig, TransactionKind};
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cats(weights: &[(&str, i64)]) -> Vec<Category> {
        weights
            .iter()
            .map(|(k, p)| Category::new(k, k, "", Decimal::from(*p), "core"))
            .collect()
    }

    fn tx(kind: TransactionKind, allocations: Vec<Allocation>) -> Transaction {
        let amount = allocations.iter().map(|a| a.amount.abs()).sum();
        Transaction {
            id: Uuid::new_v4(),
            kind,
            amount,
            category: None,
            timestamp: Utc::now(),
            note: None,
            allocations,
        }
    }

    #[test]
    fn default_config_is_valid() {
        validate_categories(&BudgetConfig::default().categories).unwrap();
    }

    #[test]
    fn rejects_weights_not_summing_to_100() {
        let err = validate_categories(&cats(&[("a", 50), ("b", 40)])).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidCategories(_)));
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert!(validate_categories(&cats(&[("a", 50), ("a", 50)])).is_err());
    }

    #[test]
    fn distributes_by_weight() {
        let allocs = distribute_income(&cats(&[("a", 50), ("b", 30), ("c", 20)]), d("1000")).unwrap();
        let amounts: Vec<Decimal> = allocs.iter().map(|a| a.amount).collect();
        assert_eq!(amounts, vec![d("500"), d("300"), d("200")]);
    }

    #[test]
    fn rounding_drift_is_bounded_by_category_count() {
        let categories = cats(&[("a", 33), ("b", 33), ("c", 34)]);
        for income in ["0.01", "0.05", "10.01", "99.99", "1234.57", "7"] {
            let income = d(income);
            let allocs = distribute_income(&categories, income).unwrap();
            let sum: Decimal = allocs.iter().map(|a| a.amount).sum();
            let bound = d("0.005") * Decimal::from(categories.len());
            assert!((sum - income).abs() <= bound, "income {income} sum {sum}");
        }
    }

    #[test]
    fn income_must_be_positive() {
        let categories = cats(&[("a", 100)]);
        assert!(matches!(
            distribute_income(&categories, Decimal::ZERO),
            Err(FinanceError::InvalidAmount(_))
        ));
        assert!(distribute_income(&categories, d("-5")).is_err());
    }

    #[test]
    fn expense_needs_known_category() {
        let categories = cats(&[("food", 100)]);
        let a = debit_expense(&categories, "food", d("12.5")).unwrap();
        assert_eq!(a.amount, d("-12.5"));
        assert!(matches!(
            debit_expense(&categories, "nope", d("1")),
            Err(FinanceError::UnknownCategory(_))
        ));
    }

    #[test]
    fn reverse_undoes_apply() {
        let categories = cats(&[("a", 60), ("b", 40)]);
        let mut balances = Balances::new();
        balances.credit("a", d("10")).unwrap();

        let income = tx(TransactionKind::Income, distribute_income(&categories, d("333.33")).unwrap());
        let expense = tx(TransactionKind::Expense, vec![debit_expense(&categories, "b", d("50")).unwrap()]);

        let before = balances.clone();
        balances.apply(&income).unwrap();
        balances.apply(&expense).unwrap();
        assert_ne!(balances, before);

        balances.reverse(&income).unwrap();
        balances.reverse(&expense).unwrap();
        assert_eq!(balances.get("a"), before.get("a"));
        assert_eq!(balances.get("b"), before.get("b"));
    }

    #[test]
    fn rebalance_keeps_total_and_locked_weights() {
        let mut categories = cats(&[("a", 40), ("b", 30), ("c", 20), ("d", 10)]);
        categories[3].locked = true;

        let out = rebalance(&categories, "a", d("50")).unwrap();
        let total: Decimal = out.iter().map(|c| c.percent).sum();
        assert_eq!(total, HUNDRED);
        assert_eq!(out[0].percent, d("50"));
        assert_eq!(out[3].percent, d("10"));
        // b and c shrink proportionally: 40 split 3:2
        assert_eq!(out[1].percent, d("24"));
        assert_eq!(out[2].percent, d("16"));
    }

    #[test]
    fn rebalance_refuses_locked_or_overflowing_targets() {
        let mut categories = cats(&[("a", 40), ("b", 60)]);
        categories[1].locked = true;
        assert!(matches!(
            rebalance(&categories, "b", d("10")),
            Err(FinanceError::LockedCategory(_))
        ));
        // a is the only unlocked category, it cannot move away from 40
        assert!(rebalance(&categories, "a", d("50")).is_err());
    }

    #[test]
    fn rebalance_spreads_evenly_from_zero_weights() {
        let categories = cats(&[("a", 100), ("b", 0), ("c", 0)]);
        let out = rebalance(&categories, "a", d("40")).unwrap();
        assert_eq!(out[1].percent, d("30"));
        assert_eq!(out[2].percent, d("30"));
    }

    #[test]
    fn amounts_above_the_cap_are_rejected_before_any_arithmetic() {
        let categories = cats(&[("a", 50), ("b", 50)]);
        let huge = d("9999999999999999999999999999");
        assert!(matches!(distribute_income(&categories, huge), Err(FinanceError::InvalidAmount(_))));
        assert!(matches!(debit_expense(&categories, "a", huge), Err(FinanceError::InvalidAmount(_))));
        assert!(distribute_income(&categories, MAX_AMOUNT).is_ok());
        assert_eq!(MAX_AMOUNT, d("1000000000000"));
        assert_eq!(MAX_BALANCE, d("1000000000000000"));
    }

    #[test]
    fn normalize_amount_rounds_once_and_rejects_dust() {
        assert_eq!(normalize_amount(d("1.005")).unwrap(), d("1.01"));
        assert_eq!(normalize_amount(d("12.5")).unwrap(), d("12.50"));
        assert!(matches!(normalize_amount(d("0.004")), Err(FinanceError::InvalidAmount(_))));
        assert!(normalize_amount(d("-1")).is_err());
    }

    #[test]
    fn balances_fail_instead_of_overflowing() {
        let mut balances = Balances::new();
        balances.credit("a", Decimal::MAX).unwrap();
        assert!(matches!(balances.credit("a", d("1")), Err(FinanceError::InvalidAmount(_))));
        assert_eq!(balances.get("a"), Decimal::MAX);

        // a failing transaction leaves every envelope untouched
        let t = tx(
            TransactionKind::Income,
            vec![
                Allocation { category: "b".into(), amount: d("5") },
                Allocation { category: "a".into(), amount: d("5") },
            ],
        );
        assert!(balances.apply(&t).is_err());
        assert_eq!(balances.get("b"), Decimal::ZERO);

        balances.credit("c", Decimal::MAX).unwrap();
        assert_eq!(balances.total(), Decimal::MAX);
    }

    #[test]
    fn rebalance_never_pushes_a_share_below_zero() {
        let categories = cats(&[("a", 0), ("b", 50), ("c", 50), ("d", 0)]);
        let out = rebalance(&categories, "a", d("99.97")).unwrap();
        let weights: Vec<Decimal> = out.iter().map(|c| c.percent).collect();
        assert_eq!(weights, vec![d("99.97"), d("0.02"), d("0.01"), d("0")]);
    }

    #[test]
    fn rebalance_holds_for_awkward_splits() {
        let layouts: &[&[(&str, i64)]] = &[
            &[("a", 0), ("b", 50), ("c", 50), ("d", 0)],
            &[("a", 1), ("b", 1), ("c", 1), ("d", 97)],
            &[("a", 33), ("b", 33), ("c", 34)],
            &[("a", 100), ("b", 0), ("c", 0), ("d", 0), ("e", 0), ("f", 0), ("g", 0)],
            &[("a", 10), ("b", 20), ("c", 30), ("d", 40)],
        ];
        let targets = ["0", "0.01", "0.5", "1", "33.333", "49.99", "66.67", "99.97", "99.99", "100"];

        for layout in layouts {
            for lock_last in [false, true] {
                let mut categories = cats(layout);
                if lock_last {
                    categories.last_mut().unwrap().locked = true;
                }
                for target in targets {
                    let Ok(out) = rebalance(&categories, "a", d(target)) else {
                        continue;
                    };
                    let total: Decimal = out.iter().map(|c| c.percent).sum();
                    assert_eq!(total, HUNDRED, "{layout:?} -> {target}");
                    for c in &out {
                        assert!(c.percent >= Decimal::ZERO && c.percent <= HUNDRED, "{layout:?} -> {target}: {c:?}");
                    }
                    assert_eq!(out[0].percent, d(target));
                    if lock_last {
                        assert_eq!(out.last().unwrap().percent, categories.last().unwrap().percent);
                    }
                }
            }
        }
    }

    #[test]
    fn rebalance_accepts_every_fitting_target_when_nothing_is_locked() {
        let categories = cats(&[("a", 0), ("b", 50), ("c", 50), ("d", 0)]);
        for cents in (0..=10_000).step_by(7) {
            let target = Decimal::new(cents, 2);
            let out = rebalance(&categories, "a", target).unwrap();
            assert!(out.iter().all(|c| c.percent >= Decimal::ZERO));
            assert_eq!(out.iter().map(|c| c.percent).sum::<Decimal>(), HUNDRED);
        }
    }

    #[test]
    fn checks_transactions_built_elsewhere() {
        let categories = cats(&[("food", 60), ("rent", 40)]);

        let mut expense = tx(TransactionKind::Expense, vec![debit_expense(&categories, "food", d("9.99")).unwrap()]);
        expense.category = Some("food".into());
        check_transaction(&categories, &expense).unwrap();

        expense.allocations[0].amount = d("9.99");
        assert!(matches!(check_transaction(&categories, &expense), Err(FinanceError::InvalidInput(_))));

        let income = tx(TransactionKind::Income, distribute_income(&categories, d("100")).unwrap());
        check_transaction(&categories, &income).unwrap();

        let mut inflated = income.clone();
        inflated.allocations[0].amount = d("90");
        assert!(check_transaction(&categories, &inflated).is_err());

        let mut negative = income.clone();
        negative.allocations[0].amount = d("-60");
        assert!(check_transaction(&categories, &negative).is_err());

        let mut stranger = income;
        stranger.allocations[0].category = "yachts".into();
        assert!(matches!(check_transaction(&categories, &stranger), Err(FinanceError::UnknownCategory(_))));
    }
}
