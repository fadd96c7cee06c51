//! Whole-budget export file.
//!
//! ```json
//! { "version": 1, "exportDate": "...", "categories": [...], "balances": {...},
//!   "history": [...], "xp": 0, "streak": {...}, "unlockedBadges": [...],
//!   "savingsGoal": null }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{Category, GamificationState, SavingsGoal, Streak, Transaction, TransactionKind};
use crate::engine::allocation::{ensure_positive, MAX_AMOUNT, MAX_BALANCE};
use crate::engine::{validate_categories, Balances};
use crate::error::{FinanceError, Result};

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub export_date: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub balances: Balances,
    pub history: Vec<Transaction>,
    pub xp: u64,
    pub streak: Streak,
    pub unlocked_badges: Vec<String>,
    pub savings_goal: Option<SavingsGoal>,
}

impl ExportDocument {
    /// Parses and validates an import file. Any problem is reported as
    /// [`FinanceError::InvalidImport`]; nothing is partially accepted.
    pub fn parse(text: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(text).map_err(|e| FinanceError::InvalidImport(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > EXPORT_VERSION {
            return Err(FinanceError::InvalidImport(format!("unsupported version {}", self.version)));
        }
        validate_categories(&self.categories).map_err(|e| FinanceError::InvalidImport(e.to_string()))?;

        let mut ids = HashSet::new();
        for tx in &self.history {
            if !ids.insert(tx.id) {
                return Err(FinanceError::InvalidImport(format!("duplicate transaction {}", tx.id)));
            }
            if ensure_positive(tx.amount).is_err() {
                return Err(FinanceError::InvalidImport(format!("transaction {} has amount {}", tx.id, tx.amount)));
            }
            if let Some(a) = tx.allocations.iter().find(|a| a.amount.abs() > MAX_AMOUNT) {
                return Err(FinanceError::InvalidImport(format!(
                    "transaction {} allocates {} to {}",
                    tx.id, a.amount, a.category
                )));
            }
            if tx.kind == TransactionKind::Expense && tx.category.is_none() {
                return Err(FinanceError::InvalidImport(format!("expense {} has no category", tx.id)));
            }
        }

        if let Some((key, amount)) = self.balances.iter().find(|(_, b)| b.abs() > MAX_BALANCE) {
            return Err(FinanceError::InvalidImport(format!("balance {amount} for {key} is out of range")));
        }

        if let Some(goal) = &self.savings_goal {
            goal.validate().map_err(|e| FinanceError::InvalidImport(e.to_string()))?;
        }
        Ok(())
    }

    pub fn gamification(&self) -> GamificationState {
        GamificationState {
            xp: self.xp,
            streak: self.streak.clone(),
            unlocked_badges: self.unlocked_badges.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::BudgetConfig;
    use serde_json::json;

    fn sample() -> ExportDocument {
        ExportDocument {
            version: EXPORT_VERSION,
            export_date: Utc::now(),
            categories: BudgetConfig::default().categories,
            balances: Balances::new(),
            history: Vec::new(),
            xp: 0,
            streak: Streak::default(),
            unlocked_badges: Vec::new(),
            savings_goal: None,
        }
    }

    #[test]
    fn uses_camel_case_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for key in ["version", "exportDate", "categories", "balances", "history", "xp", "streak", "unlockedBadges", "savingsGoal"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn parses_its_own_output() {
        let doc = sample();
        let parsed = ExportDocument::parse(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed.categories, doc.categories);
    }

    #[test]
    fn malformed_files_fail_closed() {
        for text in ["", "not json", "{}", r#"{"version": 1}"#] {
            assert!(matches!(ExportDocument::parse(text), Err(FinanceError::InvalidImport(_))), "{text:?}");
        }
    }

    #[test]
    fn rejects_future_versions_and_bad_weights() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["version"] = json!(2);
        assert!(ExportDocument::parse(&value.to_string()).is_err());

        let mut value = serde_json::to_value(sample()).unwrap();
        value["categories"][0]["percent"] = json!("1");
        let err = ExportDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidImport(_)));
    }

    #[test]
    fn rejects_out_of_range_amounts() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["balances"]["food"] = json!("9999999999999999999999999999");
        let err = ExportDocument::parse(&value.to_string()).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidImport(_)));

        let mut doc = sample();
        doc.history.push(Transaction {
            id: uuid::Uuid::new_v4(),
            kind: TransactionKind::Income,
            amount: "9999999999999999999999999999".parse().unwrap(),
            category: None,
            timestamp: Utc::now(),
            note: None,
            allocations: Vec::new(),
        });
        assert!(matches!(doc.validate(), Err(FinanceError::InvalidImport(_))));

        doc.history[0].amount = rust_decimal::Decimal::from(10);
        doc.history[0].allocations.push(crate::database::models::Allocation {
            category: "food".into(),
            amount: "-9999999999999999999999999999".parse().unwrap(),
        });
        assert!(matches!(doc.validate(), Err(FinanceError::InvalidImport(_))));
    }
}
