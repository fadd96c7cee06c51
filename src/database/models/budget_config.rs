use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub base_income: Decimal,
}

/// How income above `base` is split. The three percentages sum to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusRule {
    #[serde(default)]
    pub enabled: bool,
    pub base: Decimal,
    pub equipment: Decimal,
    pub business: Decimal,
    pub savings: Decimal,
}

/// A personal budgeting rule ("loi") written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Law {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    pub profil: Profile,
    pub categories: Vec<Category>,
    pub surplus_rule: SurplusRule,
    #[serde(default)]
    pub lois: Vec<Law>,
}

impl Default for SurplusRule {
    fn default() -> Self {
        Self {
            enabled: false,
            base: Decimal::ZERO,
            equipment: Decimal::from(30),
            business: Decimal::from(30),
            savings: Decimal::from(40),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        let pct = Decimal::from;
        Self {
            profil: Profile {
                name: "Me".to_string(),
                currency: "EUR".to_string(),
                base_income: Decimal::ZERO,
            },
            categories: vec![
                Category::new("housing", "Housing", "🏠", pct(35), "essentials"),
                Category::new("food", "Food", "🛒", pct(15), "essentials"),
                Category::new("transport", "Transport", "🚗", pct(10), "essentials"),
                Category::new("savings", "Savings", "💰", pct(20), "growth"),
                Category::new("learning", "Learning", "📚", pct(10), "growth"),
                Category::new("leisure", "Leisure", "🎉", pct(10), "lifestyle"),
            ],
            surplus_rule: SurplusRule::default(),
            lois: vec![Law {
                title: "Pay yourself first".to_string(),
                description: "Savings are funded before any leisure spending.".to_string(),
            }],
        }
    }
}
