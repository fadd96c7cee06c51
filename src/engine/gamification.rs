//! XP, ranks, streaks and badges, all derived from the transaction history.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use super::allocation::Balances;
use crate::database::models::{GamificationState, Streak, Transaction, TransactionKind};

pub const XP_INCOME: u64 = 15;
pub const XP_EXPENSE: u64 = 10;
pub const XP_NOTE_BONUS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rank {
    pub name: &'static str,
    pub min_xp: u64,
}

pub const RANKS: [Rank; 6] = [
    Rank { name: "Novice", min_xp: 0 },
    Rank { name: "Apprentice", min_xp: 100 },
    Rank { name: "Steward", min_xp: 300 },
    Rank { name: "Strategist", min_xp: 700 },
    Rank { name: "Treasurer", min_xp: 1500 },
    Rank { name: "Sovereign", min_xp: 3000 },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstIncome,
    FirstExpense,
    TenOperations,
    HundredOperations,
    Streak7,
    Streak30,
    Xp1000,
    Disciplined,
}

impl Badge {
    pub const ALL: [Badge; 8] = [
        Badge::FirstIncome,
        Badge::FirstExpense,
        Badge::TenOperations,
        Badge::HundredOperations,
        Badge::Streak7,
        Badge::Streak30,
        Badge::Xp1000,
        Badge::Disciplined,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::FirstIncome => "first_income",
            Self::FirstExpense => "first_expense",
            Self::TenOperations => "ten_operations",
            Self::HundredOperations => "hundred_operations",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
            Self::Xp1000 => "xp_1000",
            Self::Disciplined => "disciplined",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::FirstIncome => "First income",
            Self::FirstExpense => "First expense",
            Self::TenOperations => "Ten operations",
            Self::HundredOperations => "A hundred operations",
            Self::Streak7 => "Week streak",
            Self::Streak30 => "Month streak",
            Self::Xp1000 => "1000 XP",
            Self::Disciplined => "Disciplined",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.key() == key)
    }
}

pub fn xp_for(tx: &Transaction) -> u64 {
    let base = match tx.kind {
        TransactionKind::Income => XP_INCOME,
        TransactionKind::Expense => XP_EXPENSE,
    };
    let has_note = tx.note.as_deref().is_some_and(|n| !n.trim().is_empty());
    if has_note {
        base + XP_NOTE_BONUS
    } else {
        base
    }
}

pub fn rank_for(xp: u64) -> Rank {
    RANKS
        .iter()
        .rev()
        .find(|r| xp >= r.min_xp)
        .copied()
        .unwrap_or(RANKS[0])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankProgress {
    pub rank: Rank,
    pub next: Option<Rank>,
    pub xp_to_next: Option<u64>,
    /// 0..=100 progress through the current rank.
    pub percent: u8,
}

pub fn rank_progress(xp: u64) -> RankProgress {
    let rank = rank_for(xp);
    let next = RANKS.iter().find(|r| r.min_xp > xp).copied();
    let percent = match next {
        Some(n) => {
            let span = n.min_xp - rank.min_xp;
            ((xp - rank.min_xp) * 100 / span) as u8
        }
        None => 100,
    };
    RankProgress {
        rank,
        next,
        xp_to_next: next.map(|n| n.min_xp - xp),
        percent,
    }
}

/// Consecutive-day streak over the given activity dates.
/// `current` drops to 0 once a full day has passed without activity.
pub fn compute_streak(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Streak {
    let days: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let Some(&last) = days.iter().next_back() else {
        return Streak::default();
    };

    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &day in &days {
        run = match prev {
            Some(p) if day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }

    let current = if last >= today - Duration::days(1) { run } else { 0 };
    Streak {
        current,
        best,
        last_date: Some(last),
    }
}

impl GamificationState {
    /// Rebuilds the state from history. Badges in `previously_unlocked` are
    /// kept even when the history no longer qualifies for them.
    pub fn recompute(history: &[Transaction], previously_unlocked: &[String], today: NaiveDate) -> Self {
        let mut ordered: Vec<&Transaction> = history.iter().collect();
        ordered.sort_by_key(|t| t.timestamp);

        let xp: u64 = ordered.iter().map(|t| xp_for(t)).sum();
        let streak = compute_streak(ordered.iter().map(|t| t.timestamp.date_naive()), today);

        let mut balances = Balances::new();
        let mut expenses = 0usize;
        let mut overdrawn = false;
        for t in &ordered {
            // an entry that would overflow leaves the running balances as they were
            let _ = balances.apply(t);
            if t.kind == TransactionKind::Expense {
                expenses += 1;
                if let Some(cat) = &t.category {
                    overdrawn |= balances.get(cat) < Decimal::ZERO;
                }
            }
        }
        let incomes = ordered.len() - expenses;

        let earned = |b: Badge| match b {
            Badge::FirstIncome => incomes >= 1,
            Badge::FirstExpense => expenses >= 1,
            Badge::TenOperations => ordered.len() >= 10,
            Badge::HundredOperations => ordered.len() >= 100,
            Badge::Streak7 => streak.best >= 7,
            Badge::Streak30 => streak.best >= 30,
            Badge::Xp1000 => xp >= 1000,
            Badge::Disciplined => expenses >= 10 && !overdrawn,
        };

        let mut unlocked: BTreeSet<String> = previously_unlocked.iter().cloned().collect();
        unlocked.extend(Badge::ALL.into_iter().filter(|b| earned(*b)).map(|b| b.key().to_string()));

        Self {
            xp,
            streak,
            unlocked_badges: unlocked.into_iter().collect(),
        }
    }

    pub fn rank(&self) -> Rank {
        rank_for(self.xp)
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.unlocked_badges.iter().any(|k| k == badge.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Allocation;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx_on(date: NaiveDate, kind: TransactionKind, category: &str, amount: i64) -> Transaction {
        let amount = Decimal::from(amount);
        let delta = match kind {
            TransactionKind::Income => amount,
            TransactionKind::Expense => -amount,
        };
        Transaction {
            id: Uuid::new_v4(),
            kind,
            amount,
            category: (kind == TransactionKind::Expense).then(|| category.to_string()),
            timestamp: Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap()),
            note: None,
            allocations: vec![Allocation {
                category: category.to_string(),
                amount: delta,
            }],
        }
    }

    #[test]
    fn ranks_follow_thresholds() {
        assert_eq!(rank_for(0).name, "Novice");
        assert_eq!(rank_for(99).name, "Novice");
        assert_eq!(rank_for(100).name, "Apprentice");
        assert_eq!(rank_for(10_000).name, "Sovereign");
    }

    #[test]
    fn rank_progress_reports_distance_to_next() {
        let p = rank_progress(200);
        assert_eq!(p.rank.name, "Apprentice");
        assert_eq!(p.next.map(|r| r.name), Some("Steward"));
        assert_eq!(p.xp_to_next, Some(100));
        assert_eq!(p.percent, 50);

        let top = rank_progress(5000);
        assert!(top.next.is_none());
        assert_eq!(top.percent, 100);
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let today = day(2025, 3, 10);
        let s = compute_streak([day(2025, 3, 1), day(2025, 3, 2), day(2025, 3, 3), day(2025, 3, 9), day(2025, 3, 10)], today);
        assert_eq!(s.current, 2);
        assert_eq!(s.best, 3);
        assert_eq!(s.last_date, Some(today));
    }

    #[test]
    fn streak_survives_until_end_of_next_day() {
        let s = compute_streak([day(2025, 3, 8), day(2025, 3, 9)], day(2025, 3, 10));
        assert_eq!(s.current, 2);

        let broken = compute_streak([day(2025, 3, 8), day(2025, 3, 9)], day(2025, 3, 11));
        assert_eq!(broken.current, 0);
        assert_eq!(broken.best, 2);
    }

    #[test]
    fn empty_history_is_default_state() {
        let state = GamificationState::recompute(&[], &[], day(2025, 1, 1));
        assert_eq!(state, GamificationState::default());
    }

    #[test]
    fn recompute_awards_xp_and_first_badges() {
        let today = day(2025, 3, 2);
        let history = vec![
            tx_on(day(2025, 3, 1), TransactionKind::Income, "food", 100),
            tx_on(day(2025, 3, 2), TransactionKind::Expense, "food", 20),
        ];
        let state = GamificationState::recompute(&history, &[], today);
        assert_eq!(state.xp, XP_INCOME + XP_EXPENSE);
        assert_eq!(state.streak.current, 2);
        assert!(state.has_badge(Badge::FirstIncome));
        assert!(state.has_badge(Badge::FirstExpense));
        assert!(!state.has_badge(Badge::TenOperations));
    }

    #[test]
    fn badges_stay_unlocked_after_history_shrinks() {
        let previously = vec![Badge::Streak7.key().to_string()];
        let state = GamificationState::recompute(&[], &previously, day(2025, 1, 1));
        assert!(state.has_badge(Badge::Streak7));
        assert_eq!(state.xp, 0);
    }

    #[test]
    fn disciplined_needs_ten_expenses_without_overdraft() {
        let start = day(2025, 1, 1);
        let mut history = vec![tx_on(start, TransactionKind::Income, "food", 1000)];
        for i in 0..10 {
            history.push(tx_on(start + Duration::days(i), TransactionKind::Expense, "food", 10));
        }
        let state = GamificationState::recompute(&history, &[], start);
        assert!(state.has_badge(Badge::Disciplined));

        history.push(tx_on(start + Duration::days(11), TransactionKind::Expense, "food", 5000));
        let state = GamificationState::recompute(&history, &[], start);
        assert!(!state.has_badge(Badge::Disciplined));
    }

    #[test]
    fn badge_keys_round_trip() {
        for b in Badge::ALL {
            assert_eq!(Badge::from_key(b.key()), Some(b));
        }
    }
}
