use std::fmt::Write;

use crate::engine::{rank_progress, Badge};
use crate::service::BudgetSnapshot;

const PERSONA: &str = "You are the Oracle, a calm and practical personal-finance advisor inside an \
envelope-budgeting app. Answer briefly, refer to the user's envelopes by name, and never invent \
balances that are not listed below.";

/// System message describing the user's budget.
pub fn build_system_prompt(snapshot: &BudgetSnapshot) -> String {
    let cfg = &snapshot.config;
    let mut out = String::from(PERSONA);

    let _ = write!(out, "\n\nUser: {} (currency {}).", cfg.profil.name, cfg.profil.currency);
    if !cfg.profil.base_income.is_zero() {
        let _ = write!(out, " Usual monthly income: {}.", cfg.profil.base_income);
    }

    out.push_str("\n\nEnvelopes (weight, balance):");
    for c in &cfg.categories {
        let _ = write!(
            out,
            "\n- {} {} [{}]: {}%, {}{}",
            c.icon,
            c.name,
            c.bloc,
            c.percent,
            snapshot.balances.get(&c.key).round_dp(2),
            if c.locked { " (locked)" } else { "" }
        );
    }

    let rule = &cfg.surplus_rule;
    if rule.enabled {
        let _ = write!(
            out,
            "\n\nIncome above {} is split {}% equipment, {}% business, {}% savings.",
            rule.base, rule.equipment, rule.business, rule.savings
        );
    }

    if !cfg.lois.is_empty() {
        out.push_str("\n\nThe user's own budgeting laws:");
        for law in &cfg.lois {
            let _ = write!(out, "\n- {}: {}", law.title, law.description);
        }
    }

    if !snapshot.goals.is_empty() {
        out.push_str("\n\nSavings goals:");
        for g in &snapshot.goals {
            let _ = write!(out, "\n- {}: {} of {} ({}%)", g.name, g.current, g.target, g.progress_percent());
            if let Some(deadline) = g.deadline {
                let _ = write!(out, " by {deadline}");
            }
        }
    }

    if !snapshot.debts.is_empty() {
        out.push_str("\n\nDebts:");
        for d in &snapshot.debts {
            let _ = write!(out, "\n- {}: {} left at {}% a year", d.name, d.remaining, d.annual_rate);
        }
    }

    let game = &snapshot.gamification;
    let progress = rank_progress(game.xp);
    let _ = write!(
        out,
        "\n\nProgress: rank {} with {} XP, {}-day streak (best {}).",
        progress.rank.name, game.xp, game.streak.current, game.streak.best
    );
    let badges: Vec<&str> = game
        .unlocked_badges
        .iter()
        .filter_map(|k| Badge::from_key(k))
        .map(|b| b.title())
        .collect();
    if !badges.is_empty() {
        let _ = write!(out, " Badges: {}.", badges.join(", "));
    }

    out
}
