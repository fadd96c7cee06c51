use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

pub fn fmt_signed(d: &Decimal) -> String {
    if d.is_sign_negative() {
        fmt_money(d)
    } else {
        format!("+{}", fmt_money(d))
    }
}

/// Accepts "12", "12.5" and "12,50"; rejects anything that isn't a plain number.
pub fn parse_money(s: &str) -> Option<Decimal> {
    Decimal::from_str_exact(&s.trim().replace(',', ".")).ok()
}

pub fn fmt_when(t: &DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Text progress bar, e.g. `[#####.....]`.
pub fn bar(percent: u8, width: usize) -> String {
    let filled = usize::from(percent.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_formats_with_two_decimals() {
        assert_eq!(fmt_money(&Decimal::from(5)), "5.00");
        assert_eq!(fmt_money(&Decimal::from_str("3.14159").unwrap()), "3.14");
        assert_eq!(fmt_signed(&Decimal::from_str("-2.5").unwrap()), "-2.50");
        assert_eq!(fmt_signed(&Decimal::from(7)), "+7.00");
    }

    #[test]
    fn parses_comma_and_dot_amounts() {
        assert_eq!(parse_money(" 12,50 "), Decimal::from_str("12.50").ok());
        assert_eq!(parse_money("12.5"), Decimal::from_str("12.5").ok());
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(50, 10), "[#####.....]");
        assert_eq!(bar(0, 4), "[....]");
        assert_eq!(bar(150, 4), "[####]");
    }
}
