//! Parsers for free-text amount messages and command arguments.

use chrono::NaiveDate;
use engine::{CustomerKind, ExpenseKind, Money, OrderFilter, OrderState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AmountOp {
    /// `+500` - interest income.
    Interest(Money),
    /// `+500x` - principal reduction.
    Principal(Money),
    /// `+2000c` - money settled against a breach.
    Settlement(Money),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid date, use YYYY-MM-DD")]
    InvalidDate,
    #[error("missing argument")]
    Missing,
    #[error("unknown expense kind, use company or other")]
    UnknownExpenseKind,
}

/// Parses a `+amount[x|c]` message into a draft operation.
pub(crate) fn parse_amount_message(text: &str) -> Result<AmountOp, ParseError> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix('+').ok_or(ParseError::InvalidAmount)?;

    let (number, flag) = match rest.trim().chars().next_back() {
        Some(c @ ('x' | 'X' | 'c' | 'C')) => {
            let rest = rest.trim();
            (&rest[..rest.len() - 1], Some(c.to_ascii_lowercase()))
        }
        _ => (rest.trim(), None),
    };

    let amount: Money = number.parse().map_err(|_| ParseError::InvalidAmount)?;
    if !amount.is_positive() {
        return Err(ParseError::InvalidAmount);
    }

    Ok(match flag {
        Some('x') => AmountOp::Principal(amount),
        Some('c') => AmountOp::Settlement(amount),
        _ => AmountOp::Interest(amount),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReportArgs {
    pub group_id: Option<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// `[group] [today|YYYY-MM-DD [YYYY-MM-DD]]`, everything optional.
pub(crate) fn parse_report_args(args: &str, today: NaiveDate) -> Result<ReportArgs, ParseError> {
    let mut group_id = None;
    let mut dates: Vec<NaiveDate> = Vec::new();

    for (position, token) in args.split_whitespace().enumerate() {
        if token.eq_ignore_ascii_case("today") {
            dates.push(today);
        } else if let Some(date) = parse_date(token) {
            dates.push(date);
        } else if position == 0 && group_id.is_none() {
            group_id = Some(token.to_string());
        } else {
            return Err(ParseError::InvalidDate);
        }
    }

    let (from, to) = match dates.as_slice() {
        [] => (today, today),
        [single] => (*single, *single),
        [from, to, ..] => (*from, *to),
    };
    Ok(ReportArgs { group_id, from, to })
}

/// Builds an order search filter out of loose tokens: a state word, `A`/`B`,
/// `#id`, one or two dates, anything else is the attribution id.
pub(crate) fn parse_search_args(args: &str) -> Result<OrderFilter, ParseError> {
    let mut filter = OrderFilter {
        include_terminal: true,
        ..Default::default()
    };
    let mut dates: Vec<NaiveDate> = Vec::new();

    for token in args.split_whitespace() {
        if let Ok(state) = OrderState::try_from(token) {
            filter.state = Some(state);
        } else if token.len() == 1
            && let Ok(customer) = CustomerKind::try_from(token)
        {
            filter.customer = Some(customer);
        } else if let Some(id) = token.strip_prefix('#') {
            filter.order_id = Some(id.parse().map_err(|_| ParseError::Missing)?);
        } else if let Ok(id) = token.parse::<i64>() {
            filter.order_id = Some(id);
        } else if let Some(date) = parse_date(token) {
            dates.push(date);
        } else {
            filter.group_id = Some(token.to_string());
        }
    }

    match dates.as_slice() {
        [] => {}
        [single] => filter.date_range = Some((*single, *single)),
        [from, to, ..] => filter.date_range = Some((*from, *to)),
    }

    if filter.order_id.is_none()
        && filter.group_id.is_none()
        && filter.state.is_none()
        && filter.customer.is_none()
        && filter.date_range.is_none()
    {
        return Err(ParseError::Missing);
    }
    Ok(filter)
}

/// `<company|other> <amount> [note...]`
pub(crate) fn parse_expense_args(args: &str) -> Result<(ExpenseKind, Money, Option<String>), ParseError> {
    let mut parts = args.split_whitespace();
    let kind = parts.next().ok_or(ParseError::Missing)?;
    let kind = ExpenseKind::try_from(kind).map_err(|_| ParseError::UnknownExpenseKind)?;

    let amount: Money = parts
        .next()
        .ok_or(ParseError::Missing)?
        .parse()
        .map_err(|_| ParseError::InvalidAmount)?;
    if !amount.is_positive() {
        return Err(ParseError::InvalidAmount);
    }

    let note = parts.collect::<Vec<_>>().join(" ");
    let note = (!note.is_empty()).then_some(note);
    Ok((kind, amount, note))
}

/// `<±amount> [note...]`
pub(crate) fn parse_funds_args(args: &str) -> Result<(Money, Option<String>), ParseError> {
    let mut parts = args.split_whitespace();
    let amount: Money = parts
        .next()
        .ok_or(ParseError::Missing)?
        .parse()
        .map_err(|_| ParseError::InvalidAmount)?;
    if amount.is_zero() {
        return Err(ParseError::InvalidAmount);
    }

    let note = parts.collect::<Vec<_>>().join(" ");
    let note = (!note.is_empty()).then_some(note);
    Ok((amount, note))
}

/// `[YYYY-MM-DD [YYYY-MM-DD]]`, defaulting to today.
pub(crate) fn parse_income_args(
    args: &str,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ParseError> {
    let dates: Vec<NaiveDate> = args
        .split_whitespace()
        .map(|token| parse_date(token).ok_or(ParseError::InvalidDate))
        .collect::<Result<_, _>>()?;
    Ok(match dates.as_slice() {
        [] => (today, today),
        [single] => (*single, *single),
        [from, to, ..] => (*from, *to),
    })
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn amount_without_flag_is_interest() {
        assert_eq!(
            parse_amount_message("+500"),
            Ok(AmountOp::Interest(Money::new(500_00)))
        );
        assert_eq!(
            parse_amount_message(" +10.50 "),
            Ok(AmountOp::Interest(Money::new(10_50)))
        );
    }

    #[test]
    fn amount_flags_pick_the_operation() {
        assert_eq!(
            parse_amount_message("+500x"),
            Ok(AmountOp::Principal(Money::new(500_00)))
        );
        assert_eq!(
            parse_amount_message("+2000C"),
            Ok(AmountOp::Settlement(Money::new(2_000_00)))
        );
    }

    #[test]
    fn bad_amounts_are_rejected() {
        assert!(parse_amount_message("500").is_err());
        assert!(parse_amount_message("+0").is_err());
        assert!(parse_amount_message("+abc").is_err());
        assert!(parse_amount_message("+1.2.3").is_err());
    }

    #[test]
    fn report_args_forms() {
        let today = date("2025-03-10");
        assert_eq!(
            parse_report_args("", today).unwrap(),
            ReportArgs {
                group_id: None,
                from: today,
                to: today
            }
        );
        assert_eq!(
            parse_report_args("S01", today).unwrap(),
            ReportArgs {
                group_id: Some("S01".to_string()),
                from: today,
                to: today
            }
        );
        assert_eq!(
            parse_report_args("S01 2025-03-01 2025-03-09", today).unwrap(),
            ReportArgs {
                group_id: Some("S01".to_string()),
                from: date("2025-03-01"),
                to: date("2025-03-09")
            }
        );
        assert_eq!(
            parse_report_args("2025-03-01", today).unwrap().group_id,
            None
        );
        assert!(parse_report_args("S01 nonsense", today).is_err());
    }

    #[test]
    fn search_args_combine_criteria() {
        let filter = parse_search_args("S01 overdue").unwrap();
        assert_eq!(filter.group_id, Some("S01".to_string()));
        assert_eq!(filter.state, Some(OrderState::Overdue));

        let filter = parse_search_args("#42").unwrap();
        assert_eq!(filter.order_id, Some(42));

        let filter = parse_search_args("B 2025-03-01 2025-03-09").unwrap();
        assert_eq!(filter.customer, Some(CustomerKind::B));
        assert_eq!(
            filter.date_range,
            Some((date("2025-03-01"), date("2025-03-09")))
        );

        assert!(parse_search_args("").is_err());
    }

    #[test]
    fn expense_and_funds_args() {
        let (kind, amount, note) = parse_expense_args("company 80 office rent").unwrap();
        assert_eq!(kind, ExpenseKind::Company);
        assert_eq!(amount, Money::new(80_00));
        assert_eq!(note.as_deref(), Some("office rent"));

        assert!(parse_expense_args("travel 80").is_err());

        let (amount, note) = parse_funds_args("-250.50").unwrap();
        assert_eq!(amount, Money::new(-250_50));
        assert_eq!(note, None);
    }
}
