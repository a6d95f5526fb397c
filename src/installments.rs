//! Installment plans and due dates for customer credit accounts.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const MAX_INSTALLMENTS: u32 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("amount must be greater than 0")]
    NonPositiveAmount,
    #[error("installments must be between 1 and {MAX_INSTALLMENTS}")]
    InstallmentsOutOfRange,
    #[error("due date out of range")]
    DateOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Installment {
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DebtStatus {
    /// Unpaid installments with their outstanding amount.
    pub remaining: Vec<Installment>,
    pub next_due_date: Option<NaiveDate>,
    pub next_due_amount: i64,
    pub overdue_amount: i64,
    pub is_overdue: bool,
}

/// Splits `total` into `n` parts; the remainder goes on the last one.
pub fn split_amount(total: i64, n: u32) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    let parts = i64::from(n);
    let base = total / parts;
    let rem = total - base * parts;
    (0..n)
        .map(|i| if i + 1 == n { base + rem } else { base })
        .collect()
}

/// Monthly plan starting at `first_due`.
///
/// Each date is computed from `first_due` so a 31st keeps landing on month end.
pub fn build_schedule(
    total: i64,
    n: u32,
    first_due: NaiveDate,
) -> Result<Vec<Installment>, ScheduleError> {
    if total <= 0 {
        return Err(ScheduleError::NonPositiveAmount);
    }
    if n == 0 || n > MAX_INSTALLMENTS {
        return Err(ScheduleError::InstallmentsOutOfRange);
    }

    split_amount(total, n)
        .into_iter()
        .zip(0..n)
        .map(|(amount, i)| {
            let due_date = first_due
                .checked_add_months(Months::new(i))
                .ok_or(ScheduleError::DateOutOfRange)?;
            Ok(Installment {
                number: i + 1,
                due_date,
                amount,
            })
        })
        .collect()
}

pub fn default_first_due(charge_date: NaiveDate) -> NaiveDate {
    charge_date
        .checked_add_months(Months::new(1))
        .unwrap_or(charge_date)
}

/// Applies `total_paid` to the installments oldest due date first.
pub fn summarize<'a, I>(installments: I, total_paid: i64, today: NaiveDate) -> DebtStatus
where
    I: IntoIterator<Item = &'a Installment>,
{
    let mut ordered: Vec<&Installment> = installments.into_iter().collect();
    ordered.sort_by_key(|i| (i.due_date, i.number));

    let mut credit = total_paid.max(0);
    let mut remaining = Vec::new();
    for inst in ordered {
        if credit >= inst.amount {
            credit -= inst.amount;
            continue;
        }
        remaining.push(Installment {
            amount: inst.amount - credit,
            ..inst.clone()
        });
        credit = 0;
    }

    let overdue_amount = remaining
        .iter()
        .filter(|i| i.due_date < today)
        .map(|i| i.amount)
        .sum();
    let (next_due_date, next_due_amount) = remaining
        .first()
        .map(|i| (Some(i.due_date), i.amount))
        .unwrap_or((None, 0));

    DebtStatus {
        next_due_date,
        next_due_amount,
        overdue_amount,
        is_overdue: overdue_amount > 0,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn split_keeps_total_and_puts_remainder_last() {
        assert_eq!(split_amount(10_000, 3), vec![3_333, 3_333, 3_334]);
        assert_eq!(split_amount(9_000, 3), vec![3_000, 3_000, 3_000]);
        assert_eq!(split_amount(5, 1), vec![5]);
        assert!(split_amount(5, 0).is_empty());
    }

    #[test]
    fn schedule_clamps_to_month_end() {
        let plan = build_schedule(30_000, 3, date(2025, 1, 31)).unwrap();
        let dates: Vec<_> = plan.iter().map(|i| i.due_date).collect();
        assert_eq!(dates, vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]);
        assert_eq!(plan.iter().map(|i| i.amount).sum::<i64>(), 30_000);
        assert_eq!(plan[2].number, 3);
    }

    #[test]
    fn schedule_rejects_bad_input() {
        assert_eq!(
            build_schedule(0, 1, date(2025, 1, 1)),
            Err(ScheduleError::NonPositiveAmount)
        );
        assert_eq!(
            build_schedule(100, 0, date(2025, 1, 1)),
            Err(ScheduleError::InstallmentsOutOfRange)
        );
        assert_eq!(
            build_schedule(100, MAX_INSTALLMENTS + 1, date(2025, 1, 1)),
            Err(ScheduleError::InstallmentsOutOfRange)
        );
    }

    #[test]
    fn first_due_defaults_to_next_month() {
        assert_eq!(default_first_due(date(2024, 1, 31)), date(2024, 2, 29));
        assert_eq!(default_first_due(date(2025, 12, 10)), date(2026, 1, 10));
    }

    #[test]
    fn payments_cover_oldest_installments_first() {
        let plan = build_schedule(9_000, 3, date(2025, 3, 10)).unwrap();
        let status = summarize(&plan, 4_000, date(2025, 4, 1));
        assert_eq!(status.remaining.len(), 2);
        assert_eq!(status.next_due_date, Some(date(2025, 4, 10)));
        assert_eq!(status.next_due_amount, 2_000);
        assert!(!status.is_overdue);
    }

    #[test]
    fn flags_overdue_installments() {
        let mut plan = build_schedule(6_000, 2, date(2025, 1, 5)).unwrap();
        plan.extend(build_schedule(1_000, 1, date(2025, 6, 1)).unwrap());
        let status = summarize(&plan, 0, date(2025, 2, 10));
        assert!(status.is_overdue);
        assert_eq!(status.overdue_amount, 6_000);
        assert_eq!(status.next_due_date, Some(date(2025, 1, 5)));
    }

    #[test]
    fn fully_paid_has_nothing_due() {
        let plan = build_schedule(5_000, 2, date(2025, 1, 5)).unwrap();
        let status = summarize(&plan, 5_000, date(2026, 1, 1));
        assert!(status.remaining.is_empty());
        assert_eq!(status.next_due_date, None);
        assert!(!status.is_overdue);
    }
}
