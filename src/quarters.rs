//! Calendar-quarter partitioning of the collection period.
//!
//! The search API caps how many results one query can page through, so the
//! collection period is split into quarters and each quarter is queried and
//! filtered on its own.

use crate::error::{CollectError, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Quarter name with its first and last month.
const QUARTER_MONTHS: [(&str, u32, u32); 4] = [
    ("Q1", 1, 3),
    ("Q2", 4, 6),
    ("Q3", 7, 9),
    ("Q4", 10, 12),
];

/// An inclusive date window labelled like `2022_Q1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterRange {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl QuarterRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Rebuild the window for a label such as `2023_Q4`, clipped to `today`.
    pub fn from_label(label: &str, today: NaiveDate) -> Result<Self> {
        let invalid = || CollectError::InvalidQuarter(label.to_string());
        let (year, name) = label.split_once('_').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let (name, start_month, end_month) = QUARTER_MONTHS
            .iter()
            .copied()
            .find(|(q, _, _)| *q == name)
            .ok_or_else(invalid)?;

        let start_date = NaiveDate::from_ymd_opt(year, start_month, 1).ok_or_else(invalid)?;
        if start_date > today {
            return Err(CollectError::FutureQuarter(label.to_string()));
        }
        let end_date = last_day_of_month(year, end_month).ok_or_else(invalid)?;
        Ok(Self {
            label: format!("{year}_{name}"),
            start_date,
            end_date: end_date.min(today),
        })
    }
}

impl fmt::Display for QuarterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ~ {})", self.label, self.start_date, self.end_date)
    }
}

/// Quarters from `start_year`-Q1 through the quarter containing `today`.
///
/// A quarter that has not started yet ends the sequence; the quarter
/// containing `today` is clipped so it ends on `today`.
pub fn quarterly_ranges(start_year: i32, today: NaiveDate) -> Vec<QuarterRange> {
    let mut quarters = Vec::new();
    'years: for year in start_year..=today.year() {
        for (name, start_month, end_month) in QUARTER_MONTHS {
            let Some(start_date) = NaiveDate::from_ymd_opt(year, start_month, 1) else {
                break 'years;
            };
            if start_date > today {
                break 'years;
            }
            let Some(end_date) = last_day_of_month(year, end_month) else {
                break 'years;
            };
            quarters.push(QuarterRange {
                label: format!("{year}_{name}"),
                start_date,
                end_date: end_date.min(today),
            });
        }
    }
    quarters
}

/// [`quarterly_ranges`] against the local calendar date.
pub fn quarterly_ranges_until_today(start_year: i32) -> Vec<QuarterRange> {
    quarterly_ranges(start_year, Local::now().date_naive())
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()
    }
}
