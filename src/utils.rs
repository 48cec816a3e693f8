use crate::error::{DreError, Result};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Fractional digits carried by every monetary figure and percentage.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(DreError::InvalidInput(format!(
                "window end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A calendar month of a given year, as the presentation layer pages through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl<'de> Deserialize<'de> for ReportPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            year: i32,
            month: u32,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.year, raw.month).map_err(de::Error::custom)
    }
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        // Reject years chrono cannot represent up front.
        first_day_of_month(year, month)?;
        Ok(Self { year, month })
    }

    pub fn window(&self) -> Result<DateWindow> {
        month_window(self.year, self.month)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Parses a period string in the format "YYYY-MM".
    pub fn parse(period: &str) -> Result<Self> {
        let start_str = format!("{}-01", period.trim());
        let start_date = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
            DreError::InvalidInput(format!(
                "Invalid period format: {}. Expected YYYY-MM",
                period
            ))
        })?;
        Self::new(start_date.year(), start_date.month())
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(DreError::InvalidMonth(month));
    }
    Ok(())
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DreError::InvalidInput(format!("year {} is out of range", year)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    validate_month(month)?;
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 {
        year.checked_add(1)
    } else {
        Some(year)
    };

    next_year
        .and_then(|y| NaiveDate::from_ymd_opt(y, next_month, 1))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| DreError::InvalidInput(format!("year {} is out of range", year)))
}

/// `[first day, last day]` of the month, both inclusive.
pub fn month_window(year: i32, month: u32) -> Result<DateWindow> {
    Ok(DateWindow {
        start: first_day_of_month(year, month)?,
        end: last_day_of_month(year, month)?,
    })
}

/// January 1st through December 31st of `year`.
pub fn year_window(year: i32) -> Result<DateWindow> {
    Ok(DateWindow {
        start: first_day_of_month(year, 1)?,
        end: last_day_of_month(year, 12)?,
    })
}

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Renders a value with exactly two fractional digits, e.g. `3000` -> `"3000.00"`.
pub fn format_money(value: Decimal) -> String {
    let mut rounded = round_money(value);
    rounded.rescale(MONEY_DECIMAL_PLACES);
    rounded.to_string()
}
