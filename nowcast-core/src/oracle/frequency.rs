//! Period arithmetic for forecast timestamps.
//!
//! The oracle labels forecast steps with period-end dates: step `h` is the
//! `h`-th period end strictly after the last training timestamp. For series
//! stamped at period starts that label is one day before the next period
//! start, which is why the runner shifts it by a day.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sampling frequency of the target series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Quarterly,
    Monthly,
}

impl Frequency {
    /// Short alias as understood by the external bridge.
    pub fn alias(self) -> &'static str {
        match self {
            Frequency::Quarterly => "Q",
            Frequency::Monthly => "M",
        }
    }

    fn months(self) -> u32 {
        match self {
            Frequency::Quarterly => 3,
            Frequency::Monthly => 1,
        }
    }

    /// First period end strictly after `date`.
    pub fn next_period_end(self, date: NaiveDate) -> NaiveDate {
        let end = self.period_end_containing(date);
        if end > date {
            end
        } else {
            let next_start = end + Days::new(1);
            self.period_end_containing(next_start)
        }
    }

    /// Labels for `horizon` steps after `last`.
    pub fn forecast_labels(self, last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
        let mut labels = Vec::with_capacity(horizon);
        let mut cursor = last;
        for _ in 0..horizon {
            cursor = self.next_period_end(cursor);
            labels.push(cursor);
        }
        labels
    }

    fn period_end_containing(self, date: NaiveDate) -> NaiveDate {
        let span = self.months();
        let last_month = ((date.month() - 1) / span + 1) * span;
        last_day_of_month(date.year(), last_month)
    }
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
