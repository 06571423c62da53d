use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::bmi::round2;
use crate::models::BmiRecord;

/// ReportPeriod
///
/// The window a trend report covers. Unknown or missing values fall back to `Daily`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ReportPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ReportPeriod {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("weekly") => ReportPeriod::Weekly,
            Some("monthly") => ReportPeriod::Monthly,
            Some("yearly") => ReportPeriod::Yearly,
            _ => ReportPeriod::Daily,
        }
    }

    /// window
    ///
    /// Inclusive `[start, end]` bounds in UTC for a report generated at `now`.
    /// Daily is the trailing seven days up to the end of today; the others are the calendar
    /// week (starting Sunday), month, and year containing `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let today = now.date_naive();
        let (first, next) = match self {
            ReportPeriod::Daily => {
                return (now - Duration::days(7), end_before(today + Duration::days(1)));
            }
            ReportPeriod::Weekly => {
                let first = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
                (first, first + Duration::days(7))
            }
            ReportPeriod::Monthly => {
                let first = first_of_month(today);
                (first, first_of_month(first + Duration::days(32)))
            }
            ReportPeriod::Yearly => {
                let first = first_of_year(today);
                (first, first_of_year(first + Duration::days(366)))
            }
        };
        (start_of(first), end_before(next))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.ordinal0() as i64)
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

// Last millisecond before `next` begins.
fn end_before(next: NaiveDate) -> DateTime<Utc> {
    start_of(next) - Duration::milliseconds(1)
}

/// TrendSummary
///
/// Aggregate view of the records in a report window. All BMI figures are rounded to two
/// decimals; they are `None` when the window is empty.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct TrendSummary {
    pub count: usize,
    pub average_bmi: Option<f64>,
    pub min_bmi: Option<f64>,
    pub max_bmi: Option<f64>,
    pub latest_bmi: Option<f64>,
    /// Latest minus earliest BMI in the window.
    pub change: Option<f64>,
}

impl TrendSummary {
    /// Builds the summary from records sorted oldest first.
    pub fn from_records(records: &[BmiRecord]) -> Self {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Self::default();
        };

        let sum: f64 = records.iter().map(|r| r.bmi).sum();
        let min = records.iter().map(|r| r.bmi).fold(f64::INFINITY, f64::min);
        let max = records.iter().map(|r| r.bmi).fold(f64::NEG_INFINITY, f64::max);

        Self {
            count: records.len(),
            average_bmi: Some(round2(sum / records.len() as f64)),
            min_bmi: Some(round2(min)),
            max_bmi: Some(round2(max)),
            latest_bmi: Some(round2(last.bmi)),
            change: Some(round2(last.bmi - first.bmi)),
        }
    }
}
