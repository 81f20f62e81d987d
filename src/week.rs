// Reporting-week resolution.
//
// Offices close their payroll week on different weekdays. Each date is shifted
// so the office's closing day lands on an ISO Sunday, then numbered with the
// ISO 8601 rules. Offices covering the same 7-day span share a week number.
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An ISO (year, week) pair. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportingWeek {
    pub year: i32,
    pub week: u32,
}

impl ReportingWeek {
    /// The ISO Sunday closing this week.
    pub fn week_ending(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Sun)
    }
}

impl fmt::Display for ReportingWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// The weekday an office's payroll week ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekEnding(pub Weekday);

impl WeekEnding {
    pub const SUNDAY: WeekEnding = WeekEnding(Weekday::Sun);
    pub const SATURDAY: WeekEnding = WeekEnding(Weekday::Sat);

    /// Days to add so this office's closing day falls on a Sunday.
    pub fn shift_days(&self) -> u64 {
        6 - u64::from(self.0.num_days_from_monday())
    }
}

impl Default for WeekEnding {
    fn default() -> Self {
        WeekEnding::SUNDAY
    }
}

impl FromStr for WeekEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let day = trimmed
            .strip_suffix("-ending")
            .or_else(|| trimmed.strip_suffix("-Ending"))
            .unwrap_or(trimmed);
        day.parse::<Weekday>()
            .map(WeekEnding)
            .map_err(|_| format!("unknown week-ending day `{}`", s))
    }
}

impl TryFrom<String> for WeekEnding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeekEnding> for String {
    fn from(value: WeekEnding) -> Self {
        match value.0 {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
        .to_string()
    }
}

/// Resolve the reporting week for `date` under an office's week-ending convention.
pub fn resolve(date: NaiveDate, ending: WeekEnding) -> ReportingWeek {
    let shifted = date
        .checked_add_days(Days::new(ending.shift_days()))
        .unwrap_or(date);
    let iso = shifted.iso_week();
    ReportingWeek {
        year: iso.year(),
        week: iso.week(),
    }
}

/// The last `weeks` payroll weeks, closing on the most recent Sunday.
///
/// A Sunday `today` closes its own week.
pub fn payroll_window(today: NaiveDate, weeks: u32) -> (NaiveDate, NaiveDate) {
    let weeks = u64::from(weeks.max(1));
    let since_sunday = u64::from(today.weekday().num_days_from_sunday());
    let last_sunday = today.checked_sub_days(Days::new(since_sunday)).unwrap_or(today);
    let start = last_sunday
        .checked_sub_days(Days::new((weeks - 1) * 7 + 6))
        .unwrap_or(last_sunday);
    (start, last_sunday)
}

pub fn year_window(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn wk(year: i32, week: u32) -> ReportingWeek {
        ReportingWeek { year, week }
    }

    #[test]
    fn year_boundaries_follow_iso_years() {
        assert_eq!(resolve(d(2024, 12, 30), WeekEnding::SUNDAY), wk(2025, 1));
        assert_eq!(resolve(d(2023, 1, 1), WeekEnding::SUNDAY), wk(2022, 52));
        // 2020 is a 53-week ISO year.
        assert_eq!(resolve(d(2021, 1, 3), WeekEnding::SUNDAY), wk(2020, 53));
        assert_eq!(resolve(d(2021, 1, 4), WeekEnding::SUNDAY), wk(2021, 1));
    }

    #[test]
    fn saturday_offices_close_one_day_early() {
        // Sunday 2024-06-02 opens the Saturday office's week ending 2024-06-08.
        for day in 2..=8 {
            assert_eq!(resolve(d(2024, 6, day), WeekEnding::SATURDAY), wk(2024, 23));
        }
        assert_eq!(resolve(d(2024, 6, 9), WeekEnding::SATURDAY), wk(2024, 24));
        for day in 3..=9 {
            assert_eq!(resolve(d(2024, 6, day), WeekEnding::SUNDAY), wk(2024, 23));
        }
    }

    #[test]
    fn saturday_shift_crosses_iso_year() {
        // Saturday 2022-12-31 closes the last week of 2022; Sunday 2023-01-01 opens 2023-W01.
        assert_eq!(resolve(d(2022, 12, 31), WeekEnding::SATURDAY), wk(2022, 52));
        assert_eq!(resolve(d(2023, 1, 1), WeekEnding::SATURDAY), wk(2023, 1));
    }

    #[test]
    fn week_ending_parses_names_and_conventions() {
        assert_eq!("Saturday".parse::<WeekEnding>(), Ok(WeekEnding::SATURDAY));
        assert_eq!("sun".parse::<WeekEnding>(), Ok(WeekEnding::SUNDAY));
        assert_eq!("Saturday-ending".parse::<WeekEnding>(), Ok(WeekEnding::SATURDAY));
        assert!("Caturday".parse::<WeekEnding>().is_err());
        assert_eq!(WeekEnding::SUNDAY.shift_days(), 0);
        assert_eq!(WeekEnding::SATURDAY.shift_days(), 1);
        assert_eq!(WeekEnding(Weekday::Fri).shift_days(), 2);
    }

    #[test]
    fn week_ending_date_is_the_iso_sunday() {
        assert_eq!(wk(2024, 23).week_ending(), Some(d(2024, 6, 9)));
        assert_eq!(wk(2025, 1).week_ending(), Some(d(2025, 1, 5)));
        assert_eq!(wk(2023, 53).week_ending(), None);
        assert_eq!(wk(2024, 1).to_string(), "2024-W01");
    }

    #[test]
    fn payroll_window_ends_on_last_sunday() {
        // Wednesday 2024-06-12 -> last Sunday 2024-06-09.
        assert_eq!(payroll_window(d(2024, 6, 12), 1), (d(2024, 6, 3), d(2024, 6, 9)));
        assert_eq!(payroll_window(d(2024, 6, 12), 4), (d(2024, 5, 13), d(2024, 6, 9)));
        assert_eq!(payroll_window(d(2024, 6, 9), 1), (d(2024, 6, 3), d(2024, 6, 9)));
        assert_eq!(payroll_window(d(2024, 6, 12), 0), (d(2024, 6, 3), d(2024, 6, 9)));
    }

    #[test]
    fn year_window_covers_calendar_year() {
        assert_eq!(year_window(2025), Some((d(2025, 1, 1), d(2025, 12, 31))));
    }
}
