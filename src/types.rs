use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// One row of a payroll/biometric extract as exported by the time system.
///
/// Every column is optional: the loader decides what is required.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "ApplicantID")]
    pub applicant_id: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name: Option<String>,
    #[serde(rename = "OfcName")]
    pub office: Option<String>,
    #[serde(rename = "BUDeptName")]
    pub department: Option<String>,
    #[serde(rename = "ShiftNumber")]
    pub shift: Option<String>,
    #[serde(rename = "WorkDate")]
    pub work_date: Option<String>,
    #[serde(rename = "dtTimeStart")]
    pub time_start: Option<String>,
    #[serde(rename = "dtTimeEnd")]
    pub time_end: Option<String>,
    #[serde(rename = "ClockIn_Method")]
    pub clock_in_method: Option<String>,
    #[serde(rename = "ClockOut_Method")]
    pub clock_out_method: Option<String>,
    #[serde(rename = "EntryType")]
    pub entry_type: Option<String>,
    #[serde(rename = "RegHours")]
    pub regular_hours: Option<String>,
    #[serde(rename = "OTHours")]
    pub overtime_hours: Option<String>,
    #[serde(rename = "DTHours")]
    pub double_time_hours: Option<String>,
    #[serde(rename = "HolWrkHours")]
    pub holiday_hours: Option<String>,
    #[serde(rename = "ClockIn_Tries")]
    pub clock_in_tries: Option<String>,
    #[serde(rename = "ClockOut_Tries")]
    pub clock_out_tries: Option<String>,
    #[serde(rename = "Allocation_Method")]
    pub allocation_method: Option<String>,
}

/// How a time entry was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryType {
    Finger,
    Provisional,
    WriteIn,
    MissingClockOut,
    Other,
}

impl EntryType {
    /// Label used by the time system and in exported sheets.
    pub fn label(self) -> &'static str {
        match self {
            EntryType::Finger => "Finger",
            EntryType::Provisional => "Provisional Entry",
            EntryType::WriteIn => "Write-In",
            EntryType::MissingClockOut => "Missing c/o",
            EntryType::Other => "Other",
        }
    }

    /// Map an explicit entry-type label back to the enum. Unrecognised
    /// labels return `None` so the caller can fall back to clock methods.
    pub fn from_label(label: &str) -> Option<EntryType> {
        match label.trim().to_ascii_lowercase().as_str() {
            "finger" => Some(EntryType::Finger),
            "provisional entry" | "provisional" => Some(EntryType::Provisional),
            "write-in" | "write in" | "writein" => Some(EntryType::WriteIn),
            "missing c/o" | "missing clock-out" | "missing clock out" => {
                Some(EntryType::MissingClockOut)
            }
            _ => None,
        }
    }

    pub fn is_compliance_relevant(self) -> bool {
        self != EntryType::Other
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The canonical fact: one clock event or derived entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub office: String,
    /// `None` when the extract carried a missing or malformed work date.
    pub date: Option<NaiveDate>,
    pub shift: String,
    pub department: String,
    pub employee_id: String,
    pub employee_name: String,
    pub entry_type: EntryType,
    /// Label the entry type was derived from, e.g. `Time-Swap` for `Other`.
    pub entry_label: String,
    pub clock_in: Option<NaiveDateTime>,
    pub clock_out: Option<NaiveDateTime>,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub double_time_hours: f64,
    pub holiday_hours: f64,
    pub clock_in_tries: u32,
    pub clock_out_tries: u32,
}

impl TimeEntry {
    pub fn total_hours(&self) -> f64 {
        self.regular_hours + self.overtime_hours + self.double_time_hours + self.holiday_hours
    }

    pub fn needed_retries(&self) -> bool {
        self.clock_in_tries > 1 || self.clock_out_tries > 1
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ImportSummaryRow {
    #[serde(rename = "Stage")]
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "Rows")]
    #[tabled(rename = "Rows")]
    pub rows: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct EntrySampleRow {
    #[tabled(rename = "Office")]
    pub office: String,
    #[tabled(rename = "WorkDate")]
    pub work_date: String,
    #[tabled(rename = "Employee")]
    pub employee: String,
    #[tabled(rename = "EntryType")]
    pub entry_type: String,
}
