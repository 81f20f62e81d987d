// Compliance KPI aggregation.
//
// A single pass over already-filtered entries, bucketed by the requested
// dimension. Every rate keeps its integer numerator and denominator so that
// re-aggregation and threshold checks never go through rounded percentages.
use crate::config::DashboardConfig;
use crate::errors::{KpiError, Result};
use crate::types::{EntryType, TimeEntry};
use crate::week::{self, ReportingWeek};
use once_cell::sync::Lazy;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// An exact `matched / total` ratio. `total == 0` means "no data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rate {
    pub matched: u64,
    pub total: u64,
}

impl Rate {
    pub fn new(matched: u64, total: u64) -> Self {
        Rate { matched, total }
    }

    pub fn value(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.matched as f64 / self.total as f64)
        }
    }

    /// Roll two rates up by their counts.
    pub fn combine(self, other: Rate) -> Rate {
        Rate {
            matched: self.matched + other.matched,
            total: self.total + other.total,
        }
    }

    /// Compare the rate with `basis_points / 10_000` without leaving integers.
    pub fn cmp_basis_points(&self, basis_points: u64) -> Option<Ordering> {
        if self.total == 0 {
            return None;
        }
        let lhs = u128::from(self.matched) * 10_000;
        let rhs = u128::from(basis_points) * u128::from(self.total);
        Some(lhs.cmp(&rhs))
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Rate", 3)?;
        s.serialize_field("matched", &self.matched)?;
        s.serialize_field("total", &self.total)?;
        s.serialize_field("value", &self.value())?;
        s.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FingerRate,
    ProvisionalRate,
    WriteInRate,
    MissingClockOutRate,
    NonFingerRate,
    EnrollmentRate,
    MultiAttemptRate,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::FingerRate,
        Metric::ProvisionalRate,
        Metric::WriteInRate,
        Metric::MissingClockOutRate,
        Metric::NonFingerRate,
        Metric::EnrollmentRate,
        Metric::MultiAttemptRate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::FingerRate => "Finger",
            Metric::ProvisionalRate => "Provisional",
            Metric::WriteInRate => "Write-In",
            Metric::MissingClockOutRate => "Missing C/O",
            Metric::NonFingerRate => "Non-Finger",
            Metric::EnrollmentRate => "Enrollment",
            Metric::MultiAttemptRate => "Multi-Attempt",
        }
    }

    pub fn higher_is_better(self) -> bool {
        matches!(self, Metric::FingerRate | Metric::EnrollmentRate)
    }

    pub fn rate(self, record: &KpiRecord) -> Rate {
        match self {
            Metric::FingerRate => record.finger_rate(),
            Metric::ProvisionalRate => record.provisional_rate(),
            Metric::WriteInRate => record.write_in_rate(),
            Metric::MissingClockOutRate => record.missing_clock_out_rate(),
            Metric::NonFingerRate => record.non_finger_rate(),
            Metric::EnrollmentRate => record.enrollment_rate(),
            Metric::MultiAttemptRate => record.multi_attempt_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Good,
    Warning,
    Critical,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Good => "Good",
            Status::Warning => "Warning",
            Status::Critical => "Critical",
        }
    }
}

/// Percent cutoffs for one metric. For higher-is-better metrics a rate at or
/// above `good` is good; for the others a rate at or below `good` is.
/// Cutoffs carry at most two decimal places (whole basis points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub good: f64,
    pub warning: f64,
}

impl Cutoffs {
    const fn new(good: f64, warning: f64) -> Self {
        Cutoffs { good, warning }
    }

    fn basis_points(percent: f64) -> u64 {
        (percent * 100.0).round() as u64
    }

    fn is_whole_basis_points(percent: f64) -> bool {
        let scaled = percent * 100.0;
        (scaled - scaled.round()).abs() < 1e-6
    }
}

static DEFAULT_CUTOFFS: Lazy<BTreeMap<Metric, Cutoffs>> = Lazy::new(|| {
    BTreeMap::from([
        (Metric::FingerRate, Cutoffs::new(95.0, 90.0)),
        (Metric::ProvisionalRate, Cutoffs::new(2.0, 5.0)),
        (Metric::WriteInRate, Cutoffs::new(1.0, 3.0)),
        (Metric::MissingClockOutRate, Cutoffs::new(2.0, 5.0)),
        (Metric::NonFingerRate, Cutoffs::new(5.0, 10.0)),
        (Metric::EnrollmentRate, Cutoffs::new(98.0, 95.0)),
        (Metric::MultiAttemptRate, Cutoffs::new(10.0, 20.0)),
    ])
});

/// Threshold table used to classify rates. Built per call from the defaults
/// plus any configured overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    cutoffs: BTreeMap<Metric, Cutoffs>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            cutoffs: DEFAULT_CUTOFFS.clone(),
        }
    }
}

impl Thresholds {
    pub fn with_overrides(overrides: &BTreeMap<Metric, Cutoffs>) -> Result<Self> {
        let mut thresholds = Thresholds::default();
        for (metric, cutoffs) in overrides {
            let in_range = |v: f64| (0.0..=100.0).contains(&v);
            if !in_range(cutoffs.good) || !in_range(cutoffs.warning) {
                return Err(KpiError::Config(format!(
                    "{} cutoffs must be percentages between 0 and 100",
                    metric.label()
                )));
            }
            if !Cutoffs::is_whole_basis_points(cutoffs.good) || !Cutoffs::is_whole_basis_points(cutoffs.warning) {
                return Err(KpiError::Config(format!(
                    "{} cutoffs allow at most two decimal places",
                    metric.label()
                )));
            }
            let ordered = if metric.higher_is_better() {
                cutoffs.good >= cutoffs.warning
            } else {
                cutoffs.good <= cutoffs.warning
            };
            if !ordered {
                return Err(KpiError::Config(format!(
                    "{} good cutoff {} is on the wrong side of warning cutoff {}",
                    metric.label(),
                    cutoffs.good,
                    cutoffs.warning
                )));
            }
            thresholds.cutoffs.insert(*metric, *cutoffs);
        }
        Ok(thresholds)
    }

    pub fn get(&self, metric: Metric) -> Option<&Cutoffs> {
        self.cutoffs.get(&metric)
    }

    /// `None` when the rate has no data or the metric has no cutoffs.
    pub fn classify(&self, metric: Metric, rate: Rate) -> Option<Status> {
        let cutoffs = self.cutoffs.get(&metric)?;
        let vs_good = rate.cmp_basis_points(Cutoffs::basis_points(cutoffs.good))?;
        let vs_warning = rate.cmp_basis_points(Cutoffs::basis_points(cutoffs.warning))?;
        let status = if metric.higher_is_better() {
            if vs_good != Ordering::Less {
                Status::Good
            } else if vs_warning != Ordering::Less {
                Status::Warning
            } else {
                Status::Critical
            }
        } else if vs_good != Ordering::Greater {
            Status::Good
        } else if vs_warning != Ordering::Greater {
            Status::Warning
        } else {
            Status::Critical
        };
        Some(status)
    }
}

/// The dimension a KPI request buckets entries by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    None,
    Office,
    Week,
    Department,
    Shift,
    Employee,
}

impl FromStr for GroupBy {
    type Err = KpiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(GroupBy::None),
            "office" => Ok(GroupBy::Office),
            "week" => Ok(GroupBy::Week),
            "department" => Ok(GroupBy::Department),
            "shift" => Ok(GroupBy::Shift),
            "employee" => Ok(GroupBy::Employee),
            other => Err(KpiError::invalid(format!("unknown group-by `{}`", other))),
        }
    }
}

/// Whether weeks are kept apart per office or merged across offices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekView {
    #[default]
    PerOffice,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KpiRequest {
    pub group_by: GroupBy,
    pub week_view: WeekView,
}

impl KpiRequest {
    pub fn new(group_by: GroupBy) -> Self {
        KpiRequest {
            group_by,
            week_view: WeekView::PerOffice,
        }
    }

    pub fn merged_weeks(mut self) -> Self {
        self.week_view = WeekView::Merged;
        self
    }
}

/// Bucket identifier. Derived ordering puts weeks chronologically first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    All,
    Office { office: String },
    Week { week: ReportingWeek, office: Option<String> },
    Department { department: String },
    Shift { shift: String },
    Employee { name: String, id: String },
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::All => f.write_str("All"),
            GroupKey::Office { office } => f.write_str(office),
            GroupKey::Week { week, office: Some(office) } => write!(f, "{} {}", week, office),
            GroupKey::Week { week, office: None } => write!(f, "{}", week),
            GroupKey::Department { department } => f.write_str(department),
            GroupKey::Shift { shift } => f.write_str(shift),
            GroupKey::Employee { name, id } => write!(f, "{} ({})", name, id),
        }
    }
}

/// Counts for one bucket. Rates are derived from these on demand.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KpiRecord {
    pub entries: u64,
    pub finger: u64,
    pub provisional: u64,
    pub write_in: u64,
    pub missing_clock_out: u64,
    pub other: u64,
    pub employees: u64,
    pub enrolled_employees: u64,
    pub offices: u64,
    pub departments: u64,
    pub shifts: u64,
    pub weeks_observed: u64,
    pub undated: u64,
    pub multi_attempt: u64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub total_hours: f64,
}

impl KpiRecord {
    pub fn count(&self, entry_type: EntryType) -> u64 {
        match entry_type {
            EntryType::Finger => self.finger,
            EntryType::Provisional => self.provisional,
            EntryType::WriteIn => self.write_in,
            EntryType::MissingClockOut => self.missing_clock_out,
            EntryType::Other => self.other,
        }
    }

    pub fn finger_rate(&self) -> Rate {
        Rate::new(self.finger, self.entries)
    }

    pub fn provisional_rate(&self) -> Rate {
        Rate::new(self.provisional, self.entries)
    }

    pub fn write_in_rate(&self) -> Rate {
        Rate::new(self.write_in, self.entries)
    }

    pub fn missing_clock_out_rate(&self) -> Rate {
        Rate::new(self.missing_clock_out, self.entries)
    }

    pub fn non_finger_rate(&self) -> Rate {
        Rate::new(self.entries - self.finger, self.entries)
    }

    pub fn multi_attempt_rate(&self) -> Rate {
        Rate::new(self.multi_attempt, self.entries)
    }

    /// Share of employees with at least one finger scan in the window.
    pub fn enrollment_rate(&self) -> Rate {
        Rate::new(self.enrolled_employees, self.employees)
    }

    pub fn not_enrolled_employees(&self) -> u64 {
        self.employees - self.enrolled_employees
    }

    pub fn hours_per_entry(&self) -> Option<f64> {
        if self.entries == 0 {
            None
        } else {
            Some(self.total_hours / self.entries as f64)
        }
    }
}

#[derive(Default)]
struct Acc<'a> {
    record: KpiRecord,
    employees: HashSet<&'a str>,
    enrolled: HashSet<&'a str>,
    offices: HashSet<&'a str>,
    departments: HashSet<&'a str>,
    shifts: HashSet<&'a str>,
    weeks: HashSet<(Option<&'a str>, ReportingWeek)>,
}

impl<'a> Acc<'a> {
    fn add(&mut self, entry: &'a TimeEntry, week: Option<ReportingWeek>, view: WeekView) {
        let r = &mut self.record;
        r.entries += 1;
        match entry.entry_type {
            EntryType::Finger => r.finger += 1,
            EntryType::Provisional => r.provisional += 1,
            EntryType::WriteIn => r.write_in += 1,
            EntryType::MissingClockOut => r.missing_clock_out += 1,
            EntryType::Other => r.other += 1,
        }
        if entry.needed_retries() {
            r.multi_attempt += 1;
        }
        r.regular_hours += entry.regular_hours;
        r.overtime_hours += entry.overtime_hours;
        r.total_hours += entry.total_hours();

        self.employees.insert(&entry.employee_id);
        if entry.entry_type == EntryType::Finger {
            self.enrolled.insert(&entry.employee_id);
        }
        self.offices.insert(&entry.office);
        self.departments.insert(&entry.department);
        self.shifts.insert(&entry.shift);
        match week {
            Some(week) => {
                let office = match view {
                    WeekView::PerOffice => Some(entry.office.as_str()),
                    WeekView::Merged => None,
                };
                self.weeks.insert((office, week));
            }
            None => r.undated += 1,
        }
    }

    fn finish(self) -> KpiRecord {
        let mut record = self.record;
        record.employees = self.employees.len() as u64;
        record.enrolled_employees = self.enrolled.len() as u64;
        record.offices = self.offices.len() as u64;
        record.departments = self.departments.len() as u64;
        record.shifts = self.shifts.len() as u64;
        record.weeks_observed = self.weeks.len() as u64;
        record
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiResult {
    pub request: KpiRequest,
    pub groups: BTreeMap<GroupKey, KpiRecord>,
    /// Entries left out of a week grouping because they carry no usable date.
    pub excluded_undated: u64,
}

#[derive(Serialize)]
struct KpiRow<'a> {
    key: &'a GroupKey,
    label: String,
    metrics: &'a KpiRecord,
    status: BTreeMap<Metric, Option<Status>>,
}

impl KpiResult {
    pub fn get(&self, key: &GroupKey) -> Option<&KpiRecord> {
        self.groups.get(key)
    }

    /// JSON rendering for API consumers, statuses classified with `thresholds`.
    pub fn to_json(&self, thresholds: &Thresholds) -> serde_json::Value {
        let rows: Vec<KpiRow<'_>> = self
            .groups
            .iter()
            .map(|(key, record)| KpiRow {
                key,
                label: key.to_string(),
                metrics: record,
                status: Metric::ALL
                    .iter()
                    .map(|m| (*m, thresholds.classify(*m, m.rate(record))))
                    .collect(),
            })
            .collect();
        serde_json::json!({
            "group_by": self.request.group_by,
            "week_view": self.request.week_view,
            "excluded_undated": self.excluded_undated,
            "groups": rows,
        })
    }
}

fn group_key(
    group_by: GroupBy,
    entry: &TimeEntry,
    week: Option<ReportingWeek>,
    view: WeekView,
) -> Option<GroupKey> {
    match group_by {
        GroupBy::None => Some(GroupKey::All),
        GroupBy::Office => Some(GroupKey::Office {
            office: entry.office.clone(),
        }),
        GroupBy::Week => week.map(|week| GroupKey::Week {
            week,
            office: match view {
                WeekView::PerOffice => Some(entry.office.clone()),
                WeekView::Merged => None,
            },
        }),
        GroupBy::Department => Some(GroupKey::Department {
            department: entry.department.clone(),
        }),
        GroupBy::Shift => Some(GroupKey::Shift {
            shift: entry.shift.clone(),
        }),
        GroupBy::Employee => Some(GroupKey::Employee {
            name: entry.employee_name.clone(),
            id: entry.employee_id.clone(),
        }),
    }
}

/// Aggregate `entries` into one `KpiRecord` per bucket of `request.group_by`.
///
/// `GroupBy::None` always yields a single `All` bucket, even for no entries.
pub fn compute_kpis<'a, I>(entries: I, request: &KpiRequest, config: &DashboardConfig) -> KpiResult
where
    I: IntoIterator<Item = &'a TimeEntry>,
{
    let mut groups: BTreeMap<GroupKey, Acc<'a>> = BTreeMap::new();
    if request.group_by == GroupBy::None {
        groups.insert(GroupKey::All, Acc::default());
    }
    let mut excluded_undated = 0u64;

    for entry in entries {
        let week = entry
            .date
            .map(|date| week::resolve(date, config.week_ending_for(&entry.office)));
        let Some(key) = group_key(request.group_by, entry, week, request.week_view) else {
            excluded_undated += 1;
            continue;
        };
        groups
            .entry(key)
            .or_default()
            .add(entry, week, request.week_view);
    }

    KpiResult {
        request: *request,
        groups: groups.into_iter().map(|(k, acc)| (k, acc.finish())).collect(),
        excluded_undated,
    }
}
