use crate::config::DashboardConfig;
use crate::kpi::{compute_kpis, GroupBy, GroupKey, KpiRecord, KpiRequest, KpiResult, Metric, Status, Thresholds, WeekView};
use crate::types::TimeEntry;
use crate::util::{format_number, format_percent};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Bumped whenever a sheet name or header label changes.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSet {
    Overview,
    Compliance,
    EntryCounts,
    Enrollment,
    Hours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetSpec {
    pub name: &'static str,
    pub group_by: GroupBy,
    pub week_view: WeekView,
    pub metrics: MetricSet,
}

const fn sheet(name: &'static str, group_by: GroupBy, week_view: WeekView, metrics: MetricSet) -> SheetSpec {
    SheetSpec {
        name,
        group_by,
        week_view,
        metrics,
    }
}

/// Sheets of the exported workbook, in order.
pub const MANIFEST: &[SheetSpec] = &[
    sheet("Summary", GroupBy::None, WeekView::PerOffice, MetricSet::Overview),
    sheet("Office Compliance", GroupBy::Office, WeekView::PerOffice, MetricSet::Compliance),
    sheet("Office Entry Counts", GroupBy::Office, WeekView::PerOffice, MetricSet::EntryCounts),
    sheet("Office Enrollment", GroupBy::Office, WeekView::PerOffice, MetricSet::Enrollment),
    sheet("Office Hours", GroupBy::Office, WeekView::PerOffice, MetricSet::Hours),
    sheet("Weekly Compliance", GroupBy::Week, WeekView::PerOffice, MetricSet::Compliance),
    sheet("Weekly Entry Counts", GroupBy::Week, WeekView::PerOffice, MetricSet::EntryCounts),
    sheet("Combined Weekly Compliance", GroupBy::Week, WeekView::Merged, MetricSet::Compliance),
    sheet("Combined Weekly Counts", GroupBy::Week, WeekView::Merged, MetricSet::EntryCounts),
    sheet("Department Compliance", GroupBy::Department, WeekView::PerOffice, MetricSet::Compliance),
    sheet("Department Entry Counts", GroupBy::Department, WeekView::PerOffice, MetricSet::EntryCounts),
    sheet("Shift Compliance", GroupBy::Shift, WeekView::PerOffice, MetricSet::Compliance),
    sheet("Shift Entry Counts", GroupBy::Shift, WeekView::PerOffice, MetricSet::EntryCounts),
    sheet("Employee Compliance", GroupBy::Employee, WeekView::PerOffice, MetricSet::Compliance),
    sheet("Employee Enrollment", GroupBy::Employee, WeekView::PerOffice, MetricSet::Enrollment),
    sheet("Employee Hours", GroupBy::Employee, WeekView::PerOffice, MetricSet::Hours),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Count(u64),
    Number(f64),
    /// A fraction in `[0, 1]`; `None` is "no data".
    Percent(Option<f64>),
    Status(Option<Status>),
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Count(n) => n.to_string(),
            Cell::Number(n) => format_number(*n, 2),
            Cell::Percent(p) => format_percent(*p),
            Cell::Status(Some(s)) => s.label().to_string(),
            Cell::Status(None) => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Rendered string grid, header first.
    pub fn to_records(&self) -> Vec<Vec<String>> {
        let mut records = vec![self.headers.clone()];
        records.extend(self.rows.iter().map(|row| row.iter().map(Cell::render).collect()));
        records
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub sheets: Vec<Sheet>,
}

fn key_headers(group_by: GroupBy, view: WeekView) -> Vec<&'static str> {
    match (group_by, view) {
        (GroupBy::None, _) => vec!["Scope"],
        (GroupBy::Office, _) => vec!["Office"],
        (GroupBy::Week, WeekView::PerOffice) => vec!["Week Year", "Week", "Week Ending", "Office"],
        (GroupBy::Week, WeekView::Merged) => vec!["Week Year", "Week", "Week Ending"],
        (GroupBy::Department, _) => vec!["Department"],
        (GroupBy::Shift, _) => vec!["Shift"],
        (GroupBy::Employee, _) => vec!["Employee ID", "Employee"],
    }
}

fn key_cells(key: &GroupKey, config: &DashboardConfig) -> Vec<Cell> {
    match key {
        GroupKey::All => vec![Cell::Text("All".to_string())],
        GroupKey::Office { office } => vec![Cell::Text(config.display_name(office).to_string())],
        GroupKey::Week { week, office } => {
            let mut cells = vec![
                Cell::Count(u64::try_from(week.year).unwrap_or_default()),
                Cell::Count(u64::from(week.week)),
                Cell::Text(week.week_ending().map(|d| d.to_string()).unwrap_or_default()),
            ];
            if let Some(office) = office {
                cells.push(Cell::Text(config.display_name(office).to_string()));
            }
            cells
        }
        GroupKey::Department { department } => vec![Cell::Text(department.clone())],
        GroupKey::Shift { shift } => vec![Cell::Text(shift.clone())],
        GroupKey::Employee { name, id } => vec![Cell::Text(id.clone()), Cell::Text(name.clone())],
    }
}

fn fixed(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|s| s.to_string()).collect()
}

fn metric_headers(set: MetricSet) -> Vec<String> {
    let pct = |m: Metric| format!("{} %", m.label());
    let status = |m: Metric| format!("{} Status", m.label());
    match set {
        MetricSet::Overview => {
            let mut h = fixed(&["Entries", "Employees", "Offices", "Departments", "Shifts", "Weeks Observed"]);
            h.extend([
                pct(Metric::FingerRate),
                status(Metric::FingerRate),
                pct(Metric::NonFingerRate),
                pct(Metric::EnrollmentRate),
                status(Metric::EnrollmentRate),
                "Undated".to_string(),
            ]);
            h
        }
        MetricSet::Compliance => {
            let mut h = fixed(&["Entries"]);
            for m in [
                Metric::FingerRate,
                Metric::ProvisionalRate,
                Metric::WriteInRate,
                Metric::MissingClockOutRate,
            ] {
                h.push(pct(m));
                h.push(status(m));
            }
            h.push(pct(Metric::NonFingerRate));
            h
        }
        MetricSet::EntryCounts => {
            let mut h = fixed(&["Entries", "Finger", "Provisional", "Write-In", "Missing C/O", "Other", "Multi-Attempt"]);
            h.push(pct(Metric::MultiAttemptRate));
            h.push(status(Metric::MultiAttemptRate));
            h
        }
        MetricSet::Enrollment => {
            let mut h = fixed(&["Employees", "Enrolled", "Not Enrolled"]);
            h.push(pct(Metric::EnrollmentRate));
            h.push(status(Metric::EnrollmentRate));
            h
        }
        MetricSet::Hours => fixed(&["Entries", "Regular Hours", "Overtime Hours", "Total Hours", "Hours / Entry"]),
    }
}

fn metric_cells(set: MetricSet, r: &KpiRecord, thresholds: &Thresholds) -> Vec<Cell> {
    let pct = |m: Metric| Cell::Percent(m.rate(r).value());
    let status = |m: Metric| Cell::Status(thresholds.classify(m, m.rate(r)));
    match set {
        MetricSet::Overview => vec![
            Cell::Count(r.entries),
            Cell::Count(r.employees),
            Cell::Count(r.offices),
            Cell::Count(r.departments),
            Cell::Count(r.shifts),
            Cell::Count(r.weeks_observed),
            pct(Metric::FingerRate),
            status(Metric::FingerRate),
            pct(Metric::NonFingerRate),
            pct(Metric::EnrollmentRate),
            status(Metric::EnrollmentRate),
            Cell::Count(r.undated),
        ],
        MetricSet::Compliance => {
            let mut cells = vec![Cell::Count(r.entries)];
            for m in [
                Metric::FingerRate,
                Metric::ProvisionalRate,
                Metric::WriteInRate,
                Metric::MissingClockOutRate,
            ] {
                cells.push(pct(m));
                cells.push(status(m));
            }
            cells.push(pct(Metric::NonFingerRate));
            cells
        }
        MetricSet::EntryCounts => vec![
            Cell::Count(r.entries),
            Cell::Count(r.finger),
            Cell::Count(r.provisional),
            Cell::Count(r.write_in),
            Cell::Count(r.missing_clock_out),
            Cell::Count(r.other),
            Cell::Count(r.multi_attempt),
            pct(Metric::MultiAttemptRate),
            status(Metric::MultiAttemptRate),
        ],
        MetricSet::Enrollment => vec![
            Cell::Count(r.employees),
            Cell::Count(r.enrolled_employees),
            Cell::Count(r.not_enrolled_employees()),
            pct(Metric::EnrollmentRate),
            status(Metric::EnrollmentRate),
        ],
        MetricSet::Hours => vec![
            Cell::Count(r.entries),
            Cell::Number(r.regular_hours),
            Cell::Number(r.overtime_hours),
            Cell::Number(r.total_hours),
            r.hours_per_entry().map(Cell::Number).unwrap_or(Cell::Text("N/A".to_string())),
        ],
    }
}

/// Position in a configured priority list; unlisted values sort after it.
fn priority(list: &[String], value: &str) -> usize {
    list.iter()
        .position(|p| p.eq_ignore_ascii_case(value))
        .unwrap_or(list.len())
}

/// Case-insensitive name order, ties broken by the raw name.
fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Groups in presentation order: offices by display name, weeks
/// chronologically, departments and shifts by priority then name.
pub fn ordered_groups<'a>(result: &'a KpiResult, config: &DashboardConfig) -> Vec<(&'a GroupKey, &'a KpiRecord)> {
    let mut rows: Vec<(&GroupKey, &KpiRecord)> = result.groups.iter().collect();
    rows.sort_by(|(a, _), (b, _)| match (a, b) {
        (GroupKey::Office { office: x }, GroupKey::Office { office: y }) => {
            by_name(config.display_name(x), config.display_name(y)).then_with(|| x.cmp(y))
        }
        (GroupKey::Week { week: wx, office: ox }, GroupKey::Week { week: wy, office: oy }) => wx.cmp(wy).then_with(|| {
            match (ox.as_deref(), oy.as_deref()) {
                (Some(x), Some(y)) => by_name(config.display_name(x), config.display_name(y)),
                (x, y) => x.cmp(&y),
            }
            .then_with(|| ox.cmp(oy))
        }),
        (GroupKey::Department { department: x }, GroupKey::Department { department: y }) => {
            let p = &config.department_priority;
            priority(p, x).cmp(&priority(p, y)).then_with(|| by_name(x, y))
        }
        (GroupKey::Shift { shift: x }, GroupKey::Shift { shift: y }) => {
            let p = &config.shift_priority;
            priority(p, x).cmp(&priority(p, y)).then_with(|| by_name(x, y))
        }
        _ => a.cmp(b),
    });
    rows
}

/// Build one sheet from one KPI result. Every manifest entry goes through here.
pub fn build_sheet(spec: &SheetSpec, result: &KpiResult, config: &DashboardConfig, thresholds: &Thresholds) -> Sheet {
    let mut headers: Vec<String> = key_headers(spec.group_by, spec.week_view)
        .into_iter()
        .map(str::to_string)
        .collect();
    headers.extend(metric_headers(spec.metrics));

    let rows = ordered_groups(result, config)
        .into_iter()
        .map(|(key, record)| {
            let mut row = key_cells(key, config);
            row.extend(metric_cells(spec.metrics, record, thresholds));
            row
        })
        .collect();

    Sheet {
        name: spec.name.to_string(),
        headers,
        rows,
    }
}

/// Run every manifest entry over `entries`. Each distinct grouping is
/// computed once per call.
pub fn generate_report(entries: &[&TimeEntry], config: &DashboardConfig, thresholds: &Thresholds) -> Report {
    let mut results: BTreeMap<(GroupBy, WeekView), KpiResult> = BTreeMap::new();
    let sheets = MANIFEST
        .iter()
        .map(|spec| {
            let result = results.entry((spec.group_by, spec.week_view)).or_insert_with(|| {
                let request = KpiRequest {
                    group_by: spec.group_by,
                    week_view: spec.week_view,
                };
                compute_kpis(entries.iter().copied(), &request, config)
            });
            build_sheet(spec, result, config, thresholds)
        })
        .collect();
    Report { sheets }
}
