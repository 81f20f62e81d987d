use crate::config::DashboardConfig;
use crate::errors::Result;
use crate::types::{EntryType, RawRow, TimeEntry};
use crate::util::{clean_str, parse_date_safe, parse_datetime_safe, parse_f64_safe, parse_u32_safe};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const NOT_REQUIRED_TO_CLOCK: &str = "NOT_REQ_TO_CLOCK";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub parse_errors: usize,
    pub undated_rows: usize,
    pub not_required_to_clock: usize,
    pub excluded_other: usize,
    pub duplicates: usize,
    pub consolidated_offices: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Keep entries whose type is outside the four compliance types.
    pub keep_other: bool,
}

/// Derive an entry type from the clock-in / clock-out capture methods.
///
/// Returns the type and the label it was derived under. Rules are checked in
/// order; the first match wins.
pub fn derive_entry_type(clock_in: Option<&str>, clock_out: Option<&str>) -> (EntryType, &'static str) {
    let ci = clean_str(clock_in).map(|s| s.to_ascii_uppercase());
    let co = clean_str(clock_out).map(|s| s.to_ascii_uppercase());
    let ci = ci.as_deref();
    let co = co.as_deref();
    let either = |method: &str| ci == Some(method) || co == Some(method);

    match (ci, co) {
        (Some("FINGER"), Some("FINGER"))
        | (Some("FINGER"), Some("REASSIGN"))
        | (Some("REASSIGN"), Some("FINGER")) => return (EntryType::Finger, "Finger"),
        (None, None) => return (EntryType::WriteIn, "Write-In"),
        _ => {}
    }
    if either("EMPID") {
        return (EntryType::Provisional, "Provisional Entry");
    }
    if either("NO SUCCESSFUL FINGERPRINT") {
        return (EntryType::Other, "NO SUCCESSFUL FINGERPRINT");
    }
    if ci.is_none() {
        return (EntryType::Other, "Missing c/in");
    }
    if co.is_none() || co == Some("MISSING C/O MNGR SUPPLIED") {
        return (EntryType::MissingClockOut, "Missing c/o");
    }
    if either("SWAP") {
        return (EntryType::Other, "Time-Swap");
    }
    if either("RAW CLOCK PAIR SPLIT") {
        return (EntryType::Other, "Raw Clock Pair Split");
    }
    if either("WKEND RAW PAIR SPLT") {
        return (EntryType::Other, "Programming or Wk End Rw Pair Split");
    }
    if either("REASSIGN") {
        return (EntryType::Other, "Manager FTW Reassignment");
    }
    (EntryType::Other, "Programming Issue")
}

fn entry_type_for(row: &RawRow) -> (EntryType, String) {
    if let Some(label) = clean_str(row.entry_type.as_deref()) {
        return match EntryType::from_label(label) {
            Some(kind) => (kind, kind.label().to_string()),
            None => (EntryType::Other, label.to_string()),
        };
    }
    let (kind, label) = derive_entry_type(row.clock_in_method.as_deref(), row.clock_out_method.as_deref());
    (kind, label.to_string())
}

fn full_name(row: &RawRow, employee_id: &str) -> String {
    let last = clean_str(row.last_name.as_deref()).unwrap_or("");
    let first = clean_str(row.first_name.as_deref()).unwrap_or("");
    match (last.is_empty(), first.is_empty()) {
        (true, true) => employee_id.to_string(),
        (false, true) => last.to_string(),
        (true, false) => first.to_string(),
        (false, false) => format!("{}, {}", last, first),
    }
}

pub fn load_and_clean(
    path: &Path,
    config: &DashboardConfig,
    options: LoadOptions,
) -> Result<(Vec<TimeEntry>, LoadReport)> {
    info!("Loading extract {}", path.display());
    let file = std::fs::File::open(path)?;
    load_from_reader(file, config, options)
}

pub fn load_from_reader<R: Read>(
    reader: R,
    config: &DashboardConfig,
    options: LoadOptions,
) -> Result<(Vec<TimeEntry>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(reader);
    let mut report = LoadReport::default();
    let mut seen: HashSet<RawRow> = HashSet::new();
    let mut entries: Vec<TimeEntry> = Vec::new();

    for (line, result) in rdr.deserialize::<RawRow>().enumerate() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("row {}: {}", line + 1, e);
                report.parse_errors += 1;
                continue;
            }
        };

        if clean_str(row.allocation_method.as_deref())
            .is_some_and(|m| m.eq_ignore_ascii_case(NOT_REQUIRED_TO_CLOCK))
        {
            report.not_required_to_clock += 1;
            continue;
        }

        let (Some(raw_office), Some(employee_id)) = (
            clean_str(row.office.as_deref()),
            clean_str(row.applicant_id.as_deref()),
        ) else {
            debug!("row {}: missing office or employee id", line + 1);
            report.parse_errors += 1;
            continue;
        };

        let (entry_type, entry_label) = entry_type_for(&row);
        if !options.keep_other && !entry_type.is_compliance_relevant() {
            report.excluded_other += 1;
            continue;
        }

        if seen.contains(&row) {
            report.duplicates += 1;
            continue;
        }

        let office = config.resolve_office(raw_office);
        if office != raw_office {
            report.consolidated_offices += 1;
        }

        let date = parse_date_safe(row.work_date.as_deref());
        if date.is_none() {
            report.undated_rows += 1;
        }

        entries.push(TimeEntry {
            office: office.to_string(),
            date,
            shift: clean_str(row.shift.as_deref()).unwrap_or("Unknown").to_string(),
            department: clean_str(row.department.as_deref()).unwrap_or("Unknown").to_string(),
            employee_id: employee_id.to_string(),
            employee_name: full_name(&row, employee_id),
            entry_type,
            entry_label,
            clock_in: parse_datetime_safe(row.time_start.as_deref()),
            clock_out: parse_datetime_safe(row.time_end.as_deref()),
            regular_hours: parse_f64_safe(row.regular_hours.as_deref()).unwrap_or(0.0),
            overtime_hours: parse_f64_safe(row.overtime_hours.as_deref()).unwrap_or(0.0),
            double_time_hours: parse_f64_safe(row.double_time_hours.as_deref()).unwrap_or(0.0),
            holiday_hours: parse_f64_safe(row.holiday_hours.as_deref()).unwrap_or(0.0),
            clock_in_tries: parse_u32_safe(row.clock_in_tries.as_deref()).unwrap_or(1),
            clock_out_tries: parse_u32_safe(row.clock_out_tries.as_deref()).unwrap_or(1),
        });
        seen.insert(row);
    }

    report.kept_rows = entries.len();
    info!(
        "Loaded {} of {} rows ({} parse errors, {} undated, {} duplicates)",
        report.kept_rows, report.total_rows, report.parse_errors, report.undated_rows, report.duplicates
    );
    Ok((entries, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str = "ApplicantID,LastName,FirstName,OfcName,BUDeptName,ShiftNumber,WorkDate,ClockIn_Method,ClockOut_Method,RegHours,OTHours,ClockIn_Tries,Allocation_Method\n";

    fn load(body: &str, options: LoadOptions) -> (Vec<TimeEntry>, LoadReport) {
        let text = format!("{}{}", HEADER, body);
        load_from_reader(text.as_bytes(), &DashboardConfig::default(), options).unwrap()
    }

    #[test]
    fn clock_methods_map_to_entry_types() {
        let cases = [
            (Some("Finger"), Some("finger"), EntryType::Finger),
            (Some("FINGER"), Some("REASSIGN"), EntryType::Finger),
            (Some("REASSIGN"), Some("FINGER"), EntryType::Finger),
            (None, Some("NULL"), EntryType::WriteIn),
            (Some("EMPID"), Some("FINGER"), EntryType::Provisional),
            (Some("FINGER"), None, EntryType::MissingClockOut),
            (Some("FINGER"), Some("MISSING C/O MNGR SUPPLIED"), EntryType::MissingClockOut),
            (None, Some("FINGER"), EntryType::Other),
            (Some("SWAP"), Some("FINGER"), EntryType::Other),
            (Some("REASSIGN"), Some("REASSIGN"), EntryType::Other),
        ];
        for (ci, co, expected) in cases {
            assert_eq!(derive_entry_type(ci, co).0, expected, "{:?}/{:?}", ci, co);
        }
        assert_eq!(derive_entry_type(None, Some("FINGER")).1, "Missing c/in");
        assert_eq!(derive_entry_type(Some("WKEND RAW PAIR SPLT"), Some("FINGER")).1, "Programming or Wk End Rw Pair Split");
        assert_eq!(derive_entry_type(Some("FOO"), Some("BAR")).1, "Programming Issue");
    }

    #[test]
    fn rows_are_cleaned_and_consolidated() {
        let (entries, report) = load(
            "101,Doe,Jane,Blue Ash,Packing,1,2024-06-03,FINGER,FINGER,8,1.5,2,\n",
            LoadOptions::default(),
        );
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.consolidated_offices, 1);
        let e = &entries[0];
        assert_eq!(e.office, "P&G Cincinnati");
        assert_eq!(e.employee_name, "Doe, Jane");
        assert_eq!(e.date, NaiveDate::from_ymd_opt(2024, 6, 3));
        assert_eq!(e.entry_type, EntryType::Finger);
        assert_eq!(e.total_hours(), 9.5);
        assert_eq!(e.clock_in_tries, 2);
        assert_eq!(e.clock_out_tries, 1);
    }

    #[test]
    fn quality_problems_are_counted() {
        let body = "\
101,Doe,Jane,Dayton,Packing,1,2024-06-03,FINGER,FINGER,8,0,1,\n\
101,Doe,Jane,Dayton,Packing,1,2024-06-03,FINGER,FINGER,8,0,1,\n\
102,Roe,Rick,Dayton,Packing,1,not-a-date,EMPID,FINGER,8,0,1,\n\
,Nobody,Here,Dayton,Packing,1,2024-06-03,FINGER,FINGER,8,0,1,\n\
103,Poe,Ann,Dayton,Packing,1,2024-06-03,FINGER,FINGER,8,0,1,NOT_REQ_TO_CLOCK\n\
104,Moe,Bo,Dayton,Packing,1,2024-06-03,SWAP,FINGER,8,0,1,\n";
        let (entries, report) = load(body, LoadOptions::default());
        assert_eq!(report.total_rows, 6);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.parse_errors, 1);
        assert_eq!(report.not_required_to_clock, 1);
        assert_eq!(report.excluded_other, 1);
        assert_eq!(report.undated_rows, 1);
        assert_eq!(report.kept_rows, 2);
        assert_eq!(entries[1].date, None);
        assert_eq!(entries[1].entry_type, EntryType::Provisional);
    }

    #[test]
    fn other_entries_survive_when_requested() {
        let (entries, report) = load(
            "104,Moe,Bo,Dayton,,,2024-06-03,SWAP,FINGER,,,,\n",
            LoadOptions { keep_other: true },
        );
        assert_eq!(report.excluded_other, 0);
        assert_eq!(entries[0].entry_type, EntryType::Other);
        assert_eq!(entries[0].entry_label, "Time-Swap");
        assert_eq!(entries[0].department, "Unknown");
        assert_eq!(entries[0].shift, "Unknown");
        assert_eq!(entries[0].total_hours(), 0.0);
    }

    #[test]
    fn explicit_entry_type_column_wins() {
        let text = "ApplicantID,OfcName,WorkDate,EntryType,ClockIn_Method,ClockOut_Method\n\
                    7,Dayton,2024-06-03,Write-In,FINGER,FINGER\n\
                    8,Dayton,2024-06-03,Time-Swap,FINGER,FINGER\n";
        let (entries, report) = load_from_reader(
            text.as_bytes(),
            &DashboardConfig::default(),
            LoadOptions { keep_other: true },
        )
        .unwrap();
        assert_eq!(report.kept_rows, 2);
        assert_eq!(entries[0].entry_type, EntryType::WriteIn);
        assert_eq!(entries[0].employee_name, "7");
        assert_eq!(entries[1].entry_type, EntryType::Other);
        assert_eq!(entries[1].entry_label, "Time-Swap");
    }
}
