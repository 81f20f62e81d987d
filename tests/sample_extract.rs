use bstt_report::kpi::{GroupKey, Rate};
use bstt_report::loader::{load_and_clean, LoadOptions};
use bstt_report::output::report_to_xlsx_bytes;
use bstt_report::week::ReportingWeek;
use bstt_report::{compute_kpis, generate_report, DashboardConfig, Filters, GroupBy, KpiRequest, TimeEntryStore};
use std::path::PathBuf;

fn repo_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name)
}

fn sample_store() -> (TimeEntryStore, DashboardConfig) {
    let config = DashboardConfig::load(&repo_file("bstt_config.example.json")).unwrap();
    let (entries, report) = load_and_clean(&repo_file("demos/sample_extract.csv"), &config, LoadOptions::default()).unwrap();
    assert_eq!(report.total_rows, 11);
    assert_eq!(report.kept_rows, 8);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.excluded_other, 1);
    assert_eq!(report.not_required_to_clock, 1);
    assert_eq!(report.undated_rows, 1);
    assert_eq!(report.consolidated_offices, 4);
    (TimeEntryStore::new(entries), config)
}

#[test]
fn merged_week_spans_both_conventions() {
    let (store, config) = sample_store();
    let entries = store.query(&Filters::default(), &config).unwrap();

    let merged = compute_kpis(entries.iter().copied(), &KpiRequest::new(GroupBy::Week).merged_weeks(), &config);
    assert_eq!(merged.excluded_undated, 1);
    let week = ReportingWeek { year: 2024, week: 23 };
    let record = merged.get(&GroupKey::Week { week, office: None }).unwrap();
    assert_eq!(record.entries, 7);

    let per_office = compute_kpis(entries.iter().copied(), &KpiRequest::new(GroupBy::Week), &config);
    let dayton = per_office
        .get(&GroupKey::Week { week, office: Some("Dayton".to_string()) })
        .unwrap();
    assert_eq!(dayton.entries, 3);
    assert_eq!(dayton.provisional_rate(), Rate::new(1, 3));
}

#[test]
fn overall_rates_come_from_counts() {
    let (store, config) = sample_store();
    let entries = store.query(&Filters::default(), &config).unwrap();
    let result = compute_kpis(entries.iter().copied(), &KpiRequest::new(GroupBy::None), &config);
    let all = result.get(&GroupKey::All).unwrap();
    assert_eq!(all.entries, 8);
    assert_eq!(all.finger_rate(), Rate::new(5, 8));
    assert_eq!(all.write_in_rate(), Rate::new(1, 8));
    assert_eq!(all.missing_clock_out_rate(), Rate::new(1, 8));
    assert_eq!(all.multi_attempt, 2);
    assert_eq!(all.undated, 1);
}

#[test]
fn filtered_report_is_repeatable() {
    let (store, config) = sample_store();
    let thresholds = config.thresholds().unwrap();
    let filters = Filters {
        offices: vec!["Dayton".to_string()],
        ..Filters::default()
    };
    let entries = store.query(&filters, &config).unwrap();
    assert_eq!(entries.len(), 4);

    let first = generate_report(&entries, &config, &thresholds);
    let second = generate_report(&entries, &config, &thresholds);
    assert_eq!(first, second);

    let departments = first.sheets.iter().find(|s| s.name == "Department Compliance").unwrap();
    let names: Vec<String> = departments.rows.iter().map(|r| r[0].render()).collect();
    assert_eq!(names, vec!["Packing", "Receiving"]);

    let bytes = report_to_xlsx_bytes(&first).unwrap();
    assert!(!bytes.is_empty());
}

#[test]
fn unknown_department_is_an_invalid_request() {
    let (store, config) = sample_store();
    let filters = Filters {
        departments: vec!["Finance".to_string()],
        ..Filters::default()
    };
    assert!(store.query(&filters, &config).is_err());
}
