// Entry point and CLI flow.
//
// - `import` loads and cleans an extract into the entry store.
// - `kpis` runs one grouped KPI request and previews it.
// - `report` writes the multi-sheet workbook (and optional CSVs).
use anyhow::{Context, Result};
use bstt_report::kpi::{compute_kpis, GroupBy, KpiRequest, WeekView};
use bstt_report::loader::{self, LoadOptions, LoadReport};
use bstt_report::store::{date_span, Filters, ImportMode, TimeEntryStore};
use bstt_report::types::{EntrySampleRow, ImportSummaryRow, TimeEntry};
use bstt_report::{output, reports, util, week, DashboardConfig};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "bstt_report", about = "Biometric time-tracking compliance KPIs and reports")]
struct Cli {
    /// Dashboard configuration (offices, thresholds, priorities).
    #[arg(long, env = "BSTT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// JSON snapshot holding imported time entries.
    #[arg(long, env = "BSTT_STORE", default_value = "bstt_store.json", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a CSV extract into the store.
    Import {
        input: PathBuf,
        /// Replace stored entries for every year present in the extract.
        #[arg(long)]
        replace: bool,
        /// Show what would be imported without saving.
        #[arg(long)]
        dry_run: bool,
        /// Keep entries outside the compliance entry types.
        #[arg(long)]
        keep_other: bool,
    },
    /// Compute KPIs for one grouping.
    Kpis {
        /// none, office, week, department, shift or employee.
        #[arg(long, default_value = "none")]
        group_by: String,
        /// Merge offices that share a reporting week.
        #[arg(long)]
        merge_weeks: bool,
        #[command(flatten)]
        filters: FilterArgs,
        /// Also write the result as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long, default_value_t = 25)]
        preview_rows: usize,
    },
    /// Write the multi-sheet workbook.
    Report {
        #[arg(long, default_value = "bstt_report.xlsx")]
        out: PathBuf,
        /// Also write one CSV per sheet into this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Remove every stored entry dated in a year.
    DeleteYear { year: i32 },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Whole calendar year.
    #[arg(long, conflicts_with = "weeks")]
    year: Option<i32>,
    /// Last N payroll weeks ending on the most recent Sunday.
    #[arg(long)]
    weeks: Option<u32>,
    #[arg(long = "office")]
    offices: Vec<String>,
    #[arg(long = "department")]
    departments: Vec<String>,
    #[arg(long = "shift")]
    shifts: Vec<String>,
}

impl FilterArgs {
    /// Explicit `--from`/`--to` override the ends of a `--year` or `--weeks` window.
    fn to_filters(&self, today: NaiveDate) -> Result<Filters> {
        let window = match (self.year, self.weeks) {
            (Some(year), _) => {
                Some(week::year_window(year).with_context(|| format!("year {} out of range", year))?)
            }
            (None, Some(weeks)) => Some(week::payroll_window(today, weeks)),
            (None, None) => None,
        };
        Ok(Filters {
            from: self.from.or(window.map(|w| w.0)),
            to: self.to.or(window.map(|w| w.1)),
            offices: self.offices.clone(),
            departments: self.departments.clone(),
            shifts: self.shifts.clone(),
        })
    }
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    match path {
        Some(p) => DashboardConfig::load(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(DashboardConfig::default()),
    }
}

fn print_load_report(report: &LoadReport) {
    let stages = [
        ("Rows read", report.total_rows),
        ("Kept", report.kept_rows),
        ("Parse errors", report.parse_errors),
        ("Undated (kept)", report.undated_rows),
        ("Not required to clock", report.not_required_to_clock),
        ("Non-compliance types", report.excluded_other),
        ("Duplicates", report.duplicates),
        ("Consolidated offices", report.consolidated_offices),
    ];
    let rows: Vec<ImportSummaryRow> = stages
        .iter()
        .map(|(stage, n)| ImportSummaryRow {
            stage: stage.to_string(),
            rows: util::format_int(*n as u64),
        })
        .collect();
    output::preview_table_rows(&rows, rows.len());
}

fn handle_import(
    store_path: &Path,
    config: &DashboardConfig,
    input: &Path,
    replace: bool,
    dry_run: bool,
    keep_other: bool,
) -> Result<()> {
    let (entries, load_report) = loader::load_and_clean(input, config, LoadOptions { keep_other })
        .with_context(|| format!("loading extract {}", input.display()))?;
    print_load_report(&load_report);

    if entries.is_empty() {
        warn!("No entries found in {}", input.display());
        return Ok(());
    }

    if dry_run {
        println!("DRY RUN - nothing saved. Would import {} entries.\n", util::format_int(entries.len() as u64));
        let sample: Vec<EntrySampleRow> = entries
            .iter()
            .take(5)
            .map(|e| EntrySampleRow {
                office: e.office.clone(),
                work_date: e.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
                employee: e.employee_name.clone(),
                entry_type: e.entry_label.clone(),
            })
            .collect();
        output::preview_table_rows(&sample, sample.len());
        return Ok(());
    }

    let mut store = TimeEntryStore::load(store_path)?;
    let imported = entries.len();
    if replace {
        let span = date_span(&entries);
        let removed = store.import(entries, ImportMode::Replace);
        match span {
            Some((from, to)) => println!(
                "Deleted {} existing entries dated {} to {}",
                util::format_int(removed as u64),
                from,
                to
            ),
            None => println!("Deleted {} existing undated entries", util::format_int(removed as u64)),
        }
    } else {
        store.import(entries, ImportMode::Append);
    }
    store.save(store_path)?;
    println!(
        "Import complete: {} entries saved ({} in store).",
        util::format_int(imported as u64),
        util::format_int(store.len() as u64)
    );
    Ok(())
}

fn select<'a>(store: &'a TimeEntryStore, config: &DashboardConfig, filters: &FilterArgs) -> Result<Vec<&'a TimeEntry>> {
    let today = Local::now().date_naive();
    let filters = filters.to_filters(today)?;
    info!("Filters: {:?}", filters);
    Ok(store.query(&filters, config)?)
}

fn handle_kpis(
    store: &TimeEntryStore,
    config: &DashboardConfig,
    group_by: &str,
    merge_weeks: bool,
    filters: &FilterArgs,
    json: Option<&Path>,
    preview_rows: usize,
) -> Result<()> {
    let group_by: GroupBy = group_by.parse()?;
    let thresholds = config.thresholds()?;
    let entries = select(store, config, filters)?;
    let mut request = KpiRequest::new(group_by);
    if merge_weeks {
        request = request.merged_weeks();
    }

    let result = compute_kpis(entries.iter().copied(), &request, config);
    if result.excluded_undated > 0 {
        println!(
            "Note: {} undated entries excluded from weekly grouping.",
            util::format_int(result.excluded_undated)
        );
    }

    let spec = reports::SheetSpec {
        name: "KPIs",
        group_by,
        week_view: if merge_weeks { WeekView::Merged } else { WeekView::PerOffice },
        metrics: reports::MetricSet::Compliance,
    };
    output::preview_sheet(&reports::build_sheet(&spec, &result, config, &thresholds), preview_rows);

    if let Some(path) = json {
        output::write_json(path, &result.to_json(&thresholds))?;
        println!("(Full result exported to {})", path.display());
    }
    Ok(())
}

fn handle_report(
    store: &TimeEntryStore,
    config: &DashboardConfig,
    out: &Path,
    csv_dir: Option<&Path>,
    filters: &FilterArgs,
) -> Result<()> {
    let thresholds = config.thresholds()?;
    let entries = select(store, config, filters)?;
    println!("Generating report over {} entries...", util::format_int(entries.len() as u64));

    let report = reports::generate_report(&entries, config, &thresholds);
    output::write_xlsx(out, &report).with_context(|| format!("writing {}", out.display()))?;
    if let Some(dir) = csv_dir {
        output::write_report_csv(dir, &report)?;
    }
    if let Some(summary) = report.sheets.first() {
        output::preview_sheet(summary, 1);
    }
    println!("(Full report exported to {})", out.display());
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Import {
            input,
            replace,
            dry_run,
            keep_other,
        } => handle_import(&cli.store, &config, &input, replace, dry_run, keep_other),
        Command::Kpis {
            group_by,
            merge_weeks,
            filters,
            json,
            preview_rows,
        } => {
            let store = TimeEntryStore::load(&cli.store)?;
            handle_kpis(&store, &config, &group_by, merge_weeks, &filters, json.as_deref(), preview_rows)
        }
        Command::Report { out, csv_dir, filters } => {
            let store = TimeEntryStore::load(&cli.store)?;
            handle_report(&store, &config, &out, csv_dir.as_deref(), &filters)
        }
        Command::DeleteYear { year } => {
            let mut store = TimeEntryStore::load(&cli.store)?;
            let removed = store.delete_year(year);
            store.save(&cli.store)?;
            println!("Deleted {} entries dated {}.", util::format_int(removed as u64), year);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn repo_file(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name)
    }

    #[test]
    fn import_dry_run_saves_nothing_and_replace_is_stable() {
        let store_path = std::env::temp_dir().join(format!("bstt_import_test_{}.json", std::process::id()));
        std::fs::remove_file(&store_path).ok();
        let config = DashboardConfig::load(&repo_file("bstt_config.example.json")).unwrap();
        let extract = repo_file("demos/sample_extract.csv");

        handle_import(&store_path, &config, &extract, true, true, false).unwrap();
        assert!(!store_path.exists());

        handle_import(&store_path, &config, &extract, false, false, false).unwrap();
        assert_eq!(TimeEntryStore::load(&store_path).unwrap().len(), 8);
        handle_import(&store_path, &config, &extract, false, false, false).unwrap();
        assert_eq!(TimeEntryStore::load(&store_path).unwrap().len(), 16);

        handle_import(&store_path, &config, &extract, true, false, false).unwrap();
        let once = TimeEntryStore::load(&store_path).unwrap();
        handle_import(&store_path, &config, &extract, true, false, false).unwrap();
        let twice = TimeEntryStore::load(&store_path).unwrap();
        std::fs::remove_file(&store_path).ok();
        assert_eq!(once.len(), 8);
        assert_eq!(twice, once);
    }

    #[test]
    fn filter_args_build_windows() {
        let args = FilterArgs {
            weeks: Some(2),
            offices: vec!["Dayton".to_string()],
            ..FilterArgs::default()
        };
        let filters = args.to_filters(d(2024, 6, 12)).unwrap();
        assert_eq!(filters.from, Some(d(2024, 5, 27)));
        assert_eq!(filters.to, Some(d(2024, 6, 9)));
        assert_eq!(filters.offices, vec!["Dayton"]);

        let args = FilterArgs {
            year: Some(2025),
            to: Some(d(2025, 3, 31)),
            ..FilterArgs::default()
        };
        let filters = args.to_filters(d(2024, 6, 12)).unwrap();
        assert_eq!(filters.from, Some(d(2025, 1, 1)));
        assert_eq!(filters.to, Some(d(2025, 3, 31)));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "bstt_report",
            "kpis",
            "--group-by",
            "week",
            "--merge-weeks",
            "--office",
            "A",
            "--office",
            "B",
            "--from",
            "2024-06-01",
        ])
        .unwrap();
        match cli.command {
            Command::Kpis { group_by, merge_weeks, filters, .. } => {
                assert_eq!(group_by, "week");
                assert!(merge_weeks);
                assert_eq!(filters.offices, vec!["A", "B"]);
                assert_eq!(filters.from, Some(d(2024, 6, 1)));
            }
            _ => panic!("expected kpis"),
        }
        assert!(Cli::try_parse_from(["bstt_report", "report", "--year", "2024", "--weeks", "2"]).is_err());
    }
}
