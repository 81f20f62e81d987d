// In-process fact table for time entries.
//
// Persisted as a JSON snapshot. Bulk replacement builds the new table first
// and swaps it in with one assignment, and the snapshot is written to a temp
// file then renamed, so neither memory nor disk ever holds a half-replaced range.
use crate::config::DashboardConfig;
use crate::errors::{KpiError, Result};
use crate::types::TimeEntry;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Predicate narrowing applied before aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub offices: Vec<String>,
    pub departments: Vec<String>,
    pub shifts: Vec<String>,
}

impl Filters {
    fn has_date_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn matches(&self, entry: &TimeEntry) -> bool {
        if self.has_date_range() {
            let Some(date) = entry.date else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        (self.offices.is_empty() || self.offices.contains(&entry.office))
            && (self.departments.is_empty() || self.departments.contains(&entry.department))
            && (self.shifts.is_empty() || self.shifts.contains(&entry.shift))
    }
}

/// How an import lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Append,
    /// Swap out stored entries in the extract's work-date span.
    Replace,
}

/// First and last work date among `entries`, if any is dated.
pub fn date_span(entries: &[TimeEntry]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = entries.iter().filter_map(|e| e.date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeEntryStore {
    entries: Vec<TimeEntry>,
}

impl TimeEntryStore {
    pub fn new(entries: Vec<TimeEntry>) -> Self {
        TimeEntryStore { entries }
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Store {} not found, starting empty", path.display());
            return Ok(TimeEntryStore::default());
        }
        let file = std::fs::File::open(path)?;
        let store: TimeEntryStore = serde_json::from_reader(std::io::BufReader::new(file))?;
        info!("Loaded {} entries from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let file = std::fs::File::create(&tmp)?;
            let mut writer = std::io::BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            std::io::Write::flush(&mut writer)?;
        }
        std::fs::rename(&tmp, path)?;
        info!("Saved {} entries to {}", self.len(), path.display());
        Ok(())
    }

    pub fn append(&mut self, entries: Vec<TimeEntry>) {
        self.entries.extend(entries);
    }

    /// Apply an import. Returns how many stored entries were removed.
    pub fn import(&mut self, incoming: Vec<TimeEntry>, mode: ImportMode) -> usize {
        match mode {
            ImportMode::Append => {
                self.append(incoming);
                0
            }
            ImportMode::Replace => {
                let span = date_span(&incoming);
                self.replace_span(span, incoming)
            }
        }
    }

    /// Replace every entry dated `from..=to` with `incoming`. Stored undated
    /// entries are dropped only when `incoming` carries an identical one.
    pub fn replace_range(&mut self, from: NaiveDate, to: NaiveDate, incoming: Vec<TimeEntry>) -> usize {
        self.replace_span(Some((from, to)), incoming)
    }

    fn replace_span(&mut self, span: Option<(NaiveDate, NaiveDate)>, incoming: Vec<TimeEntry>) -> usize {
        let undated: Vec<TimeEntry> = incoming.iter().filter(|e| e.date.is_none()).cloned().collect();
        let removed = self.swap_in(
            |e| match e.date {
                Some(d) => span.is_some_and(|(from, to)| from <= d && d <= to),
                None => undated.contains(e),
            },
            incoming,
        );
        info!("Replaced span {:?}: removed {} entries", span, removed);
        removed
    }

    pub fn delete_year(&mut self, year: i32) -> usize {
        let removed = self.swap_in(|e| e.date.is_some_and(|d| d.year() == year), Vec::new());
        info!("Deleted {} entries dated {}", removed, year);
        removed
    }

    fn swap_in<F>(&mut self, remove: F, incoming: Vec<TimeEntry>) -> usize
    where
        F: Fn(&TimeEntry) -> bool,
    {
        let before = self.entries.len();
        let mut next: Vec<TimeEntry> = self.entries.iter().filter(|e| !remove(e)).cloned().collect();
        let removed = before - next.len();
        next.extend(incoming);
        self.entries = next;
        removed
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.entries.iter().filter_map(|e| e.date.map(|d| d.year())).collect()
    }

    pub fn known_offices(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.office.as_str()).collect()
    }

    pub fn known_departments(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.department.as_str()).collect()
    }

    pub fn known_shifts(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.shift.as_str()).collect()
    }

    /// Reject filters that cannot match anything the dashboard knows about.
    pub fn validate(&self, filters: &Filters, config: &DashboardConfig) -> Result<()> {
        if let (Some(from), Some(to)) = (filters.from, filters.to) {
            if from > to {
                return Err(KpiError::invalid(format!("date range {} .. {} is inverted", from, to)));
            }
        }
        let offices = self.known_offices();
        if let Some(office) = filters
            .offices
            .iter()
            .find(|o| !offices.contains(o.as_str()) && !config.offices.contains_key(o.as_str()))
        {
            return Err(KpiError::invalid(format!("unknown office `{}`", office)));
        }
        let departments = self.known_departments();
        if let Some(department) = filters.departments.iter().find(|d| !departments.contains(d.as_str())) {
            return Err(KpiError::invalid(format!("unknown department `{}`", department)));
        }
        let shifts = self.known_shifts();
        if let Some(shift) = filters.shifts.iter().find(|s| !shifts.contains(s.as_str())) {
            return Err(KpiError::invalid(format!("unknown shift `{}`", shift)));
        }
        Ok(())
    }

    pub fn query(&self, filters: &Filters, config: &DashboardConfig) -> Result<Vec<&TimeEntry>> {
        self.validate(filters, config)?;
        let selected: Vec<&TimeEntry> = self.entries.iter().filter(|e| filters.matches(e)).collect();
        if filters.has_date_range() {
            let undated = self.entries.iter().filter(|e| e.date.is_none()).count();
            if undated > 0 {
                debug!("{} undated entries fall outside the requested date range", undated);
            }
        }
        debug!("Query selected {} of {} entries", selected.len(), self.len());
        Ok(selected)
    }
}
