//! Compliance KPIs over biometric time-tracking extracts.
//!
//! Entries are loaded from payroll extracts, kept in a [`store::TimeEntryStore`],
//! aggregated by [`kpi::compute_kpis`] and assembled into a workbook by
//! [`reports::generate_report`].
pub mod config;
pub mod errors;
pub mod kpi;
pub mod loader;
pub mod output;
pub mod reports;
pub mod store;
pub mod types;
pub mod util;
pub mod week;

pub use config::DashboardConfig;
pub use errors::{KpiError, Result};
pub use kpi::{compute_kpis, GroupBy, KpiRequest, KpiResult, Thresholds, WeekView};
pub use reports::{generate_report, Report};
pub use store::{Filters, TimeEntryStore};
pub use types::{EntryType, TimeEntry};
