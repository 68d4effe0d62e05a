//! ddct: Relative qPCR Expression with the Delta-Delta-Ct Method
//!
//! This library turns tables of qPCR cycle-threshold (Ct) values into relative
//! expression: each target gene is normalized against a housekeeping gene and
//! against the mean Ct values of a designated control group.
//!
//! The main components of this library are:
//! - `DeltaDeltaCt` / `analyze`: The normalization engine
//! - `AnalysisConfig`: Column selection and control group for a run
//! - `AnalysisResults`: Long table, wide table, per-gene summaries and groups
//! - `Source` / `Table`: Loading CSV, TSV and spreadsheet workbooks
//! - `write_long` / `write_wide`: Exporting the result tables as CSV, TSV or xlsx

mod cell;
mod config;
mod ddct;
mod error;
mod export;
mod loader;
mod math;
mod results;
mod utils;

pub use cell::{RawValue, Row};
pub use config::AnalysisConfig;
pub use ddct::{analyze, DeltaDeltaCt};
pub use error::{DdctError, Result};
pub use export::{
    write_long, write_long_to_path, write_wide, write_wide_to_path, TableFormat, SHEET_NAME,
};
pub use loader::{Source, Table};
pub use results::{
    AnalysisResults, ControlBaseline, GeneSummary, GroupSeries, LongObservation, WideRow,
    WideTable,
};
pub use utils::unique_values;
