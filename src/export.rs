use std::fs::File;
use std::io::Write;
use std::path::Path;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::{DdctError, Result};
use crate::results::{LongObservation, WideTable};

/// Sheet name used for xlsx exports
pub const SHEET_NAME: &str = "Results";

/// Output format of an exported table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Xlsx,
}
impl TableFormat {
    /// Field delimiter; `None` for workbooks
    pub fn delimiter(&self) -> Option<u8> {
        match self {
            TableFormat::Csv => Some(b','),
            TableFormat::Tsv => Some(b'\t'),
            TableFormat::Xlsx => None,
        }
    }

    /// Infers the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("csv") => Ok(TableFormat::Csv),
            Some(e) if e.eq_ignore_ascii_case("tsv") || e.eq_ignore_ascii_case("txt") => {
                Ok(TableFormat::Tsv)
            }
            Some(e) if e.eq_ignore_ascii_case("xlsx") => Ok(TableFormat::Xlsx),
            _ => Err(DdctError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

fn csv_writer<W: Write>(writer: W, delimiter: u8) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer)
}

/// Builds a single-sheet workbook and writes its bytes
fn write_workbook<W, F>(mut writer: W, fill: F) -> Result<()>
where
    W: Write,
    F: FnOnce(&mut Worksheet) -> std::result::Result<(), rust_xlsxwriter::XlsxError>,
{
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;
    fill(sheet)?;
    writer.write_all(&workbook.save_to_buffer()?)?;
    writer.flush()?;
    Ok(())
}

/// Writes the long table, one line per observation
pub fn write_long<W: Write>(
    writer: W,
    observations: &[LongObservation],
    format: TableFormat,
) -> Result<()> {
    let Some(delimiter) = format.delimiter() else {
        return write_workbook(writer, |sheet| {
            for (col, name) in LONG_HEADER.iter().enumerate() {
                sheet.write_string(0, col as u16, *name)?;
            }
            for (idx, obs) in observations.iter().enumerate() {
                let row = idx as u32 + 1;
                sheet.write_string(row, 0, obs.sample_id.as_str())?;
                sheet.write_string(row, 1, obs.group.as_str())?;
                sheet.write_string(row, 2, obs.gene.as_str())?;
                let values = [
                    obs.ct_housekeeping,
                    obs.ct_target,
                    obs.delta_ct_housekeeping,
                    obs.delta_ct_target,
                    obs.housekeeping_factor,
                    obs.target_factor,
                    obs.normalized_expression,
                    obs.log2_expression,
                ];
                for (offset, value) in values.into_iter().enumerate() {
                    sheet.write_number(row, 3 + offset as u16, value)?;
                }
            }
            Ok(())
        });
    };

    let mut writer = csv_writer(writer, delimiter);
    if observations.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record(LONG_HEADER)?;
    }
    for obs in observations {
        writer.serialize(obs)?;
    }
    writer.flush()?;
    Ok(())
}

const LONG_HEADER: [&str; 11] = [
    "sample_id",
    "group",
    "gene",
    "ct_housekeeping",
    "ct_target",
    "delta_ct_housekeeping",
    "delta_ct_target",
    "pow2_delta_ct_housekeeping",
    "pow2_delta_ct_target",
    "normalized_expression",
    "log2_expression",
];

/// Writes the wide table; genes without an observation are left blank
pub fn write_wide<W: Write>(writer: W, wide: &WideTable, format: TableFormat) -> Result<()> {
    let header = ["sample_id".to_string(), "group".to_string()]
        .into_iter()
        .chain(wide.genes.iter().map(|gene| format!("log2_expr_{gene}")));

    let Some(delimiter) = format.delimiter() else {
        return write_workbook(writer, |sheet| {
            for (col, name) in header.enumerate() {
                sheet.write_string(0, col as u16, name)?;
            }
            for (idx, row) in wide.rows.iter().enumerate() {
                let line = idx as u32 + 1;
                sheet.write_string(line, 0, row.sample_id.as_str())?;
                sheet.write_string(line, 1, row.group.as_str())?;
                for (offset, value) in row.log2_expression.iter().enumerate() {
                    if let Some(value) = value {
                        sheet.write_number(line, 2 + offset as u16, *value)?;
                    }
                }
            }
            Ok(())
        });
    };

    let mut writer = csv_writer(writer, delimiter);
    writer.write_record(header)?;
    for row in &wide.rows {
        let values = row
            .log2_expression
            .iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_default());
        let record = [row.sample_id.clone(), row.group.clone()]
            .into_iter()
            .chain(values);
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_long_to_path<P: AsRef<Path>>(
    path: P,
    observations: &[LongObservation],
) -> Result<()> {
    let format = TableFormat::from_path(&path)?;
    write_long(File::create(path)?, observations, format)
}

pub fn write_wide_to_path<P: AsRef<Path>>(path: P, wide: &WideTable) -> Result<()> {
    let format = TableFormat::from_path(&path)?;
    write_wide(File::create(path)?, wide, format)
}
