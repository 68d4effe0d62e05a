//! Tabular sources: delimited text and spreadsheet workbooks.
//!
//! Every source is exposed as a set of named sheets. Parsing a sheet yields a
//! [`Table`] whose headers come from the first row; data cells missing from a
//! shorter row read as empty.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader, Sheets};
use tracing::debug;

use crate::cell::{RawValue, Row};
use crate::error::{DdctError, Result};

/// Headers plus rows of one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Reads delimited text with a header line
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let cells = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| (header.as_str(), text_cell(record.get(idx))));
            rows.push(cells.collect::<Row>());
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), delimiter)
    }

    pub(crate) fn from_range(range: &calamine::Range<DataType>) -> Self {
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Self::default();
        };
        let headers = header_row.iter().map(cell_to_string).collect::<Vec<_>>();

        let rows = rows
            .filter(|cells| !cells.iter().all(|c| sheet_cell(c) == RawValue::Empty))
            .map(|cells| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(idx, header)| {
                        let value = cells.get(idx).map(sheet_cell).unwrap_or_default();
                        (header.as_str(), value)
                    })
                    .collect::<Row>()
            })
            .collect();

        Self { headers, rows }
    }
}

fn text_cell(field: Option<&str>) -> RawValue {
    match field {
        Some(s) if !s.trim().is_empty() => RawValue::Text(s.to_string()),
        _ => RawValue::Empty,
    }
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Empty => String::new(),
        DataType::Bool(b) => b.to_string(),
        DataType::Error(e) => format!("ERR({e:?})"),
        DataType::Float(n) | DataType::Duration(n) => n.to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::DateTime(f) => f.to_string(),
        DataType::DateTimeIso(s) | DataType::DurationIso(s) => s.clone(),
    }
}

fn sheet_cell(cell: &DataType) -> RawValue {
    match cell {
        DataType::Float(n) => RawValue::Number(*n),
        DataType::Int(i) => RawValue::Number(*i as f64),
        DataType::Empty => RawValue::Empty,
        DataType::String(s) if s.trim().is_empty() => RawValue::Empty,
        other => RawValue::Text(cell_to_string(other)),
    }
}

/// An opened tabular source
pub enum Source {
    /// A CSV or TSV file, exposed as a single sheet named after the file stem
    Delimited { name: String, table: Table },
    Workbook(Sheets<BufReader<File>>),
}

impl Source {
    /// Opens `path`, choosing the parser from its extension
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("data")
            .to_string();

        let source = match extension.as_str() {
            "csv" => Source::Delimited {
                name,
                table: Table::from_path(path, b',')?,
            },
            "tsv" | "txt" => Source::Delimited {
                name,
                table: Table::from_path(path, b'\t')?,
            },
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Source::Workbook(open_workbook_auto(path)?),
            _ => return Err(DdctError::UnsupportedFormat(path.display().to_string())),
        };

        if source.sheet_names().is_empty() {
            return Err(DdctError::EmptyData(format!(
                "{} contains no sheets",
                path.display()
            )));
        }
        debug!(path = %path.display(), sheets = ?source.sheet_names(), "opened source");
        Ok(source)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        match self {
            Source::Delimited { name, .. } => vec![name.clone()],
            Source::Workbook(workbook) => workbook.sheet_names().to_vec(),
        }
    }

    /// Parses the named sheet
    pub fn table(&mut self, sheet: &str) -> Result<Table> {
        match self {
            Source::Delimited { name, table } if name == sheet => Ok(table.clone()),
            Source::Delimited { .. } => Err(DdctError::SheetNotFound(sheet.to_string())),
            Source::Workbook(workbook) => {
                let index = workbook
                    .sheet_names()
                    .iter()
                    .position(|name| name == sheet)
                    .ok_or_else(|| DdctError::SheetNotFound(sheet.to_string()))?;
                let range = workbook
                    .worksheet_range_at(index)
                    .ok_or_else(|| DdctError::SheetNotFound(sheet.to_string()))??;
                Ok(Table::from_range(&range))
            }
        }
    }

    /// Parses the first sheet
    pub fn first_table(&mut self) -> Result<Table> {
        let names = self.sheet_names();
        let first = names
            .first()
            .ok_or_else(|| DdctError::EmptyData("source contains no sheets".to_string()))?;
        self.table(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Range;

    use crate::{analyze, AnalysisConfig};

    #[test]
    fn test_delimited_reader() {
        let data = "id\tgrp\tHK\tGeneA\nS1\tCtrl\t20.1\t25\nS2\tTreat\t21\n";
        let table = Table::from_reader(data.as_bytes(), b'\t').unwrap();
        assert_eq!(table.headers, vec!["id", "grp", "HK", "GeneA"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].ct("HK"), Some(20.1));
        assert_eq!(table.rows[0].text("grp"), "Ctrl");
        assert_eq!(table.rows[1].get("GeneA"), &RawValue::Empty);
    }

    #[test]
    fn test_blank_cells_are_empty() {
        let data = "id,grp,HK\nS1, ,20\n";
        let table = Table::from_reader(data.as_bytes(), b',').unwrap();
        assert_eq!(table.rows[0].get("grp"), &RawValue::Empty);
    }

    #[test]
    fn test_header_only() {
        let table = Table::from_reader("id,grp\n".as_bytes(), b',').unwrap();
        assert_eq!(table.headers.len(), 2);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_delimiter_only_lines_are_skipped() {
        let data = "id,grp,HK,A\nS1,Ctrl,20,25\nS2,Treat,21,24\n,,,\n , ,,\n";
        let table = Table::from_reader(data.as_bytes(), b',').unwrap();
        assert_eq!(table.rows.len(), 2);

        let config = AnalysisConfig::builder()
            .sample_column("id")
            .group_column("grp")
            .housekeeping_column("HK")
            .target_columns(vec!["A".to_string()])
            .control_group("Ctrl")
            .build();
        let results = analyze(&table.rows, &config).unwrap();
        assert_eq!(results.summary[0].processed, 2);
        assert_eq!(results.summary[0].discarded, 0);
    }

    fn text(s: &str) -> DataType {
        DataType::String(s.to_string())
    }

    #[test]
    fn test_workbook_range() {
        // header, data, blank, whitespace-only, data with a trailing empty cell
        let mut range = Range::new((0, 0), (4, 2));
        range.set_value((0, 0), text("id"));
        range.set_value((0, 1), text("grp"));
        range.set_value((0, 2), text("HK"));
        range.set_value((1, 0), text("S1"));
        range.set_value((1, 1), text("Ctrl"));
        range.set_value((1, 2), DataType::Float(20.5));
        range.set_value((3, 1), text("  "));
        range.set_value((4, 0), text("S2"));
        range.set_value((4, 1), text("Treat"));

        let table = Table::from_range(&range);
        assert_eq!(table.headers, vec!["id", "grp", "HK"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].ct("HK"), Some(20.5));
        assert_eq!(table.rows[1].text("id"), "S2");
        assert_eq!(table.rows[1].get("HK"), &RawValue::Empty);
    }

    #[test]
    fn test_workbook_header_only_and_empty() {
        let mut range = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), text("id"));
        range.set_value((0, 1), DataType::Int(7));
        let table = Table::from_range(&range);
        assert_eq!(table.headers, vec!["id", "7"]);
        assert!(table.rows.is_empty());

        let table = Table::from_range(&Range::<DataType>::empty());
        assert_eq!(table, Table::default());
    }

    #[test]
    fn test_sheet_cells() {
        assert_eq!(sheet_cell(&DataType::Float(21.5)), RawValue::Number(21.5));
        assert_eq!(sheet_cell(&DataType::Int(30)), RawValue::Number(30.0));
        assert_eq!(sheet_cell(&DataType::Empty), RawValue::Empty);
        assert_eq!(
            sheet_cell(&DataType::String("Undetermined".to_string())),
            RawValue::Text("Undetermined".to_string())
        );
        assert_eq!(
            sheet_cell(&DataType::Bool(true)),
            RawValue::Text("true".to_string())
        );
    }
}
