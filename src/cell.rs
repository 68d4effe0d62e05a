use std::collections::HashMap;

/// A single cell as delivered by a tabular source
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    Text(String),
    Number(f64),
    #[default]
    Empty,
}

impl RawValue {
    /// Coerces the cell into a usable Ct value
    ///
    /// Text is trimmed and parsed as a decimal number. The value is usable only
    /// when it is finite and strictly positive: a Ct of zero (or below) is not a
    /// cycle count, so it is reported as absent rather than as zero.
    pub fn as_ct(&self) -> Option<f64> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            RawValue::Empty => return None,
        };
        (value.is_finite() && value > 0.0).then_some(value)
    }

    /// Trimmed text rendering of the cell
    pub fn as_text(&self) -> String {
        match self {
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Empty => String::new(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

static EMPTY: RawValue = RawValue::Empty;

/// A row of a table: column name to raw cell value
///
/// Columns that are not present read as [`RawValue::Empty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, RawValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cell, returning the row for chaining
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<RawValue>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> &RawValue {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    /// Trimmed text of a column
    pub fn text(&self, column: &str) -> String {
        self.get(column).as_text()
    }

    /// Usable Ct value of a column
    pub fn ct(&self, column: &str) -> Option<f64> {
        self.get(column).as_ct()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let cells = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { cells }
    }
}
