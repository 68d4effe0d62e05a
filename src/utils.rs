use itertools::Itertools;

use crate::cell::Row;

/// Distinct non-empty trimmed values of `column`, in first-seen order
pub fn unique_values(rows: &[Row], column: &str) -> Vec<String> {
    rows.iter()
        .map(|row| row.text(column))
        .filter(|value| !value.is_empty())
        .unique()
        .collect()
}
